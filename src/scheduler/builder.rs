use crate::error::ScheduleError;
use crate::scheduler::run_now::RunNow;
use crate::scheduler::{DepVec, SystemTopology};
use crate::system::{System, SystemId};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Declares systems and the systems each one runs after.
///
/// Consumed by `SystemTopology::new`, which validates it.
pub struct DependencyList<F> {
    entries: Vec<Entry>,
    systems: Vec<Box<dyn RunNow<F>>>,
}

struct Entry {
    system: SystemId,
    dependencies: DepVec,
}

impl<F> Default for DependencyList<F> {
    fn default() -> Self {
        Self {
            entries: vec![],
            systems: vec![],
        }
    }
}

impl<F> DependencyList<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `system`, which runs after every system in `runs_after`.
    pub fn with<S: System<F> + 'static>(mut self, system: S, runs_after: &[SystemId]) -> Self {
        self.add(system, runs_after);
        self
    }

    /// Supplies the step function of a system that other systems
    /// depend on but which has no dependencies of its own.
    pub fn with_dependency<S: System<F> + 'static>(mut self, system: S) -> Self {
        self.register(system);
        self
    }

    pub fn add<S: System<F> + 'static>(&mut self, system: S, runs_after: &[SystemId]) -> &mut Self {
        self.entries.push(Entry {
            system: <S as System<F>>::id(&system),
            dependencies: runs_after.iter().copied().collect(),
        });
        self.systems.push(Box::new(system));
        self
    }

    pub fn register<S: System<F> + 'static>(&mut self, system: S) -> &mut Self {
        self.add(system, &[])
    }

    /// Builds the topology.
    pub fn build(self) -> Result<SystemTopology<F>, ScheduleError> {
        SystemTopology::new(self)
    }

    /// Validates the declaration and splits it into a parent set per
    /// system and a step function per system.
    pub(crate) fn resolve(self) -> Result<Declaration<F>, ScheduleError> {
        let mut systems: HashMap<SystemId, Box<dyn RunNow<F>>> =
            HashMap::with_capacity(self.systems.len());
        for system in self.systems {
            let id = system.id();
            if systems.contains_key(&id) {
                return Err(ScheduleError::DuplicateSystem(id));
            }
            systems.insert(id, system);
        }

        // Parent sets in order of first mention.
        let mut dependencies: Vec<(SystemId, DepVec)> = Vec::with_capacity(systems.len());
        let mut positions: HashMap<SystemId, usize> = HashMap::with_capacity(systems.len());

        for entry in self.entries {
            if entry.dependencies.contains(&entry.system) {
                return Err(ScheduleError::SelfDependency(entry.system));
            }

            if let Some(&dependency) = entry
                .dependencies
                .iter()
                .find(|dependency| !systems.contains_key(*dependency))
            {
                return Err(ScheduleError::UnknownDependency {
                    system: entry.system,
                    dependency,
                });
            }

            let position = *positions.entry(entry.system).or_insert_with(|| {
                dependencies.push((entry.system, SmallVec::new()));
                dependencies.len() - 1
            });
            let parents = &mut dependencies[position].1;
            for dependency in &entry.dependencies {
                if !parents.contains(dependency) {
                    parents.push(*dependency);
                }
            }

            for dependency in entry.dependencies {
                positions.entry(dependency).or_insert_with(|| {
                    dependencies.push((dependency, SmallVec::new()));
                    dependencies.len() - 1
                });
            }
        }

        Ok(Declaration {
            dependencies,
            systems,
        })
    }
}

/// A validated `DependencyList`.
pub(crate) struct Declaration<F> {
    /// Direct dependencies of every system, in order of first mention.
    pub dependencies: Vec<(SystemId, DepVec)>,
    /// Step function of every system.
    pub systems: HashMap<SystemId, Box<dyn RunNow<F>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::system_fn;

    fn noop(id: usize) -> impl System<()> {
        system_fn(SystemId(id), "noop", |_: &()| {})
    }

    #[test]
    fn dependency_only_systems_get_empty_parents() {
        let declaration = DependencyList::new()
            .with(noop(1), &[SystemId(0)])
            .with_dependency(noop(0))
            .resolve()
            .unwrap();

        assert_eq!(
            declaration.dependencies,
            vec![
                (SystemId(1), DepVec::from_slice(&[SystemId(0)])),
                (SystemId(0), DepVec::new()),
            ]
        );
        assert_eq!(declaration.systems.len(), 2);
    }

    #[test]
    fn duplicate_dependencies_collapse() {
        let declaration = DependencyList::new()
            .with_dependency(noop(0))
            .with(noop(1), &[SystemId(0), SystemId(0)])
            .resolve()
            .unwrap();

        assert_eq!(declaration.dependencies[1].1.as_slice(), &[SystemId(0)]);
    }

    #[test]
    fn self_dependency() {
        let result = DependencyList::new().with(noop(4), &[SystemId(4)]).resolve();
        assert_eq!(result.err(), Some(ScheduleError::SelfDependency(SystemId(4))));
    }

    #[test]
    fn unknown_dependency() {
        let result = DependencyList::new().with(noop(1), &[SystemId(9)]).resolve();
        assert_eq!(
            result.err(),
            Some(ScheduleError::UnknownDependency {
                system: SystemId(1),
                dependency: SystemId(9),
            })
        );
    }

    #[test]
    fn duplicate_system() {
        let result = DependencyList::new()
            .with(noop(2), &[])
            .with_dependency(noop(2))
            .resolve();
        assert_eq!(result.err(), Some(ScheduleError::DuplicateSystem(SystemId(2))));
    }
}
