use std::any::type_name;
use std::fmt;

/// Unique ID of a system. Assigned by the author of the system
/// and stable for the lifetime of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct SystemId(pub usize);

impl From<usize> for SystemId {
    fn from(x: usize) -> Self {
        Self(x)
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A view into the frame which a system fetches before it runs.
pub trait SystemData<'a, F>: Sized {
    fn fetch(frame: &'a F) -> Self;
}

impl<'a, F> SystemData<'a, F> for &'a F {
    fn fetch(frame: &'a F) -> Self {
        frame
    }
}

impl<'a, F> SystemData<'a, F> for () {
    fn fetch(_frame: &'a F) -> Self {}
}

/// A system: one independently schedulable unit of step logic
/// operating on frames of type `F`.
pub trait System<F>: Send + Sync {
    type SystemData<'a>: SystemData<'a, F>
    where
        F: 'a;

    /// Returns the ID of this system.
    fn id(&self) -> SystemId;

    /// Returns a human-readable name, used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    fn run(&self, data: Self::SystemData<'_>);
}

/// A system backed by a closure. Created with `system_fn`.
pub struct FnSystem<Func> {
    id: SystemId,
    name: String,
    func: Func,
}

/// Creates a system which calls `func` with the frame each step.
pub fn system_fn<F, Func>(id: SystemId, name: &str, func: Func) -> FnSystem<Func>
where
    Func: Fn(&F) + Send + Sync,
{
    FnSystem {
        id,
        name: String::from(name),
        func,
    }
}

impl<F, Func> System<F> for FnSystem<Func>
where
    Func: Fn(&F) + Send + Sync,
{
    type SystemData<'a> = &'a F where F: 'a;

    fn id(&self) -> SystemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, frame: &F) {
        (self.func)(frame)
    }
}

impl<Func> fmt::Debug for FnSystem<Func> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fn_system_runs_closure() {
        let system = system_fn(SystemId(3), "bump", |counter: &AtomicU32| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let counter = AtomicU32::new(0);

        assert_eq!(System::<AtomicU32>::id(&system), SystemId(3));
        assert_eq!(System::<AtomicU32>::name(&system), "bump");

        System::<AtomicU32>::run(&system, &counter);
        System::<AtomicU32>::run(&system, &counter);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn display() {
        assert_eq!(SystemId(12).to_string(), "#12");
    }
}
