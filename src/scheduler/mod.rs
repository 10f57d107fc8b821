use crate::error::ScheduleError;
use crate::system::SystemId;
use crate::task::{TaskGraph, TaskId, TaskPool};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::panic;

mod builder;
mod cluster;
mod graph;
mod order;
mod run_now;

pub use builder::DependencyList;
pub use cluster::{Cluster, ClusterId};
pub use run_now::RunNow;

/// Short list of system IDs, e.g. the direct dependencies of one system.
pub(crate) type DepVec = SmallVec<[SystemId; 4]>;

/// A registered system and its name, copied out for task labels.
struct SystemTask<F> {
    system: Box<dyn RunNow<F>>,
    name: String,
}

/// Runs a fixed set of systems once per step, in parallel where
/// their dependencies allow.
///
/// Built once from a `DependencyList`. Systems are compacted into
/// clusters (chains of systems which run back to back on one worker)
/// and the clusters are given a fixed order respecting every
/// dependency between them; each step replays that plan.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SystemTopology<F> {
    /// Registered systems, keyed by ID.
    #[derivative(Debug = "ignore")]
    system_tasks: HashMap<SystemId, SystemTask<F>>,
    /// Task handle of each system for the step in progress.
    ///
    /// Reset at the start of every step.
    #[derivative(Debug = "ignore")]
    task_ids: HashMap<SystemId, TaskId>,
    clusters: Vec<Cluster>,
    cluster_order: Vec<ClusterId>,
}

impl<F> SystemTopology<F> {
    /// Builds a topology, failing if the declaration is inconsistent
    /// or contains a dependency cycle.
    pub fn new(list: DependencyList<F>) -> Result<Self, ScheduleError> {
        let declaration = list.resolve()?;

        let graph = graph::DependencyGraph::new(
            declaration
                .dependencies
                .iter()
                .map(|(id, parents)| (*id, parents.as_slice())),
        );
        let clustering = cluster::cluster(&graph)?;
        let cluster_order = order::order(&clustering.clusters, &clustering.owners)?;
        order::verify(&clustering.clusters, &clustering.owners, &cluster_order)?;

        let system_tasks: HashMap<SystemId, SystemTask<F>> = declaration
            .systems
            .into_iter()
            .map(|(id, system)| {
                let name = String::from(system.name());
                (id, SystemTask { system, name })
            })
            .collect();

        tracing::debug!(
            systems = system_tasks.len(),
            clusters = clustering.clusters.len(),
            "built system topology"
        );

        Ok(Self {
            task_ids: HashMap::with_capacity(system_tasks.len()),
            system_tasks,
            clusters: clustering.clusters,
            cluster_order,
        })
    }

    /// Returns the clusters of this topology, indexed by `ClusterId`.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Returns the order in which clusters are dispatched each step.
    pub fn cluster_order(&self) -> &[ClusterId] {
        &self.cluster_order
    }

    /// Returns the cluster containing the given system.
    pub fn cluster_of(&self, id: SystemId) -> Option<ClusterId> {
        self.clusters
            .iter()
            .position(|cluster| cluster.systems().contains(&id))
            .map(ClusterId)
    }

    pub fn system_count(&self) -> usize {
        self.system_tasks.len()
    }

    pub fn system_name(&self, id: SystemId) -> Option<&str> {
        self.system_tasks.get(&id).map(|task| task.name.as_str())
    }
}

impl<F> SystemTopology<F>
where
    F: Sync,
{
    /// Runs every system exactly once against `frame`, returning
    /// only after all of them have finished.
    ///
    /// Systems in unrelated chains run concurrently and share `frame`,
    /// so state they both mutate must use interior mutability.
    ///
    /// # Panics
    /// If a system panics, no further systems are started and the panic
    /// resumes here once systems already running have finished.
    pub fn step(&mut self, pool: &TaskPool, frame: &mut F) {
        let frame: &F = frame;
        let system_tasks = &self.system_tasks;
        let task_ids = &mut self.task_ids;
        task_ids.clear();

        let mut graph = TaskGraph::with_capacity(system_tasks.len() + 1);

        // Parent of every system task; completes once all have.
        let barrier = graph.create("step", || {});

        // Materialize one continuation chain per cluster.
        let mut roots: Vec<TaskId> = Vec::with_capacity(self.clusters.len());
        for cluster_id in &self.cluster_order {
            let mut prev_task: Option<TaskId> = None;

            for id in self.clusters[cluster_id.0].systems() {
                let system_task = &system_tasks[id];
                let system = &*system_task.system;
                let this_task = graph.create(&system_task.name, move || system.run_now(frame));
                graph.set_parent(this_task, barrier);

                match prev_task {
                    Some(prev_task) => graph.add_continuation(prev_task, this_task),
                    None => roots.push(this_task),
                }

                task_ids.insert(*id, this_task);
                prev_task = Some(this_task);
            }
        }

        let graph = &graph;
        let task_ids = &*task_ids;
        pool.scope(|scope| {
            for (cluster_id, root) in self.cluster_order.iter().zip(&roots) {
                let cluster = &self.clusters[cluster_id.0];

                for dependency in cluster.external_dependencies() {
                    let task = match task_ids.get(dependency) {
                        Some(task) => *task,
                        None => panic!("{}", ScheduleError::MissingTaskHandle(*dependency)),
                    };
                    if graph.wait(task).is_err() {
                        return;
                    }
                }

                tracing::trace!(
                    cluster = cluster_id.0,
                    root = %cluster.root(),
                    "launching cluster"
                );
                graph.launch(scope, *root);
            }

            graph.launch(scope, barrier);
            let _ = graph.wait(barrier);
        });

        if let Some(payload) = graph.take_panic() {
            panic::resume_unwind(payload);
        }
    }
}
