//! Error types surfaced while building a topology, a task pool
//! or an entity space.

use crate::storage::Entity;
use crate::SystemId;
use thiserror::Error;

/// Errors which abort construction of a `SystemTopology`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("system {dependency} is a dependency of {system} but has no step function")]
    UnknownDependency {
        system: SystemId,
        dependency: SystemId,
    },

    #[error("system {0} lists itself as a dependency")]
    SelfDependency(SystemId),

    #[error("system {0} was given more than one step function")]
    DuplicateSystem(SystemId),

    #[error("dependency cycle through systems {0:?}")]
    DependencyCycle(Vec<SystemId>),

    /// A cluster waits on a system which is not scheduled before it.
    /// This is a bug in clustering or ordering, never a user error.
    #[error("no task handle for system {0} when its dependants were scheduled")]
    MissingTaskHandle(SystemId),
}

/// Errors building a `TaskPool`.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to build worker threads: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Errors from an `EntitySpace`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("entity {0:?} does not exist")]
    UnknownEntity(Entity),
}
