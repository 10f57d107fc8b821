//! A dependency-driven, multi-threaded step scheduler.
//!
//! Systems are declared along with the systems they run after. The
//! resulting `SystemTopology` groups systems linked one-to-one into
//! sequential chains and orders the chains so that, on every step,
//! independent chains run in parallel on a `TaskPool` while each
//! system still runs after all of its dependencies.
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use system_topology::{system_fn, DependencyList, SystemId, TaskPool};
//!
//! const READ_INPUT: SystemId = SystemId(0);
//! const MOVE: SystemId = SystemId(1);
//!
//! let mut topology = DependencyList::new()
//!     .with_dependency(system_fn(READ_INPUT, "read_input", |ticks: &AtomicU32| {
//!         ticks.fetch_add(1, Ordering::SeqCst);
//!     }))
//!     .with(
//!         system_fn(MOVE, "move", |ticks: &AtomicU32| {
//!             assert_eq!(ticks.load(Ordering::SeqCst) % 2, 1);
//!             ticks.fetch_add(1, Ordering::SeqCst);
//!         }),
//!         &[READ_INPUT],
//!     )
//!     .build()
//!     .unwrap();
//!
//! let pool = TaskPool::with_threads(2).unwrap();
//! let mut ticks = AtomicU32::new(0);
//! topology.step(&pool, &mut ticks);
//! topology.step(&pool, &mut ticks);
//! assert_eq!(ticks.into_inner(), 4);
//! ```

#[macro_use]
extern crate derivative;

mod error;
mod mappings;
mod scheduler;
pub mod storage;
mod system;
pub mod task;

pub use error::{PoolError, ScheduleError, StorageError};
pub use scheduler::{Cluster, ClusterId, DependencyList, RunNow, SystemTopology};
pub use system::{system_fn, FnSystem, System, SystemData, SystemId};
pub use task::{TaskPool, TaskPoolConfig};
