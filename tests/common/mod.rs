#![allow(dead_code)]

use system_topology::TaskPool;
use tracing_subscriber::EnvFilter;

/// Routes scheduler logs to the test harness. Filtered with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn pool(threads: usize) -> TaskPool {
    init_tracing();
    TaskPool::with_threads(threads).expect("failed to create task pool")
}
