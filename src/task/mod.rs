//! The task engine driven by the scheduler.
//!
//! A `TaskPool` owns the worker threads. Each step builds a fresh
//! `TaskGraph`: an arena of tasks linked by continuation and parent
//! relations, which is then launched onto the pool and waited on.

mod atomic_bit_set;

pub use atomic_bit_set::AtomicBitSet;

use crate::error::PoolError;
use parking_lot::Mutex;
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Configuration for a `TaskPool`.
#[derive(Debug, Clone)]
pub struct TaskPoolConfig {
    /// Number of worker threads. `None` lets rayon decide
    /// (which honors `RAYON_NUM_THREADS`).
    pub num_threads: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name: String,
    /// Stack size for worker threads, in bytes.
    pub stack_size: Option<usize>,
}

impl Default for TaskPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: String::from("topology-worker"),
            stack_size: None,
        }
    }
}

impl TaskPoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn thread_name(mut self, prefix: &str) -> Self {
        self.thread_name = String::from(prefix);
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

/// Worker threads which execute tasks. Passed explicitly to every
/// step, so several pools and topologies may coexist.
pub struct TaskPool {
    pool: ThreadPool,
}

impl TaskPool {
    /// Creates a pool with the given configuration.
    pub fn new(config: &TaskPoolConfig) -> Result<Self, PoolError> {
        let prefix = config.thread_name.clone();
        let mut builder =
            ThreadPoolBuilder::new().thread_name(move |index| format!("{}-{}", prefix, index));

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pool = builder.build()?;
        tracing::debug!(threads = pool.current_num_threads(), "created task pool");
        Ok(Self { pool })
    }

    /// Creates a pool with `num_threads` workers and default settings otherwise.
    pub fn with_threads(num_threads: usize) -> Result<Self, PoolError> {
        Self::new(&TaskPoolConfig::new().num_threads(num_threads))
    }

    /// Returns the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` on the calling thread with a scope onto which
    /// tasks may be launched. Returns once `op` and every task
    /// launched in the scope have finished.
    ///
    /// The calling thread is not a worker: it may block freely
    /// inside `op` without starving the pool.
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R,
    {
        self.pool.in_place_scope(op)
    }
}

/// Handle to a task within a `TaskGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

type Body<'env> = Box<dyn FnOnce() + Send + 'env>;

struct Task<'env> {
    label: &'env str,
    /// Taken when the task runs.
    body: Mutex<Option<Body<'env>>>,
    continuation: Option<TaskId>,
    parent: Option<TaskId>,
    /// One for the body plus one per child not yet complete.
    pending: AtomicUsize,
}

/// Returned by `TaskGraph::wait` when a task body panicked
/// before the awaited task could complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poisoned;

/// Per-step arena of tasks.
///
/// Tasks are created and linked through `&mut self`, then launched
/// and waited on through `&self`. Bodies may borrow anything
/// outliving `'env`; each body is dropped as soon as it runs.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TaskGraph<'env> {
    #[derivative(Debug = "ignore")]
    tasks: Vec<Task<'env>>,
    /// Bit set of completed tasks, indexed by `TaskId`.
    #[derivative(Debug = "ignore")]
    completed: AtomicBitSet,
    poisoned: AtomicBool,
    #[derivative(Debug = "ignore")]
    panic: Mutex<Option<Box<dyn Any + Send + 'static>>>,
}

impl<'env> TaskGraph<'env> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tasks: Vec::with_capacity(capacity),
            completed: AtomicBitSet::with_capacity(capacity),
            poisoned: AtomicBool::new(false),
            panic: Mutex::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Creates a task which will run `body` once launched.
    pub fn create<B>(&mut self, label: &'env str, body: B) -> TaskId
    where
        B: FnOnce() + Send + 'env,
    {
        let id = TaskId(self.tasks.len());
        self.tasks.push(Task {
            label,
            body: Mutex::new(Some(Box::new(body))),
            continuation: None,
            parent: None,
            pending: AtomicUsize::new(1),
        });
        self.completed.grow(self.tasks.len());
        id
    }

    /// Makes `next` run on the same worker directly after `task`'s body.
    ///
    /// # Panics
    /// Panics if `task` already has a continuation.
    pub fn add_continuation(&mut self, task: TaskId, next: TaskId) {
        let slot = &mut self.tasks[task.0];
        assert!(
            slot.continuation.is_none(),
            "task {} already has a continuation",
            slot.label
        );
        slot.continuation = Some(next);
    }

    /// Makes `parent` complete only once `child` has completed.
    ///
    /// # Panics
    /// Panics if `child` already has a parent.
    pub fn set_parent(&mut self, child: TaskId, parent: TaskId) {
        let slot = &mut self.tasks[child.0];
        assert!(
            slot.parent.is_none(),
            "task {} already has a parent",
            slot.label
        );
        slot.parent = Some(parent);
        *self.tasks[parent.0].pending.get_mut() += 1;
    }

    /// Launches `task` asynchronously on `scope`. Its continuations
    /// follow on the same worker.
    pub fn launch<'scope>(&'scope self, scope: &Scope<'scope>, task: TaskId)
    where
        'env: 'scope,
    {
        tracing::trace!(task = self.tasks[task.0].label, "launching task");
        scope.spawn(move |_| self.run(task));
    }

    /// Blocks the calling thread until `task` has completed.
    pub fn wait(&self, task: TaskId) -> Result<(), Poisoned> {
        self.completed
            .wait_until(|| self.completed.contains(task.0) || self.is_poisoned());

        if self.completed.contains(task.0) {
            Ok(())
        } else {
            Err(Poisoned)
        }
    }

    pub fn is_complete(&self, task: TaskId) -> bool {
        self.completed.contains(task.0)
    }

    /// Returns whether a task body panicked.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Takes the payload of the first panic raised by a task body.
    pub fn take_panic(&self) -> Option<Box<dyn Any + Send + 'static>> {
        self.panic.lock().take()
    }

    fn run(&self, mut task: TaskId) {
        loop {
            if self.is_poisoned() {
                return;
            }

            let slot = &self.tasks[task.0];
            let body = slot.body.lock().take();
            if let Some(body) = body {
                tracing::trace!(task = slot.label, "running task");
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
                    self.poison(slot.label, payload);
                    return;
                }
            }
            self.release(task);

            match slot.continuation {
                Some(next) => task = next,
                None => return,
            }
        }
    }

    /// Drops one pending count from `task`, completing it
    /// (and releasing its parent) once none remain.
    fn release(&self, task: TaskId) {
        let slot = &self.tasks[task.0];
        if slot.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.completed.insert(task.0, true);
            if let Some(parent) = slot.parent {
                self.release(parent);
            }
        }
    }

    fn poison(&self, label: &str, payload: Box<dyn Any + Send + 'static>) {
        tracing::warn!(task = label, "task panicked; abandoning step");
        {
            let mut panic = self.panic.lock();
            if panic.is_none() {
                *panic = Some(payload);
            }
        }
        self.poisoned.store(true, Ordering::Release);
        self.completed.notify();
    }
}

impl<'env> Default for TaskGraph<'env> {
    fn default() -> Self {
        Self::new()
    }
}
