//! Deferred-task scheduling for a chain's first drain.
//!
//! A chain never drains synchronously while it is being built. Instead the builder hands the
//! first drain to a [`Scheduler`], which runs it on a later tick of whatever event loop embeds
//! the chain.

use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use anyhow::Result;
use tracing::error;

/// A task deferred to a later tick.
pub type DeferredTask = Box<dyn FnOnce() -> Result<()>>;

/// Runs deferred tasks on a later tick of the embedding event loop.
pub trait Scheduler {
    /// Queue `task` to run after the current synchronous call stack unwinds.
    fn defer(&self, task: DeferredTask);
}

/// Schedules tasks on the current Tokio [`LocalSet`](tokio::task::LocalSet).
///
/// A detached local task has no caller to return an error to, so failures are logged.
///
/// # Panics
///
/// [`Scheduler::defer`] panics when called outside a `LocalSet`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn defer(&self, task: DeferredTask) {
        tokio::task::spawn_local(async move {
            if let Err(error) = task() {
                error!(error = %format!("{error:#}"), "deferred drain failed");
            }
        });
    }
}

/// Queues tasks until the embedding program calls [`ManualScheduler::run_pending`].
///
/// Clones share one queue, so a caller can keep a handle after passing the scheduler to a
/// builder.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<VecDeque<DeferredTask>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs queued tasks in FIFO order, including tasks deferred while running, and returns how
    /// many ran.
    ///
    /// # Errors
    ///
    /// Returns the first task error unchanged. Tasks after the failing one stay queued.
    pub fn run_pending(&self) -> Result<usize> {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            ran += 1;
            task()?;
        }
        Ok(ran)
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: DeferredTask) {
        self.queue.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler").field("pending", &self.pending()).finish()
    }
}
