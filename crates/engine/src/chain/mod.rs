//! Chain controller and progression engine.
//!
//! A [`Chain`] owns an ordered queue of steps and the set of capacitors that currently block
//! progression. Draining pops steps one at a time while nothing is outstanding; a step pauses
//! the chain simply by creating capacitors and returning. Resolving the last outstanding
//! capacitor resumes the drain.

use std::{
    cell::{Ref, RefMut},
    fmt,
    rc::{Rc, Weak},
};

use anyhow::Result;
use flux_types::{ChainMode, ChainSnapshot, ChainState};
use tracing::{debug, trace};

pub mod builder;
mod controls;
pub(crate) mod state;

pub use builder::ChainBuilder;

use self::state::{ChainCore, ChainInner};

/// Fluent handle to a sequencer.
///
/// Cloning is cheap and every clone drives the same queue. Steps receive the handle as their
/// continuation argument, so they can push further work, create capacitors or cancel.
pub struct Chain<C: 'static> {
    core: Rc<ChainCore<C>>,
}

/// Context bound to chains constructed without one: a weak handle back to the chain itself.
#[derive(Clone)]
pub struct ChainRef {
    core: Weak<ChainCore<ChainRef>>,
}

impl ChainRef {
    /// Upgrades to the owning chain, or `None` once every strong handle has been dropped.
    pub fn chain(&self) -> Option<Chain<ChainRef>> {
        self.core.upgrade().map(Chain::from_core)
    }
}

impl fmt::Debug for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.upgrade() {
            Some(core) => f.debug_struct("ChainRef").field("label", &core.label).finish(),
            None => f.write_str("ChainRef(<dropped>)"),
        }
    }
}

impl Chain<ChainRef> {
    /// Creates a chain whose context is its own handle, scheduled on the current Tokio `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`; use [`ChainBuilder::scheduler`] to drive the
    /// chain from another event loop.
    pub fn new() -> Self {
        ChainBuilder::new().build()
    }
}

impl Default for Chain<ChainRef> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> Chain<C> {
    /// Creates a chain bound to `context`, scheduled on the current Tokio `LocalSet`.
    pub fn with_context(context: C) -> Self {
        ChainBuilder::new().build_with_context(context)
    }

    pub(crate) fn from_core(core: Rc<ChainCore<C>>) -> Self {
        Self { core }
    }

    /// Label attached to this chain's log events.
    pub fn label(&self) -> &str {
        &self.core.label
    }

    /// Context passed to every step and callback capacitor.
    pub fn context(&self) -> &C {
        &self.core.context
    }

    /// Appends `step` to the call queue and returns the handle so pushes compose.
    ///
    /// Pushing never starts a drain by itself. Queued steps run on the first scheduled tick or
    /// once an outstanding capacitor resolves. Steps pushed after [`Chain::elude`] are dropped.
    pub fn push<F>(&self, step: F) -> &Self
    where
        F: FnOnce(&C, &Chain<C>) -> Result<()> + 'static,
    {
        let mut inner = self.inner_mut();
        if inner.mode.is_eluded() {
            trace!(chain = %self.core.label, "chain eluded; dropping pushed step");
            return self;
        }
        inner.calls.push_back(Box::new(step));
        trace!(chain = %self.core.label, pending = inner.calls.len(), "step queued");
        self
    }

    /// Runs queued steps until the queue empties, a capacitor is outstanding, or the chain is
    /// eluded.
    ///
    /// A request made while a drain is already running on the stack returns immediately; the
    /// running loop re-checks the queue and the dependency set after every step. The first step
    /// error stops the drain and is returned unchanged.
    pub(crate) fn proceed(&self) -> Result<()> {
        {
            let mut inner = self.inner_mut();
            if inner.draining {
                trace!(chain = %self.core.label, "drain already running");
                return Ok(());
            }
            inner.draining = true;
        }
        let _guard = DrainGuard { core: &self.core };

        loop {
            let next = self.inner_mut().take_ready_step();
            let Some(step) = next else {
                break;
            };
            trace!(chain = %self.core.label, step = self.inner().steps_run, "running step");
            step(&self.core.context, self)?;
        }

        let inner = self.inner();
        debug!(
            chain = %self.core.label,
            pending = inner.calls.len(),
            outstanding = inner.dependencies.len(),
            "drain paused"
        );
        Ok(())
    }

    /// Current cancellation mode.
    pub fn mode(&self) -> ChainMode {
        self.inner().mode
    }

    /// Lifecycle state derived from the mode, the queue and the dependency set.
    pub fn state(&self) -> ChainState {
        self.inner().state()
    }

    /// Number of steps waiting in the call queue.
    pub fn pending_steps(&self) -> usize {
        self.inner().calls.len()
    }

    /// Number of capacitors created and not yet resolved.
    pub fn outstanding_capacitors(&self) -> usize {
        self.inner().dependencies.len()
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let inner = self.inner();
        ChainSnapshot {
            label: self.core.label.clone(),
            mode: inner.mode,
            state: inner.state(),
            pending_steps: inner.calls.len(),
            outstanding_capacitors: inner.dependencies.len(),
            steps_run: inner.steps_run,
            capacitors_created: inner.capacitors_created(),
            resolutions: inner.resolutions,
        }
    }

    /// Returns `true` when both handles drive the same chain.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    pub(crate) fn inner(&self) -> Ref<'_, ChainInner<C>> {
        self.core.inner.borrow()
    }

    pub(crate) fn inner_mut(&self) -> RefMut<'_, ChainInner<C>> {
        self.core.inner.borrow_mut()
    }
}

impl<C: 'static> Clone for Chain<C> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<C: 'static> fmt::Debug for Chain<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Chain")
                .field("label", &self.core.label)
                .field("mode", &inner.mode)
                .field("pending_steps", &inner.calls.len())
                .field("outstanding_capacitors", &inner.dependencies.len())
                .finish(),
            Err(_) => f.debug_struct("Chain").field("label", &self.core.label).finish_non_exhaustive(),
        }
    }
}

/// Clears the draining flag when the drain loop exits, including on error or unwind.
struct DrainGuard<'a, C: 'static> {
    core: &'a ChainCore<C>,
}

impl<C: 'static> Drop for DrainGuard<'_, C> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.core.inner.try_borrow_mut() {
            inner.draining = false;
        }
    }
}
