//! Owned controller state: the call queue, the dependency set and the mode.
//!
//! Everything here is plain data mutated through short `RefCell` borrows taken by
//! [`Chain`](super::Chain). No method in this module calls back into user code, so a borrow
//! taken here can never be observed by a step or a callback.

use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
};

use anyhow::Result;
use flux_types::{CapacitorId, ChainMode, ChainState};

use super::Chain;

/// A queued unit of work, invoked with the bound context and the continuation handle.
pub(crate) type Step<C> = Box<dyn FnOnce(&C, &Chain<C>) -> Result<()>>;

pub(crate) struct ChainCore<C: 'static> {
    pub(crate) label: String,
    pub(crate) context: C,
    pub(crate) inner: RefCell<ChainInner<C>>,
}

impl<C: 'static> ChainCore<C> {
    pub(crate) fn new(label: String, context: C) -> Self {
        Self {
            label,
            context,
            inner: RefCell::new(ChainInner::new()),
        }
    }
}

pub(crate) struct ChainInner<C: 'static> {
    /// Steps waiting to run, in push order.
    pub(crate) calls: VecDeque<Step<C>>,
    /// Capacitors created and not yet resolved.
    pub(crate) dependencies: HashSet<CapacitorId>,
    pub(crate) mode: ChainMode,
    /// Set while a drain loop is on the stack.
    pub(crate) draining: bool,
    next_capacitor: u64,
    pub(crate) steps_run: u64,
    pub(crate) resolutions: u64,
}

impl<C: 'static> ChainInner<C> {
    fn new() -> Self {
        Self {
            calls: VecDeque::new(),
            dependencies: HashSet::new(),
            mode: ChainMode::Active,
            draining: false,
            next_capacitor: 0,
            steps_run: 0,
            resolutions: 0,
        }
    }

    /// Allocates a capacitor id and counts it as outstanding straight away.
    pub(crate) fn register_capacitor(&mut self) -> CapacitorId {
        let id = CapacitorId(self.next_capacitor);
        self.next_capacitor += 1;
        self.dependencies.insert(id);
        id
    }

    /// Removes `id` from the dependency set. Returns `false` when it was already resolved.
    pub(crate) fn release(&mut self, id: CapacitorId) -> bool {
        let removed = self.dependencies.remove(&id);
        if removed {
            self.resolutions += 1;
        }
        removed
    }

    /// Pops the next step if, and only if, nothing blocks progression.
    pub(crate) fn take_ready_step(&mut self) -> Option<Step<C>> {
        if self.mode.is_eluded() || !self.dependencies.is_empty() {
            return None;
        }
        let step = self.calls.pop_front()?;
        self.steps_run += 1;
        Some(step)
    }

    /// Empties the call queue, handing the discarded steps back so they can be dropped
    /// after the borrow is released.
    pub(crate) fn discard_calls(&mut self) -> VecDeque<Step<C>> {
        std::mem::take(&mut self.calls)
    }

    pub(crate) fn capacitors_created(&self) -> u64 {
        self.next_capacitor
    }

    pub(crate) fn state(&self) -> ChainState {
        match self.mode {
            ChainMode::Eluded => ChainState::Eluded,
            _ if self.draining => ChainState::Draining,
            _ if !self.dependencies.is_empty() => ChainState::Blocked,
            ChainMode::Escaped => ChainState::Escaped,
            ChainMode::Active => ChainState::Idle,
        }
    }
}
