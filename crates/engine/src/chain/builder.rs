//! Chain construction.

use std::rc::Rc;

use flux_types::ChainConfig;
use tracing::debug;

use super::{Chain, ChainRef, state::ChainCore};
use crate::scheduler::{Scheduler, TokioScheduler};

/// Configures and starts a [`Chain`].
///
/// Building always defers the first drain through the configured [`Scheduler`], so every step
/// pushed in the same synchronous burst is queued before anything runs.
pub struct ChainBuilder {
    label: String,
    scheduler: Box<dyn Scheduler>,
}

impl ChainBuilder {
    /// Builder with the default label and the Tokio `LocalSet` scheduler.
    pub fn new() -> Self {
        Self::from_config(&ChainConfig::default())
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            label: config.label.clone(),
            scheduler: Box::new(TokioScheduler),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Replaces the scheduler used for the first drain.
    pub fn scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: Scheduler + 'static,
    {
        self.scheduler = Box::new(scheduler);
        self
    }

    /// Builds a chain whose context is a weak handle to itself.
    pub fn build(self) -> Chain<ChainRef> {
        let label = self.label.clone();
        let core = Rc::new_cyclic(|weak| ChainCore::new(label, ChainRef { core: weak.clone() }));
        self.start(Chain::from_core(core))
    }

    /// Builds a chain bound to `context`.
    pub fn build_with_context<C: 'static>(self, context: C) -> Chain<C> {
        let core = Rc::new(ChainCore::new(self.label.clone(), context));
        self.start(Chain::from_core(core))
    }

    fn start<C: 'static>(self, chain: Chain<C>) -> Chain<C> {
        debug!(chain = %chain.label(), "scheduling first drain");
        let first_tick = chain.clone();
        self.scheduler.defer(Box::new(move || first_tick.proceed()));
        chain
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
