//! Escape and elude: coarse cancellation over the whole remaining queue.

use flux_types::ChainMode;
use tracing::debug;

use super::Chain;

impl<C: 'static> Chain<C> {
    /// Discards every queued step.
    ///
    /// Outstanding capacitors still resolve and still resume draining, so steps pushed after
    /// escaping run once the dependency set empties.
    pub fn escape(&self) {
        let discarded = {
            let mut inner = self.inner_mut();
            if !inner.mode.is_eluded() {
                inner.mode = ChainMode::Escaped;
            }
            inner.discard_calls()
        };
        debug!(chain = %self.label(), discarded = discarded.len(), "chain escaped");
        drop(discarded);
    }

    /// Discards every queued step and permanently disables the chain.
    ///
    /// Every capacitor invocation afterwards is a no-op, including capacitors created before
    /// the call, and steps pushed later are dropped.
    pub fn elude(&self) {
        let discarded = {
            let mut inner = self.inner_mut();
            inner.mode = ChainMode::Eluded;
            inner.discard_calls()
        };
        debug!(chain = %self.label(), discarded = discarded.len(), "chain eluded");
        drop(discarded);
    }
}
