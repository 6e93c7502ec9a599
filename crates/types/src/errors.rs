//! Error types for chain and capacitor misuse.

use thiserror::Error;

use crate::chain::CapacitorId;

/// Errors raised by the sequencer itself.
///
/// Failures produced by steps and callbacks are never wrapped in this type; they travel back
/// to the caller exactly as the step returned them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FluxError {
    #[error("capacitor {id} was invoked from inside its own callback")]
    CallbackReentered { id: CapacitorId },
}
