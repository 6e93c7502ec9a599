//! Shared type definitions for the flux sequencer.
//!
//! These types describe the observable side of a chain (its mode, derived state and
//! snapshots) and the small error taxonomy shared by the engine and its callers. They carry no
//! behavior of their own so the CLI and tests can depend on them without pulling in the engine.

pub mod chain;
pub mod errors;

pub use chain::{CapacitorId, CapacitorVariant, ChainConfig, ChainMode, ChainSnapshot, ChainState, DEFAULT_CHAIN_LABEL};
pub use errors::FluxError;
