//! Async runtime helpers for synchronous entry points.
//!
//! Chains are `!Send` and schedule their first drain with `spawn_local`, so they must live on a
//! single-threaded runtime inside a Tokio `LocalSet`. This module provides the one entry point
//! that sets that up.

use std::future::Future;

use anyhow::anyhow;
use tokio::task::LocalSet;

/// Run `future` to completion on a fresh current-thread runtime inside a `LocalSet`.
///
/// # Arguments
/// - `future`: The future to drive; it may freely call `tokio::task::spawn_local`.
///
/// # Returns
/// Returns the future's output or an error if the Tokio runtime cannot be created.
///
/// # Notes
/// - Timers and I/O drivers are enabled.
/// - Local tasks still pending when `future` completes are dropped with the runtime.
pub fn run_local<F>(future: F) -> anyhow::Result<F::Output>
where
    F: Future,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| anyhow!(error))?;
    let local = LocalSet::new();
    Ok(local.block_on(&runtime, future))
}
