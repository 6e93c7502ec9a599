//! # Flux Engine
//!
//! An in-process asynchronous sequencer. Callers push an ordered list of steps onto a
//! [`Chain`]; any step may create one or more [`Capacitor`]s that must all be invoked by
//! external code before the next step runs.
//!
//! ## Key Features
//!
//! - **Ordered steps**: steps run strictly in push order, one at a time
//! - **Capacitors**: named-field or callback gates forming an AND-join per step
//! - **Deferred start**: the first drain always runs on a later scheduler tick
//! - **Cancellation**: [`Chain::escape`] drops the queue, [`Chain::elude`] also disables every
//!   capacitor
//!
//! ## Usage
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use flux_engine::{ChainBuilder, ManualScheduler};
//!
//! let scheduler = ManualScheduler::new();
//! let chain = ChainBuilder::new().scheduler(scheduler.clone()).build();
//! let parked = Rc::new(RefCell::new(None));
//!
//! let slot = Rc::clone(&parked);
//! chain
//!     .push(move |_, chain| {
//!         slot.replace(Some(chain.named(["value"])));
//!         Ok(())
//!     })
//!     .push(|_, _| {
//!         println!("resumed");
//!         Ok(())
//!     });
//!
//! scheduler.run_pending()?;
//! let gate = parked.borrow_mut().take();
//! if let Some(gate) = gate {
//!     gate.invoke([42])?;
//!     assert_eq!(gate.field("value"), Some(serde_json::json!(42)));
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - **`chain`**: controller state, the drain loop, construction and cancellation controls
//! - **`capacitor`**: the capacitor factory and gate invocation
//! - **`scheduler`**: deferred-tick seam with Tokio `LocalSet` and manual implementations

pub mod capacitor;
pub mod chain;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use capacitor::{Capacitor, CapacitorCallback, CapacitorKind};
pub use chain::{Chain, ChainBuilder, ChainRef};
pub use flux_types::{CapacitorId, CapacitorVariant, ChainConfig, ChainMode, ChainSnapshot, ChainState, FluxError};
pub use scheduler::{DeferredTask, ManualScheduler, Scheduler, TokioScheduler};
