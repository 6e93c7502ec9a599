//! Runtime, logging and configuration helpers shared by flux binaries.

pub mod async_runtime;
pub mod config;
pub mod logging;

pub use async_runtime::run_local;
pub use config::{CONFIG_PATH_ENV, ConfigError, DemoConfig, FluxConfig, default_config_path};
pub use logging::init_tracing;
