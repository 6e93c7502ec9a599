//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the global `fmt` subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `configured`, which wins over `info`. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing(configured: Option<&str>) {
    let filter = resolve_filter(std::env::var("RUST_LOG").ok(), configured);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_filter(from_env: Option<String>, configured: Option<&str>) -> String {
    from_env
        .filter(|value| !value.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}
