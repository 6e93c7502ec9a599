use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flux_util::{FluxConfig, init_tracing, run_local};

mod scenario;

use scenario::{Scenario, ScenarioSettings};

#[derive(Debug, Parser)]
#[command(name = "flux", version, about = "Drive flux chains with timer-backed capacitors")]
struct Cli {
    /// Path to a JSON config file (defaults to FLUX_CONFIG_PATH or the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Tracing filter used when RUST_LOG is unset.
    #[arg(long, global = true)]
    log: Option<String>,
    /// Delay before each timer-backed capacitor fires, in milliseconds.
    #[arg(long, global = true)]
    tick_ms: Option<u64>,
    /// Label attached to the chain's log events.
    #[arg(long, global = true)]
    label: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run steps that each wait on one timer-backed capacitor.
    Sequence {
        #[arg(long, default_value_t = 3)]
        steps: usize,
    },
    /// Run one step that waits on several capacitors, resolved in reverse order.
    Join {
        #[arg(long, default_value_t = 3)]
        gates: usize,
    },
    /// Escape from the chain while step `at` runs; its capacitor still resolves.
    Escape {
        #[arg(long, default_value_t = 4)]
        steps: usize,
        #[arg(long, default_value_t = 1)]
        at: usize,
    },
    /// Elude the chain while step `at` is blocked; its capacitor is ignored.
    Elude {
        #[arg(long, default_value_t = 4)]
        steps: usize,
        #[arg(long, default_value_t = 1)]
        at: usize,
    },
}

impl From<Command> for Scenario {
    fn from(command: Command) -> Self {
        match command {
            Command::Sequence { steps } => Scenario::Sequence { steps },
            Command::Join { gates } => Scenario::Join { gates },
            Command::Escape { steps, at } => Scenario::Escape { steps, at },
            Command::Elude { steps, at } => Scenario::Elude { steps, at },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(cli.log.as_deref().or(config.log_filter.as_deref()));

    let settings = ScenarioSettings::resolve(&config, cli.label, cli.tick_ms);
    let scenario = Scenario::from(cli.command);
    let snapshot = run_local(scenario::run(scenario, settings))?;
    tracing::info!(chain = %snapshot.label, state = %snapshot.state, steps_run = snapshot.steps_run, "scenario finished");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<FluxConfig> {
    match path {
        Some(path) => FluxConfig::load_from(path).with_context(|| format!("failed to load config from {}", path.display())),
        None => FluxConfig::load().context("failed to load config"),
    }
}
