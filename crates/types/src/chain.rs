//! Chain mode, state and snapshot types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label given to chains that were not named explicitly.
pub const DEFAULT_CHAIN_LABEL: &str = "flux";

/// Cancellation mode of a chain.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainMode {
    /// Steps drain normally and capacitors resolve normally.
    #[default]
    Active,
    /// The queue was discarded; capacitors still resolve and still resume draining.
    Escaped,
    /// Terminal. The queue was discarded and every capacitor invocation is ignored.
    Eluded,
}

impl ChainMode {
    /// Returns `true` once the chain has been eluded.
    pub fn is_eluded(self) -> bool {
        matches!(self, ChainMode::Eluded)
    }

    /// Whether capacitor invocations still take effect and resume draining.
    pub fn accepts_capacitors(self) -> bool {
        !self.is_eluded()
    }
}

/// Observable lifecycle state derived from a chain's mode, queue and dependencies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// No drain is running and nothing is blocking.
    Idle,
    /// A drain loop is currently executing steps.
    Draining,
    /// At least one capacitor is outstanding.
    Blocked,
    /// The queue was escaped and nothing is blocking or draining.
    Escaped,
    /// The chain was eluded.
    Eluded,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChainState::Idle => "idle",
            ChainState::Draining => "draining",
            ChainState::Blocked => "blocked",
            ChainState::Escaped => "escaped",
            ChainState::Eluded => "eluded",
        };
        f.write_str(label)
    }
}

/// Identity of a capacitor within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacitorId(pub u64);

impl fmt::Display for CapacitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cap-{}", self.0)
    }
}

/// Which behavior a capacitor runs when invoked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CapacitorVariant {
    /// Received arguments are stored under declared field names.
    NamedFields,
    /// Received arguments are forwarded to a callback.
    Callback,
}

/// Construction-time settings for a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Label attached to every log event emitted by the chain.
    #[serde(default = "default_label")]
    pub label: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { label: default_label() }
    }
}

fn default_label() -> String {
    DEFAULT_CHAIN_LABEL.to_string()
}

/// Point-in-time view of a chain, suitable for logging or JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub label: String,
    pub mode: ChainMode,
    pub state: ChainState,
    /// Steps still waiting in the call queue.
    pub pending_steps: usize,
    /// Capacitors created but not yet resolved.
    pub outstanding_capacitors: usize,
    pub steps_run: u64,
    pub capacitors_created: u64,
    /// Invocations that removed an outstanding dependency.
    pub resolutions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_mode_defaults_to_active() {
        assert_eq!(ChainMode::default(), ChainMode::Active);
        assert!(ChainMode::Escaped.accepts_capacitors());
        assert!(!ChainMode::Eluded.accepts_capacitors());
    }

    #[test]
    fn chain_config_fills_missing_label() {
        let config: ChainConfig = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(config.label, DEFAULT_CHAIN_LABEL);
    }

    #[test]
    fn snapshot_serializes_states_in_snake_case() {
        let snapshot = ChainSnapshot {
            label: "demo".into(),
            mode: ChainMode::Escaped,
            state: ChainState::Blocked,
            pending_steps: 0,
            outstanding_capacitors: 2,
            steps_run: 3,
            capacitors_created: 2,
            resolutions: 0,
        };
        let value = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert_eq!(value["mode"], "escaped");
        assert_eq!(value["state"], "blocked");
        assert_eq!(value["outstanding_capacitors"], 2);
    }

    #[test]
    fn capacitor_id_displays_with_prefix() {
        assert_eq!(CapacitorId(7).to_string(), "cap-7");
    }
}
