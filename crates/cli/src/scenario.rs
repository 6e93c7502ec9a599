//! Demo scenarios: chains whose capacitors are resolved by Tokio timers.
//!
//! Every scenario prints one JSON object per line on stdout as it progresses and finishes with
//! a snapshot of the chain once no timer is left in flight.

use std::{
    cell::{Cell, RefCell},
    future::Future,
    rc::Rc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use flux_engine::{Capacitor, Chain, ChainBuilder};
use flux_types::{ChainConfig, ChainSnapshot};
use flux_util::FluxConfig;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Sequence { steps: usize },
    Join { gates: usize },
    Escape { steps: usize, at: usize },
    Elude { steps: usize, at: usize },
}

/// Config-file values merged with command-line overrides.
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub chain: ChainConfig,
    pub tick: Duration,
}

impl ScenarioSettings {
    pub fn resolve(config: &FluxConfig, label: Option<String>, tick_ms: Option<u64>) -> Self {
        let mut chain = config.chain.clone();
        if let Some(label) = label {
            chain.label = label;
        }
        let tick_ms = tick_ms.unwrap_or(config.demo.tick_ms).max(1);
        Self {
            chain,
            tick: Duration::from_millis(tick_ms),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum DemoEvent {
    StepStarted { step: usize, at: DateTime<Utc> },
    CapacitorFired { step: usize, capacitor: String, value: Value, at: DateTime<Utc> },
    Collected { values: Vec<Value>, at: DateTime<Utc> },
    Escaped { step: usize, at: DateTime<Utc> },
    Eluded { step: usize, at: DateTime<Utc> },
    Finished { snapshot: ChainSnapshot, at: DateTime<Utc> },
}

fn emit(event: &DemoEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(error) => warn!(error = %error, "failed to serialize demo event"),
    }
}

struct DemoContext {
    tick: Duration,
    /// Timer tasks that have not finished yet.
    in_flight: Rc<Cell<usize>>,
}

type DemoChain = Chain<DemoContext>;
type DemoGate = Capacitor<DemoContext>;

/// Runs `scenario` to completion. Must be awaited inside a Tokio `LocalSet`.
pub async fn run(scenario: Scenario, settings: ScenarioSettings) -> ChainSnapshot {
    let in_flight = Rc::new(Cell::new(0));
    let context = DemoContext {
        tick: settings.tick,
        in_flight: Rc::clone(&in_flight),
    };
    let chain = ChainBuilder::from_config(&settings.chain).build_with_context(context);

    match scenario {
        Scenario::Sequence { steps } => push_sequence(&chain, steps),
        Scenario::Join { gates } => push_join(&chain, gates),
        Scenario::Escape { steps, at } => push_escape(&chain, steps, at),
        Scenario::Elude { steps, at } => push_elude(&chain, steps, at),
    }

    settle(&chain, &in_flight, settings.tick).await;
    let snapshot = chain.snapshot();
    emit(&DemoEvent::Finished {
        snapshot: snapshot.clone(),
        at: Utc::now(),
    });
    snapshot
}

fn push_sequence(chain: &DemoChain, steps: usize) {
    for step in 0..steps {
        chain.push(move |context, chain| {
            emit(&DemoEvent::StepStarted { step, at: Utc::now() });
            let gate = chain.named(["value"]);
            arm_timer(context, step, gate, context.tick, json!(step));
            Ok(())
        });
    }
}

fn push_join(chain: &DemoChain, gates: usize) {
    let parked: Rc<RefCell<Vec<DemoGate>>> = Rc::new(RefCell::new(Vec::new()));
    let park = Rc::clone(&parked);
    chain
        .push(move |context, chain| {
            emit(&DemoEvent::StepStarted { step: 0, at: Utc::now() });
            for index in 0..gates {
                let gate = chain.named(["value"]);
                park.borrow_mut().push(gate.clone());
                // Later gates fire first.
                let delay = context.tick * u32::try_from(gates - index).unwrap_or(u32::MAX);
                arm_timer(context, 0, gate, delay, json!(index));
            }
            Ok(())
        })
        .push(move |_, _| {
            emit(&DemoEvent::StepStarted { step: 1, at: Utc::now() });
            let values = parked.borrow().iter().filter_map(|gate| gate.field("value")).collect();
            emit(&DemoEvent::Collected { values, at: Utc::now() });
            Ok(())
        });
}

fn push_escape(chain: &DemoChain, steps: usize, at: usize) {
    for step in 0..steps {
        chain.push(move |context, chain| {
            emit(&DemoEvent::StepStarted { step, at: Utc::now() });
            let gate = chain.named(["value"]);
            arm_timer(context, step, gate, context.tick, json!(step));
            if step == at {
                chain.escape();
                emit(&DemoEvent::Escaped { step, at: Utc::now() });
            }
            Ok(())
        });
    }
}

fn push_elude(chain: &DemoChain, steps: usize, at: usize) {
    for step in 0..steps {
        chain.push(move |context, chain| {
            emit(&DemoEvent::StepStarted { step, at: Utc::now() });
            let gate = chain.named(["value"]);
            arm_timer(context, step, gate, context.tick, json!(step));
            if step == at {
                let target = chain.clone();
                let delay = context.tick / 2;
                spawn_tracked(context, async move {
                    tokio::time::sleep(delay).await;
                    target.elude();
                    emit(&DemoEvent::Eluded { step, at: Utc::now() });
                });
            }
            Ok(())
        });
    }
}

/// Invokes `gate` with `value` once `delay` has elapsed.
fn arm_timer(context: &DemoContext, step: usize, gate: DemoGate, delay: Duration, value: Value) {
    spawn_tracked(context, async move {
        tokio::time::sleep(delay).await;
        emit(&DemoEvent::CapacitorFired {
            step,
            capacitor: gate.id().to_string(),
            value: value.clone(),
            at: Utc::now(),
        });
        if let Err(error) = gate.invoke([value]) {
            error!(capacitor = %gate.id(), error = %format!("{error:#}"), "capacitor invocation failed");
        }
    });
}

fn spawn_tracked<F>(context: &DemoContext, task: F)
where
    F: Future<Output = ()> + 'static,
{
    let in_flight = Rc::clone(&context.in_flight);
    in_flight.set(in_flight.get() + 1);
    tokio::task::spawn_local(async move {
        task.await;
        in_flight.set(in_flight.get() - 1);
    });
}

/// Waits until the first drain has happened and no timer task is left.
async fn settle(chain: &DemoChain, in_flight: &Cell<usize>, tick: Duration) {
    let poll_interval = (tick / 4).max(Duration::from_millis(1));
    while in_flight.get() > 0 || chain.pending_steps() > 0 {
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use flux_types::{ChainMode, ChainState};
    use flux_util::run_local;

    use super::*;

    fn settings(tick_ms: u64) -> ScenarioSettings {
        ScenarioSettings::resolve(&FluxConfig::default(), Some("test".into()), Some(tick_ms))
    }

    fn run_scenario(scenario: Scenario, tick_ms: u64) -> ChainSnapshot {
        run_local(run(scenario, settings(tick_ms))).expect("runtime builds")
    }

    #[test]
    fn settings_prefer_command_line_overrides() {
        let mut config = FluxConfig::default();
        config.chain.label = "from-config".into();
        config.demo.tick_ms = 40;

        let resolved = ScenarioSettings::resolve(&config, None, None);
        assert_eq!(resolved.chain.label, "from-config");
        assert_eq!(resolved.tick, Duration::from_millis(40));

        let overridden = ScenarioSettings::resolve(&config, Some("cli".into()), Some(0));
        assert_eq!(overridden.chain.label, "cli");
        assert_eq!(overridden.tick, Duration::from_millis(1));
    }

    #[test]
    fn sequence_runs_every_step_after_its_predecessor_resolves() {
        let snapshot = run_scenario(Scenario::Sequence { steps: 3 }, 2);

        assert_eq!(snapshot.label, "test");
        assert_eq!(snapshot.steps_run, 3);
        assert_eq!(snapshot.resolutions, 3);
        assert_eq!(snapshot.state, ChainState::Idle);
    }

    #[test]
    fn join_waits_for_every_gate() {
        let snapshot = run_scenario(Scenario::Join { gates: 3 }, 2);

        assert_eq!(snapshot.steps_run, 2);
        assert_eq!(snapshot.capacitors_created, 3);
        assert_eq!(snapshot.resolutions, 3);
    }

    #[test]
    fn escape_discards_later_steps_but_resolves_the_current_gate() {
        let snapshot = run_scenario(Scenario::Escape { steps: 4, at: 1 }, 2);

        assert_eq!(snapshot.steps_run, 2);
        assert_eq!(snapshot.resolutions, 2);
        assert_eq!(snapshot.mode, ChainMode::Escaped);
        assert_eq!(snapshot.pending_steps, 0);
    }

    #[test]
    fn elude_ignores_the_gate_that_fires_afterwards() {
        let snapshot = run_scenario(Scenario::Elude { steps: 4, at: 1 }, 20);

        assert_eq!(snapshot.steps_run, 2);
        assert_eq!(snapshot.resolutions, 1);
        assert_eq!(snapshot.outstanding_capacitors, 1);
        assert_eq!(snapshot.state, ChainState::Eluded);
    }
}
