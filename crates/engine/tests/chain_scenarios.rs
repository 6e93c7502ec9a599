use std::{cell::RefCell, rc::Rc};

use flux_engine::{Capacitor, Chain, ChainBuilder, ChainMode, ChainRef, ChainState, ManualScheduler};
use serde_json::{Value, json};

type Parked = Rc<RefCell<Vec<Capacitor<ChainRef>>>>;

fn manual_chain(label: &str) -> (Chain<ChainRef>, ManualScheduler) {
    let scheduler = ManualScheduler::new();
    let chain = ChainBuilder::new().label(label).scheduler(scheduler.clone()).build();
    (chain, scheduler)
}

#[test]
fn step_two_observes_the_value_delivered_to_step_one_capacitor() {
    let (chain, scheduler) = manual_chain("value-handoff");
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let observed: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    let order = Rc::new(RefCell::new(Vec::new()));

    let park = Rc::clone(&parked);
    let read = Rc::clone(&parked);
    let sink = Rc::clone(&observed);
    let first = Rc::clone(&order);
    let second = Rc::clone(&order);
    chain
        .push(move |_, chain| {
            first.borrow_mut().push("step1");
            park.borrow_mut().push(chain.named(["value"]));
            Ok(())
        })
        .push(move |_, _| {
            second.borrow_mut().push("step2");
            sink.replace(read.borrow().first().and_then(|gate| gate.field("value")));
            Ok(())
        });

    scheduler.run_pending().expect("first drain");
    assert_eq!(*order.borrow(), vec!["step1"]);
    assert_eq!(chain.state(), ChainState::Blocked);

    let gate = parked.borrow()[0].clone();
    gate.invoke([42]).expect("deliver value");

    assert_eq!(*order.borrow(), vec!["step1", "step2"]);
    assert_eq!(*observed.borrow(), Some(json!(42)));
    assert_eq!(chain.state(), ChainState::Idle);
}

#[test]
fn escaping_in_the_first_step_skips_the_second() {
    let (chain, scheduler) = manual_chain("escape");
    let second_ran = Rc::new(RefCell::new(false));

    let flag = Rc::clone(&second_ran);
    chain.push(|_, chain| {
        chain.escape();
        Ok(())
    });
    chain.push(move |_, _| {
        flag.replace(true);
        Ok(())
    });

    scheduler.run_pending().expect("drain");
    assert!(!*second_ran.borrow());
    assert_eq!(chain.mode(), ChainMode::Escaped);
}

#[test]
fn escape_keeps_capacitor_resolution_active() {
    let (chain, scheduler) = manual_chain("escape-with-gates");
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let late_ran = Rc::new(RefCell::new(false));

    let park = Rc::clone(&parked);
    chain
        .push(move |_, chain| {
            park.borrow_mut().push(chain.named(["value"]));
            chain.escape();
            Ok(())
        })
        .push(|_, _| panic!("escaped step must not run"));

    scheduler.run_pending().expect("drain");
    let flag = Rc::clone(&late_ran);
    chain.push(move |_, _| {
        flag.replace(true);
        Ok(())
    });
    assert!(!*late_ran.borrow(), "capacitor still outstanding");

    let gate = parked.borrow()[0].clone();
    gate.invoke(["done"]).expect("resolve");
    assert_eq!(gate.field("value"), Some(json!("done")));
    assert!(*late_ran.borrow());
}

#[test]
fn eluding_turns_every_capacitor_into_a_no_op() {
    let (chain, scheduler) = manual_chain("elude");
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let callback_hits = Rc::new(RefCell::new(0));
    let resumed = Rc::new(RefCell::new(false));

    let park = Rc::clone(&parked);
    let hits = Rc::clone(&callback_hits);
    let flag = Rc::clone(&resumed);
    chain
        .push(move |_, chain| {
            park.borrow_mut().push(chain.named(["a", "b"]));
            let hits = Rc::clone(&hits);
            park.borrow_mut().push(chain.callback(move |_, _| {
                *hits.borrow_mut() += 1;
                Ok(())
            }));
            Ok(())
        })
        .push(move |_, _| {
            flag.replace(true);
            Ok(())
        });

    scheduler.run_pending().expect("drain");
    chain.elude();
    assert_eq!(chain.pending_steps(), 0);

    let gates = parked.borrow().clone();
    for gate in &gates {
        gate.invoke([1, 2]).expect("ignored invocation");
    }

    assert_eq!(gates[0].field("a"), None);
    assert_eq!(*callback_hits.borrow(), 0);
    assert!(!*resumed.borrow());
    assert_eq!(chain.state(), ChainState::Eluded);
    assert_eq!(chain.snapshot().resolutions, 0);
}

#[test]
fn chained_pauses_resume_one_step_at_a_time() {
    let (chain, scheduler) = manual_chain("relay");
    let parked: Parked = Rc::new(RefCell::new(Vec::new()));
    let order = Rc::new(RefCell::new(Vec::new()));

    for index in 0..3 {
        let park = Rc::clone(&parked);
        let order = Rc::clone(&order);
        chain.push(move |_, chain| {
            order.borrow_mut().push(index);
            park.borrow_mut().push(chain.named(["tick"]));
            Ok(())
        });
    }

    scheduler.run_pending().expect("drain");
    for expected in 1..=3 {
        assert_eq!(order.borrow().len(), expected);
        let gate = parked.borrow().last().cloned().expect("gate parked");
        gate.invoke([expected]).expect("resolve");
    }

    assert_eq!(*order.borrow(), vec![0, 1, 2]);
    let snapshot = chain.snapshot();
    assert_eq!(snapshot.steps_run, 3);
    assert_eq!(snapshot.capacitors_created, 3);
    assert_eq!(snapshot.resolutions, 3);
    assert_eq!(snapshot.outstanding_capacitors, 0);
}
