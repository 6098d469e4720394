//! Property-based tests for the runtime.
//!
//! These use proptest to drive a fixed hierarchical model with generated
//! message sequences and check the guarantees that must hold for every
//! sequence: dispatch is deterministic, the active configuration stays
//! consistent, and a terminated instance absorbs everything.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use statetree::{DefaultInstance, Instance, PseudoStateKind, StateId, StateMachine};

type Machine = StateMachine<&'static str, DefaultInstance>;
type Trace = Arc<Mutex<Vec<String>>>;

const MESSAGES: [&str; 6] = ["step", "out", "back", "finish", "halt", "noise"];

/// A workbench model exercising composition, history, completion, and
/// terminate:
///
/// - `A` is a composite with deep history over `a1 <-step-> a2`
/// - `finish` drives `a2` into a final state, completing `A` into `B`
/// - `out`/`back` hop between `A` and `B`
/// - `halt` terminates from `B`
fn workbench(trace: Trace) -> Machine {
    let mut sm = Machine::new("bench");
    let top = sm.region("top", sm.root()).unwrap();
    let initial = sm
        .pseudo_state("initial", PseudoStateKind::Initial, top)
        .unwrap();

    let a = sm.state("A", top).unwrap();
    let b = sm.state("B", top).unwrap();
    sm.transition(initial, a).unwrap();
    sm.transition(a, b).unwrap().when(|m, _| m == Some(&"out"));
    sm.transition(b, a).unwrap().when(|m, _| m == Some(&"back"));
    // completion only: never enabled while a message is being dispatched
    sm.transition(a, b).unwrap().when(|m, _| m.is_none());
    let stop = sm
        .pseudo_state("stop", PseudoStateKind::Terminate, top)
        .unwrap();
    sm.transition(b, stop).unwrap().when(|m, _| m == Some(&"halt"));

    let ra = sm.region("ra", a).unwrap();
    let history = sm
        .pseudo_state("h", PseudoStateKind::DeepHistory, ra)
        .unwrap();
    let a1 = sm.state("a1", ra).unwrap();
    let a2 = sm.state("a2", ra).unwrap();
    sm.transition(history, a1).unwrap();
    sm.transition(a1, a2).unwrap().when(|m, _| m == Some(&"step"));
    sm.transition(a2, a1).unwrap().when(|m, _| m == Some(&"step"));
    let fin = sm.final_state("fin", ra).unwrap();
    sm.transition(a2, fin)
        .unwrap()
        .when(|m, _| m == Some(&"finish"));

    for state in [a, b, a1, a2] {
        let name = sm.element_name(state).to_string();
        let entries = trace.clone();
        let entry_name = name.clone();
        sm.entry(state, move |_, _| {
            entries.lock().unwrap().push(format!("enter {entry_name}"));
        });
        let exits = trace.clone();
        sm.exit(state, move |_, _| {
            exits.lock().unwrap().push(format!("exit {name}"));
        });
    }

    sm
}

/// Every region under an active state must name one of its own vertices as
/// current.
fn check_configuration(sm: &Machine, state: StateId, instance: &DefaultInstance) {
    for region in sm.regions_of(state) {
        let Some(current) = instance.get_current(*region) else {
            continue;
        };
        assert!(
            sm.vertices_of(*region).contains(&current.vertex()),
            "region current is not one of its vertices"
        );
        if sm.is_active(current, instance) {
            check_configuration(sm, current, instance);
        }
    }
}

fn arbitrary_messages() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::collection::vec(proptest::sample::select(MESSAGES.to_vec()), 0..24)
}

proptest! {
    #[test]
    fn dispatch_is_deterministic(messages in arbitrary_messages()) {
        let first_trace = Trace::default();
        let mut first = workbench(first_trace.clone());
        let mut first_instance = DefaultInstance::new("first");
        first.initialise(&mut first_instance).unwrap();

        let second_trace = Trace::default();
        let mut second = workbench(second_trace.clone());
        let mut second_instance = DefaultInstance::new("second");
        second.initialise(&mut second_instance).unwrap();

        for message in &messages {
            let a = first.evaluate(&mut first_instance, message).unwrap();
            let b = second.evaluate(&mut second_instance, message).unwrap();
            prop_assert_eq!(a, b);
        }

        prop_assert_eq!(
            first_trace.lock().unwrap().clone(),
            second_trace.lock().unwrap().clone()
        );
        prop_assert_eq!(
            first_instance.is_terminated(),
            second_instance.is_terminated()
        );
    }

    #[test]
    fn active_configuration_stays_consistent(messages in arbitrary_messages()) {
        let mut sm = workbench(Trace::default());
        let mut instance = DefaultInstance::new("i");
        sm.initialise(&mut instance).unwrap();
        check_configuration(&sm, sm.root(), &instance);

        for message in &messages {
            sm.evaluate(&mut instance, message).unwrap();
            check_configuration(&sm, sm.root(), &instance);
        }
    }

    #[test]
    fn terminated_instances_absorb_everything(messages in arbitrary_messages()) {
        let trace = Trace::default();
        let mut sm = workbench(trace.clone());
        let mut instance = DefaultInstance::new("i");
        sm.initialise(&mut instance).unwrap();

        // drive into the terminated state directly
        sm.evaluate(&mut instance, &"out").unwrap();
        sm.evaluate(&mut instance, &"halt").unwrap();
        prop_assert!(instance.is_terminated());

        let settled = trace.lock().unwrap().clone();
        for message in &messages {
            prop_assert!(!sm.evaluate(&mut instance, message).unwrap());
        }
        prop_assert_eq!(trace.lock().unwrap().clone(), settled);
    }

    #[test]
    fn consumed_messages_are_the_enabled_ones(message in proptest::sample::select(MESSAGES.to_vec())) {
        let mut sm = workbench(Trace::default());
        let mut instance = DefaultInstance::new("i");
        sm.initialise(&mut instance).unwrap();

        // from the initial configuration (A with a1 active) exactly `step`
        // and `out` are enabled
        let consumed = sm.evaluate(&mut instance, &message).unwrap();
        prop_assert_eq!(consumed, message == "step" || message == "out");
    }
}
