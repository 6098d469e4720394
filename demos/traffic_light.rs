//! Traffic Light State Machine
//!
//! A cyclic three-state machine driven by a single `tick` message.
//!
//! Key concepts:
//! - Declarative model authoring with an entry point
//! - Guarded transitions over a message type
//! - Entry actions observing the traversal
//!
//! Run with: cargo run --example traffic_light

use statetree::{DefaultInstance, PseudoStateKind, StateMachine};

fn main() {
    // surface the runtime's enter/leave/dispatch events on stderr
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Traffic Light State Machine ===\n");

    let mut sm: StateMachine<&str> = StateMachine::new("light");
    let region = sm.region("cycle", sm.root()).unwrap();
    let initial = sm
        .pseudo_state("initial", PseudoStateKind::Initial, region)
        .unwrap();

    let red = sm.state("red", region).unwrap();
    let green = sm.state("green", region).unwrap();
    let yellow = sm.state("yellow", region).unwrap();

    for (state, label) in [(red, "Stop!"), (green, "Go!"), (yellow, "Caution")] {
        let name = sm.element_name(state).to_string();
        sm.entry(state, move |_, _| println!("  {name:<8} {label}"));
    }

    sm.transition(initial, red).unwrap();
    sm.transition(red, green)
        .unwrap()
        .when(|m, _| m == Some(&"tick"));
    sm.transition(green, yellow)
        .unwrap()
        .when(|m, _| m == Some(&"tick"));
    sm.transition(yellow, red)
        .unwrap()
        .when(|m, _| m == Some(&"tick"));

    let mut instance = DefaultInstance::new("junction-12");
    sm.initialise(&mut instance).unwrap();

    println!("\nSix ticks:");
    for _ in 0..6 {
        sm.evaluate(&mut instance, &"tick").unwrap();
    }

    println!("\nThe light is red again: {}", sm.is_active(red, &instance));
    println!("\n=== Example Complete ===");
}
