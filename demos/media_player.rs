//! Media Player State Machine
//!
//! A composite `on` state with deep history over `playing`/`paused`, a
//! choice pseudo state, and terminate semantics.
//!
//! Key concepts:
//! - Power toggling that restores where playback left off
//! - A choice branching on instance data via a custom instance type
//! - A terminate pseudo state absorbing every later message
//!
//! Run with: cargo run --example media_player

use statetree::{DefaultInstance, Instance, PseudoStateKind, RegionId, StateId, StateMachine};

/// Player instance carrying a track counter next to the runtime state.
#[derive(Default)]
struct Player {
    base: DefaultInstance,
    tracks_left: u32,
}

impl Instance for Player {
    fn set_current(&mut self, region: RegionId, state: StateId) {
        self.base.set_current(region, state);
    }

    fn get_current(&self, region: RegionId) -> Option<StateId> {
        self.base.get_current(region)
    }

    fn is_terminated(&self) -> bool {
        self.base.is_terminated()
    }

    fn set_terminated(&mut self, terminated: bool) {
        self.base.set_terminated(terminated);
    }
}

fn main() {
    // surface the runtime's enter/leave/dispatch events on stderr
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    println!("=== Media Player State Machine ===\n");

    let mut sm: StateMachine<&str, Player> = StateMachine::new("player");
    let main = sm.region("main", sm.root()).unwrap();
    let initial = sm
        .pseudo_state("initial", PseudoStateKind::Initial, main)
        .unwrap();

    let off = sm.state("off", main).unwrap();
    let on = sm.state("on", main).unwrap();
    sm.transition(initial, off).unwrap();
    sm.transition(off, on).unwrap().when(|m, _| m == Some(&"power"));
    sm.transition(on, off).unwrap().when(|m, _| m == Some(&"power"));

    let playback = sm.region("playback", on).unwrap();
    let history = sm
        .pseudo_state("history", PseudoStateKind::DeepHistory, playback)
        .unwrap();
    let playing = sm.state("playing", playback).unwrap();
    let paused = sm.state("paused", playback).unwrap();
    sm.transition(history, playing).unwrap();
    sm.transition(playing, paused)
        .unwrap()
        .when(|m, _| m == Some(&"pause"));
    sm.transition(paused, playing)
        .unwrap()
        .when(|m, _| m == Some(&"pause"));

    // `next` either advances to the next track or runs off the playlist
    let next = sm
        .pseudo_state("next", PseudoStateKind::Choice, playback)
        .unwrap();
    sm.transition(playing, next)
        .unwrap()
        .when(|m, _| m == Some(&"next"));
    sm.transition(next, playing)
        .unwrap()
        .when(|_, player: &Player| player.tracks_left > 0)
        .effect(|_, player: &mut Player| {
            player.tracks_left -= 1;
            println!("  now playing, {} tracks left", player.tracks_left);
        });
    let drained = sm
        .pseudo_state("drained", PseudoStateKind::Terminate, playback)
        .unwrap();
    sm.transition(next, drained)
        .unwrap()
        .otherwise()
        .effect(|_, _| println!("  playlist drained, shutting down"));

    for state in [off, on, playing, paused] {
        let name = sm.element_name(state).to_string();
        sm.entry(state, move |_, _| println!("  -> {name}"));
    }

    let mut player = Player {
        tracks_left: 2,
        ..Player::default()
    };
    sm.initialise(&mut player).unwrap();

    println!("\npower, pause, power, power (history restores paused):");
    for message in ["power", "pause", "power", "power"] {
        sm.evaluate(&mut player, &message).unwrap();
    }
    println!("  paused is active: {}", sm.is_active(paused, &player));

    println!("\npause, next, next, next (playlist has 2 tracks):");
    for message in ["pause", "next", "next", "next"] {
        sm.evaluate(&mut player, &message).unwrap();
    }
    println!("  terminated: {}", player.is_terminated());

    println!("\nfurther messages are absorbed:");
    println!("  consumed: {}", sm.evaluate(&mut player, &"power").unwrap());

    println!("\n=== Example Complete ===");
}
