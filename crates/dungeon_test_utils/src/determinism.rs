//! Determinism test harness.
//!
//! The engine promises that two games built from the same data and fed
//! the same inputs stay bit-identical. The helpers here replay an input
//! script against two independently-built games and compare state
//! hashes after every single tick, so a divergence points at the tick
//! that introduced it.

use dungeon_core::prelude::*;

/// One scripted player input.
#[derive(Debug, Clone, Copy)]
pub enum Input {
    /// Move in a direction.
    Move(Direction),
    /// Advance a tick with no player action.
    Wait,
}

/// Replay a script against a fresh game, returning the state hash after
/// each tick.
pub fn replay(mut game: Game, script: &[Input]) -> Vec<u64> {
    let mut hashes = Vec::with_capacity(script.len());
    for input in script {
        match input {
            Input::Move(direction) => {
                let _ = game.tick_move(*direction);
            }
            Input::Wait => {
                let _ = game.tick();
            }
        }
        hashes.push(game.state_hash());
    }
    hashes
}

/// Build two games from the same source and assert they stay identical
/// across the whole script.
///
/// # Panics
///
/// Panics with the index of the first divergent tick.
pub fn assert_deterministic(build: impl Fn() -> Game, script: &[Input]) {
    let first = replay(build(), script);
    let second = replay(build(), script);
    for (tick, (a, b)) in first.iter().zip(second.iter()).enumerate() {
        assert_eq!(
            a, b,
            "state hashes diverged at tick {} of the replay",
            tick + 1
        );
    }
}
