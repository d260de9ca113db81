//! Enemy movement strategies.
//!
//! Each enemy carries a strategy value that is swapped at runtime (potion
//! effects, bribes). Strategies only *choose* the next position; the move
//! itself goes through the map so every veto and hook still applies.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::game::Game;
use crate::position::{Direction, Position};

/// Ring of offsets a spider walks around its spawn point, clockwise
/// starting directly above.
const SPIDER_RING: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Strategy for choosing an enemy's next position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementStrategy {
    /// Pursue the player along the shortest path.
    Hostile,
    /// Step to a uniformly random legal neighbor.
    Random,
    /// Run from the player while they are invincible.
    Flee,
    /// Follow the player as an ally.
    Allied {
        /// Whether the ally was adjacent to the player last move.
        was_adjacent: bool,
    },
    /// Circle the spawn point, reversing when a boulder blocks the ring.
    Circular {
        /// Center of the ring (the spawn point).
        origin: Position,
        /// Ring slot the spider currently occupies, if it has left the
        /// center.
        slot: Option<usize>,
        /// Current orbit direction.
        clockwise: bool,
    },
}

impl MovementStrategy {
    /// Initial strategy for a spider spawned at `origin`.
    #[must_use]
    pub const fn circling(origin: Position) -> Self {
        Self::Circular {
            origin,
            slot: None,
            clockwise: true,
        }
    }
}

/// Choose the next position for `enemy` and update any per-strategy
/// state. Returns the enemy's own position when no move is possible.
pub(crate) fn next_position(game: &mut Game, enemy: EntityId) -> Position {
    let Some(entity) = game.map.get(enemy) else {
        return Position::new(0, 0);
    };
    let position = entity.position();
    let Some(strategy) = entity.kind.movement_strategy().cloned() else {
        return position;
    };

    let (next, updated) = match strategy {
        MovementStrategy::Hostile => (hostile_step(game, enemy, position), None),
        MovementStrategy::Random => (random_step(game, enemy, position), None),
        MovementStrategy::Flee => (flee_step(game, enemy, position), None),
        MovementStrategy::Allied { was_adjacent } => {
            allied_step(game, enemy, position, was_adjacent)
        }
        MovementStrategy::Circular {
            origin,
            slot,
            clockwise,
        } => circular_step(game, enemy, position, origin, slot, clockwise),
    };

    if let Some(updated) = updated {
        if let Some(strategy) = game
            .map
            .get_mut(enemy)
            .and_then(|entity| entity.kind.movement_strategy_mut())
        {
            *strategy = updated;
        }
    }
    next
}

fn hostile_step(game: &Game, enemy: EntityId, position: Position) -> Position {
    let Some(player) = game.map.player_id().and_then(|id| game.map.get(id)) else {
        return position;
    };
    game.map.shortest_step(position, player.position(), enemy)
}

fn random_step(game: &mut Game, enemy: EntityId, position: Position) -> Position {
    let candidates: Vec<Position> = position
        .cardinal_neighbors()
        .into_iter()
        .filter(|&candidate| game.map.can_move_to(enemy, candidate))
        .collect();
    if candidates.is_empty() {
        return position;
    }
    let index = game.rng.gen_range(0..candidates.len());
    candidates[index]
}

/// Move away from the player, preferring the axis the player is *not*
/// aligned on, falling back across axes before giving up.
fn flee_step(game: &Game, enemy: EntityId, position: Position) -> Position {
    let Some(player) = game.map.player_id().and_then(|id| game.map.get(id)) else {
        return position;
    };
    let (dx, dy) = position.delta_from(player.position());

    let move_x = position.translate(if dx >= 0 {
        Direction::Right
    } else {
        Direction::Left
    });
    let move_y = position.translate(if dy >= 0 {
        Direction::Down
    } else {
        Direction::Up
    });

    if dy == 0 && game.map.can_move_to(enemy, move_x) {
        move_x
    } else if dx == 0 && game.map.can_move_to(enemy, move_y) {
        move_y
    } else if dx.abs() >= dy.abs() {
        if game.map.can_move_to(enemy, move_y) {
            move_y
        } else if game.map.can_move_to(enemy, move_x) {
            move_x
        } else {
            position
        }
    } else if game.map.can_move_to(enemy, move_x) {
        move_x
    } else if game.map.can_move_to(enemy, move_y) {
        move_y
    } else {
        position
    }
}

/// Allies trail the player: hold position while adjacent, pursue while
/// separated, and step into the player's previous distinct position the
/// moment adjacency is lost.
fn allied_step(
    game: &Game,
    enemy: EntityId,
    position: Position,
    was_adjacent: bool,
) -> (Position, Option<MovementStrategy>) {
    let Some(player) = game.map.player_id().and_then(|id| game.map.get(id)) else {
        return (position, None);
    };
    let player_pos = player.position();
    let is_adjacent = player_pos.is_cardinally_adjacent(position);

    if was_adjacent && !is_adjacent {
        let next = player.previous_distinct_position().unwrap_or(position);
        (next, None)
    } else {
        let next = if is_adjacent {
            position
        } else {
            game.map.shortest_step(position, player_pos, enemy)
        };
        let updated = MovementStrategy::Allied {
            was_adjacent: player_pos.is_cardinally_adjacent(next),
        };
        (next, Some(updated))
    }
}

fn circular_step(
    game: &Game,
    enemy: EntityId,
    position: Position,
    origin: Position,
    slot: Option<usize>,
    clockwise: bool,
) -> (Position, Option<MovementStrategy>) {
    let ring_target = |slot: usize| {
        let (dx, dy) = SPIDER_RING[slot];
        origin.offset_by(dx, dy)
    };

    match slot {
        // Still on the spawn cell: step onto the top of the ring.
        None => {
            let target = ring_target(0);
            if game.map.can_move_to(enemy, target) {
                (
                    target,
                    Some(MovementStrategy::Circular {
                        origin,
                        slot: Some(0),
                        clockwise,
                    }),
                )
            } else {
                (position, None)
            }
        }
        Some(current) => {
            let advance = |cw: bool| {
                if cw {
                    (current + 1) % SPIDER_RING.len()
                } else {
                    (current + SPIDER_RING.len() - 1) % SPIDER_RING.len()
                }
            };

            let forward = advance(clockwise);
            if game.map.can_move_to(enemy, ring_target(forward)) {
                return (
                    ring_target(forward),
                    Some(MovementStrategy::Circular {
                        origin,
                        slot: Some(forward),
                        clockwise,
                    }),
                );
            }

            // Boulder on the ring: reverse the orbit.
            let backward = advance(!clockwise);
            if game.map.can_move_to(enemy, ring_target(backward)) {
                return (
                    ring_target(backward),
                    Some(MovementStrategy::Circular {
                        origin,
                        slot: Some(backward),
                        clockwise: !clockwise,
                    }),
                );
            }
            (position, None)
        }
    }
}
