//! Simulation systems: map mutations with ordered hook dispatch, and the
//! handlers behind each scheduled action.
//!
//! Movement and destruction are the only ways entities change tiles, and
//! both notify co-occupants through overlap / moved-away / teardown
//! hooks. Hook dispatch always iterates a snapshot of the tile taken
//! before the first hook runs, so hooks are free to destroy entities or
//! move them (portals teleport, boulders get pushed) without corrupting
//! the iteration. Every handler tolerates entities that disappeared
//! earlier in the same tick.

use crate::entity::{BombPhase, EntityId, EntityKind};
use crate::game::Game;
use crate::logic;
use crate::player::{self, Buildable};
use crate::position::{Direction, Position};
use crate::scheduler::{ActionId, AI_PRIORITY};

// Map mutation
// ============

/// Move an entity to a position, firing moved-away hooks on its old
/// tile's co-occupants and overlap hooks on its new tile's.
///
/// A vetoed move is a complete no-op: no position change, no hooks.
pub(crate) fn move_entity(game: &mut Game, id: EntityId, target: Position) {
    let Some(from) = game.map.get(id).map(|entity| entity.position()) else {
        return;
    };
    if !game.map.can_move_to(id, target) {
        return;
    }
    let target = target.as_layer(from.layer);

    // Moved-away hooks observe the pre-move state.
    for occupant in game.map.entities_at(from) {
        if occupant != id {
            on_moved_away(game, occupant, id);
        }
    }
    // A hook may have destroyed the mover.
    if !game.map.contains(id) {
        return;
    }

    game.map.displace(id);
    if let Some(entity) = game.map.get_mut(id) {
        entity.set_position(target);
    }
    game.map.place(id, target);

    for occupant in game.map.entities_at(target) {
        if occupant != id {
            on_overlap(game, occupant, id);
        }
    }
}

/// Destroy an entity: off its tile, teardown hook, out of the arena.
///
/// Safe to call on entities already off the map; the teardown hook still
/// runs.
pub(crate) fn destroy_entity(game: &mut Game, id: EntityId) {
    game.map.displace(id);
    teardown(game, id);
    let _ = game.map.remove_from_arena(id);
}

/// Destroy every non-player occupant of a cell (area effects). The
/// player is explicitly exempt.
pub(crate) fn destroy_entities_at(game: &mut Game, x: i32, y: i32) {
    for id in game.map.entities_at(Position::new(x, y)) {
        let is_player = matches!(
            game.map.get(id).map(|entity| &entity.kind),
            Some(EntityKind::Player(_))
        );
        if !is_player {
            destroy_entity(game, id);
        }
    }
}

/// Detonate a bomb, destroying everything but the player in its square
/// blast radius (the bomb included).
pub(crate) fn explode(game: &mut Game, bomb: EntityId) {
    let Some((position, radius)) = game.map.get(bomb).map(|entity| {
        let radius = match &entity.kind {
            EntityKind::Bomb(state) => state.radius as i32,
            _ => 0,
        };
        (entity.position(), radius)
    }) else {
        return;
    };
    // A bomb sitting in the inventory (picked back up after an early
    // switch subscription) has no tile and must not detonate.
    if !game.map.entities_at(position).contains(&bomb) {
        return;
    }
    tracing::debug!(id = bomb, radius, "bomb detonated");
    for x in (position.x - radius)..=(position.x + radius) {
        for y in (position.y - radius)..=(position.y + radius) {
            destroy_entities_at(game, x, y);
        }
    }
}

/// Teardown hook: cancel the entity's scheduled actions, detach it from
/// potion listenership, and unbind its portal partner.
fn teardown(game: &mut Game, id: EntityId) {
    let Some(entity) = game.map.get(id) else {
        return;
    };
    game.scheduler.unsubscribe(ActionId::Entity(id));
    if entity.kind.is_potion_listener() {
        player::remove_potion_listener(game, id);
    }
    let partner = match game.map.get(id).map(|entity| &entity.kind) {
        Some(EntityKind::Portal(state)) => state.pair,
        _ => None,
    };
    if let Some(partner) = partner {
        if let Some(EntityKind::Portal(state)) =
            game.map.get_mut(partner).map(|entity| &mut entity.kind)
        {
            state.pair = None;
        }
    }
}

// Hooks
// =====

/// Called on each co-occupant of a tile another entity just left.
fn on_moved_away(game: &mut Game, occupant: EntityId, mover: EntityId) {
    let mover_is_boulder = matches!(
        game.map.get(mover).map(|entity| &entity.kind),
        Some(EntityKind::Boulder)
    );
    let is_active_switch = matches!(
        game.map.get(occupant).map(|entity| &entity.kind),
        Some(EntityKind::FloorSwitch(state)) if state.activated
    );
    if mover_is_boulder && is_active_switch {
        let tick = game.get_tick();
        logic::deactivate(game, occupant, tick);
    }
}

/// Called on each co-occupant of a tile another entity just entered.
fn on_overlap(game: &mut Game, occupant: EntityId, mover: EntityId) {
    let Some((occupant_kind, occupant_pos)) = game
        .map
        .get(occupant)
        .map(|entity| (entity.kind.clone(), entity.position()))
    else {
        return;
    };
    let Some((mover_kind, mover_pos, mover_prev)) = game.map.get(mover).map(|entity| {
        (
            entity.kind.clone(),
            entity.position(),
            entity.previous_position(),
        )
    }) else {
        return;
    };
    let mover_is_player = matches!(mover_kind, EntityKind::Player(_));

    match occupant_kind {
        // An enemy stepped onto the player.
        EntityKind::Player(_) => {
            let hostile = match &mover_kind {
                EntityKind::Mercenary(merc) => !merc.allied,
                kind => kind.is_enemy(),
            };
            if hostile {
                game.battle(occupant, mover);
            }
        }
        // The player stepped onto an enemy.
        EntityKind::Mercenary(merc) => {
            if mover_is_player && !merc.allied {
                game.battle(mover, occupant);
            }
        }
        EntityKind::ZombieToast(_) | EntityKind::Spider(_) => {
            if mover_is_player {
                game.battle(mover, occupant);
            }
        }
        EntityKind::Door(door) => {
            if mover_is_player && !door.open {
                try_unlock_door(game, occupant, door.number);
            }
        }
        EntityKind::FloorSwitch(state) => {
            if matches!(mover_kind, EntityKind::Boulder) && !state.activated {
                activate_switch(game, occupant);
            }
        }
        EntityKind::Portal(state) => {
            let teleports = mover_is_player
                || matches!(mover_kind, EntityKind::Mercenary(_));
            if teleports {
                if let Some(pair) = state.pair {
                    let destination = game.map.teleport_candidates(pair, mover).next();
                    if let Some(destination) = destination {
                        move_entity(game, mover, destination);
                    }
                }
            }
        }
        EntityKind::Boulder => {
            if mover_is_player {
                let (dx, dy) = mover_pos.delta_from(mover_prev);
                if dx.abs() + dy.abs() == 1 {
                    move_entity(game, occupant, occupant_pos.offset_by(dx, dy));
                }
            }
        }
        kind if kind.is_collectable() => {
            if mover_is_player {
                let _ = player::pickup(game, occupant);
            }
        }
        _ => {}
    }
}

/// Consume the matching key and open the door.
fn try_unlock_door(game: &mut Game, door: EntityId, number: u32) {
    let key = player::items_where(game, |kind| {
        matches!(kind, EntityKind::Key { number: n } if *n == number)
    })
    .into_iter()
    .next();
    let Some(key) = key else {
        return;
    };
    player::consume_item(game, key);
    if let Some(EntityKind::Door(state)) = game.map.get_mut(door).map(|entity| &mut entity.kind) {
        state.open = true;
    }
}

/// Activate a floor switch: detonate subscribed bombs, then flood the
/// circuit.
pub(crate) fn activate_switch(game: &mut Game, switch: EntityId) {
    let (position, bombs) = {
        let Some(entity) = game.map.get_mut(switch) else {
            return;
        };
        let position = entity.position();
        match &mut entity.kind {
            EntityKind::FloorSwitch(state) => {
                state.activated = true;
                (position, state.bombs.clone())
            }
            _ => return,
        }
    };
    for bomb in bombs {
        explode(game, bomb);
    }
    let tick = game.get_tick();
    logic::propagate_activation(game, position, tick);
}

/// Subscribe a placed bomb to a switch; an already-active switch
/// detonates its bombs on the spot.
pub(crate) fn subscribe_bomb_to_switch(game: &mut Game, bomb: EntityId, switch: EntityId) {
    let activated = {
        let Some(EntityKind::FloorSwitch(state)) =
            game.map.get_mut(switch).map(|entity| &mut entity.kind)
        else {
            return;
        };
        if !state.bombs.contains(&bomb) {
            state.bombs.push(bomb);
        }
        state.activated
    };
    if activated {
        let bombs = match game.map.get(switch).map(|entity| &entity.kind) {
            Some(EntityKind::FloorSwitch(state)) => state.bombs.clone(),
            _ => Vec::new(),
        };
        for bomb in bombs {
            explode(game, bomb);
        }
    }
}

// Action handlers
// ===============

/// The player's one-shot movement action.
pub(crate) fn player_move(game: &mut Game, direction: Direction) {
    let Some(id) = game.map.player_id() else {
        return;
    };
    let target = {
        let Some(entity) = game.map.get_mut(id) else {
            return;
        };
        entity.set_facing(direction);
        entity.position().translate(direction)
    };
    move_entity(game, id, target);
}

/// The player's one-shot use-item action (validated at registration).
pub(crate) fn player_use_item(game: &mut Game, item: EntityId) {
    let kind = game.map.get(item).map(|entity| entity.kind.clone());
    match kind {
        Some(EntityKind::Bomb(_)) => place_bomb(game, item),
        Some(EntityKind::InvisibilityPotion { .. } | EntityKind::InvincibilityPotion { .. }) => {
            let tick = game.get_tick();
            player::use_potion(game, item, tick);
        }
        _ => {}
    }
}

/// Put a bomb down at the player's position and arm it.
fn place_bomb(game: &mut Game, bomb: EntityId) {
    let Some(position) = game
        .map
        .player_id()
        .and_then(|id| game.map.get(id))
        .map(|player| player.position())
    else {
        return;
    };
    if let Some(player) = game.map.player_state_mut() {
        player.inventory.retain(|&id| id != bomb);
    }

    let is_logical = {
        let Some(entity) = game.map.get_mut(bomb) else {
            return;
        };
        entity.set_position(position.as_layer(entity.kind.layer()));
        match &mut entity.kind {
            EntityKind::Bomb(state) => {
                state.phase = BombPhase::Placed;
                state.logic.is_some()
            }
            _ => return,
        }
    };
    let position = game.map.get(bomb).map(|entity| entity.position());
    let Some(position) = position else { return };
    game.map.place(bomb, position);

    if is_logical {
        let tick = game.get_tick();
        logic::evaluate(game, bomb, tick);
    } else {
        for adjacent in position.cardinal_neighbors() {
            for id in game.map.entities_at(adjacent) {
                let is_switch = matches!(
                    game.map.get(id).map(|entity| &entity.kind),
                    Some(EntityKind::FloorSwitch(_))
                );
                if is_switch {
                    subscribe_bomb_to_switch(game, bomb, id);
                }
            }
        }
    }
}

/// The player's one-shot interaction (validated at registration).
pub(crate) fn player_interact(game: &mut Game, target: EntityId) {
    let kind = game.map.get(target).map(|entity| entity.kind.clone());
    match kind {
        Some(EntityKind::Mercenary(merc)) => {
            // Pay the bribe, then turn.
            let treasures =
                player::items_where(game, |kind| matches!(kind, EntityKind::Treasure));
            for &treasure in treasures.iter().take(merc.bribe_amount as usize) {
                player::consume_item(game, treasure);
            }
            if let Some(EntityKind::Mercenary(state)) =
                game.map.get_mut(target).map(|entity| &mut entity.kind)
            {
                state.allied = true;
                state.movement = crate::movement::MovementStrategy::Allied {
                    was_adjacent: false,
                };
            }
            tracing::debug!(id = target, "mercenary bribed");
        }
        Some(EntityKind::ZombieToastSpawner) => {
            destroy_entity(game, target);
            tracing::debug!(id = target, "spawner destroyed");
        }
        _ => {}
    }
}

/// The player's one-shot crafting action (validated at registration).
pub(crate) fn player_build(game: &mut Game, buildable: Buildable) {
    player::craft(game, buildable);
}

/// One enemy's recurring movement action.
pub(crate) fn enemy_move(game: &mut Game, enemy: EntityId) {
    if !game.map.contains(enemy) {
        return;
    }
    let next = crate::movement::next_position(game, enemy);
    move_entity(game, enemy, next);
}

/// Register an enemy's recurring movement with the scheduler.
pub(crate) fn register_enemy(game: &mut Game, enemy: EntityId) {
    game.scheduler.register(
        crate::game::Action::EnemyMove(enemy),
        AI_PRIORITY,
        ActionId::Entity(enemy),
    );
}
