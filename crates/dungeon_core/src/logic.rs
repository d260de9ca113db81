//! Logic propagation.
//!
//! Conductors (floor switches, wires) and logical entities (light bulbs,
//! switch doors, logical bombs) form an implicit circuit graph through
//! cardinal adjacency. Activation flood-fills outward through wires and
//! re-evaluates every logical entity it touches; deactivation retracts
//! current from wires that no longer have an active feed, then settles
//! every logical entity on the map once, since a local change can flip
//! an AND/OR condition anywhere in the connected component.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind};
use crate::error::{GameError, Result};
use crate::game::Game;
use crate::position::Position;

/// Boolean activation rule evaluated over adjacent conductors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicRule {
    /// Active iff one or more adjacent conductors are active.
    Or,
    /// Active iff all adjacent conductors are active, and there are at
    /// least two of them.
    And,
    /// Active iff exactly one adjacent conductor is active.
    Xor,
    /// Active iff at least two adjacent conductors transitioned to
    /// active on the same tick.
    CoAnd,
}

impl LogicRule {
    /// Parse a logic rule from dungeon data.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "or" => Ok(Self::Or),
            "and" => Ok(Self::And),
            "xor" => Ok(Self::Xor),
            "co_and" => Ok(Self::CoAnd),
            other => Err(GameError::UnknownLogicRule(other.to_string())),
        }
    }
}

/// Per-entity logic bookkeeping: the rule, the current activation, and
/// the tick each adjacent conductor most recently became active (kept
/// only for `CoAnd`; entries are pruned when that neighbor is no longer
/// in the active set at evaluation time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicState {
    /// The rule this entity evaluates.
    pub rule: LogicRule,
    /// Whether the entity is currently activated.
    pub active: bool,
    /// Most recent activation tick per adjacent conductor position.
    pub activation_ticks: HashMap<Position, u64>,
}

impl LogicState {
    /// Fresh, inactive state for the given rule.
    #[must_use]
    pub fn new(rule: LogicRule) -> Self {
        Self {
            rule,
            active: false,
            activation_ticks: HashMap::new(),
        }
    }
}

/// Activate a conductor and flood the current outward.
///
/// No-op when the conductor is already active or missing.
pub(crate) fn activate(game: &mut Game, conductor: EntityId, tick: u64) {
    let Some(entity) = game.map.get_mut(conductor) else {
        return;
    };
    let position = entity.position();
    match &mut entity.kind {
        EntityKind::FloorSwitch(state) if !state.activated => state.activated = true,
        EntityKind::Wire { active } if !*active => *active = true,
        _ => return,
    }
    tracing::trace!(id = conductor, "conductor activated");
    propagate_activation(game, position, tick);
}

/// Deactivate a conductor, retract current from starved wires, and run
/// the global settle pass.
///
/// No-op when the conductor is already inactive or missing.
pub(crate) fn deactivate(game: &mut Game, conductor: EntityId, tick: u64) {
    let Some(entity) = game.map.get_mut(conductor) else {
        return;
    };
    let position = entity.position();
    match &mut entity.kind {
        EntityKind::FloorSwitch(state) if state.activated => state.activated = false,
        EntityKind::Wire { active } if *active => *active = false,
        _ => return,
    }
    tracing::trace!(id = conductor, "conductor deactivated");
    propagate_deactivation(game, position, tick);
}

/// Flood activation outward from a source position: inactive wires on
/// cardinal neighbors switch on and continue the flood, and every
/// logical entity encountered re-evaluates immediately. The visited set
/// bounds the walk on circuit cycles.
pub(crate) fn propagate_activation(game: &mut Game, source: Position, tick: u64) {
    let mut visited = HashSet::new();
    activation_pass(game, source, tick, &mut visited);
}

fn activation_pass(
    game: &mut Game,
    position: Position,
    tick: u64,
    visited: &mut HashSet<Position>,
) {
    if !visited.insert(position) {
        return;
    }
    for adjacent in position.cardinal_neighbors() {
        for id in game.map.entities_at(adjacent) {
            let is_inactive_wire = matches!(
                game.map.get(id).map(|entity| &entity.kind),
                Some(EntityKind::Wire { active: false })
            );
            if is_inactive_wire {
                if let Some(EntityKind::Wire { active }) =
                    game.map.get_mut(id).map(|entity| &mut entity.kind)
                {
                    *active = true;
                }
                activation_pass(game, adjacent, tick, visited);
            } else if game
                .map
                .get(id)
                .is_some_and(|entity| entity.kind.is_logical())
            {
                evaluate(game, id, tick);
            }
        }
    }
}

/// Flood deactivation outward from a source position. A wire only goes
/// dark when none of its own neighboring conductors remain active (it
/// stays powered while fed from another source). Afterwards every
/// logical entity on the map settles once.
pub(crate) fn propagate_deactivation(game: &mut Game, source: Position, tick: u64) {
    let mut visited = HashSet::new();
    deactivation_pass(game, source, &mut visited);
    settle_all(game, tick);
}

fn deactivation_pass(game: &mut Game, position: Position, visited: &mut HashSet<Position>) {
    if !visited.insert(position) {
        return;
    }
    for adjacent in position.cardinal_neighbors() {
        for id in game.map.entities_at(adjacent) {
            let is_active_wire = matches!(
                game.map.get(id).map(|entity| &entity.kind),
                Some(EntityKind::Wire { active: true })
            );
            if is_active_wire && !has_active_adjacent_conductor(game, adjacent) {
                if let Some(EntityKind::Wire { active }) =
                    game.map.get_mut(id).map(|entity| &mut entity.kind)
                {
                    *active = false;
                }
                deactivation_pass(game, adjacent, visited);
            }
        }
    }
}

fn has_active_adjacent_conductor(game: &Game, position: Position) -> bool {
    position.cardinal_neighbors().into_iter().any(|adjacent| {
        game.map
            .entities_at(adjacent)
            .into_iter()
            .any(|id| {
                game.map
                    .get(id)
                    .is_some_and(|entity| entity.kind.conductor_active())
            })
    })
}

/// Re-evaluate one logical entity's activation against its neighbors.
///
/// Transitions invoke the entity's own side effect: a light bulb lights
/// or darkens, a switch door opens or closes, and a placed logical bomb
/// explodes the moment it activates.
pub(crate) fn evaluate(game: &mut Game, logical: EntityId, tick: u64) {
    let Some(entity) = game.map.get(logical) else {
        return;
    };
    if !entity.kind.is_logical() {
        return;
    }
    // Unplaced logical bombs are inert inventory items.
    if let EntityKind::Bomb(bomb) = &entity.kind {
        if !matches!(bomb.phase, crate::entity::BombPhase::Placed) {
            return;
        }
    }
    let position = entity.position();
    let Some(state) = entity.kind.logic_state() else {
        return;
    };
    let rule = state.rule;
    let was_active = state.active;

    // Snapshot the neighborhood: every adjacent conductor and whether it
    // is currently carrying current.
    let mut conductors: Vec<(Position, bool)> = Vec::new();
    for adjacent in position.cardinal_neighbors() {
        for id in game.map.entities_at(adjacent) {
            if let Some(neighbor) = game.map.get(id) {
                if neighbor.kind.is_conductor() {
                    conductors.push((adjacent, neighbor.kind.conductor_active()));
                }
            }
        }
    }
    let total = conductors.len();
    let active_positions: Vec<Position> = conductors
        .iter()
        .filter(|(_, active)| *active)
        .map(|(position, _)| *position)
        .collect();
    let active = active_positions.len();

    let should_activate = match rule {
        LogicRule::Or => active >= 1,
        LogicRule::And => active >= 2 && active == total,
        LogicRule::Xor => active == 1,
        LogicRule::CoAnd => co_and_satisfied(game, logical, &active_positions),
    };

    if should_activate && !was_active {
        set_active(game, logical, true);
        if let Some(EntityKind::Bomb(_)) = game.map.get(logical).map(|entity| &entity.kind) {
            crate::systems::explode(game, logical);
        }
    } else if !should_activate && was_active {
        set_active(game, logical, false);
    }

    // Record first-seen activation ticks and prune conductors that have
    // dropped out of the active set.
    if let Some(state) = game
        .map
        .get_mut(logical)
        .and_then(|entity| entity.kind.logic_state_mut())
    {
        for position in &active_positions {
            let _ = state.activation_ticks.entry(*position).or_insert(tick);
        }
        state
            .activation_ticks
            .retain(|position, _| active_positions.contains(position));
    }
}

/// At least two of the currently-active neighbors share a recorded
/// activation tick.
fn co_and_satisfied(game: &Game, logical: EntityId, active_positions: &[Position]) -> bool {
    if active_positions.len() < 2 {
        return false;
    }
    let Some(state) = game
        .map
        .get(logical)
        .and_then(|entity| entity.kind.logic_state())
    else {
        return false;
    };
    let mut tick_counts: HashMap<u64, u32> = HashMap::new();
    for position in active_positions {
        if let Some(&tick) = state.activation_ticks.get(position) {
            *tick_counts.entry(tick).or_insert(0) += 1;
        }
    }
    tick_counts.values().any(|&count| count >= 2)
}

fn set_active(game: &mut Game, logical: EntityId, active: bool) {
    if let Some(state) = game
        .map
        .get_mut(logical)
        .and_then(|entity| entity.kind.logic_state_mut())
    {
        state.active = active;
        tracing::trace!(id = logical, active, "logical entity transitioned");
    }
}

/// Re-evaluate every logical entity on the map, in id order.
pub(crate) fn settle_all(game: &mut Game, tick: u64) {
    for id in game.map.ids_where(|entity| entity.kind.is_logical()) {
        evaluate(game, id, tick);
    }
}
