//! Player state: inventory, potion queue, crafting.
//!
//! The player's item entities keep their arena slot but lose their tile
//! the moment they are picked up; the inventory is just a list of ids
//! into the arena. Potion effects are a queue: only one potion is ever
//! in effect, and potions drunk while another is active wait their turn.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::battle::BattleStatistics;
use crate::entity::{EntityId, EntityKind};
use crate::error::{GameError, Result};
use crate::game::Game;
use crate::movement::MovementStrategy;

/// Items the player can craft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Buildable {
    /// Bow: 1 wood + 3 arrows. Doubles outgoing damage.
    Bow,
    /// Shield: 2 wood + 1 treasure or key. Adds flat defence.
    Shield,
}

impl Buildable {
    /// Snake-case name used in driver-facing data.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bow => "bow",
            Self::Shield => "shield",
        }
    }

    /// Parse a buildable name from driver input.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "bow" => Ok(Self::Bow),
            "shield" => Ok(Self::Shield),
            other => Err(GameError::InvalidAction(format!(
                "{other} cannot be built"
            ))),
        }
    }
}

/// The player's persistent state, stored inside the player entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Base battle statistics.
    pub stats: BattleStatistics,
    /// Ids of items currently held, in pickup order.
    pub inventory: Vec<EntityId>,
    /// Potions drunk while another was active, waiting their turn.
    pub potion_queue: VecDeque<EntityId>,
    /// The potion currently in effect, if any.
    pub active_potion: Option<EntityId>,
    /// Tick at which the active potion expires.
    pub next_trigger: u64,
    /// Total treasure pieces ever collected (the treasure goal counts
    /// this, not the current inventory).
    pub collected_treasure: u32,
    /// Entities interested in potion events, notified on every change.
    pub potion_listeners: Vec<EntityId>,
}

impl PlayerState {
    /// Fresh player state with the given base statistics.
    #[must_use]
    pub fn new(stats: BattleStatistics) -> Self {
        Self {
            stats,
            inventory: Vec::new(),
            potion_queue: VecDeque::new(),
            active_potion: None,
            next_trigger: 0,
            collected_treasure: 0,
            potion_listeners: Vec::new(),
        }
    }
}

// Inventory queries
// =================

/// Ids of inventory items matching a predicate, in pickup order.
pub(crate) fn items_where(
    game: &Game,
    predicate: impl Fn(&EntityKind) -> bool,
) -> Vec<EntityId> {
    let Some(player) = game.map.player_state() else {
        return Vec::new();
    };
    player
        .inventory
        .iter()
        .copied()
        .filter(|id| {
            game.map
                .get(*id)
                .is_some_and(|entity| predicate(&entity.kind))
        })
        .collect()
}

/// Number of inventory items matching a predicate.
pub(crate) fn count_items(game: &Game, predicate: impl Fn(&EntityKind) -> bool) -> usize {
    items_where(game, predicate).len()
}

/// Whether the player holds a weapon (sword or bow).
#[must_use]
pub fn has_weapon(game: &Game) -> bool {
    count_items(game, |kind| {
        matches!(kind, EntityKind::Sword { .. } | EntityKind::Bow { .. })
    }) > 0
}

// Pickup and removal
// ==================

/// Pick an item up off the map into the inventory.
///
/// Returns `false` (leaving the item on the map) when the pickup is
/// refused: the player only ever carries one key at a time.
pub(crate) fn pickup(game: &mut Game, item: EntityId) -> bool {
    let Some(kind) = game.map.get(item).map(|entity| entity.kind.clone()) else {
        return false;
    };
    if matches!(kind, EntityKind::Key { .. })
        && count_items(game, |kind| matches!(kind, EntityKind::Key { .. })) >= 1
    {
        return false;
    }
    game.map.displace(item);
    if let Some(player) = game.map.player_state_mut() {
        if matches!(kind, EntityKind::Treasure) {
            player.collected_treasure += 1;
        }
        player.inventory.push(item);
        true
    } else {
        false
    }
}

/// Remove an item from the inventory and the arena (consumed materials,
/// spent keys, broken weapons).
pub(crate) fn consume_item(game: &mut Game, item: EntityId) {
    if let Some(player) = game.map.player_state_mut() {
        player.inventory.retain(|&id| id != item);
    }
    let _ = game.map.remove_from_arena(item);
}

/// Spend one point of a weapon's durability, destroying it at zero.
pub(crate) fn spend_weapon_durability(game: &mut Game, weapon: EntityId) {
    let broke = match game.map.get_mut(weapon).map(|entity| &mut entity.kind) {
        Some(
            EntityKind::Sword { durability, .. }
            | EntityKind::Bow { durability }
            | EntityKind::Shield { durability, .. },
        ) => {
            *durability = durability.saturating_sub(1);
            *durability == 0
        }
        _ => false,
    };
    if broke {
        consume_item(game, weapon);
    }
}

// Crafting
// ========

/// What the player can currently craft.
#[must_use]
pub fn buildables(game: &Game) -> Vec<Buildable> {
    let wood = count_items(game, |kind| matches!(kind, EntityKind::Wood));
    let arrows = count_items(game, |kind| matches!(kind, EntityKind::Arrow));
    let treasure = count_items(game, |kind| matches!(kind, EntityKind::Treasure));
    let keys = count_items(game, |kind| matches!(kind, EntityKind::Key { .. }));

    let mut result = Vec::new();
    if wood >= 1 && arrows >= 3 {
        result.push(Buildable::Bow);
    }
    if wood >= 2 && (treasure >= 1 || keys >= 1) {
        result.push(Buildable::Shield);
    }
    result
}

/// Craft an item, consuming its materials from the inventory.
///
/// Callers validate via [`buildables`] first; an unsatisfiable recipe
/// here is simply a no-op.
pub(crate) fn craft(game: &mut Game, buildable: Buildable) {
    match buildable {
        Buildable::Bow => {
            let wood = items_where(game, |kind| matches!(kind, EntityKind::Wood));
            let arrows = items_where(game, |kind| matches!(kind, EntityKind::Arrow));
            if wood.is_empty() || arrows.len() < 3 {
                return;
            }
            consume_item(game, wood[0]);
            for &arrow in arrows.iter().take(3) {
                consume_item(game, arrow);
            }
            let bow = crate::factory::build_bow(&game.config);
            let id = game.map.insert_off_map(bow);
            if let Some(player) = game.map.player_state_mut() {
                player.inventory.push(id);
            }
        }
        Buildable::Shield => {
            let wood = items_where(game, |kind| matches!(kind, EntityKind::Wood));
            let treasure = items_where(game, |kind| matches!(kind, EntityKind::Treasure));
            let keys = items_where(game, |kind| matches!(kind, EntityKind::Key { .. }));
            if wood.len() < 2 || (treasure.is_empty() && keys.is_empty()) {
                return;
            }
            consume_item(game, wood[0]);
            consume_item(game, wood[1]);
            if let Some(&t) = treasure.first() {
                consume_item(game, t);
            } else {
                consume_item(game, keys[0]);
            }
            let shield = crate::factory::build_shield(&game.config);
            let id = game.map.insert_off_map(shield);
            if let Some(player) = game.map.player_state_mut() {
                player.inventory.push(id);
            }
        }
    }
}

// Potions
// =======

/// Drink a potion: it leaves the inventory and joins the effect queue,
/// taking effect immediately when nothing else is active.
pub(crate) fn use_potion(game: &mut Game, potion: EntityId, tick: u64) {
    let Some(player) = game.map.player_state_mut() else {
        return;
    };
    player.inventory.retain(|&id| id != potion);
    player.potion_queue.push_back(potion);
    if player.active_potion.is_none() {
        trigger_next_potion(game, tick);
    }
}

/// Advance the potion queue: expire the active effect and start the next
/// one, notifying every listener of the change.
pub(crate) fn trigger_next_potion(game: &mut Game, tick: u64) {
    let expired;
    let started;
    {
        let Some(player) = game.map.player_state_mut() else {
            return;
        };
        expired = player.active_potion.take();
        match player.potion_queue.pop_front() {
            None => started = None,
            Some(next) => {
                player.active_potion = Some(next);
                started = Some(next);
            }
        }
    }

    if let Some(expired) = expired {
        let _ = game.map.remove_from_arena(expired);
    }

    match started {
        None => notify_listeners(game, None),
        Some(potion) => {
            let duration = match game.map.get(potion).map(|entity| &entity.kind) {
                Some(
                    EntityKind::InvisibilityPotion { duration }
                    | EntityKind::InvincibilityPotion { duration },
                ) => *duration,
                _ => 0,
            };
            if let Some(player) = game.map.player_state_mut() {
                player.next_trigger = tick + duration;
            }
            notify_listeners(game, Some(potion));
        }
    }
}

/// Per-tick potion bookkeeping: with no effect active, or at the expiry
/// tick, advance the queue.
pub(crate) fn potion_tick(game: &mut Game, tick: u64) {
    let Some(player) = game.map.player_state() else {
        return;
    };
    if player.active_potion.is_none() || tick == player.next_trigger {
        trigger_next_potion(game, tick);
    }
}

/// Compose the active potion's battle buff over `buff`.
pub(crate) fn apply_potion_buff(game: &Game, buff: BattleStatistics) -> BattleStatistics {
    let active = game
        .map
        .player_state()
        .and_then(|player| player.active_potion)
        .and_then(|id| game.map.get(id))
        .map(|entity| &entity.kind);
    match active {
        Some(EntityKind::InvincibilityPotion { .. }) => {
            BattleStatistics::apply_buff(buff, BattleStatistics::invincible_buff())
        }
        Some(EntityKind::InvisibilityPotion { .. }) => {
            BattleStatistics::apply_buff(buff, BattleStatistics::disabled_buff())
        }
        _ => buff,
    }
}

/// Register an entity for potion events. If a potion is already in
/// effect the new listener hears about it immediately.
pub(crate) fn register_potion_listener(game: &mut Game, listener: EntityId) {
    let active = {
        let Some(player) = game.map.player_state_mut() else {
            return;
        };
        if !player.potion_listeners.contains(&listener) {
            player.potion_listeners.push(listener);
        }
        player.active_potion
    };
    if active.is_some() {
        notify_listener(game, listener, active);
    }
}

/// Drop an entity from the potion listener list (on its destruction).
pub(crate) fn remove_potion_listener(game: &mut Game, listener: EntityId) {
    if let Some(player) = game.map.player_state_mut() {
        player.potion_listeners.retain(|&id| id != listener);
    }
}

fn notify_listeners(game: &mut Game, potion: Option<EntityId>) {
    let listeners = game
        .map
        .player_state()
        .map(|player| player.potion_listeners.clone())
        .unwrap_or_default();
    for listener in listeners {
        notify_listener(game, listener, potion);
    }
}

/// Deliver one potion event: listeners swap their movement strategies.
///
/// Allied mercenaries ignore potions entirely. Zombies keep their
/// current strategy on invisibility; only invincibility scares them.
fn notify_listener(game: &mut Game, listener: EntityId, potion: Option<EntityId>) {
    let potion_kind = potion
        .and_then(|id| game.map.get(id))
        .map(|entity| entity.kind.clone());
    let Some(entity) = game.map.get_mut(listener) else {
        return;
    };
    match &mut entity.kind {
        EntityKind::Mercenary(merc) => {
            if merc.allied {
                return;
            }
            merc.movement = match potion_kind {
                Some(EntityKind::InvisibilityPotion { .. }) => MovementStrategy::Random,
                Some(EntityKind::InvincibilityPotion { .. }) => MovementStrategy::Flee,
                _ => MovementStrategy::Hostile,
            };
        }
        EntityKind::ZombieToast(zombie) => match potion_kind {
            Some(EntityKind::InvincibilityPotion { .. }) => {
                zombie.movement = MovementStrategy::Flee;
            }
            Some(EntityKind::InvisibilityPotion { .. }) => {}
            _ => zombie.movement = MovementStrategy::Random,
        },
        _ => {}
    }
}
