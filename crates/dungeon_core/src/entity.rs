//! Entity definitions.
//!
//! Everything in the dungeon is an [`Entity`]: the player, the monsters,
//! the items, the literal walls of the world. An entity couples a stable
//! identifier and position bookkeeping with an [`EntityKind`] tagged
//! variant carrying per-kind state. Behavior is dispatched by matching on
//! the kind; capability checks (conductor, logical, battleable, ...) are
//! methods on the kind rather than an inheritance chain.

use serde::{Deserialize, Serialize};

use crate::battle::{BattleStatistics, Fixed};
use crate::error::{GameError, Result};
use crate::logic::LogicState;
use crate::movement::MovementStrategy;
use crate::player::PlayerState;
use crate::position::{
    Direction, Position, CHARACTER_LAYER, DOOR_LAYER, FLOOR_LAYER, ITEM_LAYER,
};

/// Unique identifier for entities.
pub type EntityId = u64;

/// Colors used to link up color-coded entities such as portals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// Red.
    Red,
    /// Blue.
    Blue,
    /// Yellow.
    Yellow,
    /// Green.
    Green,
    /// Grey.
    Grey,
}

impl Color {
    /// Parse a color from dungeon data.
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "blue" => Ok(Self::Blue),
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            "grey" => Ok(Self::Grey),
            other => Err(GameError::InvalidState(format!("unknown color '{other}'"))),
        }
    }
}

/// State of a floor switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchState {
    /// Whether a boulder currently rests on the switch.
    pub activated: bool,
    /// Bombs subscribed to detonate when this switch activates.
    pub bombs: Vec<EntityId>,
}

/// State of a keyed door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorState {
    /// Whether the door has been unlocked.
    pub open: bool,
    /// Key number that unlocks this door.
    pub number: u32,
}

/// State of a portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalState {
    /// Pairing color.
    pub color: Color,
    /// The paired portal, if one has been bound.
    pub pair: Option<EntityId>,
}

/// Shared state of simple enemies (zombies, spiders).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyState {
    /// Battle statistics.
    pub stats: BattleStatistics,
    /// Movement strategy, swappable at runtime.
    pub movement: MovementStrategy,
}

/// State of a mercenary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MercenaryState {
    /// Battle statistics while hostile.
    pub stats: BattleStatistics,
    /// Movement strategy, swappable at runtime.
    pub movement: MovementStrategy,
    /// Treasure required for a bribe.
    pub bribe_amount: u32,
    /// Maximum Manhattan distance at which a bribe is possible.
    pub bribe_radius: u32,
    /// Attack contributed to the player once allied.
    #[serde(with = "crate::battle::fixed_serde")]
    pub ally_attack: Fixed,
    /// Defence contributed to the player once allied.
    #[serde(with = "crate::battle::fixed_serde")]
    pub ally_defence: Fixed,
    /// Whether the mercenary has been bribed.
    pub allied: bool,
}

/// Lifecycle of a bomb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BombPhase {
    /// On the map, collectable.
    Spawned,
    /// Placed by the player, armed.
    Placed,
}

/// State of a bomb (plain or logical).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombState {
    /// Blast radius in cells (square).
    pub radius: u32,
    /// Whether the bomb is still collectable or has been placed.
    pub phase: BombPhase,
    /// Logic state for logical bombs; `None` for switch-subscribed bombs.
    pub logic: Option<LogicState>,
}

/// The tagged variant holding each entity kind's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    /// The game's one and only player.
    Player(PlayerState),
    /// Impassable wall (spiders excepted).
    Wall,
    /// The exit the player must reach for the exit goal.
    Exit,
    /// Pushable boulder.
    Boulder,
    /// Floor switch, activated by a boulder. Conducts current.
    FloorSwitch(SwitchState),
    /// Keyed door.
    Door(DoorState),
    /// Key opening the door with the matching number.
    Key {
        /// Door number this key opens.
        number: u32,
    },
    /// Teleporting portal, paired by color.
    Portal(PortalState),
    /// Spawns zombie toasts on a fixed cadence.
    ZombieToastSpawner,
    /// Bribeable pursuing enemy.
    Mercenary(MercenaryState),
    /// Randomly wandering enemy.
    ZombieToast(EnemyState),
    /// Enemy circling its spawn point, ignoring walls.
    Spider(EnemyState),
    /// Crafting material.
    Wood,
    /// Crafting material.
    Arrow,
    /// Collectable wealth; bribes and the treasure goal count it.
    Treasure,
    /// Weapon adding flat attack, with limited durability.
    Sword {
        /// Attack contributed in battle.
        #[serde(with = "crate::battle::fixed_serde")]
        attack: Fixed,
        /// Battles remaining before the sword breaks.
        durability: u32,
    },
    /// Crafted weapon doubling outgoing damage.
    Bow {
        /// Battles remaining before the bow breaks.
        durability: u32,
    },
    /// Crafted shield adding flat defence.
    Shield {
        /// Defence contributed in battle.
        #[serde(with = "crate::battle::fixed_serde")]
        defence: Fixed,
        /// Battles remaining before the shield breaks.
        durability: u32,
    },
    /// Potion hiding the player from battles while active.
    InvisibilityPotion {
        /// Effect duration in ticks.
        duration: u64,
    },
    /// Potion making the player invincible while active.
    InvincibilityPotion {
        /// Effect duration in ticks.
        duration: u64,
    },
    /// Bomb, collectable until placed.
    Bomb(BombState),
    /// Wire relaying current between conductors.
    Wire {
        /// Whether current is flowing through the wire.
        active: bool,
    },
    /// Light bulb lit by its logic rule.
    LightBulb(LogicState),
    /// Door opened and closed by its logic rule instead of a key.
    SwitchDoor(LogicState),
}

impl EntityKind {
    /// Draw/occupancy layer for this kind.
    #[must_use]
    pub const fn layer(&self) -> i32 {
        match self {
            Self::Player(_) | Self::Mercenary(_) | Self::ZombieToast(_) | Self::Spider(_) => {
                CHARACTER_LAYER
            }
            Self::Door(_) | Self::SwitchDoor(_) => DOOR_LAYER,
            Self::FloorSwitch(_)
            | Self::Key { .. }
            | Self::Wood
            | Self::Arrow
            | Self::Treasure
            | Self::Sword { .. }
            | Self::Bow { .. }
            | Self::Shield { .. }
            | Self::InvisibilityPotion { .. }
            | Self::InvincibilityPotion { .. }
            | Self::Bomb(_)
            | Self::Wire { .. }
            | Self::LightBulb(_)
            | Self::Boulder => ITEM_LAYER,
            Self::Wall | Self::Exit | Self::Portal(_) | Self::ZombieToastSpawner => FLOOR_LAYER,
        }
    }

    /// Snake-case name of this kind, as used in dungeon data and snapshots.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Player(_) => "player",
            Self::Wall => "wall",
            Self::Exit => "exit",
            Self::Boulder => "boulder",
            Self::FloorSwitch(_) => "switch",
            Self::Door(_) => "door",
            Self::Key { .. } => "key",
            Self::Portal(_) => "portal",
            Self::ZombieToastSpawner => "zombie_toast_spawner",
            Self::Mercenary(_) => "mercenary",
            Self::ZombieToast(_) => "zombie_toast",
            Self::Spider(_) => "spider",
            Self::Wood => "wood",
            Self::Arrow => "arrow",
            Self::Treasure => "treasure",
            Self::Sword { .. } => "sword",
            Self::Bow { .. } => "bow",
            Self::Shield { .. } => "shield",
            Self::InvisibilityPotion { .. } => "invisibility_potion",
            Self::InvincibilityPotion { .. } => "invincibility_potion",
            Self::Bomb(_) => "bomb",
            Self::Wire { .. } => "wire",
            Self::LightBulb(_) => "light_bulb",
            Self::SwitchDoor(_) => "switch_door",
        }
    }

    /// Whether this kind is an enemy.
    #[must_use]
    pub const fn is_enemy(&self) -> bool {
        matches!(
            self,
            Self::Mercenary(_) | Self::ZombieToast(_) | Self::Spider(_)
        )
    }

    /// Whether this kind can carry current to its neighbors.
    #[must_use]
    pub const fn is_conductor(&self) -> bool {
        matches!(self, Self::FloorSwitch(_) | Self::Wire { .. })
    }

    /// Whether a conductor is currently carrying current.
    ///
    /// Returns `false` for non-conductors.
    #[must_use]
    pub fn conductor_active(&self) -> bool {
        match self {
            Self::FloorSwitch(state) => state.activated,
            Self::Wire { active } => *active,
            _ => false,
        }
    }

    /// Whether this kind evaluates a logic rule over its neighbors.
    ///
    /// Placed logical bombs count; plain bombs never do.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        match self {
            Self::LightBulb(_) | Self::SwitchDoor(_) => true,
            Self::Bomb(state) => state.logic.is_some(),
            _ => false,
        }
    }

    /// Logic state for logical kinds.
    #[must_use]
    pub fn logic_state(&self) -> Option<&LogicState> {
        match self {
            Self::LightBulb(state) | Self::SwitchDoor(state) => Some(state),
            Self::Bomb(bomb) => bomb.logic.as_ref(),
            _ => None,
        }
    }

    /// Mutable logic state for logical kinds.
    #[must_use]
    pub fn logic_state_mut(&mut self) -> Option<&mut LogicState> {
        match self {
            Self::LightBulb(state) | Self::SwitchDoor(state) => Some(state),
            Self::Bomb(bomb) => bomb.logic.as_mut(),
            _ => None,
        }
    }

    /// Battle statistics for battleable kinds (enemies; the player's live
    /// in [`PlayerState`] and are also reachable here).
    #[must_use]
    pub fn battle_statistics(&self) -> Option<BattleStatistics> {
        match self {
            Self::Player(player) => Some(player.stats),
            Self::Mercenary(merc) => Some(merc.stats),
            Self::ZombieToast(enemy) | Self::Spider(enemy) => Some(enemy.stats),
            _ => None,
        }
    }

    /// Mutable battle statistics for battleable kinds.
    #[must_use]
    pub fn battle_statistics_mut(&mut self) -> Option<&mut BattleStatistics> {
        match self {
            Self::Player(player) => Some(&mut player.stats),
            Self::Mercenary(merc) => Some(&mut merc.stats),
            Self::ZombieToast(enemy) | Self::Spider(enemy) => Some(&mut enemy.stats),
            _ => None,
        }
    }

    /// Movement strategy for enemies.
    #[must_use]
    pub fn movement_strategy(&self) -> Option<&MovementStrategy> {
        match self {
            Self::Mercenary(merc) => Some(&merc.movement),
            Self::ZombieToast(enemy) | Self::Spider(enemy) => Some(&enemy.movement),
            _ => None,
        }
    }

    /// Mutable movement strategy for enemies.
    #[must_use]
    pub fn movement_strategy_mut(&mut self) -> Option<&mut MovementStrategy> {
        match self {
            Self::Mercenary(merc) => Some(&mut merc.movement),
            Self::ZombieToast(enemy) | Self::Spider(enemy) => Some(&mut enemy.movement),
            _ => None,
        }
    }

    /// Whether this kind sits in the inventory once picked up.
    #[must_use]
    pub fn is_collectable(&self) -> bool {
        match self {
            Self::Key { .. }
            | Self::Wood
            | Self::Arrow
            | Self::Treasure
            | Self::Sword { .. }
            | Self::InvisibilityPotion { .. }
            | Self::InvincibilityPotion { .. } => true,
            Self::Bomb(bomb) => matches!(bomb.phase, BombPhase::Spawned),
            _ => false,
        }
    }

    /// Whether this kind is a potion.
    #[must_use]
    pub const fn is_potion(&self) -> bool {
        matches!(
            self,
            Self::InvisibilityPotion { .. } | Self::InvincibilityPotion { .. }
        )
    }

    /// Whether the player can ever interact with this kind.
    #[must_use]
    pub const fn is_interactable(&self) -> bool {
        matches!(self, Self::Mercenary(_) | Self::ZombieToastSpawner)
    }

    /// Whether this kind listens for player potion events.
    #[must_use]
    pub const fn is_potion_listener(&self) -> bool {
        matches!(self, Self::Mercenary(_) | Self::ZombieToast(_))
    }

    /// Whether a door-like kind is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        match self {
            Self::Door(door) => door.open,
            Self::SwitchDoor(logic) => logic.active,
            _ => false,
        }
    }

    /// Whether a light bulb is currently lit.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        matches!(self, Self::LightBulb(logic) if logic.active)
    }
}

/// An entity record stored in the map's arena.
///
/// The map is sole authority over the position-to-entity relation; the
/// fields here are the entity's own view of it, maintained through
/// [`Entity::set_position`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier, stable for the entity's lifetime.
    pub id: EntityId,
    /// Kind and per-kind state.
    pub kind: EntityKind,
    position: Position,
    previous_position: Position,
    previous_distinct_position: Option<Position>,
    facing: Option<Direction>,
}

impl Entity {
    /// Create a new entity record. The id is assigned by the map's arena.
    #[must_use]
    pub fn new(kind: EntityKind, position: Position) -> Self {
        let position = position.as_layer(kind.layer());
        Self {
            id: 0,
            kind,
            position,
            previous_position: position,
            previous_distinct_position: None,
            facing: None,
        }
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Position on the previous move, distinct or not.
    #[must_use]
    pub const fn previous_position(&self) -> Position {
        self.previous_position
    }

    /// The last position this entity occupied that differs from its
    /// current one. `None` until the entity has actually moved.
    #[must_use]
    pub const fn previous_distinct_position(&self) -> Option<Position> {
        self.previous_distinct_position
    }

    /// Facing direction, if the entity has moved with one.
    #[must_use]
    pub const fn facing(&self) -> Option<Direction> {
        self.facing
    }

    /// Update the entity's own position bookkeeping.
    ///
    /// The previous-distinct position only updates when the new position
    /// actually differs; repeated same-cell updates must not clobber it.
    pub(crate) fn set_position(&mut self, position: Position) {
        self.previous_position = self.position;
        self.position = position;
        if self.previous_position != self.position {
            self.previous_distinct_position = Some(self.previous_position);
        }
    }

    /// Update the facing direction.
    pub(crate) fn set_facing(&mut self, facing: Direction) {
        self.facing = Some(facing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_assignment() {
        let wall = Entity::new(EntityKind::Wall, Position::new(1, 1));
        assert_eq!(wall.position().layer, FLOOR_LAYER);

        let door = Entity::new(
            EntityKind::Door(DoorState {
                open: false,
                number: 1,
            }),
            Position::new(1, 1),
        );
        assert_eq!(door.position().layer, DOOR_LAYER);
    }

    #[test]
    fn test_previous_distinct_position_updates_on_real_moves_only() {
        let mut entity = Entity::new(EntityKind::Boulder, Position::new(0, 0));
        assert_eq!(entity.previous_distinct_position(), None);

        entity.set_position(Position::new(1, 0));
        assert_eq!(
            entity.previous_distinct_position(),
            Some(Position::new(0, 0))
        );

        // A "move" to the current cell keeps the distinct history.
        entity.set_position(Position::new(1, 0));
        assert_eq!(
            entity.previous_distinct_position(),
            Some(Position::new(0, 0))
        );

        entity.set_position(Position::new(2, 0));
        assert_eq!(
            entity.previous_distinct_position(),
            Some(Position::new(1, 0))
        );
    }

    #[test]
    fn test_kind_names_are_snake_case() {
        assert_eq!(EntityKind::ZombieToastSpawner.kind_name(), "zombie_toast_spawner");
        assert_eq!(
            EntityKind::Wire { active: false }.kind_name(),
            "wire"
        );
    }

    #[test]
    fn test_capability_checks() {
        let wire = EntityKind::Wire { active: true };
        assert!(wire.is_conductor());
        assert!(wire.conductor_active());
        assert!(!wire.is_logical());

        let spawner = EntityKind::ZombieToastSpawner;
        assert!(spawner.is_interactable());
        assert!(!spawner.is_conductor());
    }
}
