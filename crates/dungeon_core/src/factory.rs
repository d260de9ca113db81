//! Entity construction from parsed dungeon data, and runtime spawning.
//!
//! The core never touches files: drivers hand over a [`DungeonSpec`] and
//! a [`GameConfig`] that are already parsed (both deserialize from the
//! JSON-shaped data the original dungeons use). Unknown entity kinds,
//! goal kinds, and logic rules are construction-time errors, not
//! runtime conditions.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::{
    BattleStatistics, Fixed, DEFAULT_ENEMY_DAMAGE_REDUCER, DEFAULT_PLAYER_DAMAGE_REDUCER,
};
use crate::entity::{
    BombPhase, BombState, Color, DoorState, EnemyState, Entity, EntityId, EntityKind,
    MercenaryState, PortalState, SwitchState,
};
use crate::error::{GameError, Result};
use crate::game::Game;
use crate::logic::{LogicRule, LogicState};
use crate::movement::MovementStrategy;
use crate::player::PlayerState;
use crate::position::Position;

/// Game balance and spawning configuration, supplied pre-parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Player starting health.
    pub player_health: f64,
    /// Player attack.
    pub player_attack: f64,
    /// Mercenary starting health.
    pub mercenary_health: f64,
    /// Mercenary attack.
    pub mercenary_attack: f64,
    /// Zombie toast starting health.
    pub zombie_health: f64,
    /// Zombie toast attack.
    pub zombie_attack: f64,
    /// Spider starting health.
    pub spider_health: f64,
    /// Spider attack.
    pub spider_attack: f64,
    /// Treasure required to bribe a mercenary.
    pub bribe_amount: u32,
    /// Maximum Manhattan distance for bribing.
    pub bribe_radius: u32,
    /// Attack an allied mercenary contributes in battles.
    pub ally_attack: f64,
    /// Defence an allied mercenary contributes in battles.
    pub ally_defence: f64,
    /// Bomb blast radius in cells.
    pub bomb_radius: u32,
    /// Invincibility potion duration in ticks.
    pub invincibility_potion_duration: u64,
    /// Invisibility potion duration in ticks.
    pub invisibility_potion_duration: u64,
    /// Attack contributed by a sword.
    pub sword_attack: f64,
    /// Battles a sword survives.
    pub sword_durability: u32,
    /// Defence contributed by a shield.
    pub shield_defence: f64,
    /// Battles a shield survives.
    pub shield_durability: u32,
    /// Battles a bow survives.
    pub bow_durability: u32,
    /// Treasure required by the treasure goal.
    pub treasure_goal: u32,
    /// Ticks between zombie spawns per spawner (0 disables spawning).
    pub zombie_spawn_rate: u64,
    /// Ticks between global spider spawns (0 disables spawning).
    pub spider_spawn_rate: u64,
    /// Maximum live spiders at once.
    pub max_spiders: u32,
    /// Half-width of the square around the player where spiders appear.
    pub spider_spawn_radius: i32,
    /// Seed for the game's deterministic RNG.
    pub rng_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player_health: 5.0,
            player_attack: 5.0,
            mercenary_health: 10.0,
            mercenary_attack: 5.0,
            zombie_health: 5.0,
            zombie_attack: 6.0,
            spider_health: 5.0,
            spider_attack: 1.0,
            bribe_amount: 1,
            bribe_radius: 1,
            ally_attack: 3.0,
            ally_defence: 3.0,
            bomb_radius: 1,
            invincibility_potion_duration: 8,
            invisibility_potion_duration: 8,
            sword_attack: 2.0,
            sword_durability: 5,
            shield_defence: 2.0,
            shield_durability: 5,
            bow_durability: 5,
            treasure_goal: 1,
            zombie_spawn_rate: 20,
            spider_spawn_rate: 0,
            max_spiders: 4,
            spider_spawn_radius: 5,
            rng_seed: 0,
        }
    }
}

/// One entity row of parsed dungeon data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Entity kind name (snake_case).
    #[serde(rename = "type")]
    pub kind: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Key/door number, for keys and doors.
    #[serde(default)]
    pub key: Option<u32>,
    /// Pairing color, for portals.
    #[serde(default, rename = "colour")]
    pub color: Option<String>,
    /// Logic rule, for circuitry.
    #[serde(default)]
    pub logic: Option<String>,
}

impl EntitySpec {
    /// Spec row for a plain entity kind.
    #[must_use]
    pub fn new(kind: &str, x: i32, y: i32) -> Self {
        Self {
            kind: kind.to_string(),
            x,
            y,
            key: None,
            color: None,
            logic: None,
        }
    }

    /// Attach a key/door number.
    #[must_use]
    pub fn with_key(mut self, number: u32) -> Self {
        self.key = Some(number);
        self
    }

    /// Attach a portal color.
    #[must_use]
    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Attach a logic rule.
    #[must_use]
    pub fn with_logic(mut self, logic: &str) -> Self {
        self.logic = Some(logic.to_string());
        self
    }
}

/// Parsed goal tree data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalSpec {
    /// Goal kind ("AND", "OR", "exit", "boulders", "treasure").
    pub goal: String,
    /// Sub-goals of composite kinds.
    #[serde(default)]
    pub subgoals: Vec<GoalSpec>,
}

impl GoalSpec {
    /// Leaf goal spec.
    #[must_use]
    pub fn leaf(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            subgoals: Vec::new(),
        }
    }

    /// Composite goal spec.
    #[must_use]
    pub fn composite(goal: &str, subgoals: Vec<GoalSpec>) -> Self {
        Self {
            goal: goal.to_string(),
            subgoals,
        }
    }
}

/// A whole parsed dungeon: the entity list plus an optional goal tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonSpec {
    /// Entities to place at load time.
    pub entities: Vec<EntitySpec>,
    /// Win condition, if the dungeon has one.
    #[serde(default, rename = "goal-condition")]
    pub goal_condition: Option<GoalSpec>,
}

fn fixed(value: f64) -> Fixed {
    Fixed::from_num(value)
}

fn enemy_stats(health: f64, attack: f64) -> BattleStatistics {
    BattleStatistics::new(
        fixed(health),
        fixed(attack),
        Fixed::ZERO,
        DEFAULT_ENEMY_DAMAGE_REDUCER,
    )
}

/// Build one entity from its spec row.
///
/// Unrecognised kinds are a data error surfaced immediately.
pub fn build_entity(config: &GameConfig, spec: &EntitySpec) -> Result<Entity> {
    let position = Position::new(spec.x, spec.y);
    let kind = match spec.kind.as_str() {
        "player" => EntityKind::Player(PlayerState::new(BattleStatistics::new(
            fixed(config.player_health),
            fixed(config.player_attack),
            Fixed::ZERO,
            DEFAULT_PLAYER_DAMAGE_REDUCER,
        ))),
        "wall" => EntityKind::Wall,
        "exit" => EntityKind::Exit,
        "boulder" => EntityKind::Boulder,
        "switch" => EntityKind::FloorSwitch(SwitchState::default()),
        "door" => EntityKind::Door(DoorState {
            open: false,
            number: spec.key.unwrap_or(0),
        }),
        "key" => EntityKind::Key {
            number: spec.key.unwrap_or(0),
        },
        "portal" => EntityKind::Portal(PortalState {
            color: Color::parse(spec.color.as_deref().unwrap_or(""))?,
            pair: None,
        }),
        "zombie_toast_spawner" => EntityKind::ZombieToastSpawner,
        "mercenary" => EntityKind::Mercenary(MercenaryState {
            stats: enemy_stats(config.mercenary_health, config.mercenary_attack),
            movement: MovementStrategy::Hostile,
            bribe_amount: config.bribe_amount,
            bribe_radius: config.bribe_radius,
            ally_attack: fixed(config.ally_attack),
            ally_defence: fixed(config.ally_defence),
            allied: false,
        }),
        "zombie_toast" => EntityKind::ZombieToast(EnemyState {
            stats: enemy_stats(config.zombie_health, config.zombie_attack),
            movement: MovementStrategy::Random,
        }),
        "spider" => EntityKind::Spider(EnemyState {
            stats: enemy_stats(config.spider_health, config.spider_attack),
            movement: MovementStrategy::circling(position),
        }),
        "wood" => EntityKind::Wood,
        "arrow" => EntityKind::Arrow,
        "treasure" => EntityKind::Treasure,
        "sword" => EntityKind::Sword {
            attack: fixed(config.sword_attack),
            durability: config.sword_durability,
        },
        "invisibility_potion" => EntityKind::InvisibilityPotion {
            duration: config.invisibility_potion_duration,
        },
        "invincibility_potion" => EntityKind::InvincibilityPotion {
            duration: config.invincibility_potion_duration,
        },
        "bomb" => EntityKind::Bomb(BombState {
            radius: config.bomb_radius,
            phase: BombPhase::Spawned,
            logic: spec
                .logic
                .as_deref()
                .map(LogicRule::parse)
                .transpose()?
                .map(LogicState::new),
        }),
        "wire" => EntityKind::Wire { active: false },
        "light_bulb" => EntityKind::LightBulb(require_logic(spec)?),
        "switch_door" => EntityKind::SwitchDoor(require_logic(spec)?),
        other => return Err(GameError::UnknownEntityKind(other.to_string())),
    };
    Ok(Entity::new(kind, position))
}

fn require_logic(spec: &EntitySpec) -> Result<LogicState> {
    let rule = spec
        .logic
        .as_deref()
        .ok_or_else(|| GameError::InvalidState(format!("{} requires a logic rule", spec.kind)))?;
    Ok(LogicState::new(LogicRule::parse(rule)?))
}

/// Build a crafted bow.
#[must_use]
pub fn build_bow(config: &GameConfig) -> Entity {
    Entity::new(
        EntityKind::Bow {
            durability: config.bow_durability,
        },
        Position::new(0, 0),
    )
}

/// Build a crafted shield.
#[must_use]
pub fn build_shield(config: &GameConfig) -> Entity {
    Entity::new(
        EntityKind::Shield {
            defence: fixed(config.shield_defence),
            durability: config.shield_durability,
        },
        Position::new(0, 0),
    )
}

/// A zombie toast spawner's recurring action: every `zombie_spawn_rate`
/// ticks, emit a zombie into the first open cardinally-adjacent cell.
pub(crate) fn spawn_zombie(game: &mut Game, spawner: EntityId) {
    let rate = game.config.zombie_spawn_rate;
    if rate == 0 || (game.get_tick() + 1) % rate != 0 {
        return;
    }
    let Some(origin) = game.map.get(spawner).map(|entity| entity.position()) else {
        return;
    };

    let zombie = Entity::new(
        EntityKind::ZombieToast(EnemyState {
            stats: enemy_stats(game.config.zombie_health, game.config.zombie_attack),
            movement: MovementStrategy::Random,
        }),
        origin,
    );
    let id = game.map.insert_off_map(zombie);

    let destination = origin
        .cardinal_neighbors()
        .into_iter()
        .find(|&candidate| game.map.can_move_to(id, candidate));
    match destination {
        Some(destination) => {
            let destination = destination.as_layer(crate::position::CHARACTER_LAYER);
            if let Some(entity) = game.map.get_mut(id) {
                entity.set_position(destination);
            }
            game.map.place(id, destination);
            crate::systems::register_enemy(game, id);
            crate::player::register_potion_listener(game, id);
            tracing::debug!(id, "zombie spawned");
        }
        None => {
            let _ = game.map.remove_from_arena(id);
        }
    }
}

/// The global spider spawn task: every `spider_spawn_rate` ticks, while
/// under the population cap, drop a spider at a seeded-random cell
/// around the player.
pub(crate) fn spawn_spider(game: &mut Game) {
    let rate = game.config.spider_spawn_rate;
    if rate == 0 || (game.get_tick() + 1) % rate != 0 {
        return;
    }
    let spiders = game
        .map
        .ids_where(|entity| matches!(entity.kind, EntityKind::Spider(_)))
        .len();
    if spiders as u32 >= game.config.max_spiders {
        return;
    }
    let Some(player_pos) = game
        .map
        .player_id()
        .and_then(|id| game.map.get(id))
        .map(|player| player.position())
    else {
        return;
    };

    let radius = game.config.spider_spawn_radius.max(1);
    let spider = Entity::new(
        EntityKind::Spider(EnemyState {
            stats: enemy_stats(game.config.spider_health, game.config.spider_attack),
            movement: MovementStrategy::Hostile, // replaced once placed
        }),
        player_pos,
    );
    let id = game.map.insert_off_map(spider);

    // A handful of seeded attempts; boulders are the only thing a
    // spider cannot share a cell with.
    for _ in 0..10 {
        let dx = game.rng.gen_range(-radius..=radius);
        let dy = game.rng.gen_range(-radius..=radius);
        let candidate = player_pos.offset_by(dx, dy);
        if candidate == player_pos || !game.map.can_move_to(id, candidate) {
            continue;
        }
        let candidate = candidate.as_layer(crate::position::CHARACTER_LAYER);
        if let Some(entity) = game.map.get_mut(id) {
            entity.set_position(candidate);
            if let EntityKind::Spider(state) = &mut entity.kind {
                state.movement = MovementStrategy::circling(candidate);
            }
        }
        game.map.place(id, candidate);
        crate::systems::register_enemy(game, id);
        tracing::debug!(id, "spider spawned");
        return;
    }
    let _ = game.map.remove_from_arena(id);
}
