//! The simulation controller.
//!
//! [`Game`] owns the map, the scheduler, the RNG, the battle log, and
//! the goal tree, and exposes `tick()` as the single simulation-advance
//! primitive. Player-facing operations validate first and only then
//! register a one-shot action and tick; a rejected action is
//! side-effect free and does not advance the simulation.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::battle::{BattleResponse, Fixed};
use crate::entity::{Color, EntityId, EntityKind};
use crate::error::{GameError, Result};
use crate::factory::{self, DungeonSpec, GameConfig};
use crate::goals::Goal;
use crate::map::GameMap;
use crate::player::{self, Buildable};
use crate::position::Direction;
use crate::scheduler::{
    ActionId, Scheduler, AI_PRIORITY, PLAYER_ACTION_PRIORITY, POTION_BRIBE_PRIORITY,
};
use crate::systems;

/// The plain-data actions the scheduler queues; the game dispatches them
/// as they drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The player's one-shot movement.
    PlayerMove(Direction),
    /// The player's one-shot item use.
    PlayerUseItem(EntityId),
    /// The player's one-shot interaction.
    PlayerInteract(EntityId),
    /// The player's one-shot crafting.
    PlayerBuild(Buildable),
    /// Per-tick potion queue bookkeeping.
    PotionTick,
    /// One enemy's recurring movement.
    EnemyMove(EntityId),
    /// One spawner's recurring zombie production.
    SpawnZombie(EntityId),
    /// The global recurring spider spawn.
    SpawnSpider,
    /// The global per-tick logic settle.
    LogicSettle,
}

/// Read-only snapshot of one on-map entity, for drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Kind name (snake_case).
    pub kind: &'static str,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Whether the player could interact with this entity right now.
    pub is_interactable: bool,
}

/// Read-only snapshot of one inventory item, for drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    /// Entity id.
    pub id: EntityId,
    /// Kind name (snake_case).
    pub kind: &'static str,
}

/// The core game simulation.
#[derive(Debug)]
pub struct Game {
    name: String,
    pub(crate) map: GameMap,
    pub(crate) scheduler: Scheduler<Action>,
    pub(crate) config: GameConfig,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) battle_log: Vec<BattleResponse>,
    goal: Option<Goal>,
    tick_count: u64,
}

impl Game {
    /// Create a game over a prepared map. Use [`GameBuilder`] to also
    /// wire the scheduler and circuit subscriptions from dungeon data.
    #[must_use]
    pub fn new(name: &str, map: GameMap, config: GameConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self {
            name: name.to_string(),
            map,
            scheduler: Scheduler::new(),
            config,
            rng,
            battle_log: Vec::new(),
            goal: None,
            tick_count: 0,
        }
    }

    /// The dungeon name this game was built from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current tick number, starting at 0.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick_count
    }

    /// The map and entity arena.
    #[must_use]
    pub fn map(&self) -> &GameMap {
        &self.map
    }

    /// Mutable map access, for scenario setup in tests and drivers.
    pub fn map_mut(&mut self) -> &mut GameMap {
        &mut self.map
    }

    /// The game's win condition, if any.
    #[must_use]
    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    /// Replace the win condition.
    pub fn set_goal(&mut self, goal: Goal) {
        self.goal = Some(goal);
    }

    /// Whether the win condition is currently met.
    #[must_use]
    pub fn goal_achieved(&self) -> bool {
        self.goal.as_ref().is_some_and(|goal| goal.achieved(self))
    }

    /// Remaining-goal token string, empty once achieved (or with no
    /// goal at all).
    #[must_use]
    pub fn goal_label(&self) -> String {
        self.goal
            .as_ref()
            .map(|goal| goal.label(self))
            .unwrap_or_default()
    }

    /// Record of every battle fought so far.
    #[must_use]
    pub fn battle_log(&self) -> &[BattleResponse] {
        &self.battle_log
    }

    // Scheduling
    // ==========

    /// Register a recurring action.
    pub fn register(&mut self, action: Action, priority: i32, id: ActionId) {
        self.scheduler.register(action, priority, id);
    }

    /// Register a one-shot action.
    pub fn register_once(&mut self, action: Action, priority: i32, id: ActionId) {
        self.scheduler.register_once(action, priority, id);
    }

    /// Invalidate every current and future action with this id.
    pub fn unsubscribe(&mut self, id: ActionId) {
        self.scheduler.unsubscribe(id);
    }

    // Tick
    // ====

    /// Advance the simulation one step: drain this tick's actions in
    /// priority order, then roll the queues. Returns the new tick count.
    pub fn tick(&mut self) -> u64 {
        self.scheduler.begin_tick();
        while let Some(action) = self.scheduler.next_action() {
            self.dispatch(action);
            self.scheduler.finish_action();
        }
        self.scheduler.end_tick();
        self.tick_count += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick_count, state_hash = hash, "tick complete");
        }

        self.tick_count
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::PlayerMove(direction) => systems::player_move(self, direction),
            Action::PlayerUseItem(item) => systems::player_use_item(self, item),
            Action::PlayerInteract(target) => systems::player_interact(self, target),
            Action::PlayerBuild(buildable) => systems::player_build(self, buildable),
            Action::PotionTick => {
                let tick = self.tick_count;
                player::potion_tick(self, tick);
            }
            Action::EnemyMove(enemy) => systems::enemy_move(self, enemy),
            Action::SpawnZombie(spawner) => factory::spawn_zombie(self, spawner),
            Action::SpawnSpider => factory::spawn_spider(self),
            Action::LogicSettle => {
                let tick = self.tick_count;
                crate::logic::settle_all(self, tick);
            }
        }
    }

    /// Tick the game as a result of player movement.
    pub fn tick_move(&mut self, direction: Direction) -> u64 {
        self.register_once(
            Action::PlayerMove(direction),
            PLAYER_ACTION_PRIORITY,
            ActionId::PlayerAction,
        );
        self.tick()
    }

    /// Tick the game as a result of the player using an item.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidAction`] when the item is not in the
    /// inventory (the simulation is not advanced);
    /// [`GameError::NotUsable`] when the item exists but can never be
    /// used (only bombs and potions can).
    pub fn tick_use_item(&mut self, item: EntityId) -> Result<u64> {
        let in_inventory = self
            .map
            .player_state()
            .is_some_and(|player| player.inventory.contains(&item));
        if !in_inventory {
            return Err(GameError::InvalidAction(format!(
                "Item with id {item} doesn't exist"
            )));
        }
        let usable = matches!(
            self.map.get(item).map(|entity| &entity.kind),
            Some(
                EntityKind::Bomb(_)
                    | EntityKind::InvisibilityPotion { .. }
                    | EntityKind::InvincibilityPotion { .. }
            )
        );
        if !usable {
            let kind = self
                .map
                .get(item)
                .map_or("unknown", |entity| entity.kind.kind_name());
            return Err(GameError::NotUsable(kind.to_string()));
        }
        self.register_once(
            Action::PlayerUseItem(item),
            PLAYER_ACTION_PRIORITY,
            ActionId::PlayerAction,
        );
        Ok(self.tick())
    }

    /// Tick the game as a result of the player interacting with an
    /// entity (bribing a mercenary, breaking a spawner).
    ///
    /// # Errors
    ///
    /// [`GameError::NotInteractable`] when the entity can never be
    /// interacted with; [`GameError::InvalidAction`] when it cannot be
    /// interacted with *right now* (out of range, missing supplies). In
    /// both cases the simulation is not advanced.
    pub fn interact(&mut self, target: EntityId) -> Result<u64> {
        let interactable = self
            .map
            .get(target)
            .is_some_and(|entity| entity.kind.is_interactable());
        if !interactable {
            return Err(GameError::NotInteractable(target));
        }
        if !self.currently_interactable(target) {
            return Err(GameError::InvalidAction(
                "Entity cannot be interacted with".to_string(),
            ));
        }
        self.register_once(
            Action::PlayerInteract(target),
            PLAYER_ACTION_PRIORITY,
            ActionId::PlayerAction,
        );
        Ok(self.tick())
    }

    /// Tick the game as a result of the player crafting an item.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidAction`] when the recipe's materials are not
    /// in the inventory; the simulation is not advanced.
    pub fn build(&mut self, buildable: Buildable) -> Result<u64> {
        if !player::buildables(self).contains(&buildable) {
            return Err(GameError::InvalidAction(format!(
                "{} cannot be built",
                buildable.name()
            )));
        }
        self.register_once(
            Action::PlayerBuild(buildable),
            PLAYER_ACTION_PRIORITY,
            ActionId::PlayerAction,
        );
        Ok(self.tick())
    }

    /// Whether the player could interact with this entity right now.
    #[must_use]
    pub fn currently_interactable(&self, target: EntityId) -> bool {
        let Some(entity) = self.map.get(target) else {
            return false;
        };
        let Some(player_pos) = self
            .map
            .player_id()
            .and_then(|id| self.map.get(id))
            .map(|player| player.position())
        else {
            return false;
        };
        match &entity.kind {
            EntityKind::Mercenary(merc) => {
                !merc.allied
                    && player_pos.manhattan_distance(entity.position()) <= merc.bribe_radius
                    && player::count_items(self, |kind| matches!(kind, EntityKind::Treasure))
                        >= merc.bribe_amount as usize
            }
            EntityKind::ZombieToastSpawner => {
                player_pos.is_cardinally_adjacent(entity.position()) && player::has_weapon(self)
            }
            _ => false,
        }
    }

    // Battles
    // =======

    /// Battle the player against an enemy, then destroy whichever side
    /// ends at or below zero health.
    pub(crate) fn battle(&mut self, player: EntityId, enemy: EntityId) {
        crate::battle::run_battle(self, player, enemy);

        let player_dead = self
            .map
            .player_state()
            .is_some_and(|state| state.stats.health <= Fixed::ZERO);
        if player_dead {
            systems::destroy_entity(self, player);
        }
        let enemy_dead = self
            .map
            .get(enemy)
            .and_then(|entity| entity.kind.battle_statistics())
            .is_some_and(|stats| stats.health <= Fixed::ZERO);
        if enemy_dead {
            systems::destroy_entity(self, enemy);
        }
    }

    // Diagnostics and snapshots
    // =========================

    /// Hash of the current simulation state.
    ///
    /// Two games that executed the same inputs produce identical
    /// hashes; used for determinism checks, never persisted.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick_count.hash(&mut hasher);

        let ids = self.map.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            let Some(entity) = self.map.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            entity.kind.kind_name().hash(&mut hasher);
            entity.position().x.hash(&mut hasher);
            entity.position().y.hash(&mut hasher);
            if let Some(stats) = entity.kind.battle_statistics() {
                stats.health.to_bits().hash(&mut hasher);
            }
            entity.kind.conductor_active().hash(&mut hasher);
            entity.kind.is_open().hash(&mut hasher);
            entity.kind.is_lit().hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Snapshots of every entity currently on the map, sorted by id.
    #[must_use]
    pub fn entity_snapshots(&self) -> Vec<EntitySnapshot> {
        self.map
            .sorted_ids()
            .into_iter()
            .filter_map(|id| {
                let entity = self.map.get(id)?;
                if !self.map.entities_at(entity.position()).contains(&id) {
                    return None;
                }
                Some(EntitySnapshot {
                    id,
                    kind: entity.kind.kind_name(),
                    x: entity.position().x,
                    y: entity.position().y,
                    is_interactable: self.currently_interactable(id),
                })
            })
            .collect()
    }

    /// Snapshots of the player's inventory, in pickup order.
    #[must_use]
    pub fn inventory_snapshots(&self) -> Vec<ItemSnapshot> {
        let Some(player) = self.map.player_state() else {
            return Vec::new();
        };
        player
            .inventory
            .iter()
            .filter_map(|&id| {
                let entity = self.map.get(id)?;
                Some(ItemSnapshot {
                    id,
                    kind: entity.kind.kind_name(),
                })
            })
            .collect()
    }
}

/// Builds a [`Game`] from parsed dungeon data: entities placed, portals
/// paired, recurring actions registered, circuits subscribed.
#[derive(Debug, Default)]
pub struct GameBuilder {
    name: String,
    dungeon: DungeonSpec,
    config: GameConfig,
}

impl GameBuilder {
    /// Start building a game with the given dungeon name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dungeon: DungeonSpec::default(),
            config: GameConfig::default(),
        }
    }

    /// Use this parsed dungeon.
    #[must_use]
    pub fn dungeon(mut self, dungeon: DungeonSpec) -> Self {
        self.dungeon = dungeon;
        self
    }

    /// Use this configuration.
    #[must_use]
    pub fn config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the game.
    ///
    /// # Errors
    ///
    /// Construction-time data errors: unknown entity kinds, unknown goal
    /// kinds, malformed logic rules.
    pub fn build(self) -> Result<Game> {
        let mut map = GameMap::new();
        for spec in &self.dungeon.entities {
            let entity = factory::build_entity(&self.config, spec)?;
            let _ = map.insert(entity);
        }

        let goal = self
            .dungeon
            .goal_condition
            .as_ref()
            .map(|spec| Goal::from_spec(spec, &self.config))
            .transpose()?;

        let mut game = Game::new(&self.name, map, self.config);
        game.goal = goal;
        init(&mut game);
        tracing::debug!(
            name = game.name.as_str(),
            entities = game.map.len(),
            "game built"
        );
        Ok(game)
    }
}

/// Wire up a freshly-built game: pair portals, register recurring
/// actions, subscribe circuits and listeners.
fn init(game: &mut Game) {
    pair_portals(game);

    for enemy in game.map.ids_where(|entity| entity.kind.is_enemy()) {
        systems::register_enemy(game, enemy);
    }
    for spawner in game
        .map
        .ids_where(|entity| matches!(entity.kind, EntityKind::ZombieToastSpawner))
    {
        game.register(
            Action::SpawnZombie(spawner),
            AI_PRIORITY,
            ActionId::Entity(spawner),
        );
    }
    game.register(Action::SpawnSpider, AI_PRIORITY, ActionId::SpiderSpawner);
    if game.map.player_id().is_some() {
        game.register(Action::PotionTick, POTION_BRIBE_PRIORITY, ActionId::PotionQueue);
    }
    game.register(Action::LogicSettle, AI_PRIORITY, ActionId::LogicUpdates);

    // Bombs adjacent to switches at load time are wired immediately.
    let bombs = game
        .map
        .ids_where(|entity| matches!(entity.kind, EntityKind::Bomb(_)));
    for bomb in bombs {
        let Some(position) = game.map.get(bomb).map(|entity| entity.position()) else {
            continue;
        };
        for adjacent in position.cardinal_neighbors() {
            for id in game.map.entities_at(adjacent) {
                if matches!(
                    game.map.get(id).map(|entity| &entity.kind),
                    Some(EntityKind::FloorSwitch(_))
                ) {
                    systems::subscribe_bomb_to_switch(game, bomb, id);
                }
            }
        }
    }

    for listener in game
        .map
        .ids_where(|entity| entity.kind.is_potion_listener())
    {
        player::register_potion_listener(game, listener);
    }

    // A boulder already resting on a switch at load time counts.
    for switch in game
        .map
        .ids_where(|entity| matches!(entity.kind, EntityKind::FloorSwitch(_)))
    {
        let Some(position) = game.map.get(switch).map(|entity| entity.position()) else {
            continue;
        };
        let has_boulder = game.map.entities_at(position).into_iter().any(|id| {
            matches!(
                game.map.get(id).map(|entity| &entity.kind),
                Some(EntityKind::Boulder)
            )
        });
        if has_boulder {
            systems::activate_switch(game, switch);
        }
    }
}

/// Pair up portals by color: the first-seen portal of each color is the
/// anchor every later one binds to; binding is mutual, and rebinding the
/// anchor first unbinds its previous partner.
fn pair_portals(game: &mut Game) {
    let mut anchors: HashMap<Color, EntityId> = HashMap::new();
    for id in game.map.sorted_ids() {
        let Some(EntityKind::Portal(state)) = game.map.get(id).map(|entity| &entity.kind) else {
            continue;
        };
        let color = state.color;
        match anchors.get(&color) {
            None => {
                let _ = anchors.insert(color, id);
            }
            Some(&anchor) => bind_portals(game, anchor, id),
        }
    }
}

/// Mutually bind two portals, unbinding any previous partners first.
fn bind_portals(game: &mut Game, first: EntityId, second: EntityId) {
    for (portal, partner) in [(first, second), (second, first)] {
        let old = match game.map.get(portal).map(|entity| &entity.kind) {
            Some(EntityKind::Portal(state)) => state.pair,
            _ => continue,
        };
        if old == Some(partner) {
            continue;
        }
        if let Some(old) = old {
            if let Some(EntityKind::Portal(state)) =
                game.map.get_mut(old).map(|entity| &mut entity.kind)
            {
                state.pair = None;
            }
        }
        if let Some(EntityKind::Portal(state)) =
            game.map.get_mut(portal).map(|entity| &mut entity.kind)
        {
            state.pair = Some(partner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::EntitySpec;
    use crate::position::Position;

    fn basic_game(entities: Vec<EntitySpec>) -> Game {
        GameBuilder::new("test")
            .dungeon(DungeonSpec {
                entities,
                goal_condition: None,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_tick_increments() {
        let mut game = basic_game(vec![EntitySpec::new("player", 0, 0)]);
        assert_eq!(game.get_tick(), 0);
        assert_eq!(game.tick(), 1);
        assert_eq!(game.tick(), 2);
    }

    #[test]
    fn test_player_moves_on_tick() {
        let mut game = basic_game(vec![EntitySpec::new("player", 0, 0)]);
        let player = game.map().player_id().unwrap();

        let _ = game.tick_move(Direction::Right);

        let position = game.map().get(player).unwrap().position();
        assert_eq!(position, Position::new(1, 0));
    }

    #[test]
    fn test_walls_veto_player_movement() {
        let mut game = basic_game(vec![
            EntitySpec::new("player", 0, 0),
            EntitySpec::new("wall", 1, 0),
        ]);
        let player = game.map().player_id().unwrap();

        let _ = game.tick_move(Direction::Right);

        let position = game.map().get(player).unwrap().position();
        assert_eq!(position, Position::new(0, 0));
    }

    #[test]
    fn test_use_item_rejection_does_not_tick() {
        let mut game = basic_game(vec![EntitySpec::new("player", 0, 0)]);
        assert!(matches!(
            game.tick_use_item(999),
            Err(GameError::InvalidAction(_))
        ));
        assert_eq!(game.get_tick(), 0);
    }

    #[test]
    fn test_using_a_non_usable_item_is_an_invariant_error() {
        let mut game = basic_game(vec![
            EntitySpec::new("player", 0, 0),
            EntitySpec::new("wood", 1, 0),
        ]);
        let _ = game.tick_move(Direction::Right);
        let wood = game.inventory_snapshots()[0].id;

        assert!(matches!(
            game.tick_use_item(wood),
            Err(GameError::NotUsable(_))
        ));
        // Only the pickup move ticked.
        assert_eq!(game.get_tick(), 1);
    }

    #[test]
    fn test_interact_with_wall_is_rejected() {
        let mut game = basic_game(vec![
            EntitySpec::new("player", 0, 0),
            EntitySpec::new("wall", 1, 0),
        ]);
        let wall = game
            .map()
            .ids_where(|entity| matches!(entity.kind, EntityKind::Wall))[0];
        assert!(matches!(
            game.interact(wall),
            Err(GameError::NotInteractable(_))
        ));
        assert_eq!(game.get_tick(), 0);
    }

    #[test]
    fn test_collectables_are_picked_up_on_overlap() {
        let mut game = basic_game(vec![
            EntitySpec::new("player", 0, 0),
            EntitySpec::new("treasure", 1, 0),
        ]);

        let _ = game.tick_move(Direction::Right);

        let inventory = game.inventory_snapshots();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].kind, "treasure");
        assert!(!game.map().has_tile(Position::new(1, 0)) || {
            // The player now stands there; the treasure tile reference is gone.
            !game
                .map()
                .entities_at(Position::new(1, 0))
                .iter()
                .any(|&id| id == inventory[0].id)
        });
    }

    #[test]
    fn test_only_one_key_is_ever_carried() {
        let mut game = basic_game(vec![
            EntitySpec::new("player", 0, 0),
            EntitySpec::new("key", 1, 0).with_key(1),
            EntitySpec::new("key", 2, 0).with_key(2),
        ]);

        let _ = game.tick_move(Direction::Right);
        let _ = game.tick_move(Direction::Right);

        let inventory = game.inventory_snapshots();
        assert_eq!(inventory.len(), 1);
        // The second key stayed on the map.
        assert!(game.map().has_tile(Position::new(2, 0)));
    }

    #[test]
    fn test_state_hash_is_deterministic() {
        let build = || {
            basic_game(vec![
                EntitySpec::new("player", 0, 0),
                EntitySpec::new("mercenary", 4, 0),
            ])
        };
        let mut a = build();
        let mut b = build();
        let _ = a.tick_move(Direction::Right);
        let _ = b.tick_move(Direction::Right);
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_portal_pairing_is_mutual() {
        let game = basic_game(vec![
            EntitySpec::new("player", 0, 0),
            EntitySpec::new("portal", 2, 0).with_color("blue"),
            EntitySpec::new("portal", 8, 8).with_color("blue"),
        ]);
        let portals = game
            .map()
            .ids_where(|entity| matches!(entity.kind, EntityKind::Portal(_)));
        let pair_of = |id| match game.map().get(id).map(|entity| &entity.kind) {
            Some(EntityKind::Portal(state)) => state.pair,
            _ => None,
        };
        assert_eq!(pair_of(portals[0]), Some(portals[1]));
        assert_eq!(pair_of(portals[1]), Some(portals[0]));
    }
}
