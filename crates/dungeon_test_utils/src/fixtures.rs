//! Test fixtures and helpers.
//!
//! The [`Scenario`] builder assembles small dungeons in test code
//! without going through JSON, mirroring how a driver would hand the
//! engine already-parsed data.

use fixed::types::I32F32;

use dungeon_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Builder for small test dungeons.
#[derive(Debug, Default)]
pub struct Scenario {
    entities: Vec<EntitySpec>,
    goal: Option<GoalSpec>,
    config: GameConfig,
}

impl Scenario {
    /// Start an empty scenario with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the configuration in place.
    #[must_use]
    pub fn config(mut self, adjust: impl FnOnce(&mut GameConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// Place a plain entity.
    #[must_use]
    pub fn place(mut self, kind: &str, x: i32, y: i32) -> Self {
        self.entities.push(EntitySpec::new(kind, x, y));
        self
    }

    /// Place a fully-specified entity.
    #[must_use]
    pub fn place_spec(mut self, spec: EntitySpec) -> Self {
        self.entities.push(spec);
        self
    }

    /// Wall off a horizontal corridor: walls at `y - 1` and `y + 1` for
    /// every column in the range.
    #[must_use]
    pub fn walled_corridor(mut self, from_x: i32, to_x: i32, y: i32) -> Self {
        for x in from_x..=to_x {
            self.entities.push(EntitySpec::new("wall", x, y - 1));
            self.entities.push(EntitySpec::new("wall", x, y + 1));
        }
        self
    }

    /// Set the win condition.
    #[must_use]
    pub fn goal(mut self, goal: GoalSpec) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Build the game, panicking on malformed scenario data.
    #[must_use]
    pub fn build(self) -> Game {
        GameBuilder::new("scenario")
            .dungeon(DungeonSpec {
                entities: self.entities,
                goal_condition: self.goal,
            })
            .config(self.config)
            .build()
            .expect("scenario should build")
    }
}

/// First entity of the given kind, by id order.
///
/// Panics when the kind is absent; scenarios place what they query.
#[must_use]
pub fn find(game: &Game, kind: &str) -> EntityId {
    let ids = game
        .map()
        .ids_where(|entity| entity.kind.kind_name() == kind);
    *ids.first()
        .unwrap_or_else(|| panic!("no '{kind}' in scenario"))
}

/// Current position of an entity, as `(x, y)`.
#[must_use]
pub fn position_of(game: &Game, id: EntityId) -> (i32, i32) {
    let position = game
        .map()
        .get(id)
        .map(|entity| entity.position())
        .unwrap_or_else(|| panic!("entity {id} is gone"));
    (position.x, position.y)
}

/// Whether an entity still exists anywhere in the arena.
#[must_use]
pub fn alive(game: &Game, id: EntityId) -> bool {
    game.map().contains(id)
}
