//! Win conditions, as a composite goal tree.

use serde::Serialize;

use crate::entity::EntityKind;
use crate::error::{GameError, Result};
use crate::factory::{GameConfig, GoalSpec};
use crate::game::Game;

/// A win condition: leaves check one fact about the game, composites
/// combine two sub-goals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Goal {
    /// The player stands on an exit.
    Exit,
    /// Every floor switch is held down by a boulder.
    Boulders,
    /// The player has collected at least this much treasure.
    Treasure {
        /// Required number of treasure pieces.
        target: u32,
    },
    /// Both sub-goals achieved.
    And(Box<Goal>, Box<Goal>),
    /// Either sub-goal achieved.
    Or(Box<Goal>, Box<Goal>),
}

impl Goal {
    /// Build a goal tree from parsed dungeon data.
    ///
    /// Composite kinds require exactly two sub-goals; unknown kinds are a
    /// data error.
    pub fn from_spec(spec: &GoalSpec, config: &GameConfig) -> Result<Self> {
        match spec.goal.as_str() {
            "AND" | "OR" => {
                if spec.subgoals.len() != 2 {
                    return Err(GameError::InvalidState(format!(
                        "{} goal requires exactly two subgoals",
                        spec.goal
                    )));
                }
                let first = Box::new(Self::from_spec(&spec.subgoals[0], config)?);
                let second = Box::new(Self::from_spec(&spec.subgoals[1], config)?);
                if spec.goal == "AND" {
                    Ok(Self::And(first, second))
                } else {
                    Ok(Self::Or(first, second))
                }
            }
            "exit" => Ok(Self::Exit),
            "boulders" => Ok(Self::Boulders),
            "treasure" => Ok(Self::Treasure {
                target: config.treasure_goal,
            }),
            other => Err(GameError::UnknownGoal(other.to_string())),
        }
    }

    /// Whether this goal is currently achieved.
    ///
    /// Nothing is achievable once the player is gone.
    #[must_use]
    pub fn achieved(&self, game: &Game) -> bool {
        if game.map().player_id().is_none() {
            return false;
        }
        match self {
            Self::Exit => {
                let Some(player) = game
                    .map()
                    .player_id()
                    .and_then(|id| game.map().get(id))
                    .map(|player| player.position())
                else {
                    return false;
                };
                let exits = game
                    .map()
                    .ids_where(|entity| matches!(entity.kind, EntityKind::Exit));
                !exits.is_empty()
                    && exits.iter().any(|&exit| {
                        game.map()
                            .get(exit)
                            .is_some_and(|entity| entity.position() == player)
                    })
            }
            Self::Boulders => {
                let switches = game
                    .map()
                    .ids_where(|entity| matches!(entity.kind, EntityKind::FloorSwitch(_)));
                switches.iter().all(|&id| {
                    matches!(
                        game.map().get(id).map(|entity| &entity.kind),
                        Some(EntityKind::FloorSwitch(state)) if state.activated
                    )
                })
            }
            Self::Treasure { target } => game
                .map()
                .player_state()
                .is_some_and(|player| player.collected_treasure >= *target),
            Self::And(first, second) => first.achieved(game) && second.achieved(game),
            Self::Or(first, second) => first.achieved(game) || second.achieved(game),
        }
    }

    /// Human-facing token string for the remaining goal. Achieved goals
    /// render as empty; composites parenthesize their sub-goals.
    #[must_use]
    pub fn label(&self, game: &Game) -> String {
        if self.achieved(game) {
            return String::new();
        }
        match self {
            Self::Exit => ":exit".to_string(),
            Self::Boulders => ":boulders".to_string(),
            Self::Treasure { .. } => ":treasure".to_string(),
            Self::And(first, second) => {
                format!("({} AND {})", first.label(game), second.label(game))
            }
            Self::Or(first, second) => {
                format!("({} OR {})", first.label(game), second.label(game))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::GoalSpec;

    #[test]
    fn test_goal_tree_parses() {
        let config = GameConfig::default();
        let spec = GoalSpec::composite(
            "AND",
            vec![GoalSpec::leaf("exit"), GoalSpec::leaf("treasure")],
        );
        let goal = Goal::from_spec(&spec, &config).unwrap();
        assert_eq!(
            goal,
            Goal::And(
                Box::new(Goal::Exit),
                Box::new(Goal::Treasure {
                    target: config.treasure_goal
                })
            )
        );
    }

    #[test]
    fn test_unknown_goal_is_fatal() {
        let config = GameConfig::default();
        assert!(matches!(
            Goal::from_spec(&GoalSpec::leaf("enlightenment"), &config),
            Err(GameError::UnknownGoal(_))
        ));
    }

    #[test]
    fn test_composite_arity_is_checked() {
        let config = GameConfig::default();
        let spec = GoalSpec::composite("OR", vec![GoalSpec::leaf("exit")]);
        assert!(Goal::from_spec(&spec, &config).is_err());
    }
}
