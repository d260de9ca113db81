//! Error types for the dungeon simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all dungeon simulation errors.
///
/// Two families matter to callers: [`GameError::InvalidAction`] is a
/// rejected player action and leaves the simulation untouched (the tick
/// does not advance), while the remaining variants are construction-time
/// data or invariant violations that should never occur at steady state.
#[derive(Debug, Error)]
pub enum GameError {
    /// A player action was rejected. The tick does not advance.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// An entity kind in the dungeon data was not recognised.
    #[error("Failed to recognise '{0}' entity kind")]
    UnknownEntityKind(String),

    /// A goal kind in the dungeon data was not recognised.
    #[error("Failed to recognise '{0}' goal kind")]
    UnknownGoal(String),

    /// A logic rule string in the dungeon data was not recognised.
    #[error("Unknown logic rule: {0}")]
    UnknownLogicRule(String),

    /// The targeted item exists but can never be used.
    #[error("{0} cannot be used")]
    NotUsable(String),

    /// The targeted entity can never be interacted with.
    #[error("Entity cannot be interacted with: {0}")]
    NotInteractable(u64),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
