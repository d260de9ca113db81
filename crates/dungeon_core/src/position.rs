//! Grid positions and directions.
//!
//! All simulation geometry is integer tile coordinates. A position also
//! carries a `layer` ordinate that decides draw/occupancy precedence
//! within a tile; two positions are equal (and hash alike) when their
//! `x` and `y` match, regardless of layer, so the layer never splits a
//! tile in two.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Layer occupied by floor-level entities (switches are drawn above).
pub const FLOOR_LAYER: i32 = 0;
/// Layer occupied by items and circuitry.
pub const ITEM_LAYER: i32 = 1;
/// Layer occupied by doors.
pub const DOOR_LAYER: i32 = 2;
/// Layer occupied by the player and enemies.
pub const CHARACTER_LAYER: i32 = 3;

/// Cardinal movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing y.
    Up,
    /// Movement toward increasing y.
    Down,
    /// Movement toward decreasing x.
    Left,
    /// Movement toward increasing x.
    Right,
}

impl Direction {
    /// Unit offset for this direction as `(dx, dy)`.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

/// A position on the dungeon grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    /// Column coordinate.
    pub x: i32,
    /// Row coordinate.
    pub y: i32,
    /// Draw/occupancy precedence within a tile. Excluded from equality.
    pub layer: i32,
}

impl Position {
    /// Create a position on the floor layer.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, layer: 0 }
    }

    /// Create a position on an explicit layer.
    #[must_use]
    pub const fn new_layered(x: i32, y: i32, layer: i32) -> Self {
        Self { x, y, layer }
    }

    /// The same cell viewed on a different layer.
    #[must_use]
    pub const fn as_layer(self, layer: i32) -> Self {
        Self { layer, ..self }
    }

    /// Translate one step in the given direction, preserving the layer.
    #[must_use]
    pub const fn translate(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
            layer: self.layer,
        }
    }

    /// Translate by an arbitrary offset, preserving the layer.
    #[must_use]
    pub const fn offset_by(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            layer: self.layer,
        }
    }

    /// Component-wise difference `self - other` (layer ignored).
    #[must_use]
    pub const fn delta_from(self, other: Position) -> (i32, i32) {
        (self.x - other.x, self.y - other.y)
    }

    /// Manhattan distance to another position.
    #[must_use]
    pub const fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The four cardinally adjacent positions (up, right, down, left).
    ///
    /// Pathfinding and logic propagation run on this neighborhood.
    #[must_use]
    pub fn cardinal_neighbors(self) -> [Position; 4] {
        [
            self.offset_by(0, -1),
            self.offset_by(1, 0),
            self.offset_by(0, 1),
            self.offset_by(-1, 0),
        ]
    }

    /// All eight adjacent positions, clockwise from the upper-left.
    ///
    /// Portal destination search runs on this neighborhood.
    #[must_use]
    pub fn all_neighbors(self) -> [Position; 8] {
        [
            self.offset_by(-1, -1),
            self.offset_by(0, -1),
            self.offset_by(1, -1),
            self.offset_by(1, 0),
            self.offset_by(1, 1),
            self.offset_by(0, 1),
            self.offset_by(-1, 1),
            self.offset_by(-1, 0),
        ]
    }

    /// Whether two positions are adjacent in the 8-connected sense
    /// (diagonals included, identical cells excluded).
    #[must_use]
    pub fn is_adjacent(self, other: Position) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx <= 1 && dy <= 1 && (dx, dy) != (0, 0)
    }

    /// Whether two positions are cardinally adjacent.
    #[must_use]
    pub fn is_cardinally_adjacent(self, other: Position) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// Stable ordering key for deterministic heap tie-breaking.
    #[must_use]
    pub const fn sort_key(self) -> (i32, i32) {
        (self.y, self.x)
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_equality_ignores_layer() {
        let a = Position::new_layered(3, 4, 0);
        let b = Position::new_layered(3, 4, 3);
        assert_eq!(a, b);

        let mut map = HashMap::new();
        let _ = map.insert(a, "floor");
        let _ = map.insert(b, "character");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_translate_matches_offsets() {
        let p = Position::new(2, 2);
        assert_eq!(p.translate(Direction::Up), Position::new(2, 1));
        assert_eq!(p.translate(Direction::Down), Position::new(2, 3));
        assert_eq!(p.translate(Direction::Left), Position::new(1, 2));
        assert_eq!(p.translate(Direction::Right), Position::new(3, 2));
    }

    #[test]
    fn test_cardinal_adjacency() {
        let p = Position::new(0, 0);
        assert!(p.is_cardinally_adjacent(Position::new(0, 1)));
        assert!(!p.is_cardinally_adjacent(Position::new(1, 1)));
        assert!(!p.is_cardinally_adjacent(p));
    }

    #[test]
    fn test_full_adjacency_includes_diagonals() {
        let p = Position::new(5, 5);
        assert!(p.is_adjacent(Position::new(6, 6)));
        assert!(p.is_adjacent(Position::new(4, 5)));
        assert!(!p.is_adjacent(Position::new(7, 5)));
        assert!(!p.is_adjacent(p));
    }

    #[test]
    fn test_manhattan_distance() {
        let a = Position::new(1, 1);
        let b = Position::new(4, 3);
        assert_eq!(a.manhattan_distance(b), 5);
        assert_eq!(b.manhattan_distance(a), 5);
    }
}
