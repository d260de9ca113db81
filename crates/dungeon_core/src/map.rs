//! The game map.
//!
//! A sparse mapping from positions to [`Tile`]s over an entity arena.
//! The map is the sole authority over the position-to-entity relation:
//! every entity lives in the arena, and the entities currently *on* the
//! map are additionally referenced from exactly one tile (inventory
//! items keep their arena slot but no tile). Movement legality, the
//! portal-aware shortest-path search, and all placement queries live
//! here; the hook-dispatching mutations (`move`, `destroy`) live on the
//! game, which owns this map alongside the scheduler.

use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityKind};
use crate::player::PlayerState;
use crate::position::Position;
use crate::tile::Tile;

/// Upper bound on accumulated path cost. Searches stop expanding past
/// this distance so degenerate maps cannot stall a tick; it is a safety
/// bound, not a game rule.
const MAX_PATH_COST: u32 = 200;

/// Sparse tile map plus the entity arena behind it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMap {
    tiles: HashMap<Position, Tile>,
    entities: HashMap<EntityId, Entity>,
    next_id: EntityId,
    player: Option<EntityId>,
}

impl GameMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiles: HashMap::new(),
            entities: HashMap::new(),
            next_id: 1,
            player: None,
        }
    }

    // Arena
    // =====

    /// Insert an entity into the arena and place it on the map at its
    /// position. Returns the assigned id.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        if matches!(entity.kind, EntityKind::Player(_)) {
            self.player = Some(id);
        }
        let position = entity.position();
        let _ = self.entities.insert(id, entity);
        self.place(id, position);
        id
    }

    /// Insert an entity into the arena without placing it on the map
    /// (crafted items go straight to the inventory).
    pub fn insert_off_map(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        let _ = self.entities.insert(id, entity);
        id
    }

    /// Remove an entity from the arena entirely. The caller is
    /// responsible for having displaced it from its tile first.
    pub(crate) fn remove_from_arena(&mut self, id: EntityId) -> Option<Entity> {
        if self.player == Some(id) {
            self.player = None;
        }
        self.entities.remove(&id)
    }

    /// Get an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable reference to an entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether an entity still exists in the arena.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of entities in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Sorted entity ids, for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Sorted ids of entities matching a predicate.
    #[must_use]
    pub fn ids_where(&self, predicate: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .entities
            .iter()
            .filter(|(_, entity)| predicate(entity))
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The player's entity id, while alive.
    #[must_use]
    pub fn player_id(&self) -> Option<EntityId> {
        self.player
    }

    /// The player's state, while alive.
    #[must_use]
    pub fn player_state(&self) -> Option<&PlayerState> {
        let player = self.entities.get(&self.player?)?;
        match &player.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable player state, while alive.
    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        let id = self.player?;
        let player = self.entities.get_mut(&id)?;
        match &mut player.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    // Tiles
    // =====

    /// Whether any tile exists at the position.
    #[must_use]
    pub fn has_tile(&self, position: Position) -> bool {
        self.tiles.contains_key(&position)
    }

    /// Snapshot of the entity ids at a position, in insertion order.
    ///
    /// Hook dispatch iterates these snapshots, never a live tile, so
    /// hooks are free to mutate the map.
    #[must_use]
    pub fn entities_at(&self, position: Position) -> Vec<EntityId> {
        self.tiles
            .get(&position)
            .map(|tile| tile.entities().to_vec())
            .unwrap_or_default()
    }

    /// Pathfinding weight of the tile at a position (1 when empty).
    #[must_use]
    pub fn weight_at(&self, position: Position) -> u32 {
        self.tiles.get(&position).map_or(1, Tile::weight)
    }

    /// Reference an entity from the tile at `position`, creating the
    /// tile if needed.
    pub(crate) fn place(&mut self, id: EntityId, position: Position) {
        match self.tiles.get_mut(&position) {
            Some(tile) => tile.add(id),
            None => {
                let _ = self.tiles.insert(position, Tile::new(id));
            }
        }
    }

    /// Drop an entity's tile reference, removing the tile when it
    /// becomes empty. No-op when the entity is not on the map.
    pub(crate) fn displace(&mut self, id: EntityId) {
        let Some(position) = self.entities.get(&id).map(Entity::position) else {
            return;
        };
        if let Some(tile) = self.tiles.get_mut(&position) {
            tile.remove(id);
            if tile.is_empty() {
                let _ = self.tiles.remove(&position);
            }
        }
    }

    // Movement legality
    // =================

    /// Whether `mover` may enter `position`: true when no tile exists
    /// there, or every occupant's movement predicate accepts the mover.
    #[must_use]
    pub fn can_move_to(&self, mover: EntityId, position: Position) -> bool {
        match self.tiles.get(&position) {
            None => true,
            Some(tile) => tile
                .entities()
                .iter()
                .all(|&occupant| self.can_move_onto(occupant, mover)),
        }
    }

    /// One occupant's verdict on `mover` entering its tile.
    fn can_move_onto(&self, occupant: EntityId, mover: EntityId) -> bool {
        let Some(occupant) = self.entities.get(&occupant) else {
            return true;
        };
        let Some(mover_entity) = self.entities.get(&mover) else {
            return false;
        };
        let mover_is_spider = matches!(mover_entity.kind, EntityKind::Spider(_));
        let mover_is_player = matches!(mover_entity.kind, EntityKind::Player(_));

        match &occupant.kind {
            EntityKind::Wall => mover_is_spider,
            EntityKind::Player(_)
            | EntityKind::Exit
            | EntityKind::FloorSwitch(_)
            | EntityKind::Key { .. }
            | EntityKind::Wood
            | EntityKind::Arrow
            | EntityKind::Treasure
            | EntityKind::Sword { .. }
            | EntityKind::Bow { .. }
            | EntityKind::Shield { .. }
            | EntityKind::InvisibilityPotion { .. }
            | EntityKind::InvincibilityPotion { .. }
            | EntityKind::Bomb(_)
            | EntityKind::Wire { .. }
            | EntityKind::LightBulb(_) => true,
            EntityKind::ZombieToastSpawner => false,
            EntityKind::Mercenary(_) | EntityKind::ZombieToast(_) | EntityKind::Spider(_) => {
                mover_is_player
            }
            EntityKind::Door(door) => {
                if door.open || mover_is_spider {
                    true
                } else {
                    mover_is_player && self.player_holds_key(door.number)
                }
            }
            EntityKind::SwitchDoor(logic) => mover_is_spider || logic.active,
            EntityKind::Boulder => {
                // Only the player pushes boulders, and only when the cell
                // behind the boulder accepts it.
                if !mover_is_player {
                    return false;
                }
                let (dx, dy) = occupant.position().delta_from(mover_entity.position());
                if dx.abs() + dy.abs() != 1 {
                    return false;
                }
                let target = occupant.position().offset_by(dx, dy);
                self.can_move_to(occupant.id, target)
            }
            EntityKind::Portal(portal) => {
                let Some(pair) = portal.pair else {
                    return false;
                };
                if mover_is_player || matches!(mover_entity.kind, EntityKind::Mercenary(_)) {
                    self.teleport_candidates(pair, mover)
                        .next()
                        .is_some()
                } else {
                    true
                }
            }
        }
    }

    fn player_holds_key(&self, number: u32) -> bool {
        let Some(player) = self.player_state() else {
            return false;
        };
        player.inventory.iter().any(|&item| {
            matches!(
                self.entities.get(&item).map(|entity| &entity.kind),
                Some(EntityKind::Key { number: n }) if *n == number
            )
        })
    }

    // Portals
    // =======

    /// First portal on a tile, if any.
    #[must_use]
    pub fn portal_at(&self, position: Position) -> Option<EntityId> {
        self.entities_at(position).into_iter().find(|&id| {
            matches!(
                self.entities.get(&id).map(|entity| &entity.kind),
                Some(EntityKind::Portal(_))
            )
        })
    }

    /// Positions cardinally adjacent to `portal` that `mover` may enter.
    /// These are the cells a teleport can land on.
    pub fn teleport_candidates(
        &self,
        portal: EntityId,
        mover: EntityId,
    ) -> impl Iterator<Item = Position> + '_ {
        let origin = self
            .entities
            .get(&portal)
            .map(Entity::position)
            .unwrap_or(Position::new(0, 0));
        origin
            .cardinal_neighbors()
            .into_iter()
            .filter(move |&candidate| self.can_move_to(mover, candidate))
    }

    /// Every position `mover` could hypothetically reach by passing
    /// through the portal at `position`: the paired portal's full
    /// 8-neighborhood, filtered by movement legality. Used by the
    /// pathfinder to let routes flow through portals.
    #[must_use]
    pub fn portal_destinations(&self, position: Position, mover: EntityId) -> Vec<Position> {
        let Some(portal) = self.portal_at(position) else {
            return Vec::new();
        };
        let Some(EntityKind::Portal(state)) = self.entities.get(&portal).map(|e| &e.kind) else {
            return Vec::new();
        };
        let Some(pair) = state.pair else {
            return Vec::new();
        };
        let Some(pair_pos) = self.entities.get(&pair).map(Entity::position) else {
            return Vec::new();
        };
        pair_pos
            .all_neighbors()
            .into_iter()
            .filter(|&candidate| self.can_move_to(mover, candidate))
            .collect()
    }

    // Pathfinding
    // ===========

    /// Dijkstra single-step pathfind from `src` toward `dest` for
    /// `mover`, returning the next position to move to, or `src` itself
    /// when no improving move exists.
    ///
    /// Edges run over cardinal neighbors, weighted by the destination
    /// tile's weight. A tile holding a portal is expanded by fanning out
    /// to the paired portal's reachable surroundings at no extra cost,
    /// so paths flow through portals transparently; the portal tile is
    /// never marked visited and its ordinary neighbors are not expanded.
    #[must_use]
    pub fn shortest_step(&self, src: Position, dest: Position, mover: EntityId) -> Position {
        if !self.has_tile(src) || !self.has_tile(dest) {
            return src;
        }

        let mut dist: HashMap<Position, u32> = HashMap::new();
        let mut prev: HashMap<Position, Option<Position>> = HashMap::new();
        let mut visited: HashMap<Position, bool> = HashMap::new();
        let _ = dist.insert(src, 0);
        let _ = prev.insert(src, None);

        // Min-heap keyed on (distance, stable position order). Positions
        // ride along as their (y, x) key; the layer is irrelevant here.
        let mut queue: BinaryHeap<std::cmp::Reverse<(u32, (i32, i32))>> = BinaryHeap::new();
        queue.push(std::cmp::Reverse((0, src.sort_key())));

        while let Some(std::cmp::Reverse((d, (y, x)))) = queue.pop() {
            let curr = Position::new(x, y);
            if dist.get(&curr).copied().unwrap_or(u32::MAX) < d {
                continue; // stale queue entry
            }
            if curr == dest || d > MAX_PATH_COST {
                break;
            }

            if self.portal_at(curr).is_some() {
                let through = prev.get(&curr).copied().unwrap_or(None);
                for teleport in self.portal_destinations(curr, mover) {
                    if visited.contains_key(&teleport) {
                        continue;
                    }
                    if d < dist.get(&teleport).copied().unwrap_or(u32::MAX) {
                        let _ = dist.insert(teleport, d);
                        let _ = prev.insert(teleport, through);
                        queue.push(std::cmp::Reverse((d, teleport.sort_key())));
                    }
                }
                continue;
            }
            if visited.insert(curr, true).is_some() {
                continue;
            }

            for neighbor in curr.cardinal_neighbors() {
                if visited.contains_key(&neighbor) {
                    continue;
                }
                if self.has_tile(neighbor) && !self.can_move_to(mover, neighbor) {
                    continue;
                }
                let next_dist = d + self.weight_at(neighbor);
                if next_dist < dist.get(&neighbor).copied().unwrap_or(u32::MAX) {
                    let _ = dist.insert(neighbor, next_dist);
                    let _ = prev.insert(neighbor, Some(curr));
                    queue.push(std::cmp::Reverse((next_dist, neighbor.sort_key())));
                }
            }
        }

        // Walk the predecessor chain back from the destination to the
        // node whose predecessor is the source.
        if dest == src {
            return src;
        }
        let mut ret = dest;
        loop {
            match prev.get(&ret) {
                Some(Some(p)) if *p == src => return ret,
                Some(Some(p)) => ret = *p,
                _ => return src,
            }
        }
    }
}
