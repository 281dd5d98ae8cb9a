//! Spatial index over piece positions.
//!
//! Pieces are bucketed into square cells; a radius query visits only the
//! cells the circle overlaps. Results are ordered by piece id so every
//! caller sees neighbours in the same order on every run.

use std::collections::HashMap;

use hecs::Entity;

use crate::components::{Category, PieceId, Point};

/// Set of piece categories used to filter queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const ALL: Self = Self(u8::MAX);
    pub const NONE: Self = Self(0);
    pub const CREATURES: Self = Self::NONE.with(Category::Animal).with(Category::Player);

    fn bit(category: Category) -> u8 {
        1 << category as u8
    }

    pub const fn with(self, category: Category) -> Self {
        Self(self.0 | 1 << category as u8)
    }

    pub fn of(categories: &[Category]) -> Self {
        categories.iter().fold(Self::NONE, |set, c| set.with(*c))
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0 & Self::bit(category) != 0
    }
}

/// One piece found by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub entity: Entity,
    pub id: PieceId,
    pub point: Point,
    pub category: Category,
    pub distance: f32,
}

/// Distance queries the simulation needs from a spatial index.
pub trait SpatialQuery {
    /// Pieces within `radius` of `origin` whose category is in `filter`,
    /// ordered by piece id.
    fn within(&self, origin: Point, radius: f32, filter: CategorySet) -> Vec<Neighbor>;

    /// Whether a movement-blocking piece other than `except` sits on `point`.
    fn blocked_at(&self, point: Point, except: Entity) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Occupant {
    entity: Entity,
    id: PieceId,
    point: Point,
    category: Category,
    blocks: bool,
}

/// Uniform bucket grid.
#[derive(Debug, Clone)]
pub struct UniformGrid {
    cell: i32,
    buckets: HashMap<(i32, i32), Vec<Occupant>>,
    cells: HashMap<Entity, (i32, i32)>,
}

impl UniformGrid {
    pub const DEFAULT_CELL: i32 = 32;

    pub fn new(cell: i32) -> Self {
        Self {
            cell: cell.max(1),
            buckets: HashMap::new(),
            cells: HashMap::new(),
        }
    }

    fn key(&self, point: Point) -> (i32, i32) {
        (point.x.div_euclid(self.cell), point.y.div_euclid(self.cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.cells.contains_key(&entity)
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.cells.clear();
    }

    /// Add a piece, replacing any previous entry for the same entity.
    pub fn insert(&mut self, entity: Entity, id: PieceId, point: Point, category: Category, blocks: bool) {
        self.remove(entity);
        let key = self.key(point);
        self.buckets.entry(key).or_default().push(Occupant {
            entity,
            id,
            point,
            category,
            blocks,
        });
        self.cells.insert(entity, key);
    }

    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(key) = self.cells.remove(&entity) else {
            return false;
        };
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.retain(|o| o.entity != entity);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
        true
    }

    /// Update a piece's position. Returns false if it is not indexed.
    pub fn move_to(&mut self, entity: Entity, point: Point) -> bool {
        let Some(&old_key) = self.cells.get(&entity) else {
            return false;
        };
        let new_key = self.key(point);
        if old_key == new_key {
            if let Some(o) = self
                .buckets
                .get_mut(&old_key)
                .and_then(|b| b.iter_mut().find(|o| o.entity == entity))
            {
                o.point = point;
            }
            return true;
        }
        let Some(mut occupant) = self
            .buckets
            .get(&old_key)
            .and_then(|b| b.iter().find(|o| o.entity == entity))
            .copied()
        else {
            return false;
        };
        self.remove(entity);
        occupant.point = point;
        self.insert(entity, occupant.id, point, occupant.category, occupant.blocks);
        true
    }
}

impl Default for UniformGrid {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CELL)
    }
}

impl SpatialQuery for UniformGrid {
    fn within(&self, origin: Point, radius: f32, filter: CategorySet) -> Vec<Neighbor> {
        if radius < 0.0 {
            return Vec::new();
        }
        let reach = (radius / self.cell as f32).ceil() as i32;
        let (cx, cy) = self.key(origin);
        let radius_sq = radius * radius;
        let mut out = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for o in bucket {
                    if !filter.contains(o.category) {
                        continue;
                    }
                    let d_sq = origin.distance_squared(&o.point);
                    if d_sq <= radius_sq {
                        out.push(Neighbor {
                            entity: o.entity,
                            id: o.id,
                            point: o.point,
                            category: o.category,
                            distance: d_sq.sqrt(),
                        });
                    }
                }
            }
        }
        out.sort_by_key(|n| n.id);
        out
    }

    fn blocked_at(&self, point: Point, except: Entity) -> bool {
        self.buckets
            .get(&self.key(point))
            .is_some_and(|b| b.iter().any(|o| o.blocks && o.entity != except && o.point == point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    fn entities(n: usize) -> Vec<Entity> {
        let mut world = World::new();
        (0..n).map(|_| world.spawn(())).collect()
    }

    #[test]
    fn test_within_sorted_and_filtered() {
        let e = entities(3);
        let mut grid = UniformGrid::new(10);
        grid.insert(e[0], PieceId(7), Point::new(5, 5), Category::Animal, false);
        grid.insert(e[1], PieceId(2), Point::new(-30, 0), Category::Plant, false);
        grid.insert(e[2], PieceId(4), Point::new(0, 3), Category::Animal, false);

        let all = grid.within(Point::ORIGIN, 50.0, CategorySet::ALL);
        let ids: Vec<u64> = all.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![2, 4, 7]);

        let animals = grid.within(Point::ORIGIN, 50.0, CategorySet::of(&[Category::Animal]));
        assert_eq!(animals.len(), 2);

        let near = grid.within(Point::ORIGIN, 5.0, CategorySet::ALL);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].distance, 3.0);
    }

    #[test]
    fn test_move_across_cells() {
        let e = entities(1);
        let mut grid = UniformGrid::new(8);
        grid.insert(e[0], PieceId(1), Point::new(0, 0), Category::Item, false);
        assert!(grid.move_to(e[0], Point::new(100, 100)));
        assert!(grid.within(Point::ORIGIN, 10.0, CategorySet::ALL).is_empty());
        assert_eq!(grid.within(Point::new(100, 100), 1.0, CategorySet::ALL).len(), 1);
        assert!(grid.remove(e[0]));
        assert!(grid.is_empty());
    }

    #[test]
    fn test_blocked_at_ignores_self() {
        let e = entities(2);
        let mut grid = UniformGrid::default();
        grid.insert(e[0], PieceId(1), Point::new(3, 3), Category::Structure, true);
        assert!(grid.blocked_at(Point::new(3, 3), e[1]));
        assert!(!grid.blocked_at(Point::new(3, 3), e[0]));
        assert!(!grid.blocked_at(Point::new(3, 4), e[1]));
    }

    #[test]
    fn test_category_set() {
        assert!(CategorySet::CREATURES.contains(Category::Player));
        assert!(!CategorySet::CREATURES.contains(Category::Plant));
        assert!(CategorySet::ALL.contains(Category::Item));
        assert!(!CategorySet::NONE.contains(Category::Item));
    }
}
