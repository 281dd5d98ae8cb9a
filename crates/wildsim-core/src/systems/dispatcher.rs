//! Tick dispatcher - decides which pieces run each tick and routes them to
//! their state machine.
//!
//! Registered pieces are kept per tick group in insertion order. A pass
//! walks a copy of the group, so pieces registered mid-pass wait for the
//! next one and pieces deregistered mid-pass are skipped.

use std::collections::{HashMap, HashSet};

use hecs::Entity;
use wildsim_logic::throttle::{group_runs, should_process, DispatchStats, TickGroup};

use crate::components::{Behavior, Category, KindId, Lifecycle, PassiveMotion, Piece, Placement, StateTag};
use crate::engine::SimulationEngine;

/// Pieces whose state machines are ticked, partitioned by tick group.
#[derive(Debug, Clone, Default)]
pub struct TickRegistry {
    groups: [Vec<Entity>; 2],
    members: HashMap<Entity, TickGroup>,
    counts: [usize; 2],
}

impl TickRegistry {
    /// Register a piece. Returns false if it already was.
    pub fn register(&mut self, entity: Entity, group: TickGroup) -> bool {
        if self.members.contains_key(&entity) {
            return false;
        }
        self.members.insert(entity, group);
        self.groups[group.index()].push(entity);
        self.counts[group.index()] += 1;
        true
    }

    /// Drop a piece from ticking. The group list is compacted lazily.
    pub fn deregister(&mut self, entity: Entity) -> bool {
        match self.members.remove(&entity) {
            Some(group) => {
                self.counts[group.index()] -= 1;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains_key(&entity)
    }

    pub fn group_of(&self, entity: Entity) -> Option<TickGroup> {
        self.members.get(&entity).copied()
    }

    /// Registered pieces in a group.
    pub fn len(&self, group: TickGroup) -> usize {
        self.counts[group.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Current iteration order of a group, dropping stale entries.
    pub fn entities(&mut self, group: TickGroup) -> &[Entity] {
        self.compact(group);
        &self.groups[group.index()]
    }

    /// Reorder a group by a stable key.
    pub fn sort_by_key<K: Ord>(&mut self, group: TickGroup, key: impl FnMut(&Entity) -> K) {
        self.compact(group);
        self.groups[group.index()].sort_by_key(key);
    }

    /// Drop deregistered entries from a group's order. A piece registered
    /// again after leaving keeps only its latest position.
    pub fn compact(&mut self, group: TickGroup) {
        let members = &self.members;
        let mut seen = HashSet::new();
        let order = &mut self.groups[group.index()];
        let mut kept: Vec<Entity> = order
            .iter()
            .rev()
            .filter(|e| members.get(*e) == Some(&group) && seen.insert(**e))
            .copied()
            .collect();
        kept.reverse();
        *order = kept;
    }
}

impl SimulationEngine {
    /// Run one pass over a tick group if it is due this frame.
    pub(crate) fn dispatch_group(&mut self, group: TickGroup) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let population = self.registry.len(group);
        if population == 0 || !group_runs(group, self.tick, population, &self.tuning.dispatch) {
            return stats;
        }

        if self.tuning.dispatch.stable_order {
            let world = &self.world;
            self.registry.sort_by_key(group, |e| {
                world.get::<&Piece>(*e).map(|p| p.id).ok()
            });
        }
        let members = self.registry.entities(group).to_vec();

        let mut kind_population: HashMap<KindId, usize> = HashMap::new();
        for entity in &members {
            if let Some(piece) = self.get::<Piece>(*entity) {
                *kind_population.entry(piece.kind).or_default() += 1;
            }
        }

        for entity in members {
            if self.registry.group_of(entity) != Some(group) {
                continue;
            }
            let (Some(piece), Some(placement), Some(lifecycle)) = (
                self.get::<Piece>(entity),
                self.get::<Placement>(entity),
                self.get::<Lifecycle>(entity),
            ) else {
                tracing::warn!(?entity, "deregistering piece that no longer exists");
                self.registry.deregister(entity);
                stats.deregistered += 1;
                continue;
            };
            if !placement.in_world {
                tracing::warn!(piece = piece.id.0, "deregistering piece that left the world");
                self.registry.deregister(entity);
                stats.deregistered += 1;
                continue;
            }

            let elapsed = self.tick.saturating_sub(lifecycle.last_processed);
            if elapsed == 0 {
                stats.already_done += 1;
                continue;
            }

            if self.get::<PassiveMotion>(entity).is_some_and(|m| m.is_active()) {
                self.mark_processed(entity);
                self.passive_step(entity);
                stats.passive_steps += 1;
                continue;
            }

            let Some(behavior) = self.get::<Behavior>(entity) else {
                continue;
            };
            if behavior.is_inactive() {
                self.registry.deregister(entity);
                stats.deregistered += 1;
                continue;
            }

            let kind_count = kind_population.get(&piece.kind).copied().unwrap_or(1);
            if !should_process(kind_count, piece.id.0, self.tick, &self.tuning.dispatch) {
                stats.throttled += 1;
                continue;
            }

            self.mark_processed(entity);
            stats.processed += 1;
            self.run_behavior(entity, piece, behavior, elapsed);
        }

        self.registry.compact(group);
        stats
    }

    fn mark_processed(&mut self, entity: Entity) {
        if let Ok(mut lifecycle) = self.world.get::<&mut Lifecycle>(entity) {
            lifecycle.last_processed = self.tick;
        }
    }

    /// Route a piece to the state machine owning its active state.
    fn run_behavior(&mut self, entity: Entity, piece: Piece, behavior: Behavior, elapsed: u64) {
        let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
        match behavior {
            Behavior::Inactive => {
                self.registry.deregister(entity);
            }
            Behavior::Animal(state) => {
                expect_category(piece, Category::Animal, behavior.tag());
                self.animal_step(entity, piece, state, elapsed);
            }
            Behavior::Plant(state) => {
                expect_category(piece, Category::Plant, behavior.tag());
                self.plant_step(entity, piece, state, elapsed);
            }
            Behavior::Fire(state) => {
                expect_category(piece, Category::Fire, behavior.tag());
                self.fire_step(entity, piece, state, elapsed);
            }
            Behavior::Structure(state) => {
                expect_category(piece, Category::Structure, behavior.tag());
                self.structure_step(entity, piece, state);
            }
            Behavior::Player(state) => {
                expect_category(piece, Category::Player, behavior.tag());
                self.player_step(entity, piece, state, elapsed);
            }
            Behavior::Projectile(state) => {
                expect_category(piece, Category::Projectile, behavior.tag());
                self.projectile_step(entity, piece, state);
            }
        }
    }
}

/// A state from another category's machine can never be handled.
fn expect_category(piece: Piece, expected: Category, tag: StateTag) {
    if piece.category != expected {
        tracing::error!(piece = piece.id.0, category = ?piece.category, state = ?tag, "state has no handler for this category");
        panic!(
            "piece {} of category {:?} is in {:?}, which only {:?} pieces handle",
            piece.id.0, piece.category, tag, expected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AnimalState, Point};
    use hecs::World;

    #[test]
    fn test_registry_lazy_compaction() {
        let mut world = World::new();
        let a = world.spawn(());
        let b = world.spawn(());
        let mut registry = TickRegistry::default();

        assert!(registry.register(a, TickGroup::General));
        assert!(!registry.register(a, TickGroup::General));
        registry.register(b, TickGroup::General);
        assert_eq!(registry.len(TickGroup::General), 2);

        registry.deregister(a);
        registry.register(a, TickGroup::General);
        assert_eq!(registry.entities(TickGroup::General), &[b, a]);
        assert_eq!(registry.len(TickGroup::General), 2);
    }

    #[test]
    fn test_inactive_pieces_leave_registry() {
        let mut engine = SimulationEngine::with_defaults(1);
        let chest = engine.spawn_named("chest", Point::new(5, 5)).unwrap();
        engine.set_behavior(chest, Behavior::Inactive);

        let stats = engine.update();
        assert_eq!(stats.deregistered, 1);
        assert!(!engine.is_registered(chest));
    }

    #[test]
    fn test_despawned_piece_is_dropped_silently() {
        let mut engine = SimulationEngine::with_defaults(1);
        let rabbit = engine.spawn_named("rabbit", Point::new(5, 5)).unwrap();
        engine.world.despawn(rabbit).unwrap();

        let stats = engine.update();
        assert_eq!(stats.deregistered, 1);
        assert_eq!(stats.processed, 0);
    }

    #[test]
    fn test_passive_motion_preempts_behavior() {
        let mut engine = SimulationEngine::with_defaults(1);
        let rabbit = engine.spawn_named("rabbit", Point::new(50, 50)).unwrap();
        assert!(engine.add_impulse(rabbit, crate::components::Vec2::new(6.0, 0.0), false));

        let stats = engine.update();
        assert_eq!(stats.passive_steps, 1);
        assert_eq!(stats.processed, 0);
        assert_eq!(engine.state(rabbit), Some(StateTag::Assess));
    }

    #[test]
    #[should_panic(expected = "only Animal pieces handle")]
    fn test_foreign_state_is_fatal() {
        let mut engine = SimulationEngine::with_defaults(1);
        let hut = engine.spawn_named("hut", Point::new(5, 5)).unwrap();
        engine.set_behavior(hut, Behavior::Animal(AnimalState::Assess));
        engine.update();
    }
}
