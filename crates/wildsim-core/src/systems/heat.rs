//! Heat and combustion - resolves heat changes, spreads fire to neighbours,
//! applies burn damage and schedules the end of each burn episode.

use std::sync::Arc;

use hecs::Entity;
use rand::Rng;
use wildsim_logic::heat::{self, HeatChange, HeatContext};

use crate::components::{
    AnimalState, Behavior, Category, Heat, Lifecycle, Piece, PieceId, Placement, Point, Status, Vitals,
};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;
use crate::scheduler::DelayedEvent;
use crate::spatial::{CategorySet, SpatialQuery};

/// Ticks an animal runs from a heat source before reassessing.
const FLEE_HEAT_TICKS: u16 = 30;

impl SimulationEngine {
    /// Request a heat change on a piece.
    pub fn change_heat(&mut self, entity: Entity, delta: f32) -> HeatChange {
        self.change_heat_from(entity, delta, None)
    }

    /// Request a heat change caused by `source`.
    pub(crate) fn change_heat_from(&mut self, entity: Entity, delta: f32, source: Option<Entity>) -> HeatChange {
        let Some((piece, point)) = self.locate(entity) else {
            return HeatChange::Rejected;
        };
        let (Some(status), Some(current)) = (self.get::<Status>(entity), self.heat(entity)) else {
            return HeatChange::Rejected;
        };
        let tuning = Arc::clone(&self.tuning);
        let ctx = HeatContext {
            affinity: self.templates.get(piece.kind).fire_affinity,
            wet: self.raining || status.is_wet(self.tick),
            locked: status.heat_locked,
            submerged: self.terrain.is_water(point),
        };
        let change = heat::resolve(current, delta, &ctx, &tuning.heat);
        let Some(level) = change.current() else {
            return change;
        };

        self.put(entity, Heat { level });
        if level > 0.0 {
            self.heated.insert(piece.id, entity);
        } else {
            self.heated.remove(&piece.id);
            self.scheduler
                .cancel_where(entity, |e| *e == DelayedEvent::StopBurning);
        }

        if change.starts_episode() {
            if piece.category != Category::Fire {
                self.schedule_extinguish(entity, piece);
            }
            // Idle plants and structures resume so their heat rules run.
            if !self.is_killed(entity) && !Behavior::initial(piece.category).is_inactive() {
                self.wake(entity);
            }
        }
        if change.ignited(&tuning.heat) {
            tracing::info!(piece = piece.id.0, level, "ignited");
            self.log.push(WorldEvent::Ignited { id: piece.id });
            self.heat_reflex(entity, piece, source);
        }
        if change.extinguished(&tuning.heat) {
            tracing::debug!(piece = piece.id.0, "extinguished");
            self.log.push(WorldEvent::Extinguished { id: piece.id });
        }
        tracing::trace!(piece = piece.id.0, delta, level, "heat change");
        change
    }

    fn schedule_extinguish(&mut self, entity: Entity, piece: Piece) {
        let tuning = &self.tuning.heat;
        let roll = self
            .rng
            .gen_range(tuning.extinguish_min_ticks..=tuning.extinguish_max_ticks);
        let blocks = self.templates.get(piece.kind).blocks_movement;
        let others = self.heated.len() - usize::from(self.heated.contains_key(&piece.id));
        let delay = heat::extinguish_delay(roll, blocks, others, tuning);
        self.scheduler
            .cancel_where(entity, |e| *e == DelayedEvent::StopBurning);
        self.scheduler
            .schedule(self.tick, u64::from(delay), entity, DelayedEvent::StopBurning);
    }

    /// Make sure a heated piece has a pending end to its burn episode.
    pub(crate) fn ensure_extinguish_scheduled(&mut self, entity: Entity) {
        let Some(piece) = self.piece(entity) else {
            return;
        };
        if piece.category != Category::Fire
            && self.heat(entity).is_some_and(|h| h > 0.0)
            && !self.scheduler.has_pending(entity, DelayedEvent::StopBurning)
        {
            self.schedule_extinguish(entity, piece);
        }
    }

    /// Delayed end of a burn episode.
    pub(crate) fn stop_burning(&mut self, entity: Entity) {
        if let Some(level) = self.heat(entity) {
            if level > 0.0 {
                self.change_heat(entity, -level);
            }
        }
    }

    /// Per-tick heat pass over every heated piece.
    pub(crate) fn heat_system(&mut self) {
        let tuning = Arc::clone(&self.tuning);
        let heated: Vec<(PieceId, Entity)> = self.heated.iter().map(|(id, e)| (*id, *e)).collect();

        for (id, entity) in heated {
            let Some((piece, point)) = self.locate(entity) else {
                self.heated.remove(&id);
                continue;
            };
            let level = self.heat(entity).unwrap_or(0.0);
            if level <= 0.0 {
                self.heated.remove(&id);
                continue;
            }
            if self.terrain.is_water(point) {
                self.change_heat(entity, 0.0);
                continue;
            }

            if heat::is_burning(level, &tuning.heat) {
                self.spread_heat(entity, piece, point, level);
                let burn_tick = self.tick % u64::from(tuning.heat.burn_damage_interval) == 0;
                if burn_tick && piece.category != Category::Fire {
                    self.burn(entity, heat::base_burn(level, &tuning.heat));
                    if !self.world.contains(entity) {
                        continue;
                    }
                }
            }

            let cooling = heat::passive_cooling(level, self.raining, &tuning.heat);
            if cooling > 0.0 {
                self.change_heat(entity, -cooling);
            }
        }
    }

    /// Heat every susceptible neighbour of a burning piece.
    fn spread_heat(&mut self, source: Entity, piece: Piece, point: Point, level: f32) {
        let tuning = Arc::clone(&self.tuning);
        let Some(vitals) = self.get::<Vitals>(source) else {
            return;
        };
        let radius = heat::contagion_radius(vitals.mass, &tuning.heat);
        let burn_tick = self.tick % u64::from(tuning.heat.burn_damage_interval) == 0;

        for neighbor in self.grid.within(point, radius, CategorySet::ALL) {
            if neighbor.entity == source {
                continue;
            }
            let Some(target) = self.get::<Piece>(neighbor.entity) else {
                continue;
            };
            let affinity = self.templates.get(target.kind).fire_affinity;
            let delta = heat::contagion_delta(neighbor.distance, radius, affinity, &tuning.heat) * level;
            if delta > 0.0 {
                self.change_heat_from(neighbor.entity, delta, Some(source));
            }

            if target.category.feels_heat() && self.world.contains(neighbor.entity) {
                let target_level = self.heat(neighbor.entity).unwrap_or(0.0);
                if burn_tick && !heat::is_burning(target_level, &tuning.heat) {
                    let damage = heat::pre_ignition_damage(neighbor.distance, radius, &tuning.heat);
                    if damage > 0.0 {
                        self.burn(neighbor.entity, damage);
                    }
                }
                if target.category == Category::Animal && self.world.contains(neighbor.entity) {
                    self.heat_reflex(neighbor.entity, target, Some(source));
                }
            }
        }
        tracing::trace!(piece = piece.id.0, radius, "spread heat");
    }

    /// Burn damage. A burning piece that runs out of hit points is
    /// destroyed; players are killed instead so game over can be handled,
    /// and pieces hurt before catching fire leave a corpse.
    pub(crate) fn burn(&mut self, entity: Entity, amount: f32) {
        let Some(lifecycle) = self.get::<Lifecycle>(entity) else {
            return;
        };
        let Some(piece) = self.piece(entity) else {
            return;
        };
        let mut reached_zero = false;
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
            reached_zero = vitals.damage(amount) || (lifecycle.killed && vitals.is_depleted());
        }
        tracing::trace!(piece = piece.id.0, amount, "burn damage");
        if !reached_zero {
            return;
        }

        let burning = self
            .heat(entity)
            .is_some_and(|level| heat::is_burning(level, &self.tuning.heat));
        match piece.category {
            Category::Player => {
                self.kill(entity);
            }
            _ if burning => {
                self.destroy(entity);
            }
            _ => {
                self.kill(entity);
            }
        }
    }

    /// Coupling from heat to behavior: a burning animal runs for water when
    /// it can see some, otherwise it runs from the heat source.
    fn heat_reflex(&mut self, entity: Entity, piece: Piece, source: Option<Entity>) {
        if piece.category != Category::Animal || self.is_killed(entity) {
            return;
        }
        let Some(behavior) = self.behavior(entity) else {
            return;
        };
        if matches!(behavior, Behavior::Animal(AnimalState::FleeToWater { .. })) {
            return;
        }
        let Some((_, point)) = self.locate(entity) else {
            return;
        };
        let burning = self
            .heat(entity)
            .is_some_and(|level| heat::is_burning(level, &self.tuning.heat));
        let perception = self.templates.get(piece.kind).perception;

        if burning {
            if let Some(water) = self.terrain.nearest_water(point, perception) {
                self.set_behavior(entity, Behavior::Animal(AnimalState::FleeToWater { water }));
                self.wake(entity);
                return;
            }
        }
        if behavior.is_fleeing() {
            return;
        }
        if let Some(threat) = source {
            self.set_behavior(
                entity,
                Behavior::Animal(AnimalState::Flee {
                    threat,
                    ticks_left: FLEE_HEAT_TICKS,
                }),
            );
            self.wake(entity);
        }
    }

    /// Mark every placed piece wet for a while after rain stops.
    pub(crate) fn start_drying(&mut self) {
        let until = self.tick + u64::from(self.tuning.heat.wet_duration_ticks);
        let placed: Vec<Entity> = self
            .world
            .query::<(&Placement, &mut Status)>()
            .iter()
            .filter(|(_, (placement, _))| placement.in_world)
            .map(|(entity, (_, status))| {
                status.wet_until = Some(until);
                entity
            })
            .collect();
        for entity in placed {
            self.scheduler.schedule(
                self.tick,
                u64::from(self.tuning.heat.wet_duration_ticks),
                entity,
                DelayedEvent::DryOff,
            );
        }
    }

    /// Delayed clearing of an expired wet status.
    pub(crate) fn dry_off(&mut self, entity: Entity) {
        let tick = self.tick;
        if let Ok(mut status) = self.world.get::<&mut Status>(entity) {
            if status.wet_until.is_some_and(|until| until <= tick) {
                status.wet_until = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::StateTag;
    use crate::templates::TemplateRegistry;
    use crate::terrain::{Rect, Terrain};
    use wildsim_logic::Tuning;

    fn engine_on(terrain: Terrain) -> SimulationEngine {
        SimulationEngine::new(TemplateRegistry::standard(), Tuning::default(), terrain, 11).unwrap()
    }

    #[test]
    fn test_first_heat_schedules_extinguish() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let bush = engine.spawn_named("bush", Point::new(50, 50)).unwrap();
        let change = engine.change_heat(bush, 0.7);
        assert!(change.starts_episode());
        assert!(engine.scheduler.has_pending(bush, DelayedEvent::StopBurning));
        assert_eq!(engine.pending_events(), 1);

        engine.change_heat(bush, 0.1);
        assert_eq!(engine.pending_events(), 1);
    }

    #[test]
    fn test_overload_counts_other_heated_pieces() {
        let mut tuning = Tuning::default();
        tuning.heat.extinguish_min_ticks = 100;
        tuning.heat.extinguish_max_ticks = 100;
        tuning.heat.overload_heated_count = 1;
        let mut engine =
            SimulationEngine::new(TemplateRegistry::standard(), tuning, Terrain::open(200, 200), 11).unwrap();
        let first = engine.spawn_named("hut", Point::new(20, 20)).unwrap();
        let second = engine.spawn_named("hut", Point::new(120, 120)).unwrap();
        let third = engine.spawn_named("hut", Point::new(20, 120)).unwrap();
        engine.change_heat(first, 1.0);
        engine.change_heat(second, 1.0);
        engine.change_heat(third, 1.0);

        let due = |entity| {
            engine
                .scheduler
                .iter()
                .find(|s| s.entity == entity && s.event == DelayedEvent::StopBurning)
                .map(|s| s.due)
        };
        assert_eq!(due(first), Some(100));
        // one other heated piece is not above the overload count
        assert_eq!(due(second), Some(100));
        assert_eq!(due(third), Some(50));
    }

    #[test]
    fn test_heat_wakes_idle_structure() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let hut = engine.spawn_named("hut", Point::new(50, 50)).unwrap();
        engine.update();
        engine.update();
        assert_eq!(engine.state(hut), Some(StateTag::Inactive));
        assert!(!engine.is_registered(hut));

        engine.change_heat(hut, 1.0);
        assert!(engine.is_registered(hut));
        assert_eq!(engine.state(hut), Some(StateTag::Standing));
        engine.update();
        assert_eq!(engine.state(hut), Some(StateTag::Standing));
    }

    #[test]
    fn test_heat_lock_rejects_changes() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let hut = engine.spawn_named("hut", Point::new(50, 50)).unwrap();
        engine.set_heat_locked(hut, true);
        assert_eq!(engine.change_heat(hut, 1.0), HeatChange::Rejected);
        assert_eq!(engine.heat(hut), Some(0.0));
    }

    #[test]
    fn test_wet_pieces_heat_slower() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let wet = engine.spawn_named("bush", Point::new(100, 100)).unwrap();
        engine.set_raining(true);
        engine.change_heat(wet, 0.4);
        engine.set_raining(false);
        let dry = engine.spawn_named("bush", Point::new(10, 10)).unwrap();
        engine.change_heat(dry, 0.4);
        assert!((engine.heat(wet).unwrap() - 0.2).abs() < 1e-5);
        assert!((engine.heat(dry).unwrap() - 0.4).abs() < 1e-5);
        // still wet after the rain stops
        let again = engine.change_heat(wet, 0.2);
        assert!((again.current().unwrap() - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_fire_spreads_to_flammable_neighbours_only() {
        let mut engine = engine_on(Terrain::open(200, 200));
        engine.spawn_named("campfire", Point::new(100, 100)).unwrap();
        let grass = engine.spawn_named("grass", Point::new(104, 100)).unwrap();
        let spear = engine.spawn_named("spear", Point::new(96, 100)).unwrap();

        engine.update();
        assert!(engine.heat(grass).unwrap() > 0.0);
        assert_eq!(engine.heat(spear), Some(0.0));
    }

    #[test]
    fn test_animal_flees_fire() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let fire = engine.spawn_named("campfire", Point::new(100, 100)).unwrap();
        let rabbit = engine.spawn_named("rabbit", Point::new(110, 100)).unwrap();

        engine.update();
        match engine.behavior(rabbit).unwrap() {
            Behavior::Animal(AnimalState::Flee { threat, .. }) => assert_eq!(threat, fire),
            other => panic!("expected flee, got {other:?}"),
        }
    }

    #[test]
    fn test_burning_animal_runs_for_water() {
        let terrain = Terrain::open(200, 200).with_water(Rect::new(0, 0, 10, 200));
        let mut engine = engine_on(terrain);
        let rabbit = engine.spawn_named("rabbit", Point::new(40, 40)).unwrap();
        engine.change_heat(rabbit, 0.9);
        assert_eq!(engine.state(rabbit), Some(StateTag::FleeToWater));
    }

    #[test]
    fn test_extinguish_event_ends_episode() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let hut = engine.spawn_named("hut", Point::new(50, 50)).unwrap();
        engine.change_heat(hut, 1.0);
        let max = u64::from(engine.tuning().heat.extinguish_max_ticks) + 1;
        for _ in 0..max {
            engine.update();
            if engine.heat(hut) == Some(0.0) || !engine.world.contains(hut) {
                break;
            }
        }
        assert!(!engine.world.contains(hut) || engine.heat(hut) == Some(0.0));
    }

    #[test]
    fn test_rain_cools_and_dries_later() {
        let mut engine = engine_on(Terrain::open(200, 200));
        let bush = engine.spawn_named("bush", Point::new(50, 50)).unwrap();
        engine.change_heat(bush, 0.3);
        engine.set_raining(true);
        engine.update();
        assert!(engine.heat(bush).unwrap() < 0.3);

        engine.set_raining(false);
        let status = engine.get::<Status>(bush).unwrap();
        assert!(status.is_wet(engine.tick()));
        for _ in 0..engine.tuning().heat.wet_duration_ticks + 1 {
            engine.update();
        }
        assert_eq!(engine.get::<Status>(bush).unwrap().wet_until, None);
    }
}
