//! Plant growth and passive reproduction.

use std::f32::consts::TAU;
use std::sync::Arc;

use hecs::Entity;
use rand::Rng;

use crate::components::{Behavior, Category, Piece, PlantState, Point, Vitals};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;
use crate::spatial::{CategorySet, SpatialQuery};

/// Attempts to find open ground before a seeding round is skipped.
const SEED_ATTEMPTS: usize = 4;

impl SimulationEngine {
    pub(crate) fn plant_step(&mut self, entity: Entity, piece: Piece, state: PlantState, elapsed: u32) {
        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);

        let (outlived, full) = match self.world.get::<&mut Vitals>(entity) {
            Ok(mut vitals) => {
                let outlived = vitals.grow_older(elapsed);
                vitals.heal(template.regrowth * elapsed as f32);
                (outlived, vitals.hit_points() >= vitals.max_hit_points)
            }
            Err(_) => return,
        };
        if outlived {
            tracing::debug!(piece = piece.id.0, "plant died of age");
            self.kill(entity);
            return;
        }

        let next = match state {
            PlantState::Growing if full && template.seed_interval > 0 => PlantState::Seeding {
                cooldown: template.seed_interval,
            },
            PlantState::Growing if full => {
                self.set_behavior(entity, Behavior::Inactive);
                return;
            }
            PlantState::Growing => PlantState::Growing,
            PlantState::Seeding { cooldown } if cooldown > elapsed => PlantState::Seeding {
                cooldown: cooldown - elapsed,
            },
            PlantState::Seeding { .. } => {
                self.seed(entity, piece);
                PlantState::Seeding {
                    cooldown: template.seed_interval,
                }
            }
        };
        self.set_behavior(entity, Behavior::Plant(next));
    }

    /// Drop a seedling of the same kind nearby unless the area is crowded.
    fn seed(&mut self, entity: Entity, piece: Piece) -> Option<Entity> {
        let (_, point) = self.locate(entity)?;
        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);

        let crowd = self
            .grid
            .within(point, template.seed_radius, CategorySet::of(&[Category::Plant]))
            .into_iter()
            .filter(|n| n.entity != entity)
            .filter(|n| self.get::<Piece>(n.entity).is_some_and(|p| p.kind == piece.kind))
            .count();
        if crowd >= template.crowding_limit {
            tracing::trace!(piece = piece.id.0, crowd, "too crowded to seed");
            return None;
        }

        let mut spot = None;
        for _ in 0..SEED_ATTEMPTS {
            let angle = self.rng.gen_range(0.0..TAU);
            let distance = self.rng.gen_range(1.0..=template.seed_radius.max(1.0));
            let candidate = point.offset(
                (angle.cos() * distance).round() as i32,
                (angle.sin() * distance).round() as i32,
            );
            if self.open_ground(candidate) {
                spot = Some(candidate);
                break;
            }
        }
        let spot = spot?;

        let seedling = self.spawn(piece.kind, spot);
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(seedling) {
            let sprout = vitals.max_hit_points * 0.1;
            vitals.set_hit_points(sprout);
        }
        let id = self.piece(seedling)?.id;
        tracing::debug!(piece = id.0, parent = piece.id.0, x = spot.x, y = spot.y, "seeded");
        self.log.push(WorldEvent::Born { id, parent: piece.id });
        Some(seedling)
    }

    fn open_ground(&self, point: Point) -> bool {
        self.terrain.on_board(point)
            && !self.terrain.is_water(point)
            && !self.terrain.is_blocked(point)
            && !self.grid.blocked_at(point, Entity::DANGLING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::StateTag;

    #[test]
    fn test_damaged_plant_regrows() {
        let mut engine = SimulationEngine::with_defaults(2);
        let bush = engine.spawn_named("bush", Point::new(100, 100)).unwrap();
        engine.apply_damage(bush, 10.0);
        let damaged = engine.vitals(bush).unwrap().hit_points();

        for _ in 0..20 {
            engine.update();
        }
        assert!(engine.vitals(bush).unwrap().hit_points() > damaged);
    }

    #[test]
    fn test_full_plant_starts_seeding() {
        let mut engine = SimulationEngine::with_defaults(2);
        let grass = engine.spawn_named("grass", Point::new(100, 100)).unwrap();
        engine.update();
        assert_eq!(engine.state(grass), Some(StateTag::Seeding));
    }

    #[test]
    fn test_seeding_spawns_seedling() {
        let mut engine = SimulationEngine::with_defaults(2);
        let grass = engine.spawn_named("grass", Point::new(300, 300)).unwrap();
        let piece = engine.piece(grass).unwrap();
        let before = engine.count_kind(piece.kind);

        let seedling = engine.seed(grass, piece).unwrap();
        assert_eq!(engine.count_kind(piece.kind), before + 1);
        assert!(engine.vitals(seedling).unwrap().health_fraction() < 0.5);
        assert!(engine
            .recent_events()
            .iter()
            .chain(engine.log.as_slice())
            .any(|e| matches!(e, WorldEvent::Born { .. })));
    }

    #[test]
    fn test_crowded_plant_does_not_seed() {
        let mut engine = SimulationEngine::with_defaults(2);
        let grass = engine.spawn_named("grass", Point::new(300, 300)).unwrap();
        for i in 0..4 {
            engine.spawn_named("grass", Point::new(302 + i, 300)).unwrap();
        }
        let piece = engine.piece(grass).unwrap();
        assert!(engine.seed(grass, piece).is_none());
    }
}
