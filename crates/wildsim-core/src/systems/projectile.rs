//! Thrown projectiles.
//!
//! A flying projectile moves by its velocity each pass until its range runs
//! out, it hits something solid, or it strikes the first creature within
//! reach. Spent projectiles are destroyed on their next pass.

use std::sync::Arc;

use hecs::Entity;

use crate::components::{Behavior, KindId, Piece, Point, ProjectileState, Vec2};
use crate::engine::SimulationEngine;
use crate::spatial::{CategorySet, SpatialQuery};

/// Knockback impulse per unit of projectile speed.
const KNOCKBACK: f32 = 0.5;

impl SimulationEngine {
    /// Spawn a projectile of `kind` at `from` and set it flying.
    pub fn launch(&mut self, kind: KindId, from: Point, velocity: Vec2, thrower: Option<Entity>) -> Entity {
        let range_left = self.templates.get(kind).range;
        let projectile = self.spawn(kind, from);
        self.set_behavior(
            projectile,
            Behavior::Projectile(ProjectileState::Flying {
                velocity,
                range_left,
                thrower,
            }),
        );
        self.wake(projectile);
        if let Some(piece) = self.piece(projectile) {
            tracing::debug!(piece = piece.id.0, dx = velocity.x, dy = velocity.y, range_left, "launched");
        }
        projectile
    }

    pub(crate) fn projectile_step(&mut self, entity: Entity, piece: Piece, state: ProjectileState) {
        match state {
            ProjectileState::Spent => {
                self.destroy(entity);
            }
            ProjectileState::Flying {
                velocity,
                range_left,
                thrower,
            } => {
                let next = self.fly(entity, piece, velocity, range_left, thrower);
                self.set_behavior(entity, Behavior::Projectile(next));
            }
        }
    }

    fn fly(
        &mut self,
        entity: Entity,
        piece: Piece,
        velocity: Vec2,
        range_left: u16,
        thrower: Option<Entity>,
    ) -> ProjectileState {
        if range_left == 0 {
            return ProjectileState::Spent;
        }
        let moved = self.try_move(entity, velocity.x.round() as i32, velocity.y.round() as i32);
        let Some((_, point)) = self.locate(entity) else {
            return ProjectileState::Spent;
        };

        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);
        let victim = self
            .grid
            .within(point, template.reach, CategorySet::CREATURES)
            .into_iter()
            .filter(|n| Some(n.entity) != thrower && !self.is_killed(n.entity))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .map(|n| n.entity);

        if let Some(victim) = victim {
            let killed = self.apply_damage(victim, template.damage);
            self.add_impulse(victim, velocity * KNOCKBACK, false);
            tracing::debug!(piece = piece.id.0, ?victim, killed, "projectile hit");
            return ProjectileState::Spent;
        }
        if !moved {
            return ProjectileState::Spent;
        }
        ProjectileState::Flying {
            velocity,
            range_left: range_left - 1,
            thrower,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AnimalState, StateTag};
    use crate::events::WorldEvent;

    fn spear(engine: &SimulationEngine) -> KindId {
        engine.templates().id_of("spear").unwrap()
    }

    #[test]
    fn test_projectile_hits_creature() {
        let mut engine = SimulationEngine::with_defaults(12);
        let thrower = engine.spawn_named("player", Point::new(100, 700)).unwrap();
        let deer = engine.spawn_named("deer", Point::new(130, 100)).unwrap();
        engine.modify_vitals(deer, |v| v.stamina = 0.0);
        engine.set_behavior(deer, Behavior::Animal(AnimalState::Rest { ticks_left: 30 }));
        let kind = spear(&engine);
        let spear = engine.launch(kind, Point::new(100, 100), Vec2::new(12.0, 0.0), Some(thrower));

        let before = engine.vitals(deer).unwrap().hit_points();
        for _ in 0..3 {
            engine.update();
        }
        assert!(engine.vitals(deer).unwrap().hit_points() < before);
        assert!(!engine.world.contains(spear) || engine.state(spear) == Some(StateTag::Spent));
        assert_eq!(engine.vitals(thrower).unwrap().hit_points(), 100.0);
    }

    #[test]
    fn test_projectile_range_runs_out() {
        let mut engine = SimulationEngine::with_defaults(12);
        let kind = spear(&engine);
        let spear = engine.launch(kind, Point::new(10, 500), Vec2::new(2.0, 0.0), None);

        let mut destroyed = false;
        for _ in 0..40 {
            engine.update();
            if engine
                .recent_events()
                .iter()
                .any(|e| matches!(e, WorldEvent::Destroyed { .. }))
            {
                destroyed = true;
                break;
            }
        }
        assert!(destroyed);
        assert!(!engine.world.contains(spear));
    }

    #[test]
    fn test_projectile_stops_at_obstacle() {
        let mut engine = SimulationEngine::with_defaults(12);
        engine.spawn_named("hut", Point::new(104, 100)).unwrap();
        let kind = spear(&engine);
        let spear = engine.launch(kind, Point::new(100, 100), Vec2::new(4.0, 0.0), None);
        engine.update();
        assert_eq!(engine.state(spear), Some(StateTag::Spent));
        assert_eq!(engine.placement(spear).unwrap().point, Point::new(100, 100));
    }
}
