//! Fire pieces. Hit points are fuel; a fire goes out when its fuel is spent
//! or its heat falls under the burning threshold.

use std::sync::Arc;

use hecs::Entity;
use wildsim_logic::heat;

use crate::components::{Category, FireState, Heat, Piece, Status, Vitals};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;

impl SimulationEngine {
    pub(crate) fn fire_step(&mut self, entity: Entity, piece: Piece, state: FireState, elapsed: u32) {
        match state {
            FireState::Burning => {
                let tuning = Arc::clone(&self.tuning);
                let burn = self.templates.get(piece.kind).fuel_burn * elapsed as f32;
                let out_of_fuel = match self.world.get::<&mut Vitals>(entity) {
                    Ok(mut vitals) => vitals.damage(burn),
                    Err(_) => true,
                };
                let level = self.heat(entity).unwrap_or(0.0);
                if out_of_fuel || !heat::is_burning(level, &tuning.heat) {
                    tracing::debug!(piece = piece.id.0, out_of_fuel, level, "fire went out");
                    self.destroy(entity);
                }
            }
        }
    }

    /// Add fuel to a fire and fan it back to full heat. Fire pieces do not
    /// catch heat from their surroundings, so this sets the level directly.
    /// A heat-locked or submerged fire cannot be stoked.
    pub fn stoke(&mut self, fire: Entity, fuel: f32) -> bool {
        let Some((piece, point)) = self.locate(fire) else {
            return false;
        };
        if piece.category != Category::Fire {
            return false;
        }
        let locked = self.get::<Status>(fire).is_some_and(|s| s.heat_locked);
        if locked || self.terrain.is_water(point) {
            tracing::debug!(piece = piece.id.0, locked, "stoke refused");
            return false;
        }
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(fire) {
            vitals.heal(fuel);
        }
        let level = self.heat(fire).unwrap_or(0.0);
        self.put(fire, Heat { level: 1.0 });
        self.heated.insert(piece.id, fire);
        if !heat::is_burning(level, &self.tuning.heat) {
            self.log.push(WorldEvent::Ignited { id: piece.id });
        }
        tracing::debug!(piece = piece.id.0, fuel, "stoked");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Point;
    use crate::templates::TemplateRegistry;
    use crate::terrain::{Rect, Terrain};
    use wildsim_logic::Tuning;

    #[test]
    fn test_fire_burns_fuel() {
        let mut engine = SimulationEngine::with_defaults(8);
        let fire = engine.spawn_named("campfire", Point::new(100, 100)).unwrap();
        let fuel = engine.vitals(fire).unwrap().hit_points();
        for _ in 0..10 {
            engine.update();
        }
        assert!(engine.vitals(fire).unwrap().hit_points() < fuel);
    }

    #[test]
    fn test_fire_without_fuel_goes_out() {
        let mut engine = SimulationEngine::with_defaults(8);
        let flame = engine.spawn_named("flame", Point::new(100, 100)).unwrap();
        engine.modify_vitals(flame, |v| v.set_hit_points(0.1));
        engine.update();

        assert!(!engine.world.contains(flame));
        assert_eq!(engine.heated_count(), 0);
        assert!(engine
            .recent_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::Destroyed { .. })));
    }

    #[test]
    fn test_cooled_fire_goes_out() {
        let mut engine = SimulationEngine::with_defaults(8);
        let flame = engine.spawn_named("flame", Point::new(100, 100)).unwrap();
        engine.change_heat(flame, -0.8);
        engine.update();
        assert!(!engine.world.contains(flame));
    }

    #[test]
    fn test_stoke_refuels() {
        let mut engine = SimulationEngine::with_defaults(8);
        let fire = engine.spawn_named("campfire", Point::new(100, 100)).unwrap();
        engine.modify_vitals(fire, |v| v.set_hit_points(50.0));
        engine.change_heat(fire, -0.3);

        assert!(engine.stoke(fire, 40.0));
        assert_eq!(engine.vitals(fire).unwrap().hit_points(), 90.0);
        assert_eq!(engine.heat(fire), Some(1.0));
    }

    #[test]
    fn test_locked_fire_cannot_be_stoked() {
        let mut engine = SimulationEngine::with_defaults(8);
        let fire = engine.spawn_named("campfire", Point::new(100, 100)).unwrap();
        engine.modify_vitals(fire, |v| v.set_hit_points(50.0));
        engine.change_heat(fire, -0.3);
        engine.set_heat_locked(fire, true);

        assert!(!engine.stoke(fire, 40.0));
        assert_eq!(engine.vitals(fire).unwrap().hit_points(), 50.0);
        assert!((engine.heat(fire).unwrap() - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_fire_spawned_in_water_is_cold() {
        let terrain = Terrain::open(200, 200).with_water(Rect::new(0, 0, 50, 50));
        let mut engine =
            SimulationEngine::new(TemplateRegistry::standard(), Tuning::default(), terrain, 8).unwrap();
        let fire = engine.spawn_named("campfire", Point::new(20, 20)).unwrap();
        assert_eq!(engine.heat(fire), Some(0.0));
        assert_eq!(engine.heated_count(), 0);
        assert!(!engine.stoke(fire, 10.0));

        engine.update();
        assert!(!engine.world.contains(fire));
    }
}
