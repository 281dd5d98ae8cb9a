//! Structures only need ticking while something is happening to them.

use hecs::Entity;

use crate::components::{Behavior, Piece, StructureState};
use crate::engine::SimulationEngine;

impl SimulationEngine {
    pub(crate) fn structure_step(&mut self, entity: Entity, piece: Piece, state: StructureState) {
        match state {
            StructureState::Standing => {
                if self.heat(entity).unwrap_or(0.0) <= 0.0 {
                    tracing::trace!(piece = piece.id.0, "structure idle");
                    self.set_behavior(entity, Behavior::Inactive);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Point, StateTag};

    #[test]
    fn test_cold_structure_goes_idle() {
        let mut engine = SimulationEngine::with_defaults(4);
        let hut = engine.spawn_named("hut", Point::new(100, 100)).unwrap();
        engine.update();
        assert_eq!(engine.state(hut), Some(StateTag::Inactive));
        engine.update();
        assert!(!engine.is_registered(hut));
    }

    #[test]
    fn test_heated_structure_keeps_standing() {
        let mut engine = SimulationEngine::with_defaults(4);
        let hut = engine.spawn_named("hut", Point::new(100, 100)).unwrap();
        engine.change_heat(hut, 0.8);
        engine.update();
        assert_eq!(engine.state(hut), Some(StateTag::Standing));
    }
}
