//! Read-only view of the world for renderers and tooling.

use serde::{Deserialize, Serialize};

use crate::components::{Behavior, Category, Heat, Lifecycle, Piece, PieceId, Placement, Point, StateTag, Vitals};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;

/// One piece as seen by the outside world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceSnapshot {
    pub id: PieceId,
    pub kind: String,
    pub category: Category,
    pub point: Point,
    pub rotation: f32,
    pub in_world: bool,
    pub hit_points: f32,
    pub max_hit_points: f32,
    pub stamina: f32,
    pub fed: f32,
    pub heat: f32,
    pub burning: bool,
    pub state: StateTag,
    pub killed: bool,
}

/// Every piece after a tick, in id order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub raining: bool,
    pub pieces: Vec<PieceSnapshot>,
    pub events: Vec<WorldEvent>,
}

impl WorldSnapshot {
    pub fn get(&self, id: PieceId) -> Option<&PieceSnapshot> {
        self.pieces
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|index| &self.pieces[index])
    }

    pub fn count_in_state(&self, state: StateTag) -> usize {
        self.pieces.iter().filter(|p| p.state == state).count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl SimulationEngine {
    /// Capture vitals, state and heat for every piece.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut pieces: Vec<PieceSnapshot> = self
            .world
            .query::<(&Piece, &Placement, &Vitals, &Heat, &Behavior, &Lifecycle)>()
            .iter()
            .map(|(_, (piece, placement, vitals, heat, behavior, lifecycle))| PieceSnapshot {
                id: piece.id,
                kind: self.templates.name_of(piece.kind).to_string(),
                category: piece.category,
                point: placement.point,
                rotation: placement.rotation,
                in_world: placement.in_world,
                hit_points: vitals.hit_points(),
                max_hit_points: vitals.max_hit_points,
                stamina: vitals.stamina,
                fed: vitals.fed,
                heat: heat.level,
                burning: wildsim_logic::heat::is_burning(heat.level, &self.tuning.heat),
                state: behavior.tag(),
                killed: lifecycle.killed,
            })
            .collect();
        pieces.sort_by_key(|p| p.id);

        WorldSnapshot {
            tick: self.tick,
            raining: self.raining,
            pieces,
            events: self.recent_events().to_vec(),
        }
    }
}
