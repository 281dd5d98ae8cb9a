//! Passive movement - applies impulses as decaying motion and moves pieces
//! across the board.

use std::sync::Arc;

use hecs::Entity;
use rand::Rng;
use wildsim_logic::impulse::{self, PassiveMotion, PassiveStep};

use crate::components::{Placement, Point, Vec2, Vitals};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;
use crate::spatial::SpatialQuery;

impl SimulationEngine {
    /// Push a piece. Ignored unless its kind moves when pushed or `force`
    /// is set. Tumbling kinds also pick up a random spin.
    pub fn add_impulse(&mut self, entity: Entity, impulse: Vec2, force: bool) -> bool {
        let Some((piece, _)) = self.locate(entity) else {
            return false;
        };
        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);
        if !(template.pushable || force) {
            return false;
        }

        let spin = if template.tumbles {
            let roll = self.rng.gen_range(-1.0..=1.0);
            impulse::tumble_spin(impulse.length(), roll, &self.tuning.passive)
        } else {
            0.0
        };
        if let Ok(mut motion) = self.world.get::<&mut PassiveMotion>(entity) {
            motion.add(impulse.x, impulse.y, spin);
        }
        tracing::trace!(piece = piece.id.0, dx = impulse.x, dy = impulse.y, spin, "impulse");
        self.wake(entity);
        true
    }

    /// Integrate one passive sub-step for a piece.
    pub(crate) fn passive_step(&mut self, entity: Entity) -> PassiveStep {
        let (Some(mut motion), Some(vitals)) = (
            self.get::<PassiveMotion>(entity),
            self.get::<Vitals>(entity),
        ) else {
            return PassiveStep::Settled;
        };
        let tuning = Arc::clone(&self.tuning);
        let speed = impulse::speed_rating(vitals.speed);
        let tick = self.tick;

        let outcome = impulse::step(&mut motion, speed, tick, &tuning.passive, |dx, dy| {
            self.try_move(entity, dx, dy)
        });
        self.put(entity, motion);

        match outcome {
            PassiveStep::Moved { rotation, .. } => {
                if let Ok(mut placement) = self.world.get::<&mut Placement>(entity) {
                    placement.rotation = (placement.rotation + rotation).rem_euclid(360.0);
                }
            }
            PassiveStep::Settled => {
                if let Some(piece) = self.piece(entity) {
                    tracing::trace!(piece = piece.id.0, "settled");
                    self.log.push(WorldEvent::Settled { id: piece.id });
                }
            }
            PassiveStep::Bounced => {}
        }
        outcome
    }

    /// Move a piece by an integer offset if the destination is free.
    ///
    /// Off-board, impassable ground and movement-blocking pieces stop the
    /// move. Entering water quenches the piece.
    pub(crate) fn try_move(&mut self, entity: Entity, dx: i32, dy: i32) -> bool {
        let Some((_, from)) = self.locate(entity) else {
            return false;
        };
        if dx == 0 && dy == 0 {
            return true;
        }
        let to = from.offset(dx, dy);
        if self.terrain.is_blocked(to) || self.grid.blocked_at(to, entity) {
            return false;
        }
        self.place(entity, to);
        true
    }

    /// Set a piece's position, keeping the grid in step.
    pub(crate) fn place(&mut self, entity: Entity, to: Point) {
        if let Ok(mut placement) = self.world.get::<&mut Placement>(entity) {
            placement.point = to;
        }
        self.grid.move_to(entity, to);
        if self.terrain.is_water(to) && self.heat(entity).is_some_and(|h| h > 0.0) {
            self.change_heat(entity, 0.0);
        }
    }
}
