//! Player-controlled piece. Commands arrive from outside the simulation and
//! are consumed one per pass.

use std::sync::Arc;

use hecs::Entity;

use crate::components::{Category, Inventory, KindId, Piece, PlayerState, Point, Vec2, Vitals};
use crate::engine::SimulationEngine;
use crate::spatial::{CategorySet, SpatialQuery};

/// Input for the player state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    /// Step by an offset, clamped to the player's speed.
    Move { dx: i32, dy: i32 },
    /// Eat the first edible item carried, or a loose one within reach.
    Eat,
    /// Feed a carried fuel item to a fire within reach.
    Stoke { fire: Entity },
    /// Throw the first carried projectile.
    Throw { direction: Vec2 },
    Idle,
}

/// Minimum fire affinity for a carried item to count as fuel.
const FUEL_AFFINITY: f32 = 0.5;

impl SimulationEngine {
    pub(crate) fn player_step(&mut self, entity: Entity, piece: Piece, state: PlayerState, elapsed: u32) {
        match state {
            PlayerState::Dead => {
                self.registry.deregister(entity);
            }
            PlayerState::Controlled => {
                if !self.metabolize(entity, elapsed) {
                    return;
                }
                let command = self
                    .commands
                    .get_mut(&entity)
                    .and_then(|queue| queue.pop_front())
                    .unwrap_or(PlayerCommand::Idle);
                tracing::trace!(piece = piece.id.0, ?command, "player command");
                self.run_command(entity, piece, command);
            }
        }
    }

    fn run_command(&mut self, entity: Entity, piece: Piece, command: PlayerCommand) {
        let tuning = Arc::clone(&self.tuning);
        match command {
            PlayerCommand::Move { dx, dy } => {
                let speed = self.get::<Vitals>(entity).map_or(1.0, |v| v.speed.max(1.0));
                let (dx, dy) = Point::ORIGIN.step_towards(&Point::new(dx, dy), speed);
                if self.try_move(entity, dx, dy) {
                    self.exert(entity, tuning.energy.walk_cost);
                }
            }
            PlayerCommand::Eat => {
                self.player_eat(entity, piece);
            }
            PlayerCommand::Stoke { fire } => {
                self.player_stoke(entity, piece, fire);
            }
            PlayerCommand::Throw { direction } => {
                self.player_throw(entity, piece, direction);
            }
            PlayerCommand::Idle => {
                if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
                    vitals.rest(&tuning.energy);
                }
            }
        }
    }

    fn feed(&mut self, entity: Entity, eater: KindId, food: KindId) {
        let tuning = Arc::clone(&self.tuning);
        let templates = Arc::clone(&self.templates);
        let energy = templates.get(food).nutrition * tuning.energy.food_energy;
        let digestion = templates.get(eater).digestion;
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
            vitals.acquire(energy, digestion, &tuning.energy);
        }
    }

    fn player_eat(&mut self, entity: Entity, piece: Piece) -> bool {
        let food = self.templates.food_of(piece.kind).to_vec();
        let carried = self
            .world
            .get::<&mut Inventory>(entity)
            .ok()
            .and_then(|mut inventory| inventory.remove_first_of_kind(&food));
        if let Some(kind) = carried {
            self.feed(entity, piece.kind, kind);
            return true;
        }

        let Some((_, point)) = self.locate(entity) else {
            return false;
        };
        let reach = self.templates.get(piece.kind).reach;
        let loose = self
            .grid
            .within(point, reach, CategorySet::of(&[Category::Item]))
            .into_iter()
            .find_map(|n| {
                let other = self.get::<Piece>(n.entity)?;
                food.contains(&other.kind).then_some((n.entity, other.kind))
            });
        match loose {
            Some((item, kind)) => {
                self.destroy(item);
                self.feed(entity, piece.kind, kind);
                true
            }
            None => false,
        }
    }

    fn player_stoke(&mut self, entity: Entity, piece: Piece, fire: Entity) -> bool {
        let Some((_, point)) = self.locate(entity) else {
            return false;
        };
        let reach = self.templates.get(piece.kind).reach;
        let in_reach = self
            .locate(fire)
            .is_some_and(|(p, at)| p.category == Category::Fire && at.distance(&point) <= reach);
        if !in_reach {
            return false;
        }
        let templates = Arc::clone(&self.templates);
        let fuels: Vec<_> = templates
            .iter()
            .filter(|(_, t)| t.category == Category::Item && t.fire_affinity >= FUEL_AFFINITY)
            .map(|(kind, _)| kind)
            .collect();
        let Some(fuel) = self
            .world
            .get::<&mut Inventory>(entity)
            .ok()
            .and_then(|mut inventory| inventory.remove_first_of_kind(&fuels))
        else {
            return false;
        };
        let stoked = self.stoke(fire, templates.get(fuel).nutrition);
        if !stoked {
            if let Ok(mut inventory) = self.world.get::<&mut Inventory>(entity) {
                inventory.add(fuel);
            }
        }
        stoked
    }

    fn player_throw(&mut self, entity: Entity, piece: Piece, direction: Vec2) -> bool {
        let Some((_, point)) = self.locate(entity) else {
            return false;
        };
        let direction = direction.normalize();
        if direction == Vec2::ZERO {
            return false;
        }
        let templates = Arc::clone(&self.templates);
        let projectiles: Vec<_> = templates
            .carried_by(piece.kind)
            .iter()
            .copied()
            .filter(|kind| templates.get(*kind).category == Category::Projectile)
            .collect();
        let Some(kind) = self
            .world
            .get::<&mut Inventory>(entity)
            .ok()
            .and_then(|mut inventory| inventory.remove_first_of_kind(&projectiles))
        else {
            return false;
        };
        let velocity = direction * templates.get(kind).speed;
        self.launch(kind, point, velocity, Some(entity));
        let cost = self.tuning.energy.attack_cost;
        self.exert(entity, cost);
        true
    }
}
