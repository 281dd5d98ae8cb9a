//! Piece lifecycle - damage, killing, removal and delayed events.
//!
//! Killing is not removal: a killed piece keeps its place as a corpse until
//! its decay delay runs out. Destroying removes it from every index and
//! despawns it. Each happens at most once per piece.

use hecs::Entity;
use rand::Rng;

use crate::components::{
    Behavior, Category, Heat, Inventory, Lifecycle, PassiveMotion, Placement, PlayerState, Point, Vitals,
};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;
use crate::scheduler::{DelayedEvent, Scheduled};

/// Fraction of each hit that turns into permanent wear.
const WEAR_PER_DAMAGE: f32 = 0.1;

impl SimulationEngine {
    /// Deal damage. Returns true if this hit killed the piece.
    pub fn apply_damage(&mut self, entity: Entity, amount: f32) -> bool {
        if self.locate(entity).is_none() || self.is_killed(entity) {
            return false;
        }
        let mut reached_zero = false;
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
            if vitals.max_hit_points > 0.0 {
                let max_hit_points = vitals.max_hit_points;
                vitals.add_wear(amount.max(0.0) / max_hit_points * WEAR_PER_DAMAGE);
            }
            reached_zero = vitals.damage(amount);
        }
        if reached_zero {
            self.kill(entity)
        } else {
            self.wake(entity);
            false
        }
    }

    /// Zero a piece's vitals, spill its inventory and leave the corpse to
    /// decay. Players stay on the board for game-over handling.
    pub fn kill(&mut self, entity: Entity) -> bool {
        let Some((piece, point)) = self.locate(entity) else {
            return false;
        };
        let Some(lifecycle) = self.get::<Lifecycle>(entity) else {
            return false;
        };
        if lifecycle.killed {
            return false;
        }
        self.put(entity, Lifecycle { killed: true, ..lifecycle });
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
            vitals.zero();
        }
        self.spill_inventory(entity, point);

        tracing::info!(piece = piece.id.0, kind = %self.templates.name_of(piece.kind), "killed");
        self.log.push(WorldEvent::Killed { id: piece.id });

        if piece.category == Category::Player {
            self.set_behavior(entity, Behavior::Player(PlayerState::Dead));
            self.commands.remove(&entity);
            self.log.push(WorldEvent::PlayerKilled { id: piece.id });
        } else {
            self.set_behavior(entity, Behavior::Inactive);
            let decay = self.templates.get(piece.kind).decay_ticks;
            self.scheduler
                .schedule(self.tick, u64::from(decay), entity, DelayedEvent::Destroy);
        }
        true
    }

    /// Remove a piece from the world and despawn it.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        let Some(piece) = self.piece(entity) else {
            return false;
        };
        self.remove_from_world(entity);
        self.ids.remove(&piece.id);
        self.commands.remove(&entity);
        if self.world.despawn(entity).is_err() {
            return false;
        }
        tracing::info!(piece = piece.id.0, kind = %self.templates.name_of(piece.kind), "destroyed");
        self.log.push(WorldEvent::Destroyed { id: piece.id });
        true
    }

    /// Take a piece off the board. Its heat drops to zero at once and every
    /// event scheduled for it is cancelled.
    pub fn remove_from_world(&mut self, entity: Entity) -> bool {
        let Some((piece, _)) = self.locate(entity) else {
            return false;
        };
        if let Ok(mut placement) = self.world.get::<&mut Placement>(entity) {
            placement.in_world = false;
        }
        self.grid.remove(entity);
        self.registry.deregister(entity);
        self.scheduler.cancel_all_for(entity);

        let level = self.heat(entity).unwrap_or(0.0);
        self.put(entity, Heat { level: 0.0 });
        self.heated.remove(&piece.id);
        if wildsim_logic::heat::is_burning(level, &self.tuning.heat) {
            self.log.push(WorldEvent::Extinguished { id: piece.id });
        }
        if let Ok(mut motion) = self.world.get::<&mut PassiveMotion>(entity) {
            motion.clear();
        }
        true
    }

    /// Drop everything a piece carries as loose pieces next to it.
    fn spill_inventory(&mut self, entity: Entity, point: Point) {
        let items = match self.world.get::<&mut Inventory>(entity) {
            Ok(mut inventory) => inventory.drain(),
            Err(_) => return,
        };
        for kind in items {
            let offset = Point::new(self.rng.gen_range(-2..=2), self.rng.gen_range(-2..=2));
            let spot = self.terrain.clamp(point.offset(offset.x, offset.y));
            self.spawn(kind, spot);
        }
    }

    /// Handle one due delayed event.
    pub(crate) fn fire_delayed(&mut self, scheduled: Scheduled) {
        let entity = scheduled.entity;
        if !self.world.contains(entity) {
            return;
        }
        match scheduled.event {
            DelayedEvent::StopBurning => self.stop_burning(entity),
            DelayedEvent::Destroy => {
                self.destroy(entity);
            }
            DelayedEvent::Reinforce { threat } => self.reinforce(entity, threat),
            DelayedEvent::DryOff => self.dry_off(entity),
        }
    }
}
