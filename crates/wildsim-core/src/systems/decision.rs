//! Decision system - turns what an animal can see into candidate choices
//! and adopts the winner.
//!
//! Candidates are registered in a fixed order (every visible threat by
//! piece id, then the nearest food, then the nearest mate) so the pure
//! [`choose`] tie-break always lands on the same piece.

use std::sync::Arc;

use hecs::Entity;
use rand::Rng;
use wildsim_logic::decision::{self, choose, ActionKind, Choice};

use crate::components::{AnimalState, Behavior, Category, ChasePurpose, Piece, Point, Vitals};
use crate::engine::SimulationEngine;
use crate::spatial::{CategorySet, SpatialQuery};

/// Ticks an animal keeps running from a threat it chose to flee.
pub(crate) const FLEE_TICKS: u16 = 40;

impl SimulationEngine {
    /// Candidate choices for an animal standing at `point`.
    pub(crate) fn gather_choices(&self, entity: Entity, piece: Piece, point: Point) -> Vec<Choice<Entity>> {
        let Some(vitals) = self.get::<Vitals>(entity) else {
            return Vec::new();
        };
        let template = self.templates.get(piece.kind);
        let tuning = &self.tuning.decision;
        let perception = template.perception;
        let mate_offer = decision::mate_priority(vitals.fed_fraction(), tuning);

        let mut choices = Vec::new();
        let mut food: Option<(Entity, f32)> = None;
        let mut mate: Option<(Entity, f32)> = None;

        for neighbor in self.grid.within(point, perception, CategorySet::ALL) {
            if neighbor.entity == entity {
                continue;
            }
            let Some(other) = self.get::<Piece>(neighbor.entity) else {
                continue;
            };
            let killed = self.is_killed(neighbor.entity);

            if !killed && self.templates.fears(piece.kind, other.kind) {
                if let Some(priority) = decision::flee_priority(neighbor.distance, perception, tuning) {
                    choices.push(Choice::new(ActionKind::Flee, Some(neighbor.entity), priority));
                }
            }
            if self.templates.eats(piece.kind, other.kind)
                && !(killed && other.category == Category::Plant)
                && nearer(food, neighbor.distance)
            {
                food = Some((neighbor.entity, neighbor.distance));
            }
            if mate_offer.is_some()
                && !killed
                && self.templates.mates_of(piece.kind).contains(&other.kind)
                && nearer(mate, neighbor.distance)
            {
                mate = Some((neighbor.entity, neighbor.distance));
            }
        }

        if let Some((target, distance)) = food {
            let at_hand = distance <= template.reach;
            let priority = decision::eat_priority(vitals.hunger(), vitals.health_fraction(), at_hand, tuning);
            if priority > 0.0 {
                choices.push(Choice::new(ActionKind::Eat, Some(target), priority));
            }
        }
        if let (Some(priority), Some((target, _))) = (mate_offer, mate) {
            choices.push(Choice::new(ActionKind::Mate, Some(target), priority));
        }
        choices
    }

    /// Run the decision engine for an animal.
    pub(crate) fn decide(&self, entity: Entity, piece: Piece) -> Option<Choice<Entity>> {
        let (_, point) = self.locate(entity)?;
        choose(&self.gather_choices(entity, piece, point))
    }

    /// Enter the state a choice maps to. The previous state's memory is dropped.
    pub(crate) fn adopt(&mut self, entity: Entity, piece: Piece, choice: Choice<Entity>) {
        let Some(target) = choice.target else {
            return;
        };
        let awareness = self.templates.get(piece.kind).awareness;
        let patience = decision::patience(awareness, &self.tuning.decision);
        let state = match choice.action {
            ActionKind::Flee => AnimalState::Flee {
                threat: target,
                ticks_left: FLEE_TICKS,
            },
            ActionKind::Eat => AnimalState::Chase {
                target,
                purpose: ChasePurpose::Eat,
                patience,
            },
            ActionKind::Mate => AnimalState::Chase {
                target,
                purpose: ChasePurpose::Mate,
                patience,
            },
        };
        tracing::debug!(piece = piece.id.0, action = ?choice.action, priority = choice.priority, "decision");
        self.set_behavior(entity, Behavior::Animal(state));
    }

    /// Occasionally re-run the decision engine from an ongoing state. Adopts
    /// and returns true only if the winner differs from what the animal is
    /// already doing.
    pub(crate) fn reconsider(&mut self, entity: Entity, piece: Piece, current: Option<(ActionKind, Entity)>) -> bool {
        let tuning = Arc::clone(&self.tuning);
        if !decision::should_reevaluate(self.rng.gen(), &tuning.decision) {
            return false;
        }
        match self.decide(entity, piece) {
            Some(choice) if choice.target.map(|t| (choice.action, t)) != current => {
                self.adopt(entity, piece, choice);
                true
            }
            _ => false,
        }
    }
}

fn nearer(best: Option<(Entity, f32)>, distance: f32) -> bool {
    best.map_or(true, |(_, d)| distance < d)
}
