//! Animal state machine.
//!
//! Every pass pays metabolism and ages the animal before the active state
//! runs. States that pursue something re-check their target first and fall
//! back to [`AnimalState::Assess`] when it is gone, off the board or out of
//! perception.

use std::f32::consts::TAU;
use std::sync::Arc;

use hecs::Entity;
use rand::Rng;
use wildsim_logic::decision::{self, ActionKind};

use crate::components::{
    AnimalState, Behavior, Category, ChasePurpose, Piece, Point, Vec2, Vitals,
};
use crate::engine::SimulationEngine;
use crate::events::WorldEvent;
use crate::scheduler::DelayedEvent;
use crate::spatial::{CategorySet, SpatialQuery};

use super::decision::FLEE_TICKS;

const REST_TICKS: u16 = 30;
const WALK_STEPS: u16 = 25;
const MATE_TICKS: u16 = 20;
const ATTACK_COOLDOWN: u16 = 8;
const CALL_DELAY: u64 = 15;
/// Food units taken per eating tick.
const BITE: f32 = 1.0;
/// Stamina fraction under which an idle animal lies down.
const TIRED_FRACTION: f32 = 0.25;
/// Share of the fed pool a birth costs.
const BIRTH_COST: f32 = 0.3;
/// Knockback impulse per point of attacker strength.
const KNOCKBACK: f32 = 2.0;

impl SimulationEngine {
    pub(crate) fn animal_step(&mut self, entity: Entity, piece: Piece, state: AnimalState, elapsed: u32) {
        if !self.metabolize(entity, elapsed) {
            return;
        }
        let Some((_, point)) = self.locate(entity) else {
            return;
        };
        match state {
            AnimalState::Assess => self.assess(entity, piece),
            AnimalState::WalkAround { heading, steps_left } => {
                self.walk_around(entity, piece, heading, steps_left)
            }
            AnimalState::Rest { ticks_left } => self.rest(entity, piece, ticks_left),
            AnimalState::Chase {
                target,
                purpose,
                patience,
            } => self.chase(entity, piece, point, target, purpose, patience),
            AnimalState::Attack { target, cooldown } => self.attack(entity, piece, point, target, cooldown),
            AnimalState::Eat { target } => self.eat(entity, piece, point, target),
            AnimalState::Mate { partner, ticks_left } => self.mate(entity, piece, point, partner, ticks_left),
            AnimalState::GiveBirth { ticks_left } => self.give_birth(entity, piece, point, ticks_left),
            AnimalState::Flee { threat, ticks_left } => self.flee(entity, piece, point, threat, ticks_left),
            AnimalState::FleeToWater { water } => self.flee_to_water(entity, piece, point, water),
            AnimalState::CallForHelp { threat } => self.call_for_help(entity, threat),
        }
    }

    /// Pay the living cost for `elapsed` ticks and age. Returns false if the
    /// piece starved or died of age.
    pub(crate) fn metabolize(&mut self, entity: Entity, elapsed: u32) -> bool {
        let tuning = Arc::clone(&self.tuning);
        let died = match self.world.get::<&mut Vitals>(entity) {
            Ok(mut vitals) => {
                let outlived = vitals.grow_older(elapsed);
                vitals.expend(tuning.energy.metabolism * elapsed as f32, &tuning.energy);
                outlived || vitals.is_depleted()
            }
            Err(_) => false,
        };
        if died {
            self.kill(entity);
        }
        !died
    }

    /// Spend energy on an action. Returns false if it killed the piece.
    pub(crate) fn exert(&mut self, entity: Entity, amount: f32) -> bool {
        let tuning = Arc::clone(&self.tuning);
        let depleted = match self.world.get::<&mut Vitals>(entity) {
            Ok(mut vitals) => {
                vitals.expend(amount, &tuning.energy);
                vitals.is_depleted()
            }
            Err(_) => false,
        };
        if depleted {
            self.kill(entity);
        }
        !depleted
    }

    fn animal_state(&mut self, entity: Entity, state: AnimalState) {
        self.set_behavior(entity, Behavior::Animal(state));
    }

    fn assess(&mut self, entity: Entity, piece: Piece) {
        match self.decide(entity, piece) {
            Some(choice) => self.adopt(entity, piece, choice),
            None => self.idle(entity),
        }
    }

    /// Nothing worth doing: lie down when tired, otherwise wander.
    fn idle(&mut self, entity: Entity) {
        let tired = self
            .get::<Vitals>(entity)
            .is_some_and(|v| v.stamina < v.max_stamina * TIRED_FRACTION);
        let state = if tired {
            AnimalState::Rest {
                ticks_left: REST_TICKS,
            }
        } else {
            AnimalState::WalkAround {
                heading: self.random_heading(),
                steps_left: WALK_STEPS,
            }
        };
        self.animal_state(entity, state);
    }

    fn random_heading(&mut self) -> Vec2 {
        Vec2::from_angle(self.rng.gen_range(0.0..TAU))
    }

    fn walk_around(&mut self, entity: Entity, piece: Piece, heading: Vec2, steps_left: u16) {
        if steps_left == 0 {
            self.animal_state(entity, AnimalState::Assess);
            return;
        }
        if self.reconsider(entity, piece, None) {
            return;
        }
        let template_awareness = self.templates.get(piece.kind).awareness;
        if self
            .rng
            .gen_bool(f64::from(decision::look_around_chance(template_awareness, &self.tuning.decision)))
        {
            self.animal_state(entity, AnimalState::Assess);
            return;
        }

        let speed = self.walking_speed(entity);
        let step = heading * speed;
        let moved = self.try_move(entity, step.x.round() as i32, step.y.round() as i32);
        let cost = self.tuning.energy.walk_cost;
        if !self.exert(entity, cost) {
            return;
        }
        let heading = if moved { heading } else { self.random_heading() };
        self.animal_state(
            entity,
            AnimalState::WalkAround {
                heading,
                steps_left: steps_left - 1,
            },
        );
    }

    fn rest(&mut self, entity: Entity, piece: Piece, ticks_left: u16) {
        let tuning = Arc::clone(&self.tuning);
        let rested = match self.world.get::<&mut Vitals>(entity) {
            Ok(mut vitals) => {
                vitals.rest(&tuning.energy);
                vitals.stamina >= vitals.max_stamina
            }
            Err(_) => true,
        };
        if self.reconsider(entity, piece, None) {
            return;
        }
        let next = if rested || ticks_left == 0 {
            AnimalState::Assess
        } else {
            AnimalState::Rest {
                ticks_left: ticks_left - 1,
            }
        };
        self.animal_state(entity, next);
    }

    fn chase(
        &mut self,
        entity: Entity,
        piece: Piece,
        point: Point,
        target: Entity,
        purpose: ChasePurpose,
        patience: u32,
    ) {
        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);
        let Some((target_piece, target_point)) = self.sighted(target, point, template.perception) else {
            self.animal_state(entity, AnimalState::Assess);
            return;
        };
        if purpose == ChasePurpose::Mate && self.is_killed(target) {
            self.animal_state(entity, AnimalState::Assess);
            return;
        }
        let give_up = decision::give_up_chance(template.awareness, &self.tuning.decision);
        if patience == 0 || self.rng.gen_bool(f64::from(give_up)) {
            tracing::debug!(piece = piece.id.0, target = target_piece.id.0, "gave up chase");
            self.animal_state(entity, AnimalState::Assess);
            return;
        }
        let current = match purpose {
            ChasePurpose::Eat => Some((ActionKind::Eat, target)),
            ChasePurpose::Mate => Some((ActionKind::Mate, target)),
            ChasePurpose::Defend => None,
        };
        if purpose != ChasePurpose::Defend && self.reconsider(entity, piece, current) {
            return;
        }

        if point.distance(&target_point) <= template.reach {
            let next = match purpose {
                ChasePurpose::Eat if is_creature(target_piece.category) && !self.is_killed(target) => {
                    AnimalState::Attack { target, cooldown: 0 }
                }
                ChasePurpose::Eat => AnimalState::Eat { target },
                ChasePurpose::Mate => AnimalState::Mate {
                    partner: target,
                    ticks_left: MATE_TICKS,
                },
                ChasePurpose::Defend => AnimalState::Attack { target, cooldown: 0 },
            };
            self.animal_state(entity, next);
            return;
        }

        let speed = self.running_speed(entity);
        self.step_towards(entity, point, target_point, speed);
        let cost = self.tuning.energy.run_cost;
        if !self.exert(entity, cost) {
            return;
        }
        self.animal_state(
            entity,
            AnimalState::Chase {
                target,
                purpose,
                patience: patience - 1,
            },
        );
    }

    fn attack(&mut self, entity: Entity, piece: Piece, point: Point, target: Entity, cooldown: u16) {
        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);
        let Some((target_piece, target_point)) = self.sighted(target, point, template.perception) else {
            self.animal_state(entity, AnimalState::Assess);
            return;
        };
        let eats_target = templates.eats(piece.kind, target_piece.kind);
        if self.is_killed(target) {
            let next = if eats_target {
                AnimalState::Eat { target }
            } else {
                AnimalState::Assess
            };
            self.animal_state(entity, next);
            return;
        }
        if point.distance(&target_point) > template.reach {
            let purpose = if eats_target {
                ChasePurpose::Eat
            } else {
                ChasePurpose::Defend
            };
            let patience = decision::patience(template.awareness, &self.tuning.decision);
            self.animal_state(
                entity,
                AnimalState::Chase {
                    target,
                    purpose,
                    patience,
                },
            );
            return;
        }
        if cooldown > 0 {
            self.animal_state(
                entity,
                AnimalState::Attack {
                    target,
                    cooldown: cooldown - 1,
                },
            );
            return;
        }

        match target_piece.category {
            category if is_creature(category) => {}
            other => {
                tracing::error!(piece = piece.id.0, target = target_piece.id.0, category = ?other, "attack on a piece that cannot fight");
                panic!(
                    "piece {} attacked piece {} of category {:?}, which cannot be attacked",
                    piece.id.0, target_piece.id.0, other
                );
            }
        }

        let strength = self.get::<Vitals>(entity).map_or(1.0, |v| v.strength);
        let killed = self.apply_damage(target, template.damage * strength);
        self.add_impulse(target, point.direction_to(&target_point) * (strength * KNOCKBACK), false);
        tracing::debug!(piece = piece.id.0, target = target_piece.id.0, killed, "attack");
        let cost = self.tuning.energy.attack_cost;
        if !self.exert(entity, cost) {
            return;
        }

        if !killed {
            self.provoke(target, target_piece, entity);
        }
        let next = match (killed, eats_target) {
            (true, true) => AnimalState::Eat { target },
            (true, false) => AnimalState::Assess,
            (false, _) => AnimalState::Attack {
                target,
                cooldown: ATTACK_COOLDOWN,
            },
        };
        self.animal_state(entity, next);
    }

    /// A struck animal calls its kin if it is social, otherwise runs.
    fn provoke(&mut self, victim: Entity, victim_piece: Piece, attacker: Entity) {
        if victim_piece.category != Category::Animal || self.is_killed(victim) {
            return;
        }
        let already_reacting = match self.behavior(victim) {
            Some(Behavior::Animal(state)) => matches!(
                state,
                AnimalState::Attack { .. } | AnimalState::CallForHelp { .. } | AnimalState::FleeToWater { .. }
            ),
            _ => true,
        };
        if already_reacting {
            return;
        }
        let next = if self.templates.get(victim_piece.kind).social {
            AnimalState::CallForHelp { threat: attacker }
        } else {
            AnimalState::Flee {
                threat: attacker,
                ticks_left: FLEE_TICKS,
            }
        };
        self.animal_state(victim, next);
    }

    fn eat(&mut self, entity: Entity, piece: Piece, point: Point, target: Entity) {
        let templates = Arc::clone(&self.templates);
        let template = templates.get(piece.kind);
        let Some((target_piece, target_point)) = self.sighted(target, point, template.perception) else {
            self.animal_state(entity, AnimalState::Assess);
            return;
        };
        if point.distance(&target_point) > template.reach {
            let patience = decision::patience(template.awareness, &self.tuning.decision);
            self.animal_state(
                entity,
                AnimalState::Chase {
                    target,
                    purpose: ChasePurpose::Eat,
                    patience,
                },
            );
            return;
        }

        let eaten = match target_piece.category {
            Category::Plant if !self.is_killed(target) => {
                let gone = match self.world.get::<&mut Vitals>(target) {
                    Ok(mut vitals) => vitals.damage(BITE),
                    Err(_) => true,
                };
                if gone {
                    self.destroy(target);
                } else {
                    self.wake(target);
                }
                BITE
            }
            Category::Item => {
                self.destroy(target);
                BITE
            }
            Category::Animal if self.is_killed(target) => {
                let gone = match self.world.get::<&mut Vitals>(target) {
                    Ok(mut vitals) => {
                        vitals.mass -= BITE;
                        vitals.mass <= 0.0
                    }
                    Err(_) => true,
                };
                if gone {
                    self.destroy(target);
                }
                BITE
            }
            Category::Animal | Category::Player if !self.is_killed(target) => {
                self.animal_state(entity, AnimalState::Attack { target, cooldown: 0 });
                return;
            }
            _ => {
                self.animal_state(entity, AnimalState::Assess);
                return;
            }
        };

        let tuning = Arc::clone(&self.tuning);
        let energy = eaten * templates.get(target_piece.kind).nutrition * tuning.energy.food_energy;
        let full = match self.world.get::<&mut Vitals>(entity) {
            Ok(mut vitals) => {
                vitals.acquire(energy, template.digestion, &tuning.energy);
                vitals.hunger() <= 0.0
            }
            Err(_) => true,
        };
        tracing::trace!(piece = piece.id.0, food = target_piece.id.0, energy, "ate");
        if full || !self.world.contains(target) {
            self.animal_state(entity, AnimalState::Assess);
        }
    }

    fn mate(&mut self, entity: Entity, piece: Piece, point: Point, partner: Entity, ticks_left: u16) {
        let reach = self.templates.get(piece.kind).reach;
        let close = self
            .locate(partner)
            .is_some_and(|(_, p)| p.distance(&point) <= reach * 2.0)
            && !self.is_killed(partner);
        if !close {
            self.animal_state(entity, AnimalState::Assess);
            return;
        }
        let next = if ticks_left == 0 {
            let gestation = self.templates.get(piece.kind).gestation_ticks;
            AnimalState::GiveBirth {
                ticks_left: u16::try_from(gestation).unwrap_or(u16::MAX),
            }
        } else {
            AnimalState::Mate {
                partner,
                ticks_left: ticks_left - 1,
            }
        };
        self.animal_state(entity, next);
    }

    fn give_birth(&mut self, entity: Entity, piece: Piece, point: Point, ticks_left: u16) {
        if ticks_left > 0 {
            self.animal_state(
                entity,
                AnimalState::GiveBirth {
                    ticks_left: ticks_left - 1,
                },
            );
            return;
        }
        if let Some(spot) = self.free_spot_near(point, 3) {
            let child = self.spawn(piece.kind, spot);
            if let Some(child_piece) = self.piece(child) {
                tracing::info!(piece = child_piece.id.0, parent = piece.id.0, kind = %self.templates.name_of(piece.kind), "born");
                self.log.push(WorldEvent::Born {
                    id: child_piece.id,
                    parent: piece.id,
                });
            }
            let cost = self.get::<Vitals>(entity).map_or(0.0, |v| v.max_fed * BIRTH_COST);
            if !self.exert(entity, cost) {
                return;
            }
        }
        self.animal_state(entity, AnimalState::Assess);
    }

    fn flee(&mut self, entity: Entity, piece: Piece, point: Point, threat: Entity, ticks_left: u16) {
        let perception = self.templates.get(piece.kind).perception;
        let Some((_, threat_point)) = self.sighted(threat, point, perception) else {
            self.animal_state(entity, AnimalState::Assess);
            return;
        };
        if ticks_left == 0 {
            self.animal_state(entity, AnimalState::Assess);
            return;
        }

        let mut away = threat_point.direction_to(&point);
        if away == Vec2::ZERO {
            away = self.random_heading();
        }
        let speed = self.running_speed(entity);
        let escapes = [
            away,
            Vec2::new(-away.y, away.x).normalize() + away,
            Vec2::new(away.y, -away.x).normalize() + away,
            Vec2::new(-away.y, away.x),
            Vec2::new(away.y, -away.x),
        ];
        for direction in escapes {
            let step = direction.normalize() * speed;
            if self.try_move(entity, step.x.round() as i32, step.y.round() as i32) {
                break;
            }
        }
        let cost = self.tuning.energy.run_cost;
        if !self.exert(entity, cost) {
            return;
        }
        self.animal_state(
            entity,
            AnimalState::Flee {
                threat,
                ticks_left: ticks_left - 1,
            },
        );
    }

    fn flee_to_water(&mut self, entity: Entity, piece: Piece, point: Point, water: Point) {
        if self.heat(entity).unwrap_or(0.0) <= 0.0 {
            self.animal_state(entity, AnimalState::Rest { ticks_left: REST_TICKS });
            return;
        }
        let speed = self.running_speed(entity);
        self.step_towards(entity, point, water, speed);
        let cost = self.tuning.energy.run_cost;
        if !self.exert(entity, cost) {
            return;
        }
        let cooled = self.heat(entity).unwrap_or(0.0) <= 0.0;
        let in_water = self.locate(entity).is_some_and(|(_, p)| self.terrain.is_water(p));
        if cooled || in_water {
            tracing::debug!(piece = piece.id.0, "reached water");
            self.animal_state(entity, AnimalState::Rest { ticks_left: REST_TICKS });
        }
    }

    fn call_for_help(&mut self, entity: Entity, threat: Entity) {
        self.scheduler.schedule(
            self.tick,
            CALL_DELAY,
            entity,
            DelayedEvent::Reinforce { threat },
        );
        self.animal_state(
            entity,
            AnimalState::Flee {
                threat,
                ticks_left: FLEE_TICKS,
            },
        );
    }

    /// Send same-kind animals near `caller` after `threat`.
    pub(crate) fn reinforce(&mut self, caller: Entity, threat: Entity) {
        let Some((caller_piece, point)) = self.locate(caller) else {
            return;
        };
        let Some((threat_piece, _)) = self.locate(threat) else {
            return;
        };
        if !is_creature(threat_piece.category) || self.is_killed(threat) {
            return;
        }
        let template = self.templates.get(caller_piece.kind);
        let patience = decision::patience(template.awareness, &self.tuning.decision);
        let helpers: Vec<Entity> = self
            .grid
            .within(point, template.perception, CategorySet::of(&[Category::Animal]))
            .into_iter()
            .filter(|n| n.entity != caller && n.entity != threat)
            .filter_map(|n| {
                let piece = self.get::<Piece>(n.entity)?;
                let free = !self.is_killed(n.entity)
                    && !self.behavior(n.entity).is_some_and(|b| b.is_fleeing());
                (piece.kind == caller_piece.kind && free).then_some(n.entity)
            })
            .collect();

        tracing::debug!(piece = caller_piece.id.0, helpers = helpers.len(), "reinforcements");
        for helper in helpers {
            self.animal_state(
                helper,
                AnimalState::Chase {
                    target: threat,
                    purpose: ChasePurpose::Defend,
                    patience,
                },
            );
            self.wake(helper);
        }
    }

    /// A target that is on the board and within `range` of `from`.
    fn sighted(&self, target: Entity, from: Point, range: f32) -> Option<(Piece, Point)> {
        let (piece, point) = self.locate(target)?;
        (point.distance(&from) <= range).then_some((piece, point))
    }

    fn walking_speed(&self, entity: Entity) -> f32 {
        self.get::<Vitals>(entity).map_or(1.0, |v| (v.speed * 0.5).max(1.0))
    }

    fn running_speed(&self, entity: Entity) -> f32 {
        self.get::<Vitals>(entity).map_or(1.0, |v| v.speed.max(1.0))
    }

    /// Move towards `to`, sliding along one axis when the direct step is blocked.
    fn step_towards(&mut self, entity: Entity, from: Point, to: Point, speed: f32) -> bool {
        let (dx, dy) = from.step_towards(&to, speed);
        self.try_move(entity, dx, dy) || self.try_move(entity, dx, 0) || self.try_move(entity, 0, dy)
    }

    /// Open, dry cell within `radius` of `point`.
    fn free_spot_near(&mut self, point: Point, radius: i32) -> Option<Point> {
        for _ in 0..8 {
            let spot = point.offset(
                self.rng.gen_range(-radius..=radius),
                self.rng.gen_range(-radius..=radius),
            );
            if !self.terrain.is_blocked(spot) && !self.terrain.is_water(spot) {
                return Some(spot);
            }
        }
        None
    }
}

fn is_creature(category: Category) -> bool {
    matches!(category, Category::Animal | Category::Player)
}
