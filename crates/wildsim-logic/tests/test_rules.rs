//! Integration tests for the rule modules working together.
//!
//! Exercises: impulse settling under bounces, heat episodes from ignition to
//! burn-out, decision ordering, and the energy chain over a lifetime.
//!
//! All tests are pure logic - no world, no spatial index, no scheduler.

use wildsim_logic::decision::{choose, eat_priority, flee_priority, mate_priority, ActionKind, Choice};
use wildsim_logic::heat::{self, HeatChange, HeatContext};
use wildsim_logic::impulse::{self, PassiveMotion, PassiveStep};
use wildsim_logic::throttle::{group_runs, should_process, TickGroup};
use wildsim_logic::vitals::Vitals;
use wildsim_logic::Tuning;

// ── Helpers ────────────────────────────────────────────────────────────

/// Walls every `period` cells along x; returns whether the move is allowed.
fn walled(position: &mut i32, period: i32, dx: i32) -> bool {
    let next = *position + dx;
    if next.rem_euclid(period) == 0 {
        false
    } else {
        *position = next;
        true
    }
}

fn rabbit() -> Vitals {
    Vitals::new(4.0, 30.0, 10.0, 20.0)
}

// ── Passive movement ───────────────────────────────────────────────────

#[test]
fn impulses_settle_within_bound_even_when_bouncing() {
    let tuning = Tuning::default();
    for (index, start) in [1.0_f32, 4.5, 12.0, 40.0, -25.0].into_iter().enumerate() {
        let mut motion = PassiveMotion::new(start, start * 0.5);
        let bound = impulse::settle_bound(motion.magnitude(), &tuning.passive);
        let mut position = 1;
        let mut ticks = 0;
        loop {
            let outcome = impulse::step(&mut motion, 5, ticks as u64, &tuning.passive, |dx, _| {
                walled(&mut position, 7, dx)
            });
            if outcome == PassiveStep::Settled {
                break;
            }
            ticks += 1;
            assert!(ticks <= bound, "impulse {index} did not settle within {bound} ticks");
        }
        assert!(!motion.is_active());
    }
}

// ── Heat episodes ──────────────────────────────────────────────────────

#[test]
fn heat_episode_from_ignition_to_quench() {
    let tuning = Tuning::default();
    let ctx = HeatContext::dry(1.0);

    let first = heat::resolve(0.0, 0.3, &ctx, &tuning.heat);
    assert!(first.starts_episode());
    assert!(!first.ignited(&tuning.heat));

    let level = first.current().unwrap();
    let second = heat::resolve(level, 0.3, &ctx, &tuning.heat);
    assert!(!second.starts_episode());
    assert!(second.ignited(&tuning.heat));

    let submerged = HeatContext {
        submerged: true,
        ..ctx
    };
    let quench = heat::resolve(second.current().unwrap(), 0.5, &submerged, &tuning.heat);
    assert!(matches!(quench, HeatChange::Quenched { .. }));
    assert!(quench.extinguished(&tuning.heat));
    assert_eq!(quench.current(), Some(0.0));
}

#[test]
fn contagion_never_heats_fireproof_pieces() {
    let tuning = Tuning::default();
    let radius = heat::contagion_radius(20.0, &tuning.heat);
    let mut previous = f32::MAX;
    for step in 0..=10 {
        let distance = radius * step as f32 / 10.0;
        let delta = heat::contagion_delta(distance, radius, 1.0, &tuning.heat);
        assert!(delta <= previous);
        previous = delta;
        assert_eq!(heat::contagion_delta(distance, radius, 0.0, &tuning.heat), 0.0);
    }
    assert_eq!(previous, 0.0);
}

#[test]
fn overload_shortens_burn_episodes() {
    let tuning = Tuning::default();
    let roll = tuning.heat.extinguish_max_ticks;
    let calm = heat::extinguish_delay(roll, true, 0, &tuning.heat);
    let loaded = heat::extinguish_delay(roll, true, tuning.heat.overload_heated_count + 1, &tuning.heat);
    let loose = heat::extinguish_delay(roll, false, 0, &tuning.heat);
    assert!(loaded < calm);
    assert!(loose < calm);
}

// ── Decisions ──────────────────────────────────────────────────────────

#[test]
fn close_enemy_beats_hunger_but_not_starving_from_afar() {
    let tuning = Tuning::default();
    let perception = 300.0;

    let close = flee_priority(30.0, perception, &tuning.decision).unwrap();
    let hungry = eat_priority(0.8, 1.0, false, &tuning.decision);
    let starving = eat_priority(0.8, 0.1, false, &tuning.decision);
    let far = flee_priority(290.0, perception, &tuning.decision).unwrap();

    let choices = [
        Choice::new(ActionKind::Flee, Some(1u32), close),
        Choice::new(ActionKind::Eat, Some(2u32), hungry),
    ];
    assert_eq!(choose(&choices).unwrap().action, ActionKind::Flee);

    let choices = [
        Choice::new(ActionKind::Flee, Some(1u32), far),
        Choice::new(ActionKind::Eat, Some(2u32), starving),
    ];
    assert_eq!(choose(&choices).unwrap().action, ActionKind::Eat);
}

#[test]
fn choice_is_stable_across_repeated_evaluation() {
    let tuning = Tuning::default();
    let mate = mate_priority(1.0, &tuning.decision).unwrap();
    let choices = [
        Choice::new(ActionKind::Mate, Some(5u32), mate),
        Choice::new(ActionKind::Mate, Some(3u32), mate),
        Choice::new(ActionKind::Eat, None, 10.0),
    ];
    let first = choose(&choices).unwrap();
    for _ in 0..20 {
        assert_eq!(choose(&choices), Some(first));
    }
    assert_eq!(first.target, Some(5));
}

// ── Energy over a lifetime ─────────────────────────────────────────────

#[test]
fn starving_drains_stamina_then_fed_then_health() {
    let tuning = Tuning::default();
    let mut vitals = rabbit();
    let mut ticks = 0;
    while !vitals.is_depleted() {
        vitals.expend(tuning.energy.run_cost, &tuning.energy);
        assert!(vitals.hit_points() >= 0.0 && vitals.hit_points() <= vitals.max_hit_points);
        if vitals.hit_points() < vitals.max_hit_points {
            assert_eq!(vitals.stamina, 0.0);
            assert_eq!(vitals.fed, 0.0);
        }
        ticks += 1;
        assert!(ticks < 1_000_000);
    }
}

#[test]
fn old_age_costs_efficiency() {
    let tuning = Tuning::default();
    let mut vitals = rabbit();
    vitals.max_age = 1_000;
    let young = vitals.efficiency(&tuning.energy);
    vitals.grow_older(900);
    assert!(vitals.efficiency(&tuning.energy) < young);
    assert!(vitals.grow_older(100));
}

// ── Throttling ─────────────────────────────────────────────────────────

#[test]
fn strided_kind_covers_every_slot() {
    let mut tuning = Tuning::default();
    tuning.dispatch.kind_load_threshold = 10;
    let population = 35;
    for slot in 0..population as u64 {
        let passes = (0..4).filter(|pass| should_process(population, slot, *pass, &tuning.dispatch)).count();
        assert_eq!(passes, 1, "slot {slot} should run exactly once every four passes");
    }
    assert!(group_runs(TickGroup::General, 3, population, &tuning.dispatch));
}
