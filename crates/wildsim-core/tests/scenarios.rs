//! Cross-system scenarios for the survival engine.
//!
//! Each test drives a full `SimulationEngine` through `update()` and checks
//! behavior that only emerges when the dispatcher, heat, decisions and
//! lifecycle work together.

use std::collections::HashMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use wildsim_core::prelude::*;

// ── Helpers ────────────────────────────────────────────────────────────

fn engine_on(terrain: Terrain, seed: u64) -> SimulationEngine {
    SimulationEngine::new(TemplateRegistry::standard(), Tuning::default(), terrain, seed).unwrap()
}

/// Run until `done` holds or `limit` ticks pass, collecting every event.
fn run_until(
    engine: &mut SimulationEngine,
    limit: usize,
    mut done: impl FnMut(&SimulationEngine) -> bool,
) -> Vec<WorldEvent> {
    let mut events = Vec::new();
    for _ in 0..limit {
        engine.update();
        events.extend_from_slice(engine.recent_events());
        if done(engine) {
            break;
        }
    }
    events
}

fn count_for(events: &[WorldEvent], id: PieceId, matches: impl Fn(&WorldEvent) -> bool) -> usize {
    events.iter().filter(|e| e.piece() == id && matches(e)).count()
}

/// Meadow with a pond and a rock wall, scattered with every living kind.
fn meadow(seed: u64) -> SimulationEngine {
    let terrain = Terrain::open(600, 600)
        .with_water(Rect::new(250, 250, 80, 60))
        .with_blocking(Rect::new(0, 450, 200, 20));
    let mut engine = engine_on(terrain, seed);
    let mut rng = SmallRng::seed_from_u64(seed);

    let population = [
        ("rabbit", 20),
        ("deer", 6),
        ("wolf", 3),
        ("grass", 60),
        ("bush", 15),
        ("tree", 8),
        ("campfire", 2),
        ("hut", 2),
    ];
    for (name, count) in population {
        for _ in 0..count {
            let point = Point::new(rng.gen_range(0..600), rng.gen_range(0..600));
            if engine.terrain().is_water(point) || engine.terrain().is_blocked(point) {
                continue;
            }
            engine.spawn_named(name, point);
        }
    }
    engine
}

// ── Decisions ──────────────────────────────────────────────────────────

#[test]
fn hungry_animal_chases_the_only_food_in_sight() {
    let mut engine = engine_on(Terrain::default(), 1);
    let rabbit = engine.spawn_named("rabbit", Point::new(300, 300)).unwrap();
    let grass = engine.spawn_named("grass", Point::new(350, 300)).unwrap();
    // hunger 0.8 gives an eat priority of 1.2 with the default weight
    engine.modify_vitals(rabbit, |v| v.fed = v.max_fed * 0.2);
    assert_eq!(engine.state(rabbit), Some(StateTag::Assess));

    engine.update();
    match engine.behavior(rabbit) {
        Some(Behavior::Animal(AnimalState::Chase { target, purpose, .. })) => {
            assert_eq!(target, grass);
            assert_eq!(purpose, ChasePurpose::Eat);
        }
        other => panic!("expected a chase after grass, got {other:?}"),
    }
}

// ── Heat ───────────────────────────────────────────────────────────────

#[test]
fn burning_animal_is_quenched_the_tick_it_enters_water() {
    let terrain = Terrain::open(400, 400).with_water(Rect::new(110, 0, 40, 400));
    let mut engine = engine_on(terrain, 2);
    let rabbit = engine.spawn_named("rabbit", Point::new(100, 100)).unwrap();
    engine.change_heat(rabbit, 0.6);
    assert_eq!(engine.heat(rabbit), Some(0.6));
    assert_eq!(engine.state(rabbit), Some(StateTag::FleeToWater));

    let mut entered = false;
    for _ in 0..20 {
        engine.update();
        let point = engine.placement(rabbit).unwrap().point;
        if engine.terrain().is_water(point) {
            assert_eq!(engine.heat(rabbit), Some(0.0));
            entered = true;
            break;
        }
    }
    assert!(entered, "rabbit never reached the water");

    engine.update();
    assert_ne!(engine.state(rabbit), Some(StateTag::FleeToWater));
}

#[test]
fn burn_damage_destroys_exactly_once() {
    let mut engine = engine_on(Terrain::default(), 3);
    let wood = engine.spawn_named("wood", Point::new(500, 500)).unwrap();
    engine.modify_vitals(wood, |v| {
        v.max_hit_points = 100.0;
        v.set_hit_points(5.0);
    });
    engine.change_heat(wood, 1.0);
    let id = engine.piece(wood).unwrap().id;

    let events = run_until(&mut engine, 30, |_| false);
    assert_eq!(count_for(&events, id, |e| matches!(e, WorldEvent::Destroyed { .. })), 1);
    assert_eq!(count_for(&events, id, |e| matches!(e, WorldEvent::Killed { .. })), 0);
    assert!(engine.entity_of(id).is_none());
}

#[test]
fn burning_player_is_killed_not_destroyed() {
    let mut engine = engine_on(Terrain::default(), 3);
    let player = engine.spawn_named("player", Point::new(500, 500)).unwrap();
    engine.modify_vitals(player, |v| v.set_hit_points(5.0));
    engine.change_heat(player, 1.0);
    let id = engine.piece(player).unwrap().id;

    let events = run_until(&mut engine, 30, |_| false);
    assert_eq!(count_for(&events, id, |e| matches!(e, WorldEvent::Killed { .. })), 1);
    assert_eq!(count_for(&events, id, |e| matches!(e, WorldEvent::PlayerKilled { .. })), 1);
    assert_eq!(count_for(&events, id, |e| matches!(e, WorldEvent::Destroyed { .. })), 0);
    assert_eq!(engine.state(player), Some(StateTag::Dead));
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn default_record_carries_identity_only_and_restores_identically() {
    let mut engine = engine_on(Terrain::default(), 4);
    let deer = engine.spawn_named("deer", Point::new(200, 200)).unwrap();
    let record = engine.record_of(deer).unwrap();
    assert!(record.is_default());
    assert_eq!(record.kind, "deer");

    let bytes = bincode::serialize(&record).unwrap();
    let decoded: PieceRecord = bincode::deserialize(&bytes).unwrap();

    let mut restored = engine_on(Terrain::default(), 4);
    let copy = restored
        .restore_record(&decoded, Placement::at(Point::new(200, 200)))
        .unwrap();

    assert_eq!(restored.vitals(copy), engine.vitals(deer));
    assert_eq!(restored.heat(copy), engine.heat(deer));
    assert_eq!(restored.inventory(copy), engine.inventory(deer));
    assert_eq!(restored.snapshot().pieces, engine.snapshot().pieces);
}

#[test]
fn saved_meadow_resumes_with_the_same_pieces() {
    let mut engine = meadow(7);
    for _ in 0..50 {
        engine.update();
    }
    let mut buffer = Vec::new();
    engine.save(&mut buffer).unwrap();

    let mut loaded = engine_on(Terrain::default(), 99);
    loaded.load(buffer.as_slice()).unwrap();
    assert_eq!(loaded.tick(), engine.tick());
    assert_eq!(loaded.piece_count(), engine.piece_count());

    let before = engine.snapshot();
    let after = loaded.snapshot();
    for (a, b) in before.pieces.iter().zip(&after.pieces) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.point, b.point);
        assert_eq!(a.hit_points, b.hit_points);
        assert_eq!(a.heat, b.heat);
    }

    for _ in 0..50 {
        loaded.update();
    }
}

// ── Invariants ─────────────────────────────────────────────────────────

#[test]
fn vitals_and_heat_stay_in_bounds_over_a_long_run() {
    for seed in [11, 12] {
        let mut engine = meadow(seed);
        let mut destroyed: HashMap<PieceId, usize> = HashMap::new();

        for tick in 0..600 {
            if tick == 200 {
                engine.set_raining(true);
            }
            if tick == 350 {
                engine.set_raining(false);
            }
            engine.update();

            for event in engine.recent_events() {
                if let WorldEvent::Destroyed { id } = event {
                    *destroyed.entry(*id).or_default() += 1;
                }
            }

            let terrain = engine.terrain().clone();
            for piece in engine.snapshot().pieces {
                assert!(
                    piece.hit_points >= 0.0 && piece.hit_points <= piece.max_hit_points,
                    "seed {seed} tick {tick}: piece {:?} has {} of {} hit points",
                    piece.id,
                    piece.hit_points,
                    piece.max_hit_points
                );
                assert!((0.0..=1.0).contains(&piece.heat), "piece {:?} heat {}", piece.id, piece.heat);
                if piece.in_world && terrain.is_water(piece.point) {
                    assert_eq!(piece.heat, 0.0, "piece {:?} is hot under water", piece.id);
                }
            }
        }
        assert!(destroyed.values().all(|count| *count == 1));
    }
}
