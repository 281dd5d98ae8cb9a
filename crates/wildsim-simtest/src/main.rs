//! WildSim Headless Simulation Harness
//!
//! Builds a seeded meadow, runs it for a number of ticks and checks the
//! world invariants after every tick. Runs entirely in-process: no
//! rendering, no input devices.
//!
//! Usage:
//!   cargo run -p wildsim-simtest
//!   cargo run -p wildsim-simtest -- --ticks 5000 --seed 7 --verbose
//!   cargo run -p wildsim-simtest -- --tuning tuning.toml --snapshot world.json

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use wildsim_core::prelude::*;
use wildsim_logic::throttle::DispatchStats;
use wildsim_logic::tuning::DEFAULT_TUNING_PATH;
use wildsim_logic::TuningError;

/// Headless survival simulation with invariant checks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ticks to simulate
    #[arg(long, default_value_t = 2_000)]
    ticks: u64,

    /// World seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// TOML file overriding tuning constants. Falls back to `tuning.toml`
    /// in the working directory when present.
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Animals to scatter over the meadow
    #[arg(long, default_value_t = 60)]
    animals: usize,

    /// Plants to scatter over the meadow
    #[arg(long, default_value_t = 300)]
    plants: usize,

    /// Campfires to light
    #[arg(long, default_value_t = 3)]
    fires: usize,

    /// Write the final world snapshot as JSON
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print every check and enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);
    println!("=== WildSim Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Tuning
    let tuning = match load_tuning(&args, &mut results) {
        Some(tuning) => tuning,
        None => {
            report(&results, args.verbose);
            std::process::exit(1);
        }
    };

    // 2. Kind templates
    results.extend(validate_templates());

    if let Err(e) = run_scenarios(&args, &tuning, &mut results) {
        results.push(TestResult::new("engine_setup", false, e.to_string()));
    }

    if !report(&results, args.verbose) {
        std::process::exit(1);
    }
}

fn run_scenarios(args: &Args, tuning: &Tuning, results: &mut Vec<TestResult>) -> Result<(), TuningError> {
    // 3. Long meadow run with per-tick invariants
    let (engine, checks) = run_meadow(args, tuning)?;
    results.extend(checks);

    // 4. Fire spreading through dry grass
    results.extend(validate_fire_spread(tuning)?);

    // 5. Save/load round trip of the finished meadow
    results.extend(validate_save_load(&engine, tuning)?);

    // 6. Same seed, same world
    results.extend(validate_determinism(args, tuning)?);

    if let Some(path) = &args.snapshot {
        results.push(write_snapshot(&engine, path));
    }
    Ok(())
}

/// Print the summary; returns true when every check passed.
fn report(results: &[TestResult], verbose: bool) -> bool {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!("\n=== RESULT: {}/{} passed, {} failed ===", passed, total, failed);
    failed == 0
}

// ── Scenario construction ───────────────────────────────────────────────

fn meadow_terrain() -> Terrain {
    Terrain::open(1_200, 1_200)
        .with_water(Rect::new(500, 500, 160, 120))
        .with_water(Rect::new(0, 1_000, 1_200, 60))
        .with_blocking(Rect::new(200, 200, 20, 300))
}

fn open_spot(engine: &SimulationEngine, rng: &mut SmallRng) -> Point {
    let terrain = engine.terrain();
    loop {
        let point = Point::new(rng.gen_range(0..terrain.width), rng.gen_range(0..terrain.height));
        if !terrain.is_water(point) && !terrain.is_blocked(point) {
            return point;
        }
    }
}

fn build_meadow(args: &Args, tuning: &Tuning, seed: u64) -> Result<SimulationEngine, TuningError> {
    let mut engine = SimulationEngine::new(TemplateRegistry::standard(), tuning.clone(), meadow_terrain(), seed)?;
    let mut rng = SmallRng::seed_from_u64(seed ^ 0x5EED);

    let animals = ["rabbit", "rabbit", "rabbit", "deer", "deer", "wolf"];
    let plants = ["grass", "grass", "grass", "bush", "tree"];
    for i in 0..args.animals {
        let point = open_spot(&engine, &mut rng);
        engine.spawn_named(animals[i % animals.len()], point);
    }
    for i in 0..args.plants {
        let point = open_spot(&engine, &mut rng);
        engine.spawn_named(plants[i % plants.len()], point);
    }
    for _ in 0..args.fires {
        let point = open_spot(&engine, &mut rng);
        engine.spawn_named("campfire", point);
    }
    for _ in 0..2 {
        let point = open_spot(&engine, &mut rng);
        engine.spawn_named("hut", point);
    }
    let point = open_spot(&engine, &mut rng);
    engine.spawn_named("player", point);
    tracing::info!(seed, pieces = engine.piece_count(), "meadow built");
    Ok(engine)
}

// ── 1. Tuning ───────────────────────────────────────────────────────────

fn load_tuning(args: &Args, results: &mut Vec<TestResult>) -> Option<Tuning> {
    println!("--- Tuning ---");
    let defaults = Tuning::default();
    results.push(TestResult::new(
        "tuning_defaults_valid",
        defaults.validate().is_ok(),
        "built-in tuning passes validation",
    ));

    let fallback = PathBuf::from(DEFAULT_TUNING_PATH);
    let path = match &args.tuning {
        Some(path) => path,
        None if fallback.is_file() => &fallback,
        None => return Some(defaults),
    };
    match Tuning::load(path) {
        Ok(tuning) => {
            results.push(TestResult::new(
                "tuning_file",
                true,
                format!("loaded {}", path.display()),
            ));
            Some(tuning)
        }
        Err(e) => {
            results.push(TestResult::new("tuning_file", false, e.to_string()));
            None
        }
    }
}

// ── 2. Templates ────────────────────────────────────────────────────────

fn validate_templates() -> Vec<TestResult> {
    println!("--- Kind Templates ---");
    let mut results = Vec::new();
    let templates = TemplateRegistry::standard();

    let expected = [
        "rabbit", "deer", "wolf", "grass", "bush", "tree", "campfire", "flame", "hut", "chest", "player",
        "spear",
    ];
    let missing: Vec<_> = expected.iter().filter(|name| templates.id_of(name).is_none()).collect();
    results.push(TestResult::new(
        "templates_standard_kinds",
        missing.is_empty(),
        if missing.is_empty() {
            format!("{} kinds registered", templates.len())
        } else {
            format!("missing kinds: {:?}", missing)
        },
    ));

    let mut engine = SimulationEngine::with_defaults(1);
    let mut failures = Vec::new();
    for (kind, template) in templates.iter() {
        let entity = engine.spawn(kind, Point::new(500, 500));
        let record = engine.record_of(entity);
        if !record.as_ref().is_some_and(|r| r.is_default()) {
            failures.push(template.name.clone());
        }
    }
    results.push(TestResult::new(
        "templates_spawn_default_records",
        failures.is_empty(),
        if failures.is_empty() {
            "every kind spawns with an identity-only record".to_string()
        } else {
            format!("non-default records for {:?}", failures)
        },
    ));

    let animals = templates
        .iter()
        .filter(|(_, t)| t.category == Category::Animal)
        .filter(|(kind, _)| templates.food_of(*kind).is_empty())
        .map(|(_, t)| t.name.clone())
        .collect::<Vec<_>>();
    results.push(TestResult::new(
        "templates_animals_have_food",
        animals.is_empty(),
        if animals.is_empty() {
            "every animal eats something".to_string()
        } else {
            format!("animals with nothing to eat: {:?}", animals)
        },
    ));

    results
}

// ── 3. Meadow run ───────────────────────────────────────────────────────

#[derive(Default)]
struct Violations {
    hit_points: usize,
    heat_range: usize,
    hot_in_water: usize,
    duplicate_kills: usize,
    duplicate_destroys: usize,
    first: Option<String>,
}

impl Violations {
    fn note(&mut self, message: impl FnOnce() -> String) {
        if self.first.is_none() {
            self.first = Some(message());
        }
    }

    fn total(&self) -> usize {
        self.hit_points + self.heat_range + self.hot_in_water + self.duplicate_kills + self.duplicate_destroys
    }
}

fn run_meadow(args: &Args, tuning: &Tuning) -> Result<(SimulationEngine, Vec<TestResult>), TuningError> {
    println!("--- Meadow Run ({} ticks, seed {}) ---", args.ticks, args.seed);
    let mut results = Vec::new();
    let mut engine = build_meadow(args, tuning, args.seed)?;
    let start_pieces = engine.piece_count();

    let mut violations = Violations::default();
    let mut killed: HashMap<PieceId, usize> = HashMap::new();
    let mut destroyed: HashMap<PieceId, usize> = HashMap::new();
    let mut totals = DispatchStats::default();
    let mut events = HashMap::<&'static str, usize>::new();
    let terrain = engine.terrain().clone();

    for tick in 0..args.ticks {
        // a shower every thousand ticks
        engine.set_raining(tick % 1_000 >= 700);
        engine.update();
        totals.merge(engine.last_stats());

        for event in engine.recent_events() {
            let name = match event {
                WorldEvent::Ignited { .. } => "ignited",
                WorldEvent::Extinguished { .. } => "extinguished",
                WorldEvent::Killed { id } => {
                    *killed.entry(*id).or_default() += 1;
                    "killed"
                }
                WorldEvent::Destroyed { id } => {
                    *destroyed.entry(*id).or_default() += 1;
                    "destroyed"
                }
                WorldEvent::Born { .. } => "born",
                WorldEvent::Settled { .. } => "settled",
                WorldEvent::PlayerKilled { .. } => "player_killed",
            };
            *events.entry(name).or_default() += 1;
        }

        for piece in engine.snapshot().pieces {
            if piece.hit_points < 0.0 || piece.hit_points > piece.max_hit_points {
                violations.hit_points += 1;
                violations.note(|| {
                    format!(
                        "tick {}: piece {} has {} of {} hit points",
                        engine.tick(),
                        piece.id.0,
                        piece.hit_points,
                        piece.max_hit_points
                    )
                });
            }
            if !(0.0..=1.0).contains(&piece.heat) {
                violations.heat_range += 1;
                violations.note(|| format!("tick {}: piece {} heat {}", engine.tick(), piece.id.0, piece.heat));
            }
            if piece.in_world && piece.heat > 0.0 && terrain.is_water(piece.point) {
                violations.hot_in_water += 1;
                violations.note(|| format!("tick {}: piece {} is hot under water", engine.tick(), piece.id.0));
            }
        }
    }
    violations.duplicate_kills = killed.values().filter(|n| **n > 1).count();
    violations.duplicate_destroys = destroyed.values().filter(|n| **n > 1).count();

    if args.verbose {
        let mut names: Vec<_> = events.iter().collect();
        names.sort();
        for (name, count) in names {
            println!("  {:>14}: {}", name, count);
        }
        println!(
            "  dispatch: {} processed, {} passive, {} throttled, {} deregistered",
            totals.processed, totals.passive_steps, totals.throttled, totals.deregistered
        );
    }

    results.push(TestResult::new(
        "meadow_hit_points_bounded",
        violations.hit_points == 0,
        format!("{} violations", violations.hit_points),
    ));
    results.push(TestResult::new(
        "meadow_heat_bounded",
        violations.heat_range == 0,
        format!("{} violations", violations.heat_range),
    ));
    results.push(TestResult::new(
        "meadow_water_quenches",
        violations.hot_in_water == 0,
        format!("{} hot pieces under water", violations.hot_in_water),
    ));
    results.push(TestResult::new(
        "meadow_single_kill",
        violations.duplicate_kills == 0,
        format!("{} pieces killed, {} more than once", killed.len(), violations.duplicate_kills),
    ));
    results.push(TestResult::new(
        "meadow_single_destroy",
        violations.duplicate_destroys == 0,
        format!(
            "{} pieces destroyed, {} more than once",
            destroyed.len(),
            violations.duplicate_destroys
        ),
    ));
    results.push(TestResult::new(
        "meadow_dispatch_ran",
        totals.processed > 0,
        format!(
            "{} state machine runs, {} → {} pieces",
            totals.processed,
            start_pieces,
            engine.piece_count()
        ),
    ));
    let last = engine.snapshot();
    let corpses = last
        .pieces
        .iter()
        .filter(|p| p.killed && p.category != Category::Player)
        .count();
    let idle = last.count_in_state(StateTag::Inactive);
    results.push(TestResult::new(
        "meadow_corpses_idle",
        corpses <= idle,
        format!("{} corpses, {} idle pieces", corpses, idle),
    ));
    if let Some(first) = &violations.first {
        results.push(TestResult::new("meadow_first_violation", violations.total() == 0, first.clone()));
    }

    Ok((engine, results))
}

// ── 4. Fire spread ──────────────────────────────────────────────────────

fn validate_fire_spread(tuning: &Tuning) -> Result<Vec<TestResult>, TuningError> {
    println!("--- Fire Spread ---");
    let mut results = Vec::new();
    let mut engine = SimulationEngine::new(
        TemplateRegistry::standard(),
        tuning.clone(),
        Terrain::open(400, 400).with_water(Rect::new(300, 0, 100, 400)),
        3,
    )?;
    engine.spawn_named("campfire", Point::new(100, 200));
    let mut grass = Vec::new();
    for dx in [8, 14, 20] {
        if let Some(entity) = engine.spawn_named("grass", Point::new(100 + dx, 200)) {
            grass.push(entity);
        }
    }
    let far = engine.spawn_named("grass", Point::new(250, 200));
    let soaked = engine.spawn_named("grass", Point::new(350, 200));

    let mut ignitions = 0;
    for _ in 0..200 {
        engine.update();
        ignitions += engine
            .recent_events()
            .iter()
            .filter(|e| matches!(e, WorldEvent::Ignited { .. }))
            .count();
    }

    results.push(TestResult::new(
        "fire_spreads_to_neighbours",
        ignitions > 0,
        format!("{} ignitions near the campfire", ignitions),
    ));
    let far_cold = far.is_some_and(|e| engine.heat(e).map_or(true, |h| h == 0.0));
    results.push(TestResult::new(
        "fire_stays_within_radius",
        far_cold,
        "grass outside the contagion radius stays cold",
    ));
    if let Some(entity) = soaked {
        engine.change_heat(entity, 1.0);
        results.push(TestResult::new(
            "fire_never_lights_under_water",
            engine.heat(entity) == Some(0.0),
            "heat requests under water are quenched",
        ));
    }
    Ok(results)
}

// ── 5. Save / Load ──────────────────────────────────────────────────────

fn validate_save_load(engine: &SimulationEngine, tuning: &Tuning) -> Result<Vec<TestResult>, TuningError> {
    println!("--- Save / Load ---");
    let mut results = Vec::new();

    let mut buffer = Vec::new();
    if let Err(e) = engine.save(&mut buffer) {
        results.push(TestResult::new("save_world", false, e.to_string()));
        return Ok(results);
    }
    results.push(TestResult::new(
        "save_world",
        true,
        format!("{} pieces in {} bytes", engine.piece_count(), buffer.len()),
    ));

    let mut loaded = SimulationEngine::new(TemplateRegistry::standard(), tuning.clone(), Terrain::default(), 0)?;
    if let Err(e) = loaded.load(buffer.as_slice()) {
        results.push(TestResult::new("load_world", false, e.to_string()));
        return Ok(results);
    }

    let before = engine.snapshot();
    let after = loaded.snapshot();
    let mismatched = before
        .pieces
        .iter()
        .zip(&after.pieces)
        .filter(|(a, b)| a.id != b.id || a.kind != b.kind || a.point != b.point || a.hit_points != b.hit_points)
        .count();
    results.push(TestResult::new(
        "load_world",
        before.pieces.len() == after.pieces.len() && mismatched == 0 && before.tick == after.tick,
        format!(
            "{} of {} pieces restored, {} mismatched",
            after.pieces.len(),
            before.pieces.len(),
            mismatched
        ),
    ));

    let defaults = before
        .pieces
        .iter()
        .filter_map(|piece| engine.entity_of(piece.id))
        .filter_map(|entity| engine.record_of(entity))
        .filter(|record| record.is_default())
        .count();
    results.push(TestResult::new(
        "save_sparse_records",
        true,
        format!("{} pieces still at their kind defaults", defaults),
    ));

    for _ in 0..100 {
        loaded.update();
    }
    results.push(TestResult::new(
        "load_resumes",
        loaded.tick() == engine.tick() + 100,
        format!("resumed to tick {}", loaded.tick()),
    ));
    Ok(results)
}

// ── 6. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(args: &Args, tuning: &Tuning) -> Result<Vec<TestResult>, TuningError> {
    println!("--- Determinism ---");
    let ticks = args.ticks.min(300);
    let run = || -> Result<WorldSnapshot, TuningError> {
        let mut engine = build_meadow(args, tuning, args.seed)?;
        for _ in 0..ticks {
            engine.update();
        }
        Ok(engine.snapshot())
    };
    let first = run()?;
    let second = run()?;
    Ok(vec![TestResult::new(
        "same_seed_same_world",
        first == second,
        format!("{} pieces after {} ticks", first.pieces.len(), ticks),
    )])
}

fn write_snapshot(engine: &SimulationEngine, path: &PathBuf) -> TestResult {
    let written = engine
        .snapshot()
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => TestResult::new("snapshot_written", true, format!("{}", path.display())),
        Err(e) => TestResult::new("snapshot_written", false, e),
    }
}
