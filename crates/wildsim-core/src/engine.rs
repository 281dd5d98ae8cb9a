//! Simulation engine - main entry point for running the simulation

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use hecs::{Entity, World};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use wildsim_logic::throttle::{DispatchStats, TickGroup};
use wildsim_logic::{Tuning, TuningError};

use crate::components::*;
use crate::events::{EventLog, WorldEvent};
use crate::scheduler::EventQueue;
use crate::spatial::UniformGrid;
use crate::systems::{PlayerCommand, TickRegistry};
use crate::templates::TemplateRegistry;
use crate::terrain::Terrain;

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing every piece
    pub world: World,
    pub(crate) templates: Arc<TemplateRegistry>,
    pub(crate) tuning: Arc<Tuning>,
    pub(crate) terrain: Terrain,
    pub(crate) grid: UniformGrid,
    pub(crate) scheduler: EventQueue,
    pub(crate) registry: TickRegistry,
    /// Pieces with nonzero heat, in id order
    pub(crate) heated: BTreeMap<PieceId, Entity>,
    pub(crate) ids: HashMap<PieceId, Entity>,
    pub(crate) commands: HashMap<Entity, VecDeque<PlayerCommand>>,
    pub(crate) log: EventLog,
    pub(crate) last_events: EventLog,
    pub(crate) rng: SmallRng,
    pub(crate) seed: u64,
    pub(crate) tick: u64,
    pub(crate) raining: bool,
    pub(crate) next_id: u64,
    pub(crate) stats: DispatchStats,
}

impl SimulationEngine {
    /// Create an empty world. Fails if the tuning does not validate.
    pub fn new(templates: TemplateRegistry, tuning: Tuning, terrain: Terrain, seed: u64) -> Result<Self, TuningError> {
        tuning.validate()?;
        Ok(Self::assemble(templates, tuning, terrain, seed))
    }

    /// Standard templates, default tuning and an open board.
    pub fn with_defaults(seed: u64) -> Self {
        Self::assemble(TemplateRegistry::standard(), Tuning::default(), Terrain::default(), seed)
    }

    fn assemble(templates: TemplateRegistry, tuning: Tuning, terrain: Terrain, seed: u64) -> Self {
        Self {
            world: World::new(),
            templates: Arc::new(templates),
            tuning: Arc::new(tuning),
            terrain,
            grid: UniformGrid::default(),
            scheduler: EventQueue::new(),
            registry: TickRegistry::default(),
            heated: BTreeMap::new(),
            ids: HashMap::new(),
            commands: HashMap::new(),
            log: EventLog::default(),
            last_events: EventLog::default(),
            rng: SmallRng::seed_from_u64(seed),
            seed,
            tick: 0,
            raining: false,
            next_id: 1,
            stats: DispatchStats::default(),
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// Due delayed events fire first, then heat propagates, then each tick
    /// group that is due this frame is dispatched.
    pub fn update(&mut self) -> DispatchStats {
        self.tick += 1;

        for scheduled in self.scheduler.drain_due(self.tick) {
            self.fire_delayed(scheduled);
        }

        self.heat_system();

        let mut stats = DispatchStats::default();
        for group in TickGroup::ALL {
            stats.merge(&self.dispatch_group(group));
        }
        self.stats = stats.clone();

        self.last_events = std::mem::take(&mut self.log);
        stats
    }

    /// Create a piece of `kind` at `point` with its template defaults.
    pub fn spawn(&mut self, kind: KindId, point: Point) -> Entity {
        let id = PieceId(self.next_id);
        self.next_id += 1;
        self.spawn_with_id(id, kind, point)
    }

    /// Spawn by kind name.
    pub fn spawn_named(&mut self, name: &str, point: Point) -> Option<Entity> {
        let kind = self.templates.id_of(name)?;
        Some(self.spawn(kind, point))
    }

    pub(crate) fn spawn_with_id(&mut self, id: PieceId, kind: KindId, point: Point) -> Entity {
        let templates = Arc::clone(&self.templates);
        let template = templates.get(kind);
        let category = template.category;

        let mut inventory = Inventory::with_capacity(template.capacity);
        for item in templates.carried_by(kind) {
            inventory.add(*item);
        }
        let lit = category == Category::Fire && !self.terrain.is_water(point);
        let heat = Heat {
            level: if lit { 1.0 } else { 0.0 },
        };
        let behavior = Behavior::initial(category);

        let entity = self.world.spawn((
            Piece { id, kind, category },
            Placement::at(point),
            template.vitals(),
            heat,
            PassiveMotion::ZERO,
            Status::default(),
            Lifecycle {
                last_processed: self.tick,
                killed: false,
            },
            behavior,
            inventory,
        ));
        self.ids.insert(id, entity);
        self.next_id = self.next_id.max(id.0 + 1);
        self.grid
            .insert(entity, id, point, category, template.blocks_movement);
        if heat.level > 0.0 {
            self.heated.insert(id, entity);
            self.log.push(WorldEvent::Ignited { id });
        }
        if !behavior.is_inactive() {
            self.registry.register(entity, tick_group(category));
        }
        tracing::trace!(piece = id.0, kind = %template.name, x = point.x, y = point.y, "spawned");
        entity
    }

    /// Put a piece back into the tick registry, reviving an idle state machine.
    pub fn wake(&mut self, entity: Entity) {
        let (Some(piece), Some(placement), Some(lifecycle), Some(behavior)) = (
            self.get::<Piece>(entity),
            self.get::<Placement>(entity),
            self.get::<Lifecycle>(entity),
            self.get::<Behavior>(entity),
        ) else {
            return;
        };
        if !placement.in_world {
            return;
        }
        if behavior.is_inactive() && !lifecycle.killed {
            let initial = Behavior::initial(piece.category);
            if !initial.is_inactive() {
                self.set_behavior(entity, initial);
            }
        }
        self.registry.register(entity, tick_group(piece.category));
    }

    /// Replace a piece's active state. The old state's memory is dropped.
    pub fn set_behavior(&mut self, entity: Entity, behavior: Behavior) {
        let Ok(mut slot) = self.world.get::<&mut Behavior>(entity) else {
            return;
        };
        let previous = *slot;
        *slot = behavior;
        drop(slot);
        if previous.tag() != behavior.tag() {
            if let Some(piece) = self.get::<Piece>(entity) {
                tracing::debug!(piece = piece.id.0, from = ?previous.tag(), to = ?behavior.tag(), "state change");
            }
        }
    }

    pub fn set_raining(&mut self, raining: bool) {
        if self.raining == raining {
            return;
        }
        self.raining = raining;
        tracing::info!(raining, tick = self.tick, "weather changed");
        if !raining {
            self.start_drying();
        }
    }

    pub fn raining(&self) -> bool {
        self.raining
    }

    /// Queue a command for a player piece.
    pub fn push_player_command(&mut self, player: Entity, command: PlayerCommand) {
        self.commands.entry(player).or_default().push_back(command);
        self.wake(player);
    }

    /// Lock or unlock all heat change on a piece.
    pub fn set_heat_locked(&mut self, entity: Entity, locked: bool) {
        if let Ok(mut status) = self.world.get::<&mut Status>(entity) {
            status.heat_locked = locked;
        }
    }

    /// Edit a piece's vitals in place. Hit points stay clamped.
    pub fn modify_vitals<F>(&mut self, entity: Entity, edit: F) -> bool
    where
        F: FnOnce(&mut Vitals),
    {
        match self.world.get::<&mut Vitals>(entity) {
            Ok(mut vitals) => {
                edit(&mut vitals);
                true
            }
            Err(_) => false,
        }
    }

    /// Put an item into a piece's inventory. Returns false when full or absent.
    pub fn give_item(&mut self, entity: Entity, kind: KindId) -> bool {
        self.world
            .get::<&mut Inventory>(entity)
            .map(|mut inv| inv.add(kind))
            .unwrap_or(false)
    }

    // --- Queries ---

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Events raised during the last `update`, including those raised by
    /// calls made since the update before it.
    pub fn recent_events(&self) -> &[WorldEvent] {
        self.last_events.as_slice()
    }

    pub fn last_stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn entity_of(&self, id: PieceId) -> Option<Entity> {
        self.ids.get(&id).copied()
    }

    pub fn piece(&self, entity: Entity) -> Option<Piece> {
        self.get(entity)
    }

    pub fn vitals(&self, entity: Entity) -> Option<Vitals> {
        self.get(entity)
    }

    pub fn heat(&self, entity: Entity) -> Option<f32> {
        self.get::<Heat>(entity).map(|h| h.level)
    }

    pub fn behavior(&self, entity: Entity) -> Option<Behavior> {
        self.get(entity)
    }

    pub fn state(&self, entity: Entity) -> Option<StateTag> {
        self.behavior(entity).map(|b| b.tag())
    }

    pub fn placement(&self, entity: Entity) -> Option<Placement> {
        self.get(entity)
    }

    pub fn passive_motion(&self, entity: Entity) -> Option<PassiveMotion> {
        self.get(entity)
    }

    pub fn inventory(&self, entity: Entity) -> Option<Inventory> {
        self.world.get::<&Inventory>(entity).ok().map(|inv| (*inv).clone())
    }

    pub fn is_killed(&self, entity: Entity) -> bool {
        self.get::<Lifecycle>(entity).is_some_and(|l| l.killed)
    }

    pub fn is_registered(&self, entity: Entity) -> bool {
        self.registry.contains(entity)
    }

    pub fn piece_count(&self) -> usize {
        self.ids.len()
    }

    pub fn count_kind(&self, kind: KindId) -> usize {
        self.world
            .query::<&Piece>()
            .iter()
            .filter(|(_, piece)| piece.kind == kind)
            .count()
    }

    pub fn heated_count(&self) -> usize {
        self.heated.len()
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    // --- Component helpers ---

    pub(crate) fn get<T: hecs::Component + Copy>(&self, entity: Entity) -> Option<T> {
        self.world.get::<&T>(entity).ok().map(|c| *c)
    }

    pub(crate) fn put<T: hecs::Component>(&mut self, entity: Entity, value: T) {
        if let Ok(mut slot) = self.world.get::<&mut T>(entity) {
            *slot = value;
        }
    }

    /// Live, placed piece with its kind and position.
    pub(crate) fn locate(&self, entity: Entity) -> Option<(Piece, Point)> {
        let piece = self.get::<Piece>(entity)?;
        let placement = self.get::<Placement>(entity)?;
        placement.in_world.then_some((piece, placement.point))
    }
}

/// Dispatch partition for a category.
pub(crate) fn tick_group(category: Category) -> TickGroup {
    match category {
        Category::Plant => TickGroup::Growing,
        _ => TickGroup::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SimulationEngine {
        SimulationEngine::with_defaults(7)
    }

    #[test]
    fn test_engine_creation() {
        let engine = engine();
        assert_eq!(engine.piece_count(), 0);
        assert_eq!(engine.tick(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_tuning() {
        let mut tuning = Tuning::default();
        tuning.heat.burn_damage_interval = 0;
        let result = SimulationEngine::new(TemplateRegistry::standard(), tuning, Terrain::default(), 7);
        assert!(matches!(
            result,
            Err(TuningError::Invalid {
                field: "heat.burn_damage_interval",
                ..
            })
        ));
    }

    #[test]
    fn test_spawn_registers_active_pieces() {
        let mut engine = engine();
        let rabbit = engine.spawn_named("rabbit", Point::new(10, 10)).unwrap();
        let meat = engine.spawn_named("meat", Point::new(12, 10)).unwrap();

        assert!(engine.is_registered(rabbit));
        assert!(!engine.is_registered(meat));
        assert_eq!(engine.state(rabbit), Some(StateTag::Assess));
        assert_eq!(engine.piece(rabbit).map(|p| p.id), Some(PieceId(1)));
        assert_eq!(engine.entity_of(PieceId(2)), Some(meat));
    }

    #[test]
    fn test_spawned_fire_is_hot() {
        let mut engine = engine();
        let fire = engine.spawn_named("campfire", Point::new(50, 50)).unwrap();
        assert_eq!(engine.heat(fire), Some(1.0));
        assert_eq!(engine.heated_count(), 1);
    }

    #[test]
    fn test_update_advances_tick() {
        let mut engine = engine();
        engine.spawn_named("rabbit", Point::new(10, 10));
        for _ in 0..5 {
            engine.update();
        }
        assert_eq!(engine.tick(), 5);
    }

    #[test]
    fn test_wake_revives_idle_structure() {
        let mut engine = engine();
        let hut = engine.spawn_named("hut", Point::new(20, 20)).unwrap();
        engine.set_behavior(hut, Behavior::Inactive);
        engine.update();
        assert!(!engine.is_registered(hut));

        engine.wake(hut);
        assert!(engine.is_registered(hut));
        assert_eq!(engine.state(hut), Some(StateTag::Standing));
    }
}
