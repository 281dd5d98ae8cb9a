//! Save/Load functionality for persisting simulation state
//!
//! Each piece is written as a sparse record: its id and kind name plus only
//! the values that differ from what a freshly spawned piece of that kind
//! would have. Loading spawns the kind's defaults and overlays the record.
//! Working memory (targets, timers) is never saved; pieces re-enter a
//! deterministic state for their category instead.
//!
//! The whole world is written with bincode behind a version number.

use std::collections::HashSet;
use std::io::{Read, Write};

use hecs::Entity;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{
    Behavior, Category, Heat, Inventory, Lifecycle, PassiveMotion, Piece, PieceId, Placement, StateTag, Status,
    Vitals,
};
use crate::engine::{tick_group, SimulationEngine};
use crate::scheduler::DelayedEvent;
use crate::terrain::Terrain;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("piece {id} has unknown kind `{kind}`")]
    UnknownKind { id: u64, kind: String },
    #[error("piece {0} appears twice")]
    DuplicatePiece(u64),
}

/// A single value that differs from the kind's template default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Override {
    HitPoints(f32),
    Wear(f32),
    Stamina(f32),
    Fed(f32),
    Mass(f32),
    Age(u32),
    Heat(f32),
    Motion(PassiveMotion),
    WetUntil(u64),
    HeatLocked,
    Killed,
    /// Carried items by kind name
    Inventory(Vec<String>),
    State(StateTag),
}

/// Sparse serialization record of one piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieceRecord {
    pub id: PieceId,
    pub kind: String,
    pub overrides: Vec<Override>,
}

impl PieceRecord {
    /// True if the piece matched its template defaults exactly.
    pub fn is_default(&self) -> bool {
        self.overrides.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPiece {
    pub record: PieceRecord,
    pub placement: Placement,
}

/// Delayed event with its piece references resolved to ids
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SavedDelayed {
    StopBurning,
    Destroy,
    Reinforce { threat: PieceId },
    DryOff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEvent {
    pub due: u64,
    pub piece: PieceId,
    pub event: SavedDelayed,
}

/// Serializable snapshot of the simulation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub tick: u64,
    pub raining: bool,
    pub seed: u64,
    pub next_id: u64,
    pub terrain: Terrain,
    /// Every piece, in id order
    pub pieces: Vec<SavedPiece>,
    pub events: Vec<SavedEvent>,
}

impl SimulationEngine {
    /// Sparse record of a piece against its kind's defaults.
    pub fn record_of(&self, entity: Entity) -> Option<PieceRecord> {
        let piece = self.get::<Piece>(entity)?;
        let vitals = self.get::<Vitals>(entity)?;
        let heat = self.get::<Heat>(entity)?;
        let motion = self.get::<PassiveMotion>(entity)?;
        let status = self.get::<Status>(entity)?;
        let lifecycle = self.get::<Lifecycle>(entity)?;
        let behavior = self.get::<Behavior>(entity)?;
        let inventory = self.world.get::<&Inventory>(entity).ok()?.items.clone();

        let template = self.templates.get(piece.kind);
        let defaults = template.vitals();
        let mut overrides = Vec::new();

        if vitals.hit_points() != defaults.hit_points() {
            overrides.push(Override::HitPoints(vitals.hit_points()));
        }
        if vitals.wear() != defaults.wear() {
            overrides.push(Override::Wear(vitals.wear()));
        }
        if vitals.stamina != defaults.stamina {
            overrides.push(Override::Stamina(vitals.stamina));
        }
        if vitals.fed != defaults.fed {
            overrides.push(Override::Fed(vitals.fed));
        }
        if vitals.mass != defaults.mass {
            overrides.push(Override::Mass(vitals.mass));
        }
        if vitals.age != defaults.age {
            overrides.push(Override::Age(vitals.age));
        }
        if heat.level != default_heat(piece.category) {
            overrides.push(Override::Heat(heat.level));
        }
        if motion != PassiveMotion::ZERO {
            overrides.push(Override::Motion(motion));
        }
        if let Some(until) = status.wet_until {
            overrides.push(Override::WetUntil(until));
        }
        if status.heat_locked {
            overrides.push(Override::HeatLocked);
        }
        if lifecycle.killed {
            overrides.push(Override::Killed);
        }
        if inventory.as_slice() != self.templates.carried_by(piece.kind) {
            let names = inventory
                .iter()
                .map(|kind| self.templates.name_of(*kind).to_string())
                .collect();
            overrides.push(Override::Inventory(names));
        }
        if behavior.tag() != Behavior::initial(piece.category).tag() {
            overrides.push(Override::State(behavior.tag()));
        }

        Some(PieceRecord {
            id: piece.id,
            kind: template.name.clone(),
            overrides,
        })
    }

    /// Spawn a piece from its kind defaults and overlay a record.
    pub fn restore_record(&mut self, record: &PieceRecord, placement: Placement) -> Result<Entity, SaveError> {
        let unknown = |kind: &str| SaveError::UnknownKind {
            id: record.id.0,
            kind: kind.to_string(),
        };
        let kind = self.templates.id_of(&record.kind).ok_or_else(|| unknown(&record.kind))?;
        if self.ids.contains_key(&record.id) {
            return Err(SaveError::DuplicatePiece(record.id.0));
        }

        let entity = self.spawn_with_id(record.id, kind, placement.point);
        let category = self.templates.get(kind).category;
        let mut behavior = Behavior::initial(category);
        let mut heat = default_heat(category);

        for value in &record.overrides {
            match value {
                Override::HitPoints(hp) => self.edit_vitals(entity, |v| v.set_hit_points(*hp)),
                Override::Wear(wear) => self.edit_vitals(entity, |v| v.restore(v.hit_points(), *wear)),
                Override::Stamina(stamina) => self.edit_vitals(entity, |v| v.stamina = *stamina),
                Override::Fed(fed) => self.edit_vitals(entity, |v| v.fed = *fed),
                Override::Mass(mass) => self.edit_vitals(entity, |v| v.mass = *mass),
                Override::Age(age) => self.edit_vitals(entity, |v| v.age = *age),
                Override::Heat(level) => heat = level.clamp(0.0, 1.0),
                Override::Motion(motion) => self.put(entity, *motion),
                Override::WetUntil(until) => {
                    if let Ok(mut status) = self.world.get::<&mut Status>(entity) {
                        status.wet_until = Some(*until);
                    }
                }
                Override::HeatLocked => {
                    if let Ok(mut status) = self.world.get::<&mut Status>(entity) {
                        status.heat_locked = true;
                    }
                }
                Override::Killed => {
                    if let Ok(mut lifecycle) = self.world.get::<&mut Lifecycle>(entity) {
                        lifecycle.killed = true;
                    }
                }
                Override::Inventory(names) => {
                    let items = names
                        .iter()
                        .map(|name| self.templates.id_of(name).ok_or_else(|| unknown(name)))
                        .collect::<Result<Vec<_>, _>>()?;
                    if let Ok(mut inventory) = self.world.get::<&mut Inventory>(entity) {
                        inventory.items = items;
                    }
                }
                Override::State(tag) => behavior = Behavior::reentry(category, *tag),
            }
        }
        // Water quenches whatever heat was saved.
        if self.terrain.is_water(placement.point) {
            heat = 0.0;
        }
        // Corpses only wait for their decay event.
        if self.is_killed(entity) && category != Category::Player {
            behavior = Behavior::Inactive;
        }

        self.put(entity, Heat { level: heat });
        if heat > 0.0 {
            self.heated.insert(record.id, entity);
        } else {
            self.heated.remove(&record.id);
        }
        self.put(entity, behavior);
        if let Ok(mut slot) = self.world.get::<&mut Placement>(entity) {
            slot.rotation = placement.rotation;
        }

        if !placement.in_world {
            self.remove_from_world(entity);
            return Ok(entity);
        }
        let moving = self.get::<PassiveMotion>(entity).is_some_and(|m| m.is_active());
        if behavior.is_inactive() && !moving {
            self.registry.deregister(entity);
        } else {
            self.registry.register(entity, tick_group(category));
        }
        if heat > 0.0 && category != Category::Fire {
            self.ensure_extinguish_scheduled(entity);
        }
        Ok(entity)
    }

    fn edit_vitals(&mut self, entity: Entity, edit: impl FnOnce(&mut Vitals)) {
        if let Ok(mut vitals) = self.world.get::<&mut Vitals>(entity) {
            edit(&mut vitals);
        }
    }

    /// Save the complete simulation to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        let mut entities: Vec<(PieceId, Entity)> = self.ids.iter().map(|(id, e)| (*id, *e)).collect();
        entities.sort_by_key(|(id, _)| *id);

        let pieces: Vec<SavedPiece> = entities
            .into_iter()
            .filter_map(|(_, entity)| {
                Some(SavedPiece {
                    record: self.record_of(entity)?,
                    placement: self.get::<Placement>(entity)?,
                })
            })
            .collect();

        let events = self
            .scheduler
            .iter()
            .filter_map(|scheduled| {
                let piece = self.get::<Piece>(scheduled.entity)?.id;
                let event = match scheduled.event {
                    DelayedEvent::StopBurning => SavedDelayed::StopBurning,
                    DelayedEvent::Destroy => SavedDelayed::Destroy,
                    DelayedEvent::Reinforce { threat } => SavedDelayed::Reinforce {
                        threat: self.get::<Piece>(threat)?.id,
                    },
                    DelayedEvent::DryOff => SavedDelayed::DryOff,
                };
                Some(SavedEvent {
                    due: scheduled.due,
                    piece,
                    event,
                })
            })
            .collect();

        let save_data = SaveData {
            version: SAVE_VERSION,
            tick: self.tick,
            raining: self.raining,
            seed: self.seed,
            next_id: self.next_id,
            terrain: self.terrain.clone(),
            pieces,
            events,
        };
        bincode::serialize_into(writer, &save_data)?;
        tracing::info!(tick = self.tick, pieces = save_data.pieces.len(), "saved world");
        Ok(())
    }

    /// Replace the world with one loaded from a reader. Templates and tuning
    /// stay those of this engine.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let save_data: SaveData = bincode::deserialize_from(reader)?;
        if save_data.version != SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected: SAVE_VERSION,
                found: save_data.version,
            });
        }

        // Nothing is touched until every record is known to restore.
        self.check_pieces(&save_data.pieces)?;

        self.reset();
        self.tick = save_data.tick;
        self.raining = save_data.raining;
        self.seed = save_data.seed;
        self.rng = SmallRng::seed_from_u64(save_data.seed ^ save_data.tick);
        self.terrain = save_data.terrain;

        for saved in &save_data.pieces {
            self.restore_record(&saved.record, saved.placement)?;
        }
        self.next_id = self.next_id.max(save_data.next_id);

        self.scheduler.clear();
        for saved in save_data.events {
            let Some(entity) = self.ids.get(&saved.piece).copied() else {
                continue;
            };
            let event = match saved.event {
                SavedDelayed::StopBurning => DelayedEvent::StopBurning,
                SavedDelayed::Destroy => DelayedEvent::Destroy,
                SavedDelayed::Reinforce { threat } => match self.ids.get(&threat) {
                    Some(threat) => DelayedEvent::Reinforce { threat: *threat },
                    None => continue,
                },
                SavedDelayed::DryOff => DelayedEvent::DryOff,
            };
            let delay = saved.due.saturating_sub(self.tick);
            self.scheduler.schedule(self.tick, delay, entity, event);
        }
        let burning: Vec<(Entity, Category)> = self
            .heated
            .values()
            .filter_map(|e| Some((*e, self.get::<Piece>(*e)?.category)))
            .collect();
        for (entity, category) in burning {
            if category != Category::Fire {
                self.ensure_extinguish_scheduled(entity);
            }
        }

        self.log.clear();
        self.last_events.clear();
        tracing::info!(tick = self.tick, pieces = self.ids.len(), "loaded world");
        Ok(())
    }

    fn check_pieces(&self, pieces: &[SavedPiece]) -> Result<(), SaveError> {
        let mut seen = HashSet::with_capacity(pieces.len());
        for saved in pieces {
            let record = &saved.record;
            if !seen.insert(record.id) {
                return Err(SaveError::DuplicatePiece(record.id.0));
            }
            let carried = record.overrides.iter().flat_map(|value| match value {
                Override::Inventory(names) => names.as_slice(),
                _ => &[][..],
            });
            for kind in std::iter::once(&record.kind).chain(carried) {
                if self.templates.id_of(kind).is_none() {
                    return Err(SaveError::UnknownKind {
                        id: record.id.0,
                        kind: kind.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.world.clear();
        self.grid.clear();
        self.scheduler.clear();
        self.registry.clear();
        self.heated.clear();
        self.ids.clear();
        self.commands.clear();
        self.log.clear();
        self.last_events.clear();
        self.next_id = 1;
    }
}

fn default_heat(category: Category) -> f32 {
    if category == Category::Fire {
        1.0
    } else {
        0.0
    }
}
