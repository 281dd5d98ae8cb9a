//! World events raised for the presentation layers.
//!
//! The engine never plays sounds or effects itself. It records what
//! happened during a tick and leaves the rest to whoever reads the log.

use serde::{Deserialize, Serialize};

use crate::components::PieceId;

/// Something observable that happened to a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// Heat crossed the burning threshold upwards
    Ignited { id: PieceId },
    /// Heat dropped back under the burning threshold
    Extinguished { id: PieceId },
    /// Vitals zeroed; the corpse lingers
    Killed { id: PieceId },
    /// Removed from the world for good
    Destroyed { id: PieceId },
    Born { id: PieceId, parent: PieceId },
    /// Passive motion came to rest
    Settled { id: PieceId },
    PlayerKilled { id: PieceId },
}

impl WorldEvent {
    pub fn piece(&self) -> PieceId {
        match *self {
            WorldEvent::Ignited { id }
            | WorldEvent::Extinguished { id }
            | WorldEvent::Killed { id }
            | WorldEvent::Destroyed { id }
            | WorldEvent::Born { id, .. }
            | WorldEvent::Settled { id }
            | WorldEvent::PlayerKilled { id } => id,
        }
    }
}

/// Events raised since the log was last cleared.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<WorldEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn as_slice(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn count(&self, predicate: impl Fn(&WorldEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}
