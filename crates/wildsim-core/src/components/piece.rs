//! Piece identity and lifecycle components.

use serde::{Deserialize, Serialize};

/// Stable piece identifier, unique for the lifetime of a world and kept
/// across save/load (hecs entity handles are not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PieceId(pub u64);

/// Index of a kind template in the [`TemplateRegistry`](crate::templates::TemplateRegistry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindId(pub u16);

/// Broad polymorphic family of a piece; selects its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Animal,
    Plant,
    Fire,
    Structure,
    Player,
    Projectile,
    /// Loose item lying on the ground
    Item,
}

impl Category {
    /// Kinds that feel fire before catching it and flee from it.
    pub fn feels_heat(&self) -> bool {
        matches!(self, Category::Animal | Category::Player)
    }

    pub fn is_living(&self) -> bool {
        matches!(self, Category::Animal | Category::Plant | Category::Player)
    }
}

/// Identity component present on every piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub kind: KindId,
    pub category: Category,
}

/// Bookkeeping the dispatcher and lifecycle code need
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Tick at which the piece was last processed
    pub last_processed: u64,
    /// Set once by `kill`; the corpse lingers until destroyed
    pub killed: bool,
}

/// Status effects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Tick until which the piece counts as wet
    pub wet_until: Option<u64>,
    /// Rejects every heat change
    pub heat_locked: bool,
}

impl Status {
    pub fn is_wet(&self, tick: u64) -> bool {
        self.wet_until.is_some_and(|until| tick < until)
    }
}

/// Heat level in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Heat {
    pub level: f32,
}
