//! WildSim Core - Survival Simulation Engine
//!
//! An ECS-based simulation of a meadow full of pieces: animals that hunt,
//! graze, breed and flee, plants that regrow and seed, fires that spread,
//! structures, projectiles and a player, each driven by its own state
//! machine every tick.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Pieces of every category
//! - **Components**: Pure data attached to entities (Piece, Placement, Vitals, Heat, Behavior, ...)
//! - **Systems**: Logic that queries and updates components
//!
//! Pure formulas (heat, impulses, decisions, energy) live in `wildsim-logic`
//! so they can be tested without a world.
//!
//! # Example
//!
//! ```rust,no_run
//! use wildsim_core::prelude::*;
//!
//! let mut engine = SimulationEngine::with_defaults(42);
//! engine.spawn_named("rabbit", Point::new(100, 100));
//! engine.spawn_named("grass", Point::new(140, 100));
//!
//! for _ in 0..600 {
//!     engine.update();
//! }
//! println!("{}", engine.snapshot().to_json().unwrap());
//! ```

pub mod components;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod scheduler;
pub mod snapshot;
pub mod spatial;
pub mod systems;
pub mod templates;
pub mod terrain;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::SimulationEngine;
    pub use crate::events::WorldEvent;
    pub use crate::persistence::{PieceRecord, SaveError};
    pub use crate::snapshot::{PieceSnapshot, WorldSnapshot};
    pub use crate::systems::PlayerCommand;
    pub use crate::templates::{KindTemplate, TemplateRegistry};
    pub use crate::terrain::{Rect, Terrain};
    pub use wildsim_logic::Tuning;
}
