//! Component definitions for the ECS simulation.
//!
//! Components are plain data attached to piece entities. Behavior lives in
//! the systems; the pure math behind vitals and passive motion lives in
//! `wildsim-logic` and is attached here as-is.

mod behavior;
mod common;
mod inventory;
mod piece;

pub use behavior::*;
pub use common::*;
pub use inventory::*;
pub use piece::*;

pub use wildsim_logic::impulse::PassiveMotion;
pub use wildsim_logic::vitals::Vitals;
