//! Pure simulation logic for WildSim.
//!
//! This crate contains the survival-simulation math that is independent of
//! the ECS world, the spatial index and the scheduler. Functions take plain
//! data and return results, so every rule here is unit-testable on its own
//! and the engine crate only has to wire them to pieces.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`decision`] | Utility choice selection and flee/eat/mate priority heuristics |
//! | [`heat`] | Heat change resolution, contagion falloff, burn damage, burn episode length |
//! | [`impulse`] | Decaying passive movement with bounce and sub-unit flicker |
//! | [`throttle`] | Tick groups, group intervals and per-kind striding under load |
//! | [`tuning`] | TOML-loadable tuning constants with validation |
//! | [`vitals`] | Hit points, efficiency and the stamina → fed → health energy chain |

pub mod decision;
pub mod heat;
pub mod impulse;
pub mod throttle;
pub mod tuning;
pub mod vitals;

pub use tuning::{Tuning, TuningError};
