//! Systems - logic that operates on components

mod animal;
mod decision;
mod dispatcher;
mod fire;
mod heat;
mod lifecycle;
mod passive;
mod plant;
mod player;
mod projectile;
mod structure;

pub use dispatcher::TickRegistry;
pub use player::PlayerCommand;
