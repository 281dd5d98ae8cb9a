//! Pure heat and combustion math.
//!
//! Heat is a continuous level in `[0, 1]`; a piece is burning once the level
//! reaches the burning threshold. This module resolves requested heat
//! changes against a piece's situation (affinity, wetness, locks,
//! submersion), computes contagion falloff, burn damage and the length of a
//! burn episode.

use crate::tuning::HeatTuning;

/// Situation of a piece at the moment a heat change is requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatContext {
    /// Kind's susceptibility multiplier.
    pub affinity: f32,
    pub wet: bool,
    /// Scripted or immune pieces reject every change.
    pub locked: bool,
    pub submerged: bool,
}

impl HeatContext {
    pub fn dry(affinity: f32) -> Self {
        Self {
            affinity,
            wet: false,
            locked: false,
            submerged: false,
        }
    }
}

/// Outcome of resolving a heat change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeatChange {
    /// The piece holds a heat lock; nothing changed.
    Rejected,
    /// Nothing changed (zero affinity, or already at the clamp).
    Unchanged,
    /// The piece is under water; heat is forced to zero.
    Quenched { previous: f32 },
    Changed {
        previous: f32,
        current: f32,
    },
}

impl HeatChange {
    /// Heat level after the change, if it moved.
    pub fn current(&self) -> Option<f32> {
        match *self {
            HeatChange::Changed { current, .. } => Some(current),
            HeatChange::Quenched { .. } => Some(0.0),
            HeatChange::Rejected | HeatChange::Unchanged => None,
        }
    }

    /// A new heat episode begins when heat rises from exactly zero.
    pub fn starts_episode(&self) -> bool {
        matches!(*self, HeatChange::Changed { previous, current } if previous == 0.0 && current > 0.0)
    }

    /// Crossed the burning threshold upwards.
    pub fn ignited(&self, tuning: &HeatTuning) -> bool {
        matches!(*self, HeatChange::Changed { previous, current }
            if previous < tuning.burning_threshold && current >= tuning.burning_threshold)
    }

    /// Crossed the burning threshold downwards.
    pub fn extinguished(&self, tuning: &HeatTuning) -> bool {
        match *self {
            HeatChange::Changed { previous, current } => {
                previous >= tuning.burning_threshold && current < tuning.burning_threshold
            }
            HeatChange::Quenched { previous } => previous >= tuning.burning_threshold,
            _ => false,
        }
    }
}

pub fn is_burning(level: f32, tuning: &HeatTuning) -> bool {
    level >= tuning.burning_threshold
}

/// Effective delta for a requested change. Only gains are scaled; cooling
/// applies as requested.
pub fn effective_delta(requested: f32, ctx: &HeatContext, tuning: &HeatTuning) -> f32 {
    if requested <= 0.0 {
        return requested;
    }
    let mut delta = requested * ctx.affinity;
    if ctx.wet {
        delta *= tuning.wet_factor;
    }
    delta
}

/// Resolve a requested heat change against the current level.
pub fn resolve(current: f32, requested: f32, ctx: &HeatContext, tuning: &HeatTuning) -> HeatChange {
    if ctx.locked {
        return HeatChange::Rejected;
    }
    if ctx.submerged {
        return if current > 0.0 {
            HeatChange::Quenched { previous: current }
        } else {
            HeatChange::Unchanged
        };
    }
    let next = (current + effective_delta(requested, ctx, tuning)).clamp(0.0, 1.0);
    if next == current {
        HeatChange::Unchanged
    } else {
        HeatChange::Changed {
            previous: current,
            current: next,
        }
    }
}

/// Radius within which a burning piece heats its neighbours.
pub fn contagion_radius(mass: f32, tuning: &HeatTuning) -> f32 {
    tuning.contagion_base_radius + mass.max(0.0).sqrt() * tuning.contagion_mass_factor
}

/// Linear falloff in `[0, 1]`: one at the source, zero at the radius.
pub fn falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        0.0
    } else {
        1.0 - distance.max(0.0) / radius
    }
}

/// Heat delta a burning source requests from a target at `distance`.
///
/// Falls off linearly and is zero for targets that cannot heat up at all.
pub fn contagion_delta(distance: f32, radius: f32, target_affinity: f32, tuning: &HeatTuning) -> f32 {
    if target_affinity <= 0.0 {
        return 0.0;
    }
    tuning.contagion_strength * falloff(distance, radius)
}

/// Damage per burn application at the given heat level.
pub fn base_burn(level: f32, tuning: &HeatTuning) -> f32 {
    level.clamp(0.0, 1.0) * tuning.burn_damage_scale
}

/// Damage an animal or player takes from standing near a fire it has not caught yet.
pub fn pre_ignition_damage(distance: f32, radius: f32, tuning: &HeatTuning) -> f32 {
    tuning.pre_ignition_damage * falloff(distance, radius)
}

/// Length of a burn episode in ticks.
///
/// `roll` is a uniform sample in `[extinguish_min_ticks, extinguish_max_ticks]`.
/// Pieces that do not block movement burn out faster, and once more than
/// `overload_heated_count` pieces are heated every new episode is shortened
/// to cap the simultaneous fire cost.
pub fn extinguish_delay(roll: u32, blocks_movement: bool, heated_count: usize, tuning: &HeatTuning) -> u32 {
    let mut ticks = roll as f32;
    if !blocks_movement {
        ticks *= tuning.non_blocking_delay_factor;
    }
    if heated_count > tuning.overload_heated_count {
        ticks *= tuning.overload_delay_factor;
    }
    (ticks.round() as u32).max(1)
}

/// Heat lost this tick by a piece that is not being heated.
pub fn passive_cooling(level: f32, raining: bool, tuning: &HeatTuning) -> f32 {
    let mut cooling = 0.0;
    if !is_burning(level, tuning) {
        cooling += tuning.decay_per_tick;
    }
    if raining {
        cooling += tuning.rain_cooling;
    }
    cooling
}
