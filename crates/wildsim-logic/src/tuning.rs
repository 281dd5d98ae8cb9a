//! Tuning parameters for the survival simulation.
//!
//! Every domain constant lives here so scenarios can be re-balanced from a
//! TOML file without recompiling. All sections use `#[serde(default)]`, so a
//! file only needs to name the values it overrides:
//!
//! ```
//! use wildsim_logic::tuning::Tuning;
//!
//! let tuning = Tuning::from_toml_str("[heat]\nburning_threshold = 0.6\n").unwrap();
//! assert!((tuning.heat.burning_threshold - 0.6).abs() < f32::EPSILON);
//! assert!((tuning.passive.retention - 0.85).abs() < f32::EPSILON);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default tuning file path used by the harness.
pub const DEFAULT_TUNING_PATH: &str = "tuning.toml";

/// Errors raised while loading or validating tuning.
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to read tuning file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse tuning: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid tuning value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Top-level tuning structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub heat: HeatTuning,
    pub passive: PassiveTuning,
    pub decision: DecisionTuning,
    pub energy: EnergyTuning,
    pub dispatch: DispatchTuning,
}

/// Heat and combustion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatTuning {
    /// Heat level at or above which a piece is burning.
    pub burning_threshold: f32,
    /// Per-tick heat loss for heated pieces that are not burning.
    pub decay_per_tick: f32,
    /// Per-tick heat loss for every heated piece while it rains.
    pub rain_cooling: f32,
    /// Multiplier applied to heat gain while a piece is wet.
    pub wet_factor: f32,
    /// How long a piece stays wet after leaving water or rain.
    pub wet_duration_ticks: u32,
    /// Shortest randomized burn episode.
    pub extinguish_min_ticks: u32,
    /// Longest randomized burn episode.
    pub extinguish_max_ticks: u32,
    /// Burn episode multiplier for pieces that do not block movement.
    pub non_blocking_delay_factor: f32,
    /// Number of simultaneously heated pieces above which burn episodes are shortened.
    pub overload_heated_count: usize,
    /// Burn episode multiplier applied while overloaded.
    pub overload_delay_factor: f32,
    /// Ticks between burn damage applications.
    pub burn_damage_interval: u32,
    /// Damage per burn application at heat level 1.0.
    pub burn_damage_scale: f32,
    /// Damage per tick to animals and players standing near a fire at zero distance.
    pub pre_ignition_damage: f32,
    /// Contagion radius before the mass term.
    pub contagion_base_radius: f32,
    /// Contagion radius added per unit of sqrt(mass).
    pub contagion_mass_factor: f32,
    /// Heat delta requested from a target at zero distance, per tick.
    pub contagion_strength: f32,
}

impl Default for HeatTuning {
    fn default() -> Self {
        Self {
            burning_threshold: 0.5,
            decay_per_tick: 0.01,
            rain_cooling: 0.02,
            wet_factor: 0.5,
            wet_duration_ticks: 300,
            extinguish_min_ticks: 200,
            extinguish_max_ticks: 400,
            non_blocking_delay_factor: 0.5,
            overload_heated_count: 150,
            overload_delay_factor: 0.5,
            burn_damage_interval: 10,
            burn_damage_scale: 10.0,
            pre_ignition_damage: 1.0,
            contagion_base_radius: 16.0,
            contagion_mass_factor: 2.0,
            contagion_strength: 0.05,
        }
    }
}

/// Passive movement (impulse) integrator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveTuning {
    /// Below this magnitude on both axes the motion snaps to zero.
    pub stop_threshold: f32,
    /// Fraction of velocity kept after a successful step.
    pub retention: f32,
    /// Fraction of velocity kept (and inverted) after a collision.
    pub bounce_attenuation: f32,
    /// Passive velocity is divided by this before being applied.
    pub divisor: f32,
    /// Spin per unit of impulse magnitude for tumbling kinds.
    pub tumble_factor: f32,
    /// Upper bound on spin magnitude, degrees per tick.
    pub max_spin: f32,
}

impl Default for PassiveTuning {
    fn default() -> Self {
        Self {
            stop_threshold: 0.3,
            retention: 0.85,
            bounce_attenuation: 0.5,
            divisor: 1.0,
            tumble_factor: 2.0,
            max_spin: 15.0,
        }
    }
}

/// Utility decision parameters for autonomous agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTuning {
    /// Ongoing states re-evaluate goals on roughly 1 in this many ticks.
    pub decision_interval: u32,
    /// Flee priority of an enemy standing at the edge of perception.
    pub flee_base: f32,
    /// Extra flee priority gained as an enemy closes to zero distance.
    pub flee_proximity: f32,
    /// Eat priority per unit of hunger.
    pub eat_weight: f32,
    /// Eat priority when health is critical.
    pub eat_critical: f32,
    /// Health fraction under which eating becomes critical.
    pub critical_health_fraction: f32,
    /// Eat priority multiplier when the food is already within reach.
    pub at_hand_factor: f32,
    /// Flat mate priority.
    pub mate_priority: f32,
    /// Minimum fed fraction before a partner is offered.
    pub mate_min_fed_fraction: f32,
    /// Look-around chance per tick at awareness 1.0.
    pub look_around_chance: f32,
    /// Give-up chance per chase tick at awareness 1.0.
    pub give_up_chance: f32,
    /// Chase patience in ticks at awareness 0.0.
    pub base_patience: u32,
}

impl Default for DecisionTuning {
    fn default() -> Self {
        Self {
            decision_interval: 5,
            flee_base: 1.5,
            flee_proximity: 2.0,
            eat_weight: 1.5,
            eat_critical: 5.0,
            critical_health_fraction: 0.25,
            at_hand_factor: 0.8,
            mate_priority: 0.8,
            mate_min_fed_fraction: 0.6,
            look_around_chance: 0.05,
            give_up_chance: 0.01,
            base_patience: 240,
        }
    }
}

/// Energy economy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyTuning {
    /// Energy spent per elapsed tick just to stay alive.
    pub metabolism: f32,
    /// Energy spent per walking step.
    pub walk_cost: f32,
    /// Energy spent per running step (chase, flee).
    pub run_cost: f32,
    /// Energy spent per attack.
    pub attack_cost: f32,
    /// Stamina recovered per resting tick, paid from the fed pool.
    pub rest_recovery: f32,
    /// Weight of age in the efficiency curve.
    pub age_efficiency_weight: f32,
    /// Efficiency never drops below this floor.
    pub min_efficiency: f32,
    /// Energy gained per unit of food eaten.
    pub food_energy: f32,
}

impl Default for EnergyTuning {
    fn default() -> Self {
        Self {
            metabolism: 0.02,
            walk_cost: 0.05,
            run_cost: 0.15,
            attack_cost: 0.3,
            rest_recovery: 0.5,
            age_efficiency_weight: 0.5,
            min_efficiency: 0.1,
            food_energy: 2.0,
        }
    }
}

/// Tick dispatcher throttling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchTuning {
    /// Frames between passes of the growing group under normal load.
    pub growing_interval: u32,
    /// Frames between passes of the growing group once it exceeds `growing_load_threshold`.
    pub growing_interval_under_load: u32,
    /// Growing-group population that counts as load.
    pub growing_load_threshold: usize,
    /// Per-kind population above which pieces of that kind are strided across frames.
    pub kind_load_threshold: usize,
    /// Sort each group's registry by piece id before every pass.
    pub stable_order: bool,
}

impl Default for DispatchTuning {
    fn default() -> Self {
        Self {
            growing_interval: 1,
            growing_interval_under_load: 4,
            growing_load_threshold: 2000,
            kind_load_threshold: 500,
            stable_order: false,
        }
    }
}

impl Tuning {
    /// Parse tuning from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = toml::from_str(text)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Load tuning from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TuningError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would break the integrator or heat model.
    pub fn validate(&self) -> Result<(), TuningError> {
        let unit_open = |v: f32| v > 0.0 && v < 1.0;

        if !(self.heat.burning_threshold > 0.0 && self.heat.burning_threshold <= 1.0) {
            return Err(TuningError::Invalid {
                field: "heat.burning_threshold",
                reason: "must be in (0, 1]",
            });
        }
        if self.heat.extinguish_min_ticks == 0
            || self.heat.extinguish_min_ticks > self.heat.extinguish_max_ticks
        {
            return Err(TuningError::Invalid {
                field: "heat.extinguish_min_ticks",
                reason: "must be positive and not exceed extinguish_max_ticks",
            });
        }
        if self.heat.burn_damage_interval == 0 {
            return Err(TuningError::Invalid {
                field: "heat.burn_damage_interval",
                reason: "must be positive",
            });
        }
        if !unit_open(self.passive.retention) {
            return Err(TuningError::Invalid {
                field: "passive.retention",
                reason: "must be in (0, 1)",
            });
        }
        if !unit_open(self.passive.bounce_attenuation) {
            return Err(TuningError::Invalid {
                field: "passive.bounce_attenuation",
                reason: "must be in (0, 1)",
            });
        }
        if self.passive.stop_threshold <= 0.0 || self.passive.divisor <= 0.0 {
            return Err(TuningError::Invalid {
                field: "passive.stop_threshold",
                reason: "stop threshold and divisor must be positive",
            });
        }
        if self.decision.decision_interval == 0 {
            return Err(TuningError::Invalid {
                field: "decision.decision_interval",
                reason: "must be positive",
            });
        }
        if self.dispatch.growing_interval == 0 || self.dispatch.growing_interval_under_load == 0 {
            return Err(TuningError::Invalid {
                field: "dispatch.growing_interval",
                reason: "intervals must be positive",
            });
        }
        if !(self.energy.min_efficiency > 0.0 && self.energy.min_efficiency <= 1.0) {
            return Err(TuningError::Invalid {
                field: "energy.min_efficiency",
                reason: "must be in (0, 1]",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            [passive]
            retention = 0.5

            [dispatch]
            stable_order = true
        "#;
        let tuning = Tuning::from_toml_str(text).unwrap();
        assert!((tuning.passive.retention - 0.5).abs() < f32::EPSILON);
        assert!(tuning.dispatch.stable_order);
        assert_eq!(tuning.heat, HeatTuning::default());
    }

    #[test]
    fn test_rejects_divergent_retention() {
        let err = Tuning::from_toml_str("[passive]\nretention = 1.0\n").unwrap_err();
        assert!(matches!(
            err,
            TuningError::Invalid {
                field: "passive.retention",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_inverted_extinguish_range() {
        let text = "[heat]\nextinguish_min_ticks = 500\nextinguish_max_ticks = 100\n";
        assert!(Tuning::from_toml_str(text).is_err());
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            Tuning::from_toml_str("[heat\n"),
            Err(TuningError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Tuning::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, TuningError::Read { .. }));
    }
}
