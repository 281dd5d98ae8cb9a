//! Vital statistics and the energy economy.
//!
//! Energy moves through three pools in a fixed order: stamina, then the fed
//! level, then raw hit points. Spending drains stamina first and only eats
//! into the fed level once stamina is gone, and into health once the piece
//! is starving. Gaining energy refills in the same order. A piece therefore
//! never dies of short-term exhaustion before starving, nor starves before
//! losing health.

use serde::{Deserialize, Serialize};

use crate::tuning::EnergyTuning;

/// Vital statistics of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub mass: f32,
    hit_points: f32,
    pub max_hit_points: f32,
    /// Ticks lived.
    pub age: u32,
    /// Ticks after which the piece dies of old age; zero means ageless.
    pub max_age: u32,
    /// Accumulated wear in `[0, 1]`; only ever grows.
    wear: f32,
    pub strength: f32,
    pub speed: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    pub fed: f32,
    pub max_fed: f32,
}

/// How a spend was covered.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Depletion {
    pub from_stamina: f32,
    pub from_fed: f32,
    pub from_health: f32,
}

impl Depletion {
    pub fn total(&self) -> f32 {
        self.from_stamina + self.from_fed + self.from_health
    }
}

impl Vitals {
    /// Fresh vitals with all pools full.
    pub fn new(mass: f32, max_hit_points: f32, max_stamina: f32, max_fed: f32) -> Self {
        Self {
            mass,
            hit_points: max_hit_points,
            max_hit_points,
            age: 0,
            max_age: 0,
            wear: 0.0,
            strength: 1.0,
            speed: 1.0,
            stamina: max_stamina,
            max_stamina,
            fed: max_fed,
            max_fed,
        }
    }

    pub fn hit_points(&self) -> f32 {
        self.hit_points
    }

    /// Set hit points, clamped to `[0, max_hit_points]`.
    pub fn set_hit_points(&mut self, value: f32) {
        self.hit_points = value.clamp(0.0, self.max_hit_points);
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_hit_points <= 0.0 {
            0.0
        } else {
            self.hit_points / self.max_hit_points
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.hit_points <= 0.0
    }

    /// Remove hit points. Returns true if this call took the piece to zero.
    pub fn damage(&mut self, amount: f32) -> bool {
        let was_alive = self.hit_points > 0.0;
        self.set_hit_points(self.hit_points - amount.max(0.0));
        was_alive && self.hit_points <= 0.0
    }

    pub fn heal(&mut self, amount: f32) {
        self.set_hit_points(self.hit_points + amount.max(0.0));
    }

    pub fn wear(&self) -> f32 {
        self.wear
    }

    /// Accumulate wear. Negative amounts are ignored so efficiency never rises.
    pub fn add_wear(&mut self, amount: f32) {
        self.wear = (self.wear + amount.max(0.0)).min(1.0);
    }

    /// Hunger in `[0, 1]`: zero when fully fed.
    pub fn hunger(&self) -> f32 {
        if self.max_fed <= 0.0 {
            0.0
        } else {
            1.0 - (self.fed / self.max_fed).clamp(0.0, 1.0)
        }
    }

    pub fn fed_fraction(&self) -> f32 {
        1.0 - self.hunger()
    }

    /// Efficiency from age and wear. Non-increasing over a lifetime because
    /// both inputs only grow.
    pub fn efficiency(&self, tuning: &EnergyTuning) -> f32 {
        let age_factor = if self.max_age == 0 {
            1.0
        } else {
            1.0 - tuning.age_efficiency_weight * (self.age as f32 / self.max_age as f32).min(1.0)
        };
        (age_factor * (1.0 - self.wear)).clamp(tuning.min_efficiency, 1.0)
    }

    /// Advance age. Returns true once the piece has outlived its span.
    pub fn grow_older(&mut self, ticks: u32) -> bool {
        self.age = self.age.saturating_add(ticks);
        self.max_age != 0 && self.age >= self.max_age
    }

    /// Zero every pool, as on death.
    pub fn zero(&mut self) {
        self.hit_points = 0.0;
        self.stamina = 0.0;
        self.fed = 0.0;
    }

    /// Spend energy through the stamina → fed → health chain.
    ///
    /// Less efficient pieces pay more for the same work.
    pub fn expend(&mut self, amount: f32, tuning: &EnergyTuning) -> Depletion {
        let mut remaining = amount.max(0.0) / self.efficiency(tuning);
        let mut depletion = Depletion::default();

        let take = remaining.min(self.stamina);
        self.stamina -= take;
        remaining -= take;
        depletion.from_stamina = take;

        let take = remaining.min(self.fed);
        self.fed -= take;
        remaining -= take;
        depletion.from_fed = take;

        let take = remaining.min(self.hit_points);
        self.set_hit_points(self.hit_points - take);
        depletion.from_health = take;

        depletion
    }

    /// Gain energy through the stamina → fed → health chain.
    ///
    /// `affinity` scales how well this piece digests the source. Returns the
    /// amount that could not be stored.
    pub fn acquire(&mut self, amount: f32, affinity: f32, tuning: &EnergyTuning) -> f32 {
        let mut remaining = amount.max(0.0) * self.efficiency(tuning) * affinity.max(0.0);

        let room = (self.max_stamina - self.stamina).max(0.0);
        let give = remaining.min(room);
        self.stamina += give;
        remaining -= give;

        let room = (self.max_fed - self.fed).max(0.0);
        let give = remaining.min(room);
        self.fed += give;
        remaining -= give;

        let room = (self.max_hit_points - self.hit_points).max(0.0);
        let give = remaining.min(room);
        self.set_hit_points(self.hit_points + give);
        remaining - give
    }

    /// Convert fed level into stamina while resting.
    pub fn rest(&mut self, tuning: &EnergyTuning) {
        let room = (self.max_stamina - self.stamina).max(0.0);
        let amount = tuning.rest_recovery.min(room).min(self.fed);
        self.fed -= amount;
        self.stamina += amount;
    }

    /// Restore template values that are not serialized directly.
    pub fn restore(&mut self, hit_points: f32, wear: f32) {
        self.set_hit_points(hit_points);
        self.wear = wear.clamp(0.0, 1.0);
    }
}
