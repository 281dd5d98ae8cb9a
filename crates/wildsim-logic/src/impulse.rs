//! Passive movement - decaying impulses independent of a piece's own will.
//!
//! Knockback, explosions, fire push-back and drift all land here as an
//! accumulated velocity plus a spin. Each tick the integrator either settles
//! the motion, moves by `velocity / divisor` and decays it, or bounces off an
//! obstacle with an attenuated, inverted velocity.
//!
//! Positions are integral, so an axis whose displacement is under one unit
//! "flickers": it moves a single unit on a duty cycle of one tick in
//! `11 - speed`. Sub-unit drift therefore still displaces the piece instead
//! of stalling.
//!
//! Both the retention and the bounce factors are below one, so the velocity
//! magnitude shrinks geometrically and [`settle_bound`] ticks is enough to
//! reach the stop threshold.

use serde::{Deserialize, Serialize};

use crate::tuning::PassiveTuning;

/// Highest speed rating; the flicker period is `MAX_SPEED_RATING + 1 - speed`.
pub const MAX_SPEED_RATING: u8 = 10;

/// Accumulated passive velocity and spin of a piece.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PassiveMotion {
    pub dx: f32,
    pub dy: f32,
    /// Degrees per tick.
    pub spin: f32,
}

impl PassiveMotion {
    pub const ZERO: Self = Self {
        dx: 0.0,
        dy: 0.0,
        spin: 0.0,
    };

    pub fn new(dx: f32, dy: f32) -> Self {
        Self { dx, dy, spin: 0.0 }
    }

    /// Whether the piece is currently being displaced or rotated.
    pub fn is_active(&self) -> bool {
        self.dx != 0.0 || self.dy != 0.0 || self.spin != 0.0
    }

    pub fn magnitude(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }

    /// Accumulate an impulse.
    pub fn add(&mut self, dx: f32, dy: f32, spin: f32) {
        self.dx += dx;
        self.dy += dy;
        self.spin += spin;
    }

    pub fn clear(&mut self) {
        *self = Self::ZERO;
    }
}

/// What one integrator step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassiveStep {
    /// Remaining motion fell under the threshold and was zeroed.
    Settled,
    /// The piece moved (possibly by zero units while flickering) and the motion decayed.
    Moved { dx: i32, dy: i32, rotation: f32 },
    /// The move was blocked; velocity and spin were inverted and attenuated.
    Bounced,
}

/// Clamp a raw speed attribute to a flicker-usable rating.
pub fn speed_rating(speed: f32) -> u8 {
    speed.round().clamp(1.0, f32::from(MAX_SPEED_RATING)) as u8
}

/// Integer displacement for one axis, flickering when under one unit.
fn axis_step(velocity: f32, period: u64, tick: u64) -> i32 {
    if velocity.abs() >= 1.0 {
        velocity.trunc() as i32
    } else if velocity != 0.0 && tick % period == 0 {
        velocity.signum() as i32
    } else {
        0
    }
}

/// Integer displacement this tick for a given motion.
pub fn displacement(motion: &PassiveMotion, speed: u8, tick: u64, tuning: &PassiveTuning) -> (i32, i32) {
    let rating = speed.clamp(1, MAX_SPEED_RATING);
    let period = u64::from(MAX_SPEED_RATING + 1 - rating);
    (
        axis_step(motion.dx / tuning.divisor, period, tick),
        axis_step(motion.dy / tuning.divisor, period, tick),
    )
}

/// Advance passive motion by one tick.
///
/// `try_move` receives the integer displacement and reports whether the
/// piece could occupy the new position. It is not called when the motion
/// settles, nor when the displacement is zero on both axes.
pub fn step<F>(
    motion: &mut PassiveMotion,
    speed: u8,
    tick: u64,
    tuning: &PassiveTuning,
    try_move: F,
) -> PassiveStep
where
    F: FnOnce(i32, i32) -> bool,
{
    if motion.dx.abs() < tuning.stop_threshold && motion.dy.abs() < tuning.stop_threshold {
        motion.clear();
        return PassiveStep::Settled;
    }

    let (dx, dy) = displacement(motion, speed, tick, tuning);
    let moved = (dx == 0 && dy == 0) || try_move(dx, dy);

    if moved {
        let rotation = motion.spin;
        motion.dx *= tuning.retention;
        motion.dy *= tuning.retention;
        motion.spin *= tuning.retention;
        PassiveStep::Moved { dx, dy, rotation }
    } else {
        motion.dx = -motion.dx * tuning.bounce_attenuation;
        motion.dy = -motion.dy * tuning.bounce_attenuation;
        motion.spin = -motion.spin * tuning.bounce_attenuation;
        PassiveStep::Bounced
    }
}

/// Spin for a tumbling piece hit by an impulse of `magnitude`.
///
/// `roll` is a uniform sample in `[-1, 1]` supplied by the caller's RNG.
pub fn tumble_spin(magnitude: f32, roll: f32, tuning: &PassiveTuning) -> f32 {
    (roll.clamp(-1.0, 1.0) * magnitude * tuning.tumble_factor).clamp(-tuning.max_spin, tuning.max_spin)
}

/// Upper bound on the ticks needed for a motion of `magnitude` to settle.
pub fn settle_bound(magnitude: f32, tuning: &PassiveTuning) -> u32 {
    if magnitude < tuning.stop_threshold {
        return 1;
    }
    let worst = tuning.retention.max(tuning.bounce_attenuation);
    let ticks = (tuning.stop_threshold / magnitude).ln() / worst.ln();
    ticks.ceil() as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_motion_settles() {
        let tuning = PassiveTuning::default();
        let mut motion = PassiveMotion::new(0.1, -0.2);
        motion.spin = 3.0;
        let result = step(&mut motion, 5, 0, &tuning, |_, _| panic!("must not move"));
        assert_eq!(result, PassiveStep::Settled);
        assert!(!motion.is_active());
    }

    #[test]
    fn test_move_decays_velocity() {
        let tuning = PassiveTuning::default();
        let mut motion = PassiveMotion::new(10.0, 0.0);
        let result = step(&mut motion, 5, 1, &tuning, |dx, dy| {
            assert_eq!((dx, dy), (10, 0));
            true
        });
        assert!(matches!(result, PassiveStep::Moved { dx: 10, dy: 0, .. }));
        assert!((motion.dx - 8.5).abs() < 1e-5);
    }

    #[test]
    fn test_collision_bounces() {
        let tuning = PassiveTuning::default();
        let mut motion = PassiveMotion::new(4.0, -2.0);
        motion.spin = 6.0;
        let result = step(&mut motion, 5, 1, &tuning, |_, _| false);
        assert_eq!(result, PassiveStep::Bounced);
        assert!((motion.dx + 2.0).abs() < 1e-5);
        assert!((motion.dy - 1.0).abs() < 1e-5);
        assert!((motion.spin + 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_sub_unit_flicker_duty_cycle() {
        let tuning = PassiveTuning::default();
        let motion = PassiveMotion::new(0.6, 0.0);
        // Speed 8 flickers on one tick in three.
        let moves: Vec<i32> = (0..6).map(|t| displacement(&motion, 8, t, &tuning).0).collect();
        assert_eq!(moves, vec![1, 0, 0, 1, 0, 0]);
    }

    #[test]
    fn test_max_speed_flickers_every_tick() {
        let tuning = PassiveTuning::default();
        let motion = PassiveMotion::new(-0.5, 0.5);
        for t in 0..4 {
            assert_eq!(displacement(&motion, MAX_SPEED_RATING, t, &tuning), (-1, 1));
        }
    }

    #[test]
    fn test_motion_always_terminates() {
        let tuning = PassiveTuning::default();
        for &(dx, dy) in &[(50.0, 0.0), (-13.0, 7.5), (0.9, 0.9), (200.0, -200.0)] {
            let mut motion = PassiveMotion::new(dx, dy);
            let bound = settle_bound(motion.magnitude(), &tuning);
            let mut ticks = 0;
            let mut blocked = false;
            loop {
                ticks += 1;
                // Alternate between free moves and collisions.
                blocked = !blocked;
                if step(&mut motion, 3, ticks as u64, &tuning, |_, _| !blocked) == PassiveStep::Settled {
                    break;
                }
                assert!(ticks <= bound, "({dx}, {dy}) did not settle within {bound} ticks");
            }
        }
    }

    #[test]
    fn test_tumble_spin_is_bounded() {
        let tuning = PassiveTuning::default();
        assert!((tumble_spin(100.0, 1.0, &tuning) - tuning.max_spin).abs() < f32::EPSILON);
        assert!((tumble_spin(100.0, -1.0, &tuning) + tuning.max_spin).abs() < f32::EPSILON);
        assert!((tumble_spin(2.0, 0.5, &tuning) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_speed_rating_clamps() {
        assert_eq!(speed_rating(0.0), 1);
        assert_eq!(speed_rating(4.4), 4);
        assert_eq!(speed_rating(40.0), MAX_SPEED_RATING);
    }
}
