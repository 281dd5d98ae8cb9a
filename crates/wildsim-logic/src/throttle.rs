//! Tick throttling for large populations.
//!
//! Pieces are split into two tick groups: one whose members grow and
//! reproduce passively (plants), and one for everything else. Each group
//! can run at its own frame interval, so plants can be slowed down under
//! load without touching animals.
//!
//! Inside a pass, a kind whose population exceeds the load threshold is
//! strided: each piece is processed on one frame in `stride`, offset by its
//! slot so the work spreads evenly. Skipped pieces keep their last-processed
//! counter, so the elapsed delta they receive next time covers the gap.
//!
//! ```
//! use wildsim_logic::throttle::{group_runs, should_process, TickGroup};
//! use wildsim_logic::tuning::DispatchTuning;
//!
//! let tuning = DispatchTuning::default();
//! assert!(group_runs(TickGroup::General, 0, 10_000, &tuning));
//! assert!(should_process(100, 7, 3, &tuning));
//! ```

use serde::{Deserialize, Serialize};

use crate::tuning::DispatchTuning;

/// Dispatch partition a piece belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickGroup {
    /// Pieces that grow or reproduce passively.
    Growing,
    General,
}

impl TickGroup {
    pub const ALL: [TickGroup; 2] = [TickGroup::General, TickGroup::Growing];

    pub fn index(self) -> usize {
        match self {
            TickGroup::General => 0,
            TickGroup::Growing => 1,
        }
    }
}

/// Frame interval for a group given its current population.
pub fn group_interval(group: TickGroup, population: usize, tuning: &DispatchTuning) -> u32 {
    match group {
        TickGroup::General => 1,
        TickGroup::Growing if population > tuning.growing_load_threshold => {
            tuning.growing_interval_under_load.max(1)
        }
        TickGroup::Growing => tuning.growing_interval.max(1),
    }
}

/// Whether a group gets a pass on this frame.
pub fn group_runs(group: TickGroup, frame: u64, population: usize, tuning: &DispatchTuning) -> bool {
    frame % u64::from(group_interval(group, population, tuning)) == 0
}

/// Stride for a kind with the given population; one means every pass.
pub fn stride(kind_population: usize, tuning: &DispatchTuning) -> u64 {
    if tuning.kind_load_threshold == 0 || kind_population <= tuning.kind_load_threshold {
        1
    } else {
        kind_population.div_ceil(tuning.kind_load_threshold) as u64
    }
}

/// Whether a piece in `slot` of a kind with `kind_population` members is
/// processed on group pass `pass`.
pub fn should_process(kind_population: usize, slot: u64, pass: u64, tuning: &DispatchTuning) -> bool {
    let stride = stride(kind_population, tuning);
    stride == 1 || (slot + pass) % stride == 0
}

/// Per-group counts reported by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Pieces whose state machine ran.
    pub processed: usize,
    /// Pieces that took a passive-movement step instead.
    pub passive_steps: usize,
    /// Pieces skipped by kind striding.
    pub throttled: usize,
    /// Pieces already handled this pass.
    pub already_done: usize,
    /// Pieces dropped from the registry.
    pub deregistered: usize,
}

impl DispatchStats {
    pub fn merge(&mut self, other: &DispatchStats) {
        self.processed += other.processed;
        self.passive_steps += other.passive_steps;
        self.throttled += other.throttled;
        self.already_done += other.already_done;
        self.deregistered += other.deregistered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_group_runs_every_frame() {
        let tuning = DispatchTuning::default();
        for frame in 0..10 {
            assert!(group_runs(TickGroup::General, frame, 1_000_000, &tuning));
        }
    }

    #[test]
    fn growing_group_slows_under_load() {
        let tuning = DispatchTuning::default();
        let busy = tuning.growing_load_threshold + 1;
        let runs: Vec<bool> = (0..8).map(|f| group_runs(TickGroup::Growing, f, busy, &tuning)).collect();
        assert_eq!(runs, vec![true, false, false, false, true, false, false, false]);
        assert!(group_runs(TickGroup::Growing, 3, 10, &tuning));
    }

    #[test]
    fn stride_grows_with_population() {
        let tuning = DispatchTuning::default();
        assert_eq!(stride(10, &tuning), 1);
        assert_eq!(stride(tuning.kind_load_threshold, &tuning), 1);
        assert_eq!(stride(tuning.kind_load_threshold + 1, &tuning), 2);
        assert_eq!(stride(tuning.kind_load_threshold * 3, &tuning), 3);
    }

    #[test]
    fn strided_pieces_spread_across_passes() {
        let tuning = DispatchTuning::default();
        let population = tuning.kind_load_threshold * 2;
        for slot in 0..4u64 {
            let hits = (0..10).filter(|&p| should_process(population, slot, p, &tuning)).count();
            assert_eq!(hits, 5, "slot {slot} processed {hits} times");
        }
        assert!(should_process(population, 0, 0, &tuning));
        assert!(!should_process(population, 1, 0, &tuning));
    }

    #[test]
    fn stats_merge() {
        let mut a = DispatchStats {
            processed: 2,
            ..Default::default()
        };
        let b = DispatchStats {
            processed: 3,
            throttled: 1,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.processed, 5);
        assert_eq!(a.throttled, 1);
    }
}
