//! Utility decision engine for autonomous agents.
//!
//! Callers precompute a small list of candidate [`Choice`]s from what the
//! agent can currently see, each with a priority from the heuristics below.
//! [`choose`] drops candidates without a target and returns the highest
//! priority; on equal priorities the first registered candidate wins, so a
//! given candidate list always yields the same answer.

use serde::{Deserialize, Serialize};

use crate::tuning::DecisionTuning;

/// Goal an agent may adopt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Flee,
    Eat,
    Mate,
}

/// One candidate goal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choice<T> {
    pub action: ActionKind,
    pub target: Option<T>,
    pub priority: f32,
}

impl<T> Choice<T> {
    pub fn new(action: ActionKind, target: Option<T>, priority: f32) -> Self {
        Self {
            action,
            target,
            priority,
        }
    }
}

/// Pick the best targeted candidate. Ties keep the earliest candidate.
pub fn choose<T: Copy>(choices: &[Choice<T>]) -> Option<Choice<T>> {
    let mut best: Option<Choice<T>> = None;
    for choice in choices.iter().filter(|c| c.target.is_some()) {
        match best {
            Some(current) if choice.priority <= current.priority => {}
            _ => best = Some(*choice),
        }
    }
    best
}

/// Flee priority for an enemy at `distance`, rising as it closes in.
///
/// Enemies outside perception are ignored.
pub fn flee_priority(distance: f32, perception: f32, tuning: &DecisionTuning) -> Option<f32> {
    if perception <= 0.0 || distance > perception {
        return None;
    }
    let closeness = 1.0 - (distance / perception).clamp(0.0, 1.0);
    Some(tuning.flee_base + tuning.flee_proximity * closeness)
}

/// Eat priority from hunger in `[0, 1]` and the health fraction.
///
/// Critical health overrides hunger with a fixed high priority. Food that is
/// already within reach is scaled down so fleeing still wins close calls.
pub fn eat_priority(hunger: f32, health_fraction: f32, at_hand: bool, tuning: &DecisionTuning) -> f32 {
    let base = if health_fraction < tuning.critical_health_fraction {
        tuning.eat_critical
    } else {
        hunger.clamp(0.0, 1.0) * tuning.eat_weight
    };
    if at_hand {
        base * tuning.at_hand_factor
    } else {
        base
    }
}

/// Flat mate priority, offered only to agents fed enough to breed.
pub fn mate_priority(fed_fraction: f32, tuning: &DecisionTuning) -> Option<f32> {
    (fed_fraction >= tuning.mate_min_fed_fraction).then_some(tuning.mate_priority)
}

/// Chance per tick that an idle agent looks around and reassesses.
pub fn look_around_chance(awareness: f32, tuning: &DecisionTuning) -> f32 {
    (tuning.look_around_chance * awareness.max(0.0)).clamp(0.0, 1.0)
}

/// Chance per chase tick that an agent gives up on its target.
pub fn give_up_chance(awareness: f32, tuning: &DecisionTuning) -> f32 {
    (tuning.give_up_chance * awareness.max(0.0)).clamp(0.0, 1.0)
}

/// Ticks an agent keeps chasing before giving up; more aware agents are less patient.
pub fn patience(awareness: f32, tuning: &DecisionTuning) -> u32 {
    let scaled = tuning.base_patience as f32 / (1.0 + awareness.max(0.0));
    (scaled.round() as u32).max(1)
}

/// Whether an ongoing state should re-run the decision engine this tick.
///
/// `roll` is a uniform integer sample; evaluation happens on about one tick
/// in `decision_interval`.
pub fn should_reevaluate(roll: u32, tuning: &DecisionTuning) -> bool {
    roll % tuning.decision_interval.max(1) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_highest_priority() {
        let choices = [
            Choice::new(ActionKind::Eat, Some(1u32), 1.2),
            Choice::new(ActionKind::Flee, Some(2u32), 3.0),
            Choice::new(ActionKind::Mate, Some(3u32), 0.8),
        ];
        let best = choose(&choices).unwrap();
        assert_eq!(best.action, ActionKind::Flee);
        assert_eq!(best.target, Some(2));
    }

    #[test]
    fn test_choose_skips_untargeted() {
        let choices = [
            Choice::new(ActionKind::Flee, None, 10.0),
            Choice::new(ActionKind::Eat, Some(7u32), 0.1),
        ];
        assert_eq!(choose(&choices).unwrap().target, Some(7));
        assert!(choose::<u32>(&[Choice::new(ActionKind::Mate, None, 1.0)]).is_none());
        assert!(choose::<u32>(&[]).is_none());
    }

    #[test]
    fn test_tie_break_first_registered_wins() {
        let choices = [
            Choice::new(ActionKind::Mate, Some(4u32), 1.0),
            Choice::new(ActionKind::Eat, Some(5u32), 1.0),
            Choice::new(ActionKind::Flee, Some(6u32), 1.0),
        ];
        for _ in 0..10 {
            let best = choose(&choices).unwrap();
            assert_eq!(best.action, ActionKind::Mate);
            assert_eq!(best.target, Some(4));
        }
    }

    #[test]
    fn test_flee_priority_rises_with_proximity() {
        let tuning = DecisionTuning::default();
        let far = flee_priority(290.0, 300.0, &tuning).unwrap();
        let near = flee_priority(10.0, 300.0, &tuning).unwrap();
        assert!(near > far);
        assert!(flee_priority(301.0, 300.0, &tuning).is_none());
    }

    #[test]
    fn test_eat_priority() {
        let tuning = DecisionTuning::default();
        let hungry = eat_priority(0.8, 1.0, false, &tuning);
        let sated = eat_priority(0.1, 1.0, false, &tuning);
        assert!(hungry > sated);
        assert!((eat_priority(0.0, 0.1, false, &tuning) - tuning.eat_critical).abs() < 1e-6);
        assert!(eat_priority(0.8, 1.0, true, &tuning) < hungry);
    }

    #[test]
    fn test_mate_priority_requires_fed() {
        let tuning = DecisionTuning::default();
        assert!(mate_priority(0.2, &tuning).is_none());
        assert_eq!(mate_priority(0.9, &tuning), Some(tuning.mate_priority));
    }

    #[test]
    fn test_awareness_shortens_patience() {
        let tuning = DecisionTuning::default();
        assert!(patience(2.0, &tuning) < patience(0.5, &tuning));
        assert!(give_up_chance(2.0, &tuning) > give_up_chance(0.5, &tuning));
        assert!(look_around_chance(2.0, &tuning) > look_around_chance(0.5, &tuning));
    }

    #[test]
    fn test_reevaluation_sampling() {
        let tuning = DecisionTuning::default();
        let hits = (0..100).filter(|&r| should_reevaluate(r, &tuning)).count();
        assert_eq!(hits, 20);
    }
}
