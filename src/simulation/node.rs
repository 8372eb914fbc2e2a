//! Tree node payload and state scoring.

use serde::{Deserialize, Serialize};

use super::simulator::{ActionResponse, StateMetrics, StepLimitedSimulator, Simulator};
use crate::core::{ActionKind, ActionSet, AtomicActionSet};
use crate::mcts::MCTSConfig;

/// How a simulation ended, if it did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionState {
    #[default]
    Incomplete,
    ProgressComplete,
    NoMoreDurability,
    InvalidAction,
    MaxActionCountReached,
    NoMoreActions,
}

impl CompletionState {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != CompletionState::Incomplete
    }

    /// Completion state of a node: an incomplete simulation with nothing
    /// left to try is `NoMoreActions`.
    #[inline]
    #[must_use]
    pub fn from_parts(simulation: CompletionState, actions: ActionSet) -> CompletionState {
        if actions.is_empty() && simulation == CompletionState::Incomplete {
            CompletionState::NoMoreActions
        } else {
            simulation
        }
    }
}

/// Payload of a search tree node.
#[derive(Debug)]
pub struct SimulationNode<St, A> {
    pub state: St,
    /// Action that led here. `None` only at the root.
    pub action: Option<A>,
    pub simulation_completion_state: CompletionState,
    /// Actions not yet expanded from this node.
    pub available_actions: AtomicActionSet,
}

impl<St, A: ActionKind> SimulationNode<St, A> {
    pub fn new(state: St, action: Option<A>, simulation_completion_state: CompletionState, actions: ActionSet) -> Self {
        Self {
            state,
            action,
            simulation_completion_state,
            available_actions: AtomicActionSet::new(actions),
        }
    }

    #[inline]
    pub fn completion_state(&self) -> CompletionState {
        CompletionState::from_parts(self.simulation_completion_state, self.available_actions.load())
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completion_state().is_terminal()
    }
}

/// `weight` scaled by `value / target`; a zero target counts as reached.
#[inline]
fn ratio_term(weight: f32, value: u32, target: u32) -> f32 {
    if target == 0 {
        weight
    } else {
        weight * (value as f32 / target as f32).clamp(0.0, 1.0)
    }
}

/// Score of a finished state, `None` unless the craft completed.
///
/// Weighted sum of the progress, quality, durability and CP ratios (each
/// clamped to `[0, 1]`) plus `score_steps * (1 - (steps_taken + 1) / max_step_count)`.
/// A zero target earns its full weight, except quality: a recipe without
/// quality drops the quality term. The result lies in `[0, total weight]`.
#[must_use]
pub fn calculate_score_for_state(
    metrics: &StateMetrics,
    completion: CompletionState,
    config: &MCTSConfig,
) -> Option<f32> {
    if completion != CompletionState::ProgressComplete {
        return None;
    }

    let progress = ratio_term(config.score_progress, metrics.progress, metrics.max_progress);
    let quality = if metrics.max_quality == 0 {
        0.0
    } else {
        ratio_term(config.score_quality, metrics.quality, metrics.max_quality)
    };
    let durability = ratio_term(config.score_durability, metrics.durability, metrics.max_durability);
    let cp = ratio_term(config.score_cp, metrics.cp, metrics.max_cp);

    let step_ratio = (metrics.steps_taken + 1) as f32 / config.max_step_count.max(1) as f32;
    let fewer_steps = config.score_steps * (1.0 - step_ratio).max(0.0);

    Some(progress + quality + durability + cp + fewer_steps)
}

/// Score a fixed action list from `state`.
///
/// Stops at the first action that is not used. A list that breaks off on an
/// unusable action before the craft finished scores half. Returns the score
/// and the state reached.
pub fn score_actions<S: Simulator>(
    simulator: &StepLimitedSimulator<S>,
    state: &S::State,
    actions: &[S::Action],
    config: &MCTSConfig,
) -> (f32, S::State) {
    let mut current = state.clone();
    let mut failed = false;

    for &action in actions {
        let (response, next) = simulator.execute(&current, action);
        match response {
            ActionResponse::Used => current = next,
            ActionResponse::NotUsable => {
                failed = true;
                break;
            }
            ActionResponse::SimulationComplete => break,
        }
    }

    let completion = simulator.completion_state(&current);
    let mut score = simulator.score(&current, completion, config).unwrap_or(0.0);
    if failed {
        score /= 2.0;
    }
    (score, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> StateMetrics {
        StateMetrics {
            progress: 1000,
            max_progress: 1000,
            quality: 500,
            max_quality: 1000,
            durability: 40,
            max_durability: 80,
            cp: 100,
            max_cp: 400,
            steps_taken: 9,
        }
    }

    #[test]
    fn test_derived_completion_state() {
        let empty = ActionSet::new();
        let some = ActionSet::from_bits(0b101);

        assert_eq!(
            CompletionState::from_parts(CompletionState::Incomplete, empty),
            CompletionState::NoMoreActions
        );
        assert_eq!(
            CompletionState::from_parts(CompletionState::Incomplete, some),
            CompletionState::Incomplete
        );
        assert_eq!(
            CompletionState::from_parts(CompletionState::ProgressComplete, empty),
            CompletionState::ProgressComplete
        );
    }

    #[test]
    fn test_node_completion_follows_available_actions() {
        let node: SimulationNode<(), u8> =
            SimulationNode::new((), None, CompletionState::Incomplete, ActionSet::from_bits(0b1));
        assert!(!node.is_complete());

        let registry = crate::core::ActionRegistry::new(&[7u8]).unwrap();
        assert!(node.available_actions.remove(&registry, 7));
        assert_eq!(node.completion_state(), CompletionState::NoMoreActions);
    }

    #[test]
    fn test_score_weighted_sum() {
        let config = MCTSConfig::default();
        let score = calculate_score_for_state(&metrics(), CompletionState::ProgressComplete, &config).unwrap();

        let expected = 0.20 * 1.0 + 0.65 * 0.5 + 0.05 * 0.5 + 0.05 * 0.25 + 0.05 * (1.0 - 10.0 / 30.0);
        assert!((score - expected).abs() < 1e-6, "{} != {}", score, expected);
    }

    #[test]
    fn test_score_is_none_unless_progress_complete() {
        let config = MCTSConfig::default();
        for completion in [
            CompletionState::Incomplete,
            CompletionState::NoMoreDurability,
            CompletionState::InvalidAction,
            CompletionState::MaxActionCountReached,
            CompletionState::NoMoreActions,
        ] {
            assert_eq!(calculate_score_for_state(&metrics(), completion, &config), None);
        }
    }

    #[test]
    fn test_zero_quality_target_drops_term() {
        let config = MCTSConfig::default();
        let mut m = metrics();
        m.quality = 0;
        m.max_quality = 0;

        let score = calculate_score_for_state(&m, CompletionState::ProgressComplete, &config).unwrap();
        let expected = 0.20 + 0.05 * 0.5 + 0.05 * 0.25 + 0.05 * (1.0 - 10.0 / 30.0);
        assert!((score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_zero_target_earns_full_weight() {
        let config = MCTSConfig::default();
        let m = StateMetrics {
            progress: 100,
            max_progress: 100,
            quality: 50,
            max_quality: 100,
            durability: 10,
            max_durability: 10,
            cp: 0,
            max_cp: 0,
            steps_taken: 0,
        };

        let score = calculate_score_for_state(&m, CompletionState::ProgressComplete, &config).unwrap();
        let expected = 0.20 + 0.65 * 0.5 + 0.05 + 0.05 + 0.05 * (1.0 - 1.0 / 30.0);
        assert!((score - expected).abs() < 1e-6, "{} != {}", score, expected);

        let no_durability = StateMetrics { durability: 0, max_durability: 0, ..m };
        let same = calculate_score_for_state(&no_durability, CompletionState::ProgressComplete, &config).unwrap();
        assert!((same - expected).abs() < 1e-6);
    }

    #[test]
    fn test_ratios_are_clamped() {
        let config = MCTSConfig::default();
        let mut m = metrics();
        m.quality = 5000;
        m.steps_taken = 100;

        let score = calculate_score_for_state(&m, CompletionState::ProgressComplete, &config).unwrap();
        assert!(score <= config.total_weight() + 1e-6);
        let expected = 0.20 + 0.65 + 0.05 * 0.5 + 0.05 * 0.25;
        assert!((score - expected).abs() < 1e-6);
    }
}
