//! The domain simulator the solver drives.
//!
//! The solver never looks inside a state. Everything it needs goes through
//! the `Simulator` trait: apply an action, ask whether the state is finished,
//! list the actions worth trying, and read the numbers the score is built
//! from.

use serde::{Deserialize, Serialize};

use super::node::CompletionState;
use crate::core::{ActionKind, ActionRegistry, ActionSet, HeuristicMode};
use crate::mcts::MCTSConfig;

/// Outcome of applying one action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionResponse {
    /// The action was applied.
    Used,
    /// The action could not be used in this state; the state is unchanged.
    NotUsable,
    /// The state was already terminal; nothing happened.
    SimulationComplete,
}

/// Raw quantities the score is computed from.
///
/// A target of zero removes the matching term from the score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetrics {
    pub progress: u32,
    pub max_progress: u32,
    pub quality: u32,
    pub max_quality: u32,
    pub durability: u32,
    pub max_durability: u32,
    pub cp: u32,
    pub max_cp: u32,
    /// Actions applied since the start of the craft.
    pub steps_taken: u32,
}

/// A deterministic domain transition system.
///
/// Any randomness has to live inside `State`; `execute` must return the same
/// result for the same inputs.
pub trait Simulator: Clone + Send + Sync {
    type State: Clone + Send + Sync;
    type Action: ActionKind;

    /// Actions the solver may try, in bitset slot order.
    fn registry(&self) -> &ActionRegistry<Self::Action>;

    /// Apply `action` to `state`, returning the new state.
    fn execute(&self, state: &Self::State, action: Self::Action) -> (ActionResponse, Self::State);

    /// Whether `state` is finished, and how.
    fn completion_state(&self, state: &Self::State) -> CompletionState;

    /// Usable actions in `state`, optionally pruned of dominated ones.
    fn available_actions(&self, state: &Self::State, strict: bool) -> ActionSet;

    /// Quantities for scoring.
    fn metrics(&self, state: &Self::State) -> StateMetrics;
}

/// A simulator with the solver's step budget applied.
///
/// A state that is still incomplete but has used up all but the last step
/// reports `MaxActionCountReached`. Terminal states have no actions.
#[derive(Clone, Debug)]
pub struct StepLimitedSimulator<S> {
    inner: S,
    max_step_count: u32,
}

impl<S: Simulator> StepLimitedSimulator<S> {
    pub fn new(inner: S, max_step_count: u32) -> Self {
        Self { inner, max_step_count }
    }

    #[inline]
    pub fn registry(&self) -> &ActionRegistry<S::Action> {
        self.inner.registry()
    }

    #[inline]
    pub fn execute(&self, state: &S::State, action: S::Action) -> (ActionResponse, S::State) {
        self.inner.execute(state, action)
    }

    #[inline]
    pub fn metrics(&self, state: &S::State) -> StateMetrics {
        self.inner.metrics(state)
    }

    pub fn completion_state(&self, state: &S::State) -> CompletionState {
        let base = self.inner.completion_state(state);
        if base == CompletionState::Incomplete
            && self.inner.metrics(state).steps_taken + 1 >= self.max_step_count
        {
            CompletionState::MaxActionCountReached
        } else {
            base
        }
    }

    pub fn is_complete(&self, state: &S::State) -> bool {
        self.completion_state(state).is_terminal()
    }

    /// Actions to try from `state` under `mode`.
    pub fn available_actions(&self, state: &S::State, mode: HeuristicMode) -> ActionSet {
        if self.is_complete(state) {
            ActionSet::new()
        } else {
            self.inner.available_actions(state, mode.is_strict())
        }
    }

    /// Score of `state` given its completion state.
    pub fn score(&self, state: &S::State, completion: CompletionState, config: &MCTSConfig) -> Option<f32> {
        super::node::calculate_score_for_state(&self.inner.metrics(state), completion, config)
    }
}
