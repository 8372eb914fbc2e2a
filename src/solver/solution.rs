//! Solver output.

use serde::{Deserialize, Serialize};

/// An action line and the state it leads to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverSolution<St, A> {
    /// Actions in execution order.
    pub actions: Vec<A>,
    /// State reached by applying `actions` from the starting state.
    pub state: St,
    /// Score of `state`; zero unless the craft was completed.
    pub score: f32,
}

impl<St, A> SolverSolution<St, A> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }
}
