//! MCTS search statistics for diagnostics and tuning.

use serde::{Deserialize, Serialize};

/// Statistics collected during MCTS search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Total iterations performed.
    pub iterations: u64,

    /// Nodes added by expansion.
    pub nodes_expanded: u64,

    /// Rollouts played out.
    pub simulations: u64,

    /// Rollouts kept in the tree as real nodes.
    pub materialized: u64,

    /// Nodes added by materialization.
    pub nodes_materialized: u64,

    /// Total time spent searching (microseconds).
    pub time_us: u64,
}

impl SearchStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all statistics to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold another search's counters into this one.
    pub fn merge(&mut self, other: &SearchStats) {
        self.iterations += other.iterations;
        self.nodes_expanded += other.nodes_expanded;
        self.simulations += other.simulations;
        self.materialized += other.materialized;
        self.nodes_materialized += other.nodes_materialized;
        self.time_us = self.time_us.max(other.time_us);
    }

    /// Calculate iterations per second.
    #[must_use]
    pub fn iterations_per_second(&self) -> f64 {
        if self.time_us == 0 {
            0.0
        } else {
            self.iterations as f64 / (self.time_us as f64 / 1_000_000.0)
        }
    }

    /// Nodes added to the tree per iteration.
    #[must_use]
    pub fn avg_nodes_per_iteration(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            (self.nodes_expanded + self.nodes_materialized) as f64 / self.iterations as f64
        }
    }
}
