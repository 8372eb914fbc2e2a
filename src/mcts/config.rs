//! MCTS engine configuration parameters.

use serde::{Deserialize, Serialize};

use crate::core::{HeuristicMode, SolverConfig};

/// Engine-facing subset of `SolverConfig`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MCTSConfig {
    /// Hard cap on solution length.
    pub max_step_count: u32,

    /// Cap on random steps per rollout.
    pub max_rollout_step_count: u32,

    /// Pruning policy for root, expansion and rollout actions.
    pub heuristic: HeuristicMode,

    /// Rollouts scoring at least this (and at least the tree's best) are
    /// kept as real nodes.
    pub score_storage_threshold: f32,

    /// Weight `w` of max score against mean score during selection.
    pub max_score_weighting_constant: f32,

    /// Exploration constant `C`.
    pub exploration_constant: f32,

    pub score_progress: f32,
    pub score_quality: f32,
    pub score_durability: f32,
    pub score_cp: f32,
    pub score_steps: f32,
}

impl Default for MCTSConfig {
    fn default() -> Self {
        Self::from(&SolverConfig::default())
    }
}

impl From<&SolverConfig> for MCTSConfig {
    fn from(config: &SolverConfig) -> Self {
        Self {
            max_step_count: config.max_step_count,
            max_rollout_step_count: config.max_rollout_step_count,
            heuristic: config.heuristic,
            score_storage_threshold: config.score_storage_threshold,
            max_score_weighting_constant: config.max_score_weighting_constant,
            exploration_constant: config.exploration_constant,
            score_progress: config.score_progress,
            score_quality: config.score_quality,
            score_durability: config.score_durability,
            score_cp: config.score_cp,
            score_steps: config.score_steps,
        }
    }
}

impl MCTSConfig {
    /// Sum of the score weights.
    #[must_use]
    pub fn total_weight(&self) -> f32 {
        self.score_progress + self.score_quality + self.score_durability + self.score_cp + self.score_steps
    }

    pub fn with_exploration(mut self, c: f32) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_max_score_weighting(mut self, w: f32) -> Self {
        self.max_score_weighting_constant = w;
        self
    }
}
