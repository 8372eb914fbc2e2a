//! Solver configuration.
//!
//! `SolverConfig` is a plain serializable value. Persisting it is the
//! caller's business; the solver only consumes an already-built config.

use std::thread;

use serde::{Deserialize, Serialize};

use super::error::{SolverError, SolverResult};
use super::rng::SelectionMode;

/// Search strategy used by the solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// One tree, run to budget, return its best full line.
    Oneshot,
    /// `fork_count` independent trees, return the best line among them.
    OneshotForked,
    /// One tree per step; commit the best next action and restart.
    Stepwise,
    /// Like `Stepwise` but every step is searched by `fork_count` trees.
    StepwiseForked,
    /// Like `StepwiseForked` but keeps the best `furcated_action_count`
    /// frontier states alive as a beam between rounds.
    #[default]
    StepwiseFurcated,
}

/// How aggressively the simulator prunes dominated actions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeuristicMode {
    /// Every simulator-legal action.
    Loose,
    /// Legal actions minus provably dominated ones.
    #[default]
    Strict,
}

impl HeuristicMode {
    /// Whether the strict pruning policy applies.
    #[inline]
    #[must_use]
    pub fn is_strict(self) -> bool {
        matches!(self, HeuristicMode::Strict)
    }
}

fn available_parallelism() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Solver configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Iteration budget per search episode (split across forks).
    pub iterations: u32,

    /// Shared-tree workers per engine for the non-forked algorithms.
    pub max_thread_count: usize,

    /// Independent trees searched per round by forked algorithms.
    pub fork_count: usize,

    /// Beam width kept alive between furcated rounds.
    pub furcated_action_count: usize,

    /// Score at which a rollout is worth keeping in the tree, and at which a
    /// whole run stops early.
    pub score_storage_threshold: f32,

    /// Weight `w` of a child's max score versus its mean score.
    pub max_score_weighting_constant: f32,

    /// Exploration constant `C` in `sqrt(C * ln(N) / n)`.
    pub exploration_constant: f32,

    /// Hard cap on the number of steps in a solution.
    pub max_step_count: u32,

    /// Cap on random steps in a single rollout.
    pub max_rollout_step_count: u32,

    /// Pruning policy for legal actions.
    pub heuristic: HeuristicMode,

    /// Weight of the progress ratio.
    pub score_progress: f32,

    /// Weight of the quality ratio.
    pub score_quality: f32,

    /// Weight of the remaining durability ratio.
    pub score_durability: f32,

    /// Weight of the remaining CP ratio.
    pub score_cp: f32,

    /// Weight of the "fewer steps" term.
    pub score_steps: f32,

    /// Search strategy.
    pub algorithm: Algorithm,

    /// Random or rank-0 action picks.
    pub selection: SelectionMode,

    /// Seed for every RNG stream the solver derives.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let fork_count = available_parallelism().max(32);
        Self {
            iterations: 100_000,
            max_thread_count: 1,
            fork_count,
            furcated_action_count: fork_count / 2,
            score_storage_threshold: 1.0,
            max_score_weighting_constant: 0.1,
            exploration_constant: 4.0,
            max_step_count: 30,
            max_rollout_step_count: 99,
            heuristic: HeuristicMode::Strict,
            score_progress: 0.20,
            score_quality: 0.65,
            score_durability: 0.05,
            score_cp: 0.05,
            score_steps: 0.05,
            algorithm: Algorithm::StepwiseFurcated,
            selection: SelectionMode::Random,
            seed: 0,
        }
    }
}

impl SolverConfig {
    /// Preset for the standalone simulator window.
    #[must_use]
    pub fn simulator_default() -> Self {
        Self::default()
    }

    /// Preset for the in-game helper: bigger budget, one core left free for
    /// the host application.
    #[must_use]
    pub fn synth_helper_default() -> Self {
        let cores = available_parallelism();
        let fork_count = cores.saturating_sub(1).max(1);
        Self {
            iterations: 300_000,
            fork_count,
            furcated_action_count: (cores / 2).clamp(1, fork_count),
            algorithm: Algorithm::StepwiseForked,
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set fork count and beam width together.
    pub fn with_forks(mut self, fork_count: usize, furcated_action_count: usize) -> Self {
        self.fork_count = fork_count;
        self.furcated_action_count = furcated_action_count;
        self
    }

    pub fn with_threads(mut self, max_thread_count: usize) -> Self {
        self.max_thread_count = max_thread_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicMode) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_max_step_count(mut self, max_step_count: u32) -> Self {
        self.max_step_count = max_step_count;
        self
    }

    pub fn with_exploration(mut self, c: f32) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_score_storage_threshold(mut self, threshold: f32) -> Self {
        self.score_storage_threshold = threshold;
        self
    }

    /// Set the five score weights (progress, quality, durability, cp, steps).
    pub fn with_weights(mut self, progress: f32, quality: f32, durability: f32, cp: f32, steps: f32) -> Self {
        self.score_progress = progress;
        self.score_quality = quality;
        self.score_durability = durability;
        self.score_cp = cp;
        self.score_steps = steps;
        self
    }

    /// Sum of the five score weights, the upper bound of any score.
    #[must_use]
    pub fn total_weight(&self) -> f32 {
        self.score_progress + self.score_quality + self.score_durability + self.score_cp + self.score_steps
    }

    /// Check that the config describes a runnable search.
    pub fn validate(&self) -> SolverResult<()> {
        let invalid = |msg: &str| Err(SolverError::InvalidConfig(msg.to_string()));

        if self.iterations == 0 {
            return invalid("iterations must be positive");
        }
        if self.max_thread_count == 0 {
            return invalid("max_thread_count must be at least 1");
        }
        if self.fork_count == 0 {
            return invalid("fork_count must be at least 1");
        }
        if self.furcated_action_count == 0 || self.furcated_action_count > self.fork_count {
            return invalid("furcated_action_count must be between 1 and fork_count");
        }
        if self.max_step_count == 0 {
            return invalid("max_step_count must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.max_score_weighting_constant) {
            return invalid("max_score_weighting_constant must be within [0, 1]");
        }
        if !(self.exploration_constant >= 0.0) {
            return invalid("exploration_constant must be non-negative");
        }
        let weights = [
            self.score_progress,
            self.score_quality,
            self.score_durability,
            self.score_cp,
            self.score_steps,
        ];
        if weights.iter().any(|w| !(*w >= 0.0)) {
            return invalid("score weights must be non-negative");
        }
        if self.total_weight() <= 0.0 {
            return invalid("at least one score weight must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SolverConfig::default();
        assert_eq!(config.iterations, 100_000);
        assert_eq!(config.max_step_count, 30);
        assert_eq!(config.max_rollout_step_count, 99);
        assert!(config.fork_count >= 32);
        assert_eq!(config.furcated_action_count, config.fork_count / 2);
        assert_eq!(config.algorithm, Algorithm::StepwiseFurcated);
        assert_eq!(config.heuristic, HeuristicMode::Strict);
        assert!((config.total_weight() - 1.0).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(SolverConfig::simulator_default().validate().is_ok());

        let helper = SolverConfig::synth_helper_default();
        assert_eq!(helper.iterations, 300_000);
        assert_eq!(helper.algorithm, Algorithm::StepwiseForked);
        assert!(helper.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SolverConfig::default()
            .with_iterations(500)
            .with_forks(4, 2)
            .with_seed(123)
            .with_algorithm(Algorithm::Oneshot);

        assert_eq!(config.iterations, 500);
        assert_eq!(config.fork_count, 4);
        assert_eq!(config.furcated_action_count, 2);
        assert_eq!(config.seed, 123);
        assert_eq!(config.algorithm, Algorithm::Oneshot);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = SolverConfig::default().with_forks(4, 2);

        assert!(base.clone().with_iterations(0).validate().is_err());
        assert!(base.clone().with_forks(0, 0).validate().is_err());
        assert!(base.clone().with_forks(4, 5).validate().is_err());
        assert!(base.clone().with_max_step_count(0).validate().is_err());
        assert!(base.clone().with_weights(-0.1, 0.5, 0.2, 0.2, 0.2).validate().is_err());
        assert!(base.clone().with_weights(0.0, 0.0, 0.0, 0.0, 0.0).validate().is_err());

        let mut config = base.clone();
        config.max_score_weighting_constant = 1.5;
        assert!(matches!(config.validate(), Err(SolverError::InvalidConfig(_))));

        let mut config = base;
        config.exploration_constant = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization() {
        let config = SolverConfig::default().with_seed(999).with_heuristic(HeuristicMode::Loose);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SolverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
