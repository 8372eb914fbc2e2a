//! Solver orchestration on top of the MCTS engine.
//!
//! ## Overview
//!
//! The solver turns an iteration budget into an action line using one of
//! five strategies (`Algorithm`):
//!
//! - **Oneshot**: one tree, return its best full line
//! - **OneshotForked**: `fork_count` independent trees, best line wins
//! - **Stepwise**: search, commit the best next action, restart from the new
//!   state, repeat
//! - **StepwiseForked**: stepwise, with every step searched by forked trees
//! - **StepwiseFurcated**: stepwise over a beam of the best
//!   `furcated_action_count` frontier states
//!
//! Actions are handed to the `on_action` callback once they are locked in:
//! in order, exactly once, and only when every surviving branch agrees on
//! them. A run stops early once a line scores at least
//! `score_storage_threshold`.
//!
//! ## Usage
//!
//! ```
//! use craft_mcts::core::{Algorithm, SolverConfig};
//! use craft_mcts::games::simple::SimpleCraftBuilder;
//! use craft_mcts::solver::Solver;
//!
//! let (sim, state) = SimpleCraftBuilder::new().build();
//! let config = SolverConfig::default()
//!     .with_algorithm(Algorithm::Stepwise)
//!     .with_iterations(500)
//!     .with_seed(7);
//!
//! let solver = Solver::new(config, sim, state).unwrap();
//! let mut locked_in = Vec::new();
//! let solution = solver.search(|action| locked_in.push(action));
//!
//! assert_eq!(locked_in, solution.actions);
//! ```

mod furcated;
mod oneshot;
pub mod progress;
pub mod solution;
mod stepwise;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::core::{Algorithm, SolverConfig, SolverResult, SolverRng};
use crate::mcts::{MCTSConfig, SearchStats, MCTS};
use crate::simulation::{Simulator, StepLimitedSimulator};

pub use progress::{CancellationToken, ProgressSnapshot, SearchStage, SolverProgress};
pub use solution::SolverSolution;

/// Solution type for simulator `S`.
pub type Solution<S> = SolverSolution<<S as Simulator>::State, <S as Simulator>::Action>;

/// Everything a strategy needs for one run.
pub(crate) struct SearchContext<'a, S: Simulator> {
    pub config: &'a SolverConfig,
    pub mcts_config: MCTSConfig,
    pub simulator: &'a S,
    pub limited: StepLimitedSimulator<S>,
    pub progress: &'a SolverProgress,
    pub token: &'a CancellationToken,
    stats: &'a Mutex<SearchStats>,
}

/// Outcome of one forked tree.
pub(crate) struct ForkResult<S: Simulator> {
    pub max_score: f32,
    /// Index of the root state this fork searched from.
    pub root: usize,
    pub solution: Solution<S>,
}

impl<'a, S: Simulator> SearchContext<'a, S> {
    fn new(
        config: &'a SolverConfig,
        simulator: &'a S,
        progress: &'a SolverProgress,
        token: &'a CancellationToken,
        stats: &'a Mutex<SearchStats>,
    ) -> Self {
        Self {
            config,
            mcts_config: MCTSConfig::from(config),
            simulator,
            limited: StepLimitedSimulator::new(simulator.clone(), config.max_step_count),
            progress,
            token,
            stats,
        }
    }

    /// Per-fork iteration budget.
    pub fn fork_iterations(&self) -> u64 {
        (u64::from(self.config.iterations) / self.config.fork_count as u64).max(1)
    }

    /// Build a tree at `state` and search it with the configured worker count.
    pub fn search_tree(&self, state: &S::State, rng: &mut SolverRng) -> MCTS<S> {
        let mcts = MCTS::new(self.mcts_config.clone(), self.simulator.clone(), state.clone());
        mcts.search_concurrent(
            u64::from(self.config.iterations),
            self.config.max_thread_count,
            rng,
            self.progress.counter(),
            self.token,
        );
        self.record(&mcts.stats());
        mcts
    }

    /// Search `fork_count` independent single-threaded trees in parallel.
    ///
    /// Fork `i` starts from `roots[i * roots.len() / fork_count]`. Results
    /// come back in fork order.
    pub fn run_forks(&self, roots: &[S::State], rng: &mut SolverRng) -> Vec<ForkResult<S>> {
        let fork_count = self.config.fork_count;
        let budget = self.fork_iterations();

        rng.fork_many(fork_count)
            .into_par_iter()
            .enumerate()
            .map(|(i, mut fork_rng)| {
                let root = i * roots.len() / fork_count;
                let mcts = MCTS::new(self.mcts_config.clone(), self.simulator.clone(), roots[root].clone());
                mcts.search(budget, &mut fork_rng, self.progress.counter(), self.token);
                self.record(&mcts.stats());
                ForkResult {
                    max_score: mcts.max_score(),
                    root,
                    solution: mcts.solution(),
                }
            })
            .collect()
    }

    /// Fold a finished tree's counters into the run totals.
    fn record(&self, stats: &SearchStats) {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).merge(stats);
    }

    /// Replay `actions` from `state`.
    pub fn replay(&self, state: &S::State, actions: &[S::Action]) -> S::State {
        actions
            .iter()
            .fold(state.clone(), |current, &action| self.limited.execute(&current, action).1)
    }

    /// Wrap a reached state as a solution, scoring it.
    pub fn finish(&self, actions: Vec<S::Action>, state: S::State) -> Solution<S> {
        let completion = self.limited.completion_state(&state);
        let score = self.limited.score(&state, completion, &self.mcts_config).unwrap_or(0.0);
        SolverSolution { actions, state, score }
    }

    pub fn threshold(&self) -> f32 {
        self.config.score_storage_threshold
    }
}

/// Index of the best fork by max score; ties go to the lower index.
pub(crate) fn best_fork<S: Simulator>(results: &[ForkResult<S>]) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, r)| match best {
            Some((_, score)) if score >= r.max_score => best,
            _ => Some((i, r.max_score)),
        })
        .map(|(i, _)| i)
}

/// Iterations per second in thousands.
pub(crate) fn kilo_iterations_per_second(iterations: u64, started: Instant) -> f64 {
    let secs = started.elapsed().as_secs_f64();
    if secs == 0.0 {
        0.0
    } else {
        iterations as f64 / secs / 1000.0
    }
}

/// Configured solver for one starting state.
pub struct Solver<S: Simulator> {
    config: SolverConfig,
    simulator: S,
    state: S::State,
    token: CancellationToken,
    progress: Arc<SolverProgress>,
    stats: Mutex<SearchStats>,
}

impl<S: Simulator> Solver<S> {
    /// Create a solver. Fails if `config` does not validate.
    pub fn new(config: SolverConfig, simulator: S, state: S::State) -> SolverResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            simulator,
            state,
            token: CancellationToken::new(),
            progress: Arc::new(SolverProgress::new()),
            stats: Mutex::new(SearchStats::new()),
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// A handle that cancels this solver's searches.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Progress counters, safe to poll from another thread.
    pub fn progress(&self) -> Arc<SolverProgress> {
        Arc::clone(&self.progress)
    }

    /// Engine counters summed over every tree of the last search.
    pub fn stats(&self) -> SearchStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Run the configured algorithm.
    ///
    /// `on_action` receives locked-in actions in order. On cancellation the
    /// actions locked in so far are returned.
    pub fn search(&self, mut on_action: impl FnMut(S::Action)) -> Solution<S> {
        let started = Instant::now();
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).reset();
        let ctx = SearchContext::new(&self.config, &self.simulator, &self.progress, &self.token, &self.stats);
        let mut rng = SolverRng::with_mode(self.config.seed, self.config.selection);

        let solution = match self.config.algorithm {
            Algorithm::Oneshot => oneshot::search(&ctx, &self.state, &mut rng, &mut on_action),
            Algorithm::OneshotForked => oneshot::search_forked(&ctx, &self.state, &mut rng, &mut on_action),
            Algorithm::Stepwise => stepwise::search(&ctx, &self.state, &mut rng, &mut on_action),
            Algorithm::StepwiseForked => stepwise::search_forked(&ctx, &self.state, &mut rng, &mut on_action),
            Algorithm::StepwiseFurcated => furcated::search(&ctx, &self.state, &mut rng, &mut on_action),
        };

        self.progress.finish();
        let stats = self.stats();
        info!(
            algorithm = ?self.config.algorithm,
            actions = solution.len(),
            score = solution.score,
            iterations = stats.iterations,
            nodes = stats.nodes_expanded + stats.nodes_materialized,
            cancelled = self.token.is_cancelled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Solver finished"
        );
        solution
    }
}

/// Run a search in one call.
pub fn search<S: Simulator>(
    config: SolverConfig,
    simulator: S,
    state: S::State,
    on_action: impl FnMut(S::Action),
    token: CancellationToken,
) -> SolverResult<Solution<S>> {
    Ok(Solver::new(config, simulator, state)?.with_token(token).search(on_action))
}
