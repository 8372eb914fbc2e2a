//! Core MCTS search algorithm.
//!
//! One `MCTS` owns one tree. Each iteration runs
//! select → expand → rollout → backpropagate:
//!
//! - **Select** descends with `MaxScoreUcb` until it reaches a node that
//!   still has untried actions or has no children yet.
//! - **Expand** pops one untried action from that node and appends the
//!   resulting state as a child. A node that is already terminal is scored
//!   instead.
//! - **Rollout** plays random actions from the new child until the craft ends
//!   or the rollout cap is hit. A rollout that completes the craft with a
//!   score above both the storage threshold and the tree's best is
//!   materialized: its whole action line becomes real nodes.
//! - **Backpropagate** visits every slot on the selection path, deepest
//!   first, and finally the root aggregate.
//!
//! Every tree mutation is an atomic operation on `&self`, so several workers
//! can share one tree (`search_concurrent`). Materialization is the one
//! serialized step: it runs under a mutex and re-checks the best score inside
//! the critical section, so two racing rollouts never both commit a line that
//! the other one beat.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::arena::{ArenaNode, ChildIdx};
use super::config::MCTSConfig;
use super::policy::{BestMaxScore, MaxScoreUcb, SelectionPolicy};
use super::scores::{AtomicF32, RootScores};
use super::stats::SearchStats;
use crate::core::{ActionKind, SolverRng};
use crate::simulation::{CompletionState, SimulationNode, Simulator, StepLimitedSimulator};
use crate::solver::{CancellationToken, SolverSolution};

/// Iterations between progress counter updates.
pub const PROGRESS_UPDATE_FREQUENCY: u64 = 1 << 10;

/// Consecutive non-growing iterations before the tree is checked for being
/// exhausted.
pub const STALE_PROGRESS_THRESHOLD: usize = 1 << 12;

/// Node payload for simulator `S`.
pub type SearchNode<S> = SimulationNode<<S as Simulator>::State, <S as Simulator>::Action>;

/// Tree node for simulator `S`.
pub type TreeNode<S> = ArenaNode<SearchNode<S>>;

/// Parent nodes and child slots from the root down to a node.
type NodePath<'a, S> = SmallVec<[(&'a TreeNode<S>, ChildIdx); 32]>;

type RolloutActions<A> = SmallVec<[A; 32]>;

/// Result of one expand-and-rollout step.
struct Expansion<'a, S: Simulator> {
    /// Path to the deepest node the score is credited to.
    path: NodePath<'a, S>,
    score: f32,
    /// Whether the tree gained a node.
    grew: bool,
}

#[derive(Default)]
struct Counters {
    iterations: AtomicU64,
    nodes_expanded: AtomicU64,
    simulations: AtomicU64,
    materialized: AtomicU64,
    nodes_materialized: AtomicU64,
    time_us: AtomicU64,
}

/// A single MCTS tree over simulator `S`.
pub struct MCTS<S: Simulator> {
    config: MCTSConfig,
    simulator: StepLimitedSimulator<S>,
    root: TreeNode<S>,
    root_scores: RootScores,
    materialize_lock: Mutex<()>,
    /// Best score committed by materialization; may run ahead of the root
    /// aggregate until the committing iteration backpropagates.
    materialized_max: AtomicF32,
    counters: Counters,
}

impl<S: Simulator> MCTS<S> {
    /// Create a tree rooted at `state`.
    pub fn new(config: MCTSConfig, simulator: S, state: S::State) -> Self {
        let simulator = StepLimitedSimulator::new(simulator, config.max_step_count);
        let completion = simulator.completion_state(&state);
        let actions = simulator.available_actions(&state, config.heuristic);
        let root = ArenaNode::root(SimulationNode::new(state, None, completion, actions));

        Self {
            config,
            simulator,
            root,
            root_scores: RootScores::new(),
            materialize_lock: Mutex::new(()),
            materialized_max: AtomicF32::default(),
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &MCTSConfig {
        &self.config
    }

    /// The step-limited simulator this tree expands with.
    #[inline]
    pub fn simulator(&self) -> &StepLimitedSimulator<S> {
        &self.simulator
    }

    #[inline]
    pub fn root(&self) -> &TreeNode<S> {
        &self.root
    }

    /// Best score backpropagated to the root so far.
    #[inline]
    pub fn max_score(&self) -> f32 {
        self.root_scores.max_score()
    }

    #[inline]
    pub fn root_visits(&self) -> u32 {
        self.root_scores.visits()
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.root.subtree_size()
    }

    pub fn stats(&self) -> SearchStats {
        let c = &self.counters;
        SearchStats {
            iterations: c.iterations.load(Ordering::Relaxed),
            nodes_expanded: c.nodes_expanded.load(Ordering::Relaxed),
            simulations: c.simulations.load(Ordering::Relaxed),
            materialized: c.materialized.load(Ordering::Relaxed),
            nodes_materialized: c.nodes_materialized.load(Ordering::Relaxed),
            time_us: c.time_us.load(Ordering::Relaxed),
        }
    }

    /// Apply `action` to `state` and wrap the result as a node payload.
    fn execute(&self, state: &S::State, action: S::Action) -> SearchNode<S> {
        let (_, next) = self.simulator.execute(state, action);
        let completion = self.simulator.completion_state(&next);
        let actions = self.simulator.available_actions(&next, self.config.heuristic);
        SimulationNode::new(next, Some(action), completion, actions)
    }

    /// Descend to the node to expand.
    ///
    /// Returns `None` if the descent hit a child slot another worker has
    /// reserved but not filled yet.
    fn select(&self) -> Option<(NodePath<'_, S>, &TreeNode<S>)> {
        let mut path: NodePath<'_, S> = SmallVec::new();
        let mut node = &self.root;
        let mut visits = self.root_scores.visits();

        loop {
            let child_count = node.child_count();
            let expandable = !node.state.available_actions.is_empty();
            if expandable || child_count == 0 {
                return Some((path, node));
            }

            let idx = MaxScoreUcb.select(&node.child_scores, child_count, visits, &self.config);
            let child = node.child_at(idx)?;
            visits = node.child_scores.visits(idx);
            path.push((node, idx));
            node = child;
        }
    }

    fn expand_and_rollout<'a>(
        &'a self,
        rng: &mut SolverRng,
        mut path: NodePath<'a, S>,
        leaf: &'a TreeNode<S>,
    ) -> Option<Expansion<'a, S>> {
        let initial = &leaf.state;
        if initial.is_complete() {
            let score = self
                .simulator
                .score(&initial.state, initial.completion_state(), &self.config)
                .unwrap_or(0.0);
            return Some(Expansion { path, score, grew: false });
        }

        let action = initial.available_actions.pop_random(self.simulator.registry(), rng)?;
        let (idx, expanded) = leaf.add_child(self.execute(&initial.state, action));
        path.push((leaf, idx));
        self.counters.nodes_expanded.fetch_add(1, Ordering::Relaxed);

        let (actions, state, completion) = self.rollout(rng, &expanded.state);
        self.counters.simulations.fetch_add(1, Ordering::Relaxed);

        let score = self.simulator.score(&state, completion, &self.config).unwrap_or(0.0);
        if completion == CompletionState::ProgressComplete
            && score >= self.config.score_storage_threshold
            && score >= self.max_score()
        {
            self.materialize(&mut path, expanded, &actions, score);
        }

        Some(Expansion { path, score, grew: true })
    }

    /// Play random actions from `start` until the craft ends or the rollout
    /// cap is reached.
    fn rollout(
        &self,
        rng: &mut SolverRng,
        start: &SearchNode<S>,
    ) -> (RolloutActions<S::Action>, S::State, CompletionState) {
        let registry = self.simulator.registry();
        let steps_taken = self.simulator.metrics(&start.state).steps_taken;
        let cap = self
            .config
            .max_step_count
            .saturating_sub(steps_taken)
            .min(self.config.max_rollout_step_count) as usize;

        let mut actions = RolloutActions::new();
        let mut state = start.state.clone();
        let mut completion = start.simulation_completion_state;
        let mut available = start.available_actions.load();

        while CompletionState::from_parts(completion, available) == CompletionState::Incomplete
            && actions.len() < cap
        {
            let Some(action) = available.select_random(registry, rng) else {
                break;
            };
            actions.push(action);

            state = self.simulator.execute(&state, action).1;
            completion = self.simulator.completion_state(&state);
            if completion.is_terminal() {
                break;
            }
            available = self.simulator.available_actions(&state, self.config.heuristic);
        }

        (actions, state, completion)
    }

    /// Insert a rollout's action line below `start` as real nodes.
    ///
    /// Extends `path` to the deepest inserted node. Stops early where an
    /// action was already expanded from a node or the line reaches a
    /// terminal node.
    fn materialize<'a>(
        &'a self,
        path: &mut NodePath<'a, S>,
        start: &'a TreeNode<S>,
        actions: &[S::Action],
        score: f32,
    ) {
        let _guard = self.materialize_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let best = self.max_score().max(self.materialized_max.load(Ordering::Acquire));
        if score < best {
            return;
        }
        self.materialized_max.fetch_max(score, Ordering::AcqRel);

        let registry = self.simulator.registry();
        let mut node = start;
        let mut added = 0u64;
        for &action in actions {
            let sim = &node.state;
            if sim.is_complete() || !sim.available_actions.remove(registry, action) {
                break;
            }

            let (idx, child) = node.add_child(self.execute(&sim.state, action));
            path.push((node, idx));
            node = child;
            added += 1;
        }

        self.counters.materialized.fetch_add(1, Ordering::Relaxed);
        self.counters.nodes_materialized.fetch_add(added, Ordering::Relaxed);
        trace!(score, nodes = added, depth = node.depth, "Materialized rollout");
    }

    /// Credit `score` to every slot on `path` and to the root.
    fn backpropagate(&self, path: &NodePath<'_, S>, score: f32) {
        for (parent, idx) in path.iter().rev() {
            parent.child_scores.visit(*idx, score);
        }
        self.root_scores.visit(score);
    }

    /// Check whether no node in the tree can be expanded any more.
    pub fn all_nodes_complete(&self) -> bool {
        fn has_incomplete<St, A: ActionKind>(node: &ArenaNode<SimulationNode<St, A>>) -> bool {
            if node.children.is_empty() {
                return !node.state.available_actions.is_empty();
            }
            node.children.iter().any(|child| has_incomplete(child))
        }
        !has_incomplete(&self.root)
    }

    /// One worker's iteration loop.
    ///
    /// Runs until `iterations` are done and some completed craft has been
    /// found, the tree is exhausted, or the token is cancelled.
    fn run_worker(
        &self,
        iterations: u64,
        rng: &mut SolverRng,
        progress: &AtomicU64,
        token: &CancellationToken,
    ) -> u64 {
        let mut stale = 0usize;
        let mut i = 0u64;

        while i < iterations || self.max_score() == 0.0 {
            if token.is_cancelled() {
                break;
            }

            let expansion = self
                .select()
                .and_then(|(path, leaf)| self.expand_and_rollout(rng, path, leaf));
            let grew = expansion.as_ref().is_some_and(|e| e.grew);

            if self.max_score() == 0.0 {
                if grew {
                    stale = 0;
                } else {
                    stale += 1;
                    if stale >= STALE_PROGRESS_THRESHOLD {
                        stale = 0;
                        if self.all_nodes_complete() {
                            debug!(iterations = i, "Search tree exhausted without a completed craft");
                            break;
                        }
                    }
                }
            }

            if let Some(expansion) = expansion {
                self.backpropagate(&expansion.path, expansion.score);
            }

            i += 1;
            if i % PROGRESS_UPDATE_FREQUENCY == 0 {
                progress.fetch_add(PROGRESS_UPDATE_FREQUENCY, Ordering::Relaxed);
            }
        }

        progress.fetch_add(i % PROGRESS_UPDATE_FREQUENCY, Ordering::Relaxed);
        self.counters.iterations.fetch_add(i, Ordering::Relaxed);
        i
    }

    /// Run `iterations` iterations on the calling thread.
    ///
    /// Keeps going past the budget while no completed craft has been found.
    /// Returns the number of iterations performed.
    pub fn search(
        &self,
        iterations: u64,
        rng: &mut SolverRng,
        progress: &AtomicU64,
        token: &CancellationToken,
    ) -> u64 {
        let start = Instant::now();
        let done = self.run_worker(iterations, rng, progress, token);
        self.record_time(start, done);
        done
    }

    /// Run `iterations` iterations split across `threads` workers sharing
    /// this tree.
    ///
    /// Each worker draws from its own fork of `rng`.
    pub fn search_concurrent(
        &self,
        iterations: u64,
        threads: usize,
        rng: &mut SolverRng,
        progress: &AtomicU64,
        token: &CancellationToken,
    ) -> u64 {
        let threads = threads.max(1);
        if threads == 1 {
            return self.search(iterations, rng, progress, token);
        }

        let start = Instant::now();
        let per_worker = iterations / threads as u64;
        let extra = iterations % threads as u64;
        let mut rngs = rng.fork_many(threads);

        let mut counts = vec![0u64; threads];
        rayon::scope(|s| {
            for (t, (worker_rng, worker_done)) in rngs.iter_mut().zip(counts.iter_mut()).enumerate() {
                let budget = per_worker + u64::from((t as u64) < extra);
                s.spawn(move |_| *worker_done = self.run_worker(budget, worker_rng, progress, token));
            }
        });
        let done = counts.iter().sum::<u64>();

        self.record_time(start, done);
        done
    }

    fn record_time(&self, start: Instant, iterations: u64) {
        let elapsed_us = start.elapsed().as_micros() as u64;
        self.counters.time_us.fetch_add(elapsed_us, Ordering::Relaxed);
        trace!(
            iterations,
            elapsed_us,
            max_score = self.max_score(),
            "MCTS search complete"
        );
    }

    /// Best line in the tree: follow the highest max score until a node
    /// without children.
    pub fn solution(&self) -> SolverSolution<S::State, S::Action> {
        let mut actions = Vec::new();
        let mut node = &self.root;

        while node.child_count() != 0 {
            let idx = BestMaxScore.select(&node.child_scores, node.child_count(), 0, &self.config);
            let Some(child) = node.child_at(idx) else {
                break;
            };
            if let Some(action) = child.state.action {
                actions.push(action);
            }
            node = child;
        }

        let end = &node.state;
        let score = self
            .simulator
            .score(&end.state, end.simulation_completion_state, &self.config)
            .unwrap_or(0.0);

        SolverSolution {
            actions,
            state: end.state.clone(),
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SolverConfig;
    use crate::games::simple::{CraftAction, SimpleCraftBuilder};

    fn config() -> MCTSConfig {
        MCTSConfig::from(&SolverConfig::default())
    }

    #[test]
    fn test_root_is_expandable() {
        let (sim, state) = SimpleCraftBuilder::new().build();
        let mcts = MCTS::new(config(), sim, state);
        assert!(!mcts.root().state.available_actions.is_empty());
        assert_eq!(mcts.node_count(), 1);
        assert_eq!(mcts.max_score(), 0.0);
    }

    #[test]
    fn test_search_grows_tree_and_finds_score() {
        let (sim, state) = SimpleCraftBuilder::new().build();
        let mcts = MCTS::new(config(), sim, state);
        let progress = AtomicU64::new(0);

        let done = mcts.search(2000, &mut SolverRng::new(1), &progress, &CancellationToken::new());

        assert!(done >= 2000);
        assert_eq!(progress.load(Ordering::Relaxed), done);
        assert!(mcts.node_count() > 1);
        assert!(mcts.max_score() > 0.0);
        assert_eq!(mcts.root_visits() as u64, mcts.stats().iterations);

        let stats = mcts.stats();
        assert_eq!(stats.iterations, done);
        assert!(stats.nodes_expanded > 0);
    }

    #[test]
    fn test_solution_is_a_legal_line() {
        let (sim, state) = SimpleCraftBuilder::new().build();
        let mcts = MCTS::new(config(), sim.clone(), state.clone());
        mcts.search(3000, &mut SolverRng::new(5), &AtomicU64::new(0), &CancellationToken::new());

        let solution = mcts.solution();
        assert!(!solution.actions.is_empty());

        let limited = StepLimitedSimulator::new(sim, config().max_step_count);
        let mut current = state;
        for action in &solution.actions {
            assert!(limited.available_actions(&current, config().heuristic).has(limited.registry(), *action));
            current = limited.execute(&current, *action).1;
        }
        assert_eq!(limited.metrics(&current), limited.metrics(&solution.state));
    }

    #[test]
    fn test_cancelled_search_stops_immediately() {
        let (sim, state) = SimpleCraftBuilder::new().build();
        let mcts = MCTS::new(config(), sim, state);
        let token = CancellationToken::new();
        token.cancel();

        let done = mcts.search(1_000_000, &mut SolverRng::new(1), &AtomicU64::new(0), &token);
        assert_eq!(done, 0);
        assert_eq!(mcts.node_count(), 1);
        assert!(mcts.solution().actions.is_empty());
    }

    #[test]
    fn test_unsolvable_tree_terminates() {
        // Durability runs out long before progress can finish
        let (sim, state) = SimpleCraftBuilder::new()
            .actions(&[CraftAction::BasicSynthesis])
            .max_progress(10_000)
            .max_durability(20)
            .build();
        let mcts = MCTS::new(config(), sim, state);

        let done = mcts.search(10, &mut SolverRng::new(3), &AtomicU64::new(0), &CancellationToken::new());
        assert!(done >= 10);
        assert_eq!(mcts.max_score(), 0.0);
        assert!(mcts.all_nodes_complete());
    }

    #[test]
    fn test_concurrent_search_shares_tree() {
        let (sim, state) = SimpleCraftBuilder::new().build();
        let mcts = MCTS::new(config(), sim, state);
        let progress = AtomicU64::new(0);

        let done = mcts.search_concurrent(4000, 4, &mut SolverRng::new(9), &progress, &CancellationToken::new());

        assert!(done >= 4000);
        assert_eq!(progress.load(Ordering::Relaxed), done);
        assert!(mcts.max_score() > 0.0);
        // Root visits can trail iterations only by iterations that found no
        // node to expand
        assert!(mcts.root_visits() as u64 <= done);
        assert!(!mcts.solution().actions.is_empty());
    }
}
