//! # craft-mcts
//!
//! A Monte Carlo Tree Search solver for step-budgeted crafting rotations.
//!
//! ## Design Principles
//!
//! 1. **Simulator-Agnostic**: The solver never inspects a state. Domains plug
//!    in through the `Simulator` trait and register at most 32 actions.
//!
//! 2. **Max Score, Not Mean**: Only the best line matters, so selection and
//!    solution extraction follow each child's best score.
//!
//! 3. **Cancellable**: Every search polls a `CancellationToken` and returns
//!    the actions committed so far.
//!
//! ## Architecture
//!
//! - **Arena Tree**: Nodes live in fixed 8-slot batches, so the tree grows
//!   without moving nodes and workers can hold references into it.
//!
//! - **Bitset Actions**: Legal actions are a `u32` mask; untried actions are
//!   popped with a CAS loop.
//!
//! - **Strategies**: One-shot, stepwise, forked and furcated (beam) search
//!   on top of the same engine. See `solver`.
//!
//! ## Modules
//!
//! - `core`: Actions, RNG, configuration, errors
//! - `simulation`: Simulator trait, completion states, scoring
//! - `mcts`: Arena tree and the search engine
//! - `solver`: Search strategies, cancellation, progress
//! - `games`: Example simulators

pub mod core;
pub mod games;
pub mod mcts;
pub mod simulation;
pub mod solver;

// Re-export commonly used types
pub use crate::core::{
    ActionKind, ActionRegistry, ActionSet, AtomicActionSet, MAX_ACTIONS,
    Algorithm, HeuristicMode, SolverConfig,
    SelectionMode, SolverRng,
    SolverError, SolverResult,
};

pub use crate::simulation::{
    ActionResponse, CompletionState, Simulator, StateMetrics, StepLimitedSimulator,
    calculate_score_for_state, score_actions,
};

pub use crate::mcts::{MCTSConfig, MCTS, SearchStats};

pub use crate::solver::{
    search, CancellationToken, ProgressSnapshot, SearchStage, Solver, SolverProgress, SolverSolution,
};
