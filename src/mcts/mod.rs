//! Monte Carlo Tree Search for craft-mcts.
//!
//! ## Overview
//!
//! This module implements an arena-backed MCTS that maximizes a terminal
//! score. Key features:
//!
//! - **Arena storage**: Children live in fixed batches of 8 slots allocated
//!   once and never moved, so references into the tree stay valid while it
//!   grows
//! - **Vectorized selection**: Child statistics are stored column-wise and
//!   scored 8 lanes at a time (`intrinsics`)
//! - **Max-score UCB**: Selection blends mean and best score, since only the
//!   best line found matters
//! - **Materialization**: Rollouts that beat the tree's best are kept as
//!   real nodes
//! - **Shared-tree workers**: All mutation is atomic, so several threads can
//!   search one tree
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::atomic::AtomicU64;
//!
//! use craft_mcts::core::{SolverConfig, SolverRng};
//! use craft_mcts::games::simple::SimpleCraftBuilder;
//! use craft_mcts::mcts::{MCTSConfig, MCTS};
//! use craft_mcts::solver::CancellationToken;
//!
//! let (sim, state) = SimpleCraftBuilder::new().build();
//! let config = MCTSConfig::from(&SolverConfig::default());
//! let mcts = MCTS::new(config, sim, state);
//!
//! let progress = AtomicU64::new(0);
//! mcts.search(1000, &mut SolverRng::new(42), &progress, &CancellationToken::new());
//!
//! let best = mcts.solution();
//! println!("{:?} scores {:.3}", best.actions, best.score);
//! ```

pub mod arena;
pub mod config;
pub mod intrinsics;
pub mod policy;
pub mod scores;
pub mod search;
pub mod stats;

// Re-export main types
pub use arena::{ArenaBuffer, ArenaNode, ChildIdx};
pub use config::MCTSConfig;
pub use intrinsics::{hmax_index, reciprocal_sqrt, F32x8, LANES};
pub use policy::{BestMaxScore, MaxScoreUcb, SelectionPolicy};
pub use scores::{AtomicF32, ChildData, NodeScoresBuffer, RootScores};
pub use search::{SearchNode, TreeNode, MCTS};
pub use stats::SearchStats;
