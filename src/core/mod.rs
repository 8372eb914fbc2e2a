//! Core solver types: actions, RNG, configuration, errors.
//!
//! Everything here is independent of the search itself. Simulators and the
//! MCTS engine both build on these types.

pub mod action;
pub mod config;
pub mod error;
pub mod rng;

pub use action::{ActionKind, ActionRegistry, ActionSet, AtomicActionSet, MAX_ACTIONS};
pub use config::{Algorithm, HeuristicMode, SolverConfig};
pub use error::{SolverError, SolverResult};
pub use rng::{SelectionMode, SolverRng};
