//! The boundary between the solver and the domain it optimizes.
//!
//! - `simulator`: the `Simulator` trait a domain implements, plus the
//!   step-budget wrapper the solver puts around it
//! - `node`: completion states, the per-node payload and scoring

pub mod node;
pub mod simulator;

pub use node::{calculate_score_for_state, score_actions, CompletionState, SimulationNode};
pub use simulator::{ActionResponse, Simulator, StateMetrics, StepLimitedSimulator};
