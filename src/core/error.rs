//! Error types for solver setup.
//!
//! Only configuration and registry construction are fallible. Terminal
//! simulation outcomes are `CompletionState` values and cancellation simply
//! returns the committed prefix, so neither shows up here.

use thiserror::Error;

/// Errors raised while building registries, action sets or configs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("action registry supports at most {max} actions, got {count}")]
    TooManyActions { count: usize, max: usize },

    #[error("action {0} is not registered")]
    UnregisteredAction(String),

    #[error("action {0} is registered more than once")]
    DuplicateAction(String),

    #[error("index {index} is out of range for a set of {count} actions")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("invalid solver config: {0}")]
    InvalidConfig(String),
}

pub type SolverResult<T> = Result<T, SolverError>;
