//! Example simulators.

pub mod simple;
