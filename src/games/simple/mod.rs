//! Simple crafting game for testing the solver.
//!
//! A minimal deterministic craft:
//! - Synthesis actions add progress, touches add quality
//! - Each synthesis or touch costs 10 durability; the craft fails at 0
//! - Masters' Mend restores durability, Innovation boosts touches
//! - Everything but Basic Synthesis costs CP
//! - The craft succeeds once progress reaches its target
//!
//! Strict mode prunes obviously wasted actions (touching at max quality,
//! mending near full durability, refreshing an active Innovation).

mod game;

pub use game::{CraftAction, CraftState, SimpleCraft, SimpleCraftBuilder};
