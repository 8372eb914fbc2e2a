//! Cancellation and progress reporting shared between the solver and its
//! callers.
//!
//! Both are polled, never pushed: the solver checks the token once per
//! iteration and once per round, and a UI reads `SolverProgress` whenever it
//! redraws.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Cooperative cancellation flag.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search holding this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Coarse phase of a solver run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchStage {
    #[default]
    NotStarted,
    /// Searching round `n`, counting from 1. One-shot runs have one round.
    Round(u32),
    Finished,
}

const STAGE_NOT_STARTED: u32 = 0;
const STAGE_FINISHED: u32 = u32::MAX;

impl SearchStage {
    fn encode(self) -> u32 {
        match self {
            SearchStage::NotStarted => STAGE_NOT_STARTED,
            SearchStage::Round(n) => n.clamp(1, STAGE_FINISHED - 1),
            SearchStage::Finished => STAGE_FINISHED,
        }
    }

    fn decode(raw: u32) -> Self {
        match raw {
            STAGE_NOT_STARTED => SearchStage::NotStarted,
            STAGE_FINISHED => SearchStage::Finished,
            n => SearchStage::Round(n),
        }
    }
}

/// Live progress counters of a solver run.
///
/// `value` counts iterations in the current round and may overshoot `max`
/// while no completed craft has been found.
#[derive(Debug, Default)]
pub struct SolverProgress {
    value: AtomicU64,
    max: AtomicU64,
    stage: AtomicU32,
}

/// A consistent-enough copy of `SolverProgress` for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub value: u64,
    pub max: u64,
    pub stage: SearchStage,
}

impl ProgressSnapshot {
    /// Completion of the current round in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            0.0
        } else {
            (self.value as f32 / self.max as f32).clamp(0.0, 1.0)
        }
    }
}

impl SolverProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn stage(&self) -> SearchStage {
        SearchStage::decode(self.stage.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            value: self.value(),
            max: self.max(),
            stage: self.stage(),
        }
    }

    /// Iteration counter the engines add to.
    pub(crate) fn counter(&self) -> &AtomicU64 {
        &self.value
    }

    pub(crate) fn begin_round(&self, round: u32, max: u64) {
        self.value.store(0, Ordering::Relaxed);
        self.max.store(max, Ordering::Relaxed);
        self.stage.store(SearchStage::Round(round).encode(), Ordering::Release);
    }

    pub(crate) fn finish(&self) {
        self.stage.store(SearchStage::Finished.encode(), Ordering::Release);
    }
}
