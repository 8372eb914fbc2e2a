//! Columnar child statistics.
//!
//! A node keeps the score sum, max score and visit count of each child in
//! three parallel columns, batched `LANES` wide to line up with the node's
//! `ArenaBuffer`. Updates are independent atomic operations: under contention
//! the three columns of one slot may briefly disagree, which selection
//! tolerates.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use super::arena::{ChildIdx, MAX_BATCHES};
use super::intrinsics::{F32x8, LANES};

/// An `f32` stored in an `AtomicU32` bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    #[must_use]
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self, ordering: Ordering) -> f32 {
        f32::from_bits(self.0.load(ordering))
    }

    #[inline]
    pub fn store(&self, value: f32, ordering: Ordering) {
        self.0.store(value.to_bits(), ordering);
    }

    /// Add `value` with a compare-and-swap loop. Returns the previous value.
    #[inline]
    pub fn fetch_add(&self, value: f32, ordering: Ordering) -> f32 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + value).to_bits();
            match self.0.compare_exchange_weak(current, next, ordering, Ordering::Relaxed) {
                Ok(previous) => return f32::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }

    /// Raise to `value` if larger. Returns the previous value.
    #[inline]
    pub fn fetch_max(&self, value: f32, ordering: Ordering) -> f32 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let previous = f32::from_bits(current);
            if previous >= value {
                return previous;
            }
            match self.0.compare_exchange_weak(current, value.to_bits(), ordering, Ordering::Relaxed) {
                Ok(_) => return previous,
                Err(actual) => current = actual,
            }
        }
    }
}

/// One `LANES`-wide batch of child statistics.
#[derive(Debug)]
pub struct ScoresBatch {
    pub score_sum: [AtomicF32; LANES],
    pub max_score: [AtomicF32; LANES],
    pub visits: [AtomicU32; LANES],
}

impl Default for ScoresBatch {
    fn default() -> Self {
        Self {
            score_sum: std::array::from_fn(|_| AtomicF32::default()),
            max_score: std::array::from_fn(|_| AtomicF32::default()),
            visits: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }
}

/// Statistics of up to `LANES` children, loaded for lane-wise evaluation.
///
/// Lanes at or beyond `len` are zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChildData {
    pub score_sums: F32x8,
    pub max_scores: F32x8,
    pub visits: F32x8,
    pub len: usize,
}

/// Per-node statistics of all its children.
#[derive(Debug)]
pub struct NodeScoresBuffer {
    batches: [OnceLock<Box<ScoresBatch>>; MAX_BATCHES],
}

impl NodeScoresBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    #[inline]
    fn batch(&self, batch: usize) -> &ScoresBatch {
        self.batches[batch].get_or_init(Box::default)
    }

    /// Make sure the batch holding `idx` is allocated.
    #[inline]
    pub fn ensure(&self, idx: ChildIdx) {
        self.batch(idx.batch as usize);
    }

    /// Record one visit with `score`.
    #[inline]
    pub fn visit(&self, idx: ChildIdx, score: f32) {
        let batch = self.batch(idx.batch as usize);
        let lane = idx.offset as usize;
        batch.score_sum[lane].fetch_add(score, Ordering::Relaxed);
        batch.max_score[lane].fetch_max(score, Ordering::Relaxed);
        batch.visits[lane].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn visits(&self, idx: ChildIdx) -> u32 {
        self.batches[idx.batch as usize]
            .get()
            .map_or(0, |b| b.visits[idx.offset as usize].load(Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn max_score(&self, idx: ChildIdx) -> f32 {
        self.batches[idx.batch as usize]
            .get()
            .map_or(0.0, |b| b.max_score[idx.offset as usize].load(Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub fn score_sum(&self, idx: ChildIdx) -> f32 {
        self.batches[idx.batch as usize]
            .get()
            .map_or(0.0, |b| b.score_sum[idx.offset as usize].load(Ordering::Relaxed))
    }

    /// Load batch `batch` for `remaining` children still to scan.
    ///
    /// Returns `min(remaining, LANES)` valid lanes. An unallocated batch
    /// reads as zeros.
    #[must_use]
    pub fn load_child_data(&self, batch: usize, remaining: usize) -> ChildData {
        let len = remaining.min(LANES);
        let mut data = ChildData {
            len,
            ..ChildData::default()
        };

        if let Some(scores) = self.batches.get(batch).and_then(OnceLock::get) {
            for lane in 0..len {
                data.score_sums.0[lane] = scores.score_sum[lane].load(Ordering::Relaxed);
                data.max_scores.0[lane] = scores.max_score[lane].load(Ordering::Relaxed);
                data.visits.0[lane] = scores.visits[lane].load(Ordering::Relaxed) as f32;
            }
        }
        data
    }
}

impl Default for NodeScoresBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics of the tree root, which has no parent column.
#[derive(Debug, Default)]
pub struct RootScores {
    score_sum: AtomicF32,
    max_score: AtomicF32,
    visits: AtomicU32,
}

impl RootScores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn visit(&self, score: f32) {
        self.score_sum.fetch_add(score, Ordering::Relaxed);
        self.max_score.fetch_max(score, Ordering::AcqRel);
        self.visits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn max_score(&self) -> f32 {
        self.max_score.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub fn score_sum(&self) -> f32 {
        self.score_sum.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Relaxed)
    }
}
