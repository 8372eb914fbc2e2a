//! MCTS child selection policies.
//!
//! Both policies scan a node's `NodeScoresBuffer` one `LANES`-wide batch at
//! a time and keep a running maximum that starts at zero and is replaced on
//! `>=`, so ties go to the later child.
//!
//! - `MaxScoreUcb`: tree descent, `(1 - w) * s / v + w * m + sqrt(C * ln(N)) / sqrt(v)`
//! - `BestMaxScore`: solution extraction, highest max score

use super::arena::ChildIdx;
use super::config::MCTSConfig;
use super::intrinsics::{hmax_index, reciprocal_sqrt, F32x8};
use super::scores::{ChildData, NodeScoresBuffer};

/// Policy for choosing a child to follow.
pub trait SelectionPolicy: Send + Sync {
    /// Pick one of the first `child_count` children.
    ///
    /// `parent_visits` is the visit count of the node being descended from.
    fn select(
        &self,
        scores: &NodeScoresBuffer,
        child_count: usize,
        parent_visits: u32,
        config: &MCTSConfig,
    ) -> ChildIdx;
}

/// Scan batches with `eval`, returning the best child by running maximum.
#[inline]
fn scan_batches(
    scores: &NodeScoresBuffer,
    child_count: usize,
    eval: impl Fn(&ChildData) -> F32x8,
) -> ChildIdx {
    let mut best = ChildIdx::default();
    let mut best_score = 0.0f32;
    let mut remaining = child_count;
    let mut batch = 0;

    while remaining > 0 {
        let data = scores.load_child_data(batch, remaining);
        let values = eval(&data);
        let lane = hmax_index(values, data.len);

        if values[lane] >= best_score {
            best = ChildIdx::new(batch, lane);
            best_score = values[lane];
        }

        remaining -= data.len;
        batch += 1;
    }
    best
}

/// Upper-confidence selection blending mean and max score.
///
/// Exploitation: `(1 - w) * (s / v) + w * m`.
/// Exploration: `sqrt(C * ln(N) / v)`, computed as `sqrt(C * ln(N)) * rsqrt(v)`.
/// `v` is floored at one so unvisited children are scored rather than
/// skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxScoreUcb;

impl SelectionPolicy for MaxScoreUcb {
    fn select(
        &self,
        scores: &NodeScoresBuffer,
        child_count: usize,
        parent_visits: u32,
        config: &MCTSConfig,
    ) -> ChildIdx {
        let ln_parent = (parent_visits.max(1) as f32).ln();
        let c = F32x8::splat((config.exploration_constant * ln_parent).sqrt());
        let w = config.max_score_weighting_constant;
        let mean_weight = 1.0 - w;

        scan_batches(scores, child_count, |data| {
            let v = data.visits.max(F32x8::splat(1.0));
            let exploitation = (data.score_sums / v) * mean_weight + data.max_scores * w;
            let exploration = c * reciprocal_sqrt(v);
            exploitation + exploration
        })
    }
}

/// Greedy selection by max score.
#[derive(Clone, Copy, Debug, Default)]
pub struct BestMaxScore;

impl SelectionPolicy for BestMaxScore {
    fn select(
        &self,
        scores: &NodeScoresBuffer,
        child_count: usize,
        _parent_visits: u32,
        _config: &MCTSConfig,
    ) -> ChildIdx {
        scan_batches(scores, child_count, |data| data.max_scores)
    }
}
