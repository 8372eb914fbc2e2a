//! Single-round strategies: search once, return the best full line.

use std::time::Instant;

use tracing::debug;

use super::{best_fork, kilo_iterations_per_second, SearchContext, Solution};
use crate::core::SolverRng;
use crate::simulation::Simulator;

/// One tree, searched with `max_thread_count` workers.
pub(super) fn search<S: Simulator>(
    ctx: &SearchContext<'_, S>,
    state: &S::State,
    rng: &mut SolverRng,
    on_action: &mut impl FnMut(S::Action),
) -> Solution<S> {
    let started = Instant::now();
    ctx.progress.begin_round(1, u64::from(ctx.config.iterations));

    let mcts = ctx.search_tree(state, rng);
    if ctx.token.is_cancelled() {
        return ctx.finish(Vec::new(), state.clone());
    }

    let solution = mcts.solution();
    debug!(
        max_score = mcts.max_score(),
        nodes = mcts.node_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        kips = kilo_iterations_per_second(ctx.progress.value(), started),
        "Oneshot search complete"
    );

    solution.actions.iter().copied().for_each(&mut *on_action);
    solution
}

/// `fork_count` independent trees from the same state; the best one wins.
pub(super) fn search_forked<S: Simulator>(
    ctx: &SearchContext<'_, S>,
    state: &S::State,
    rng: &mut SolverRng,
    on_action: &mut impl FnMut(S::Action),
) -> Solution<S> {
    let started = Instant::now();
    ctx.progress.begin_round(1, u64::from(ctx.config.iterations));

    let results = ctx.run_forks(std::slice::from_ref(state), rng);
    if ctx.token.is_cancelled() {
        return ctx.finish(Vec::new(), state.clone());
    }

    let Some(best) = best_fork(&results) else {
        return ctx.finish(Vec::new(), state.clone());
    };
    let winner = &results[best];
    debug!(
        forks = results.len(),
        best,
        max_score = winner.max_score,
        elapsed_ms = started.elapsed().as_millis() as u64,
        kips = kilo_iterations_per_second(ctx.progress.value(), started),
        "Forked oneshot search complete"
    );

    let solution = winner.solution.clone();
    solution.actions.iter().copied().for_each(&mut *on_action);
    solution
}
