//! Stepwise strategies: commit one action per round and search again from
//! the state it leads to.

use std::time::Instant;

use tracing::debug;

use super::{best_fork, kilo_iterations_per_second, SearchContext, Solution};
use crate::core::SolverRng;
use crate::simulation::Simulator;

/// Best line found by one round.
struct Round<S: Simulator> {
    max_score: f32,
    solution: Solution<S>,
}

fn run<S: Simulator>(
    ctx: &SearchContext<'_, S>,
    state: &S::State,
    rng: &mut SolverRng,
    on_action: &mut impl FnMut(S::Action),
    mut search_round: impl FnMut(&S::State, &mut SolverRng) -> Option<Round<S>>,
) -> Solution<S> {
    let mut actions = Vec::new();
    let mut current = state.clone();
    let mut round_number = 0u32;

    while !ctx.token.is_cancelled() && !ctx.limited.is_complete(&current) {
        round_number += 1;
        let started = Instant::now();
        ctx.progress.begin_round(round_number, u64::from(ctx.config.iterations));

        let mut round_rng = rng.fork();
        let Some(round) = search_round(&current, &mut round_rng) else {
            break;
        };
        if ctx.token.is_cancelled() {
            break;
        }

        debug!(
            round = round_number,
            max_score = round.max_score,
            line = round.solution.actions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            kips = kilo_iterations_per_second(ctx.progress.value(), started),
            "Stepwise round complete"
        );

        if round.max_score >= ctx.threshold() {
            round.solution.actions.iter().copied().for_each(&mut *on_action);
            actions.extend(round.solution.actions);
            current = round.solution.state;
            break;
        }

        let Some(&action) = round.solution.actions.first() else {
            break;
        };
        on_action(action);
        actions.push(action);
        current = ctx.limited.execute(&current, action).1;
    }

    ctx.finish(actions, current)
}

/// Each round searches one shared tree.
pub(super) fn search<S: Simulator>(
    ctx: &SearchContext<'_, S>,
    state: &S::State,
    rng: &mut SolverRng,
    on_action: &mut impl FnMut(S::Action),
) -> Solution<S> {
    run(ctx, state, rng, on_action, |current, round_rng| {
        let mcts = ctx.search_tree(current, round_rng);
        Some(Round {
            max_score: mcts.max_score(),
            solution: mcts.solution(),
        })
    })
}

/// Each round searches `fork_count` independent trees and follows the best.
pub(super) fn search_forked<S: Simulator>(
    ctx: &SearchContext<'_, S>,
    state: &S::State,
    rng: &mut SolverRng,
    on_action: &mut impl FnMut(S::Action),
) -> Solution<S> {
    run(ctx, state, rng, on_action, |current, round_rng| {
        let mut results = ctx.run_forks(std::slice::from_ref(current), round_rng);
        let best = best_fork(&results)?;
        let winner = results.swap_remove(best);
        Some(Round {
            max_score: winner.max_score,
            solution: winner.solution,
        })
    })
}
