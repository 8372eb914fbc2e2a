//! Stepwise search over a beam of frontier states.
//!
//! Each round spreads `fork_count` trees over the active states, keeps the
//! `furcated_action_count` best forks and advances each of them by its first
//! action. Branches that reach the end of the craft are parked as
//! candidates. Actions shared by every surviving branch are locked in and
//! reported as soon as they are known, but only while no candidate exists:
//! once one does, the reported prefix must stay compatible with whichever
//! candidate wins.

use std::time::Instant;

use tracing::debug;

use super::{kilo_iterations_per_second, ForkResult, SearchContext, Solution};
use crate::core::SolverRng;
use crate::simulation::Simulator;

/// A state on the beam and the actions that led to it.
struct Branch<S: Simulator> {
    actions: Vec<S::Action>,
    state: S::State,
}

/// A branch that finished the craft.
struct Candidate<S: Simulator> {
    branch: Branch<S>,
    max_score: f32,
}

/// Fork indices ordered by max score, best first; ties keep fork order.
fn rank<S: Simulator>(results: &[ForkResult<S>], keep: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| results[b].max_score.total_cmp(&results[a].max_score));
    order.truncate(keep);
    order
}

/// Length of the longest prefix all `branches` share.
fn common_prefix_len<S: Simulator>(branches: &[Branch<S>]) -> usize {
    let Some((first, rest)) = branches.split_first() else {
        return 0;
    };
    rest.iter().fold(first.actions.len(), |len, branch| {
        first.actions[..len]
            .iter()
            .zip(&branch.actions)
            .take_while(|(a, b)| a == b)
            .count()
    })
}

/// Report `actions[*definite..]` and mark them as reported.
fn report<A: Copy>(actions: &[A], definite: &mut usize, on_action: &mut impl FnMut(A)) {
    if actions.len() > *definite {
        actions[*definite..].iter().copied().for_each(&mut *on_action);
        *definite = actions.len();
    }
}

pub(super) fn search<S: Simulator>(
    ctx: &SearchContext<'_, S>,
    state: &S::State,
    rng: &mut SolverRng,
    on_action: &mut impl FnMut(S::Action),
) -> Solution<S> {
    let keep = ctx.config.furcated_action_count;
    let mut active = vec![Branch::<S> {
        actions: Vec::new(),
        state: state.clone(),
    }];
    let mut candidates: Vec<Candidate<S>> = Vec::new();
    let mut locked_in: Vec<S::Action> = Vec::new();
    let mut definite = 0usize;
    let mut round_number = 0u32;

    while !active.is_empty() && !ctx.token.is_cancelled() {
        round_number += 1;
        let started = Instant::now();
        ctx.progress.begin_round(round_number, u64::from(ctx.config.iterations));

        let roots: Vec<S::State> = active.iter().map(|b| b.state.clone()).collect();
        let mut round_rng = rng.fork();
        let results = ctx.run_forks(&roots, &mut round_rng);
        if ctx.token.is_cancelled() {
            break;
        }

        let ranked = rank(&results, keep);
        let Some(&best) = ranked.first() else {
            break;
        };

        debug!(
            round = round_number,
            branches = active.len(),
            candidates = candidates.len(),
            max_score = results[best].max_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            kips = kilo_iterations_per_second(ctx.progress.value(), started),
            "Furcated round complete"
        );

        let leader = &results[best];
        if leader.max_score >= ctx.threshold() {
            let mut actions = active[leader.root].actions.clone();
            actions.extend_from_slice(&leader.solution.actions);
            report(&actions, &mut definite, &mut *on_action);
            return ctx.finish(actions, leader.solution.state.clone());
        }

        let mut next = Vec::with_capacity(ranked.len());
        for &i in &ranked {
            let result = &results[i];
            let Some(&action) = result.solution.actions.first() else {
                continue;
            };
            let parent = &active[result.root];
            let mut actions = parent.actions.clone();
            actions.push(action);
            let branch = Branch {
                actions,
                state: ctx.limited.execute(&parent.state, action).1,
            };

            if ctx.limited.is_complete(&branch.state) {
                candidates.push(Candidate {
                    branch,
                    max_score: result.max_score,
                });
            } else {
                next.push(branch);
            }
        }

        if candidates.is_empty() && !next.is_empty() {
            let shared = common_prefix_len(&next);
            locked_in = next[0].actions[..shared].to_vec();
            report(&locked_in, &mut definite, &mut *on_action);
        }

        active = next;
    }

    let winner = candidates.into_iter().fold(None, |best: Option<Candidate<S>>, c| match best {
        Some(b) if b.max_score >= c.max_score => Some(b),
        _ => Some(c),
    });

    match winner {
        Some(candidate) => {
            report(&candidate.branch.actions, &mut definite, &mut *on_action);
            ctx.finish(candidate.branch.actions, candidate.branch.state)
        }
        None => {
            let reached = ctx.replay(state, &locked_in);
            ctx.finish(locked_in, reached)
        }
    }
}
