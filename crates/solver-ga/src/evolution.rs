//! Generational loop: elitism, tournament selection, deterministic crowding,
//! adaptive penalty escalation and diversity injection.

use crate::catalog::Catalog;
use crate::fitness::{evaluate, Evaluation, HardCategory, PenaltyWeights, Violations};
use crate::individual::Individual;
use crate::init::{initial_population, random_individual};
use crate::operators::{crossover, mutate};
use crate::repair::repair;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, info};
use types::{GaParams, GenerationStats};

/// Run-scoped tuning state, threaded through every generation.
#[derive(Clone, Debug)]
pub struct OptimizerState {
    pub weights: PenaltyWeights,
    pub mutation_rate: f64,
    pub stagnation: usize,
    pub best_score: Option<f64>,
    pub escalations: usize,
    pub injections: usize,
    pub history: Vec<GenerationStats>,
    windows: [VecDeque<u32>; 3],
}

impl OptimizerState {
    pub fn new(params: &GaParams) -> Self {
        Self {
            weights: PenaltyWeights::default(),
            mutation_rate: params.mutation_rate,
            stagnation: 0,
            best_score: None,
            escalations: 0,
            injections: 0,
            history: Vec::new(),
            windows: Default::default(),
        }
    }

    /// Returns true once the best score has not improved for `limit`
    /// generations; the counter restarts afterwards.
    pub fn observe_best(&mut self, score: f64, limit: usize) -> bool {
        match self.best_score {
            Some(best) if score <= best + 1e-9 => self.stagnation += 1,
            _ => {
                self.best_score = Some(score);
                self.stagnation = 0;
            }
        }
        if limit > 0 && self.stagnation >= limit {
            self.stagnation = 0;
            return true;
        }
        false
    }

    /// Feeds the top cohort's violation totals into the trailing windows and
    /// escalates every category whose window never went down.
    pub fn track_violations(&mut self, totals: &Violations, params: &GaParams) -> Vec<HardCategory> {
        let span = params.violation_window.max(2);
        let mut escalated = Vec::new();
        for (i, cat) in HardCategory::ALL.into_iter().enumerate() {
            let window = &mut self.windows[i];
            window.push_back(totals.get(cat));
            if window.len() > span {
                window.pop_front();
            }
            if window.len() < span {
                continue;
            }
            let improved = window.iter().zip(window.iter().skip(1)).any(|(prev, next)| next < prev);
            let still_violated = window.back().is_some_and(|&v| v > 0);
            if !improved && still_violated {
                self.weights
                    .escalate(cat, params.penalty_escalation, params.penalty_cap);
                window.clear();
                escalated.push(cat);
            }
        }
        if !escalated.is_empty() {
            self.escalations += escalated.len();
            self.mutation_rate = (self.mutation_rate * params.penalty_escalation).min(params.max_mutation_rate);
            debug!(?escalated, weights = ?self.weights, mutation_rate = self.mutation_rate, "penalties escalated");
        }
        escalated
    }
}

pub struct Outcome {
    pub best: Individual,
    pub evaluation: Evaluation,
    pub state: OptimizerState,
}

fn rank(cat: &Catalog, population: Vec<Individual>, state: &OptimizerState, params: &GaParams) -> Vec<(Individual, Evaluation)> {
    let mut scored: Vec<(Individual, Evaluation)> = population
        .into_iter()
        .map(|ind| {
            let e = evaluate(cat, &ind, &state.weights, params.validity_threshold);
            (ind, e)
        })
        .collect();
    scored.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
    scored
}

/// Best of `k` uniform picks; `scored` is sorted best first.
fn tournament<R: Rng + ?Sized>(scored: &[(Individual, Evaluation)], k: usize, rng: &mut R) -> usize {
    (0..k.max(1))
        .map(|_| rng.gen_range(0..scored.len()))
        .min()
        .unwrap_or(0)
}

fn cohort_violations(scored: &[(Individual, Evaluation)], top: usize) -> Violations {
    scored.iter().take(top).fold(Violations::default(), |mut acc, (_, e)| {
        acc.qualification += e.violations.qualification;
        acc.capacity += e.violations.capacity;
        acc.availability += e.violations.availability;
        acc
    })
}

/// True when matching `c1` with `pb` and `c2` with `pa` is the closer pairing.
fn crossed_pairing(c1: &Individual, c2: &Individual, pa: &Individual, pb: &Individual) -> bool {
    c1.similarity(pb) + c2.similarity(pa) > c1.similarity(pa) + c2.similarity(pb)
}

/// Deterministic crowding: the child replaces its paired parent unless it scores worse.
fn compete(child: Individual, child_eval: &Evaluation, parent: &Individual, parent_eval: &Evaluation) -> Individual {
    if child_eval.score >= parent_eval.score {
        child
    } else {
        parent.clone()
    }
}

/// Repairs a clone of each of the `top` best-scoring individuals in place,
/// keeping it when the score does not drop. Positions are left unchanged.
fn polish_top<R: Rng + ?Sized>(
    cat: &Catalog,
    population: &mut [Individual],
    top: usize,
    weights: &PenaltyWeights,
    params: &GaParams,
    rng: &mut R,
) -> usize {
    let thr = params.validity_threshold;
    let mut order: Vec<(usize, f64)> = population
        .iter()
        .enumerate()
        .map(|(i, ind)| (i, evaluate(cat, ind, weights, thr).score))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut kept = 0;
    for &(i, before) in order.iter().take(top) {
        let mut polished = population[i].clone();
        repair(cat, &mut polished, params, rng);
        if evaluate(cat, &polished, weights, thr).score >= before {
            population[i] = polished;
            kept += 1;
        }
    }
    kept
}

/// Replaces half the population, never touching the first `keep` slots.
fn inject_diversity<R: Rng + ?Sized>(
    cat: &Catalog,
    population: &mut [Individual],
    keep: usize,
    params: &GaParams,
    rng: &mut R,
) -> usize {
    let mut slots: Vec<usize> = (keep.min(population.len())..population.len()).collect();
    slots.shuffle(rng);
    let count = (population.len() / 2).min(slots.len());
    for &i in slots.iter().take(count) {
        let mut fresh = random_individual(cat, params, rng);
        repair(cat, &mut fresh, params, rng);
        population[i] = fresh;
    }
    count
}

pub fn evolve<R: Rng + ?Sized>(cat: &Catalog, params: &GaParams, rng: &mut R) -> Outcome {
    let size = params.population_size.max(2);
    let elite = ((size as f64 * params.elite_fraction).round() as usize).clamp(1, size);
    let top = ((size as f64 * params.top_fraction).ceil() as usize).clamp(1, size);
    let thr = params.validity_threshold;

    let mut state = OptimizerState::new(params);
    let mut population = initial_population(cat, params, rng);

    for generation in 0..params.generations {
        let scored = rank(cat, population, &state, params);

        let (best, best_eval) = &scored[0];
        let mean = scored.iter().map(|(_, e)| e.score).sum::<f64>() / scored.len() as f64;
        let stats = GenerationStats {
            generation,
            best_score: best_eval.score,
            mean_score: mean,
            best_unassigned: cat.student_count() - best.assigned().len(),
            best_hard_violations: best_eval.violations.hard(),
        };
        if generation % 10 == 0 || generation + 1 == params.generations {
            info!(
                generation,
                best = stats.best_score,
                mean = stats.mean_score,
                unassigned = stats.best_unassigned,
                hard = stats.best_hard_violations,
                "ga generation"
            );
        }
        state.history.push(stats);

        let mut next: Vec<Individual> = scored.iter().take(elite).map(|(ind, _)| ind.clone()).collect();
        while next.len() < size {
            let ia = tournament(&scored, params.tournament_size, rng);
            let ib = tournament(&scored, params.tournament_size, rng);
            let (pa, ea) = &scored[ia];
            let (pb, eb) = &scored[ib];

            let mut c1 = crossover(cat, pa, pb, params, rng);
            mutate(cat, &mut c1, state.mutation_rate, params, rng);
            let mut c2 = crossover(cat, pb, pa, params, rng);
            mutate(cat, &mut c2, state.mutation_rate, params, rng);
            let e1 = evaluate(cat, &c1, &state.weights, thr);
            let e2 = evaluate(cat, &c2, &state.weights, thr);

            let [(r1, re1), (r2, re2)] = if crossed_pairing(&c1, &c2, pa, pb) {
                [(pb, eb), (pa, ea)]
            } else {
                [(pa, ea), (pb, eb)]
            };
            for survivor in [compete(c1, &e1, r1, re1), compete(c2, &e2, r2, re2)] {
                if next.len() < size {
                    next.push(survivor);
                }
            }
        }

        polish_top(cat, &mut next, top, &state.weights, params, rng);

        let escalated = state.track_violations(&cohort_violations(&scored, top), params);
        let stagnant = state.observe_best(scored[0].1.score, params.stagnation_limit);
        if !escalated.is_empty() || stagnant {
            let replaced = inject_diversity(cat, &mut next, elite, params, rng);
            state.injections += 1;
            debug!(generation, replaced, stagnant, "diversity injected");
        }

        population = next;
    }

    let mut scored = rank(cat, population, &state, params);
    let (best, evaluation) = scored.swap_remove(0);
    Outcome {
        best,
        evaluation,
        state,
    }
}
