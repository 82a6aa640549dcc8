//! Genetic section scheduler with an exact backtracking fallback.
//!
//! A run builds a [`catalog::Catalog`] of conflict-free class templates,
//! evolves a population of candidate schedules over it, and hands the best
//! one to [`backtrack::solve`] whenever it leaves a student unplaced or
//! breaks a blocking constraint. The result is then materialized into
//! per-slot class records and roster rows.

pub mod backtrack;
pub mod catalog;
pub mod evolution;
pub mod fitness;
pub mod individual;
pub mod init;
pub mod materialize;
pub mod operators;
pub mod repair;

#[cfg(test)]
mod testing;

use catalog::Catalog;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sched_core::{ScheduleError, Scheduler};
use tracing::{info, warn};
use types::{Diagnostics, GaParams, ScheduleRequest, ScheduleResult};

pub struct GaScheduler {
    params: GaParams,
}

impl GaScheduler {
    pub fn new() -> Self {
        Self::with_params(GaParams::default())
    }

    /// Parameters used when a request carries none of its own.
    pub fn with_params(params: GaParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GaParams {
        &self.params
    }
}

impl Default for GaScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for GaScheduler {
    fn schedule(&self, req: &ScheduleRequest) -> Result<ScheduleResult, ScheduleError> {
        let params = req.params.as_ref().unwrap_or(&self.params);
        let mut rng = match params.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        optimize(req, params, &mut rng)
    }
}

/// One full run with an injected generator.
pub fn optimize<R: Rng + ?Sized>(
    req: &ScheduleRequest,
    params: &GaParams,
    rng: &mut R,
) -> Result<ScheduleResult, ScheduleError> {
    info!(
        course = req.course.id.0,
        teachers = req.teachers.len(),
        rooms = req.rooms.len(),
        enrollments = req.enrollments.len(),
        "received scheduling request"
    );
    let cat = Catalog::build(req, params.max_classes_per_teacher)?;
    let outcome = evolution::evolve(&cat, params, rng);

    let unassigned = cat.student_count() - outcome.best.assigned().len();
    let blocking = outcome.evaluation.violations.blocking();
    let used_fallback = unassigned > 0 || blocking > 0;
    let classes = if used_fallback {
        warn!(unassigned, blocking, "evolved schedule incomplete, running exact search");
        backtrack::solve(&cat, params)?
    } else {
        outcome.best.classes
    };

    let mut result = materialize::materialize(&cat, req.course.id, &classes, params);
    info!(
        classes = result.scheduled_classes.len(),
        roster_rows = result.scheduled_enrollments.len(),
        best_score = outcome.evaluation.score,
        used_fallback,
        "schedule ready"
    );

    let state = outcome.state;
    result.diagnostics = Some(Diagnostics {
        penalty_weights: state.weights.report(),
        mutation_rate: state.mutation_rate,
        population_size: params.population_size,
        generations: params.generations,
        templates: cat.templates.len(),
        best_score: outcome.evaluation.score,
        unassigned_before_fallback: unassigned,
        used_fallback,
        qualification_widened: cat.qualification_widened,
        history: state.history,
    });
    Ok(result)
}
