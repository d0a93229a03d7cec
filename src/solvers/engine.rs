//! `good_lp` Engine

use std::{
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use good_lp::{Solution, SolverModel};

#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as default_solver;
#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
use good_lp::solvers::microlp::microlp as default_solver;

use crate::{
    model::{ConstraintRelation, Formulation, ModelConstraint},
    solvers::{EngineError, EngineSolution, SolveOptions, SolverEngine, SolvedValues},
};

#[cfg(feature = "solver-highs")]
const BACKEND: &str = "highs";
#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
const BACKEND: &str = "microlp";

/// Engine backed by the `good_lp` backend selected at compile time.
///
/// With a time limit the solve runs on a worker thread and the call stops waiting
/// once the budget expires. The thread is detached, not cancelled: `microlp` keeps
/// solving to completion in the background and its result is discarded. The `highs`
/// backend also receives the limit directly and stops on its own.
///
/// The reported objective is the objective expression evaluated over the solved
/// variable values.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpEngine;

impl SolverEngine for GoodLpEngine {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn solve(
        &self,
        formulation: Formulation,
        options: &SolveOptions,
    ) -> Result<EngineSolution, EngineError> {
        let Some(limit) = options.time_limit else {
            return run(formulation, None);
        };

        let (sender, receiver) = mpsc::channel();

        thread::Builder::new()
            .name("procura-solve".to_string())
            .spawn(move || {
                if sender.send(run(formulation, Some(limit))).is_err() {
                    tracing::debug!("solve finished after the caller stopped waiting");
                }
            })
            .map_err(|err| EngineError::Failed(format!("cannot start solver thread: {err}")))?;

        match receiver.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(?limit, "time limit expired, solve thread left running");

                Err(EngineError::TimedOut(limit))
            }
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Failed(
                "solver thread exited without a result".to_string(),
            )),
        }
    }
}

fn run(formulation: Formulation, limit: Option<Duration>) -> Result<EngineSolution, EngineError> {
    let (pb, objective, constraints, variables) = formulation.into_parts();

    let model = pb.minimise(objective.clone()).using(default_solver);
    let model = apply_time_limit(model, limit);
    let model = apply_recorded_constraints(model, constraints);

    let solution = model.solve()?;

    let values: SolvedValues = variables
        .iter()
        .map(|&var| (var, solution.value(var)))
        .collect();

    Ok(EngineSolution {
        objective_value: values.eval(&objective),
        values,
    })
}

fn apply_recorded_constraints<S: SolverModel>(
    mut model: S,
    constraints: Vec<ModelConstraint>,
) -> S {
    for constraint in constraints {
        model = match constraint.relation {
            ConstraintRelation::Eq => model.with(constraint.lhs.eq(constraint.rhs)),
            ConstraintRelation::Leq => model.with(constraint.lhs.leq(constraint.rhs)),
            ConstraintRelation::Geq => model.with(constraint.lhs.geq(constraint.rhs)),
        };
    }

    model
}

#[cfg(feature = "solver-highs")]
fn apply_time_limit(
    model: good_lp::solvers::highs::HighsProblem,
    limit: Option<Duration>,
) -> good_lp::solvers::highs::HighsProblem {
    match limit {
        Some(limit) => model.set_time_limit(limit.as_secs_f64()),
        None => model,
    }
}

#[cfg(not(feature = "solver-highs"))]
fn apply_time_limit<S: SolverModel>(model: S, _limit: Option<Duration>) -> S {
    model
}
