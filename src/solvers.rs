//! Solve Invocation
//!
//! Hands a [`Formulation`] to a [`SolverEngine`] exactly once and reports the result as
//! a [`SolveOutcome`]. Engine failures are data here: infeasibility, unboundedness, an
//! expired time budget and backend errors all come back as a [`SolveStatus`] rather
//! than an `Err`.

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use good_lp::{Expression, ResolutionError, Solution, Variable};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::Formulation;

pub mod engine;

pub use engine::GoodLpEngine;

/// Final status of a solve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// A proven optimal solution was found
    Optimal,

    /// No assignment satisfies every constraint
    Infeasible,

    /// The objective can decrease without limit
    Unbounded,

    /// The time budget expired before the engine finished
    Timeout,

    /// The engine failed or is unavailable
    SolverError,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Timeout => "timeout",
            SolveStatus::SolverError => "solver error",
        })
    }
}

/// Solve configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveOptions {
    /// Wall-clock budget for the engine. `None` waits for the engine to finish.
    ///
    /// The budget bounds how long the caller waits, not the engine itself. When it
    /// expires the outcome is `Timeout` and the detached solve thread keeps running
    /// until the backend returns, then drops its result. Only the `highs` backend
    /// also stops the search on its own.
    pub time_limit: Option<Duration>,
}

impl SolveOptions {
    /// Options with a wall-clock budget.
    pub fn with_time_limit(time_limit: Duration) -> Self {
        Self {
            time_limit: Some(time_limit),
        }
    }
}

/// Solved variable values, read-only once the solve returns.
#[derive(Debug, Clone, Default)]
pub struct SolvedValues {
    values: HashMap<Variable, f64>,
}

impl SolvedValues {
    /// Value of `var`, if the engine reported one.
    pub fn get(&self, var: Variable) -> Option<f64> {
        self.values.get(&var).copied()
    }

    /// Evaluate an expression against the solved values. Variables without a value
    /// count as zero.
    pub fn eval(&self, expression: &Expression) -> f64 {
        self.values.eval(expression.clone())
    }

    /// Number of variables with a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values were reported
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Variable, f64)> for SolvedValues {
    fn from_iter<I: IntoIterator<Item = (Variable, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// What a [`SolverEngine`] returns when it finds an optimal solution.
#[derive(Debug, Clone)]
pub struct EngineSolution {
    /// Objective value at the solved point.
    ///
    /// `good_lp` exposes only variable values, so this is the formulation's objective
    /// expression evaluated over [`EngineSolution::values`], not a figure read from
    /// the backend. Reconciliation compares it against costs priced from the model
    /// layout, which catches a layout that disagrees with the emitted objective.
    pub objective_value: f64,

    /// Every variable value
    pub values: SolvedValues,
}

/// Engine Errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The problem has no feasible solution.
    #[error("problem is infeasible")]
    Infeasible,

    /// The problem objective is unbounded.
    #[error("problem is unbounded")]
    Unbounded,

    /// The time budget expired.
    #[error("time limit of {0:?} expired")]
    TimedOut(Duration),

    /// The engine is unavailable or failed.
    #[error("engine failure: {0}")]
    Failed(String),
}

impl From<ResolutionError> for EngineError {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::Infeasible => EngineError::Infeasible,
            ResolutionError::Unbounded => EngineError::Unbounded,
            other => EngineError::Failed(other.to_string()),
        }
    }
}

impl EngineError {
    /// Status reported for this failure
    pub fn status(&self) -> SolveStatus {
        match self {
            EngineError::Infeasible => SolveStatus::Infeasible,
            EngineError::Unbounded => SolveStatus::Unbounded,
            EngineError::TimedOut(_) => SolveStatus::Timeout,
            EngineError::Failed(_) => SolveStatus::SolverError,
        }
    }
}

/// The only seam between the crate and an external MILP engine.
pub trait SolverEngine {
    /// Engine name, for logs and reports
    fn name(&self) -> &'static str;

    /// Solve the formulation to optimality.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] describing why no optimal solution is available.
    fn solve(
        &self,
        formulation: Formulation,
        options: &SolveOptions,
    ) -> Result<EngineSolution, EngineError>;
}

/// Result of a single solve attempt.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Final status
    pub status: SolveStatus,

    /// Objective value, only when optimal
    pub objective_value: Option<f64>,

    /// Solved variable values, empty unless optimal
    pub values: SolvedValues,

    /// Wall-clock time spent in the engine
    pub elapsed: Duration,

    /// Engine message for non-optimal outcomes
    pub detail: Option<String>,
}

impl SolveOutcome {
    /// Outcome of an optimal solve.
    pub fn optimal(solution: EngineSolution, elapsed: Duration) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective_value: Some(solution.objective_value),
            values: solution.values,
            elapsed,
            detail: None,
        }
    }

    /// Outcome of a failed solve.
    pub fn failed(error: &EngineError, elapsed: Duration) -> Self {
        Self {
            status: error.status(),
            objective_value: None,
            values: SolvedValues::default(),
            elapsed,
            detail: Some(error.to_string()),
        }
    }

    /// Whether the solve reached a proven optimum
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// Solve with the feature-selected [`GoodLpEngine`].
pub fn solve(formulation: Formulation, options: &SolveOptions) -> SolveOutcome {
    solve_with(&GoodLpEngine, formulation, options)
}

/// Solve with the given engine. Makes exactly one attempt.
#[tracing::instrument(
    name = "solve",
    skip_all,
    fields(
        engine = engine.name(),
        variables = formulation.variable_count(),
        binaries = formulation.binary_count()
    )
)]
pub fn solve_with(
    engine: &dyn SolverEngine,
    formulation: Formulation,
    options: &SolveOptions,
) -> SolveOutcome {
    let start = Instant::now();
    let result = engine.solve(formulation, options);
    let elapsed = start.elapsed();

    match result {
        Ok(solution) => {
            info!(
                status = %SolveStatus::Optimal,
                objective = solution.objective_value,
                ?elapsed,
                "solve finished"
            );

            SolveOutcome::optimal(solution, elapsed)
        }
        Err(error @ EngineError::Failed(_)) => {
            warn!(%error, ?elapsed, "engine failed");

            SolveOutcome::failed(&error, elapsed)
        }
        Err(error) => {
            info!(status = %error.status(), ?elapsed, "solve finished");

            SolveOutcome::failed(&error, elapsed)
        }
    }
}
