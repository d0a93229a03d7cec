//! Procura prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    fixtures::{FixtureError, ScenarioFixture},
    model::{
        ConstraintKind, ModelBuilder, ModelConstructionError, ModelObserver, ModelOptions,
        NoopObserver, ProcurementModel, TracingObserver,
    },
    optimise,
    parameters::{
        CostKey, ItemKey, ParameterSet, ParameterSetBuilder, PeriodKey, SourcingKey, SupplierKey,
        TierBand, TierSchedule, ValidationError,
    },
    plan::{PurchasePlan, ReconciliationError, SourcingRecord, SupplierSummary},
    solvers::{
        GoodLpEngine, SolveOptions, SolveOutcome, SolveStatus, SolverEngine, solve, solve_with,
    },
    statement::{StatementError, write_plan},
};
