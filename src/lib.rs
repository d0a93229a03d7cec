//! Procura
//!
//! Procura plans multi-item, multi-supplier, multi-period purchases under tiered volume
//! discounts and supplier risk penalties, and produces a cost-minimising purchase plan.
//!
//! Tiered pricing is non-convex, so every sourcing decision is encoded with one
//! quantity and one binary selection variable per tier. The resulting mixed-integer
//! program is handed to a [`solvers::SolverEngine`] and the solved values are read
//! back into a [`plan::PurchasePlan`].
//!
//! ```rust,no_run
//! use procura::prelude::*;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fixture = ScenarioFixture::from_set("scenario_a")?;
//! let params = fixture.parameters()?;
//!
//! let plan = optimise(&params, &fixture.model_options(), &SolveOptions::default())?;
//!
//! write_plan(std::io::stdout(), &plan, &params)?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod model;
pub mod parameters;
pub mod plan;
pub mod prelude;
pub mod solvers;
pub mod statement;
pub mod utils;

use crate::{
    model::{ModelBuilder, ModelConstructionError, ModelOptions},
    parameters::ParameterSet,
    plan::PurchasePlan,
    solvers::SolveOptions,
};

/// Build, solve and interpret a procurement model in one call.
///
/// A non-optimal solve is not an error: the returned plan carries the status.
///
/// # Errors
///
/// Returns a [`ModelConstructionError`] if the model cannot be built.
pub fn optimise(
    params: &ParameterSet,
    model_options: &ModelOptions,
    solve_options: &SolveOptions,
) -> Result<PurchasePlan, ModelConstructionError> {
    let model = ModelBuilder::new(params)
        .with_options(*model_options)
        .build()?;

    let (formulation, layout) = model.into_parts();
    let outcome = solvers::solve(formulation, solve_options);

    Ok(PurchasePlan::from_outcome(&layout, &outcome))
}
