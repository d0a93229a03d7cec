//! Purchase Planning Example
//!
//! Loads a bundled scenario, builds the procurement model, solves it and prints the
//! purchase plan.
//!
//! Run with: `cargo run --example plan -- --fixture scenario_a`
//!
//! Set `RUST_LOG=procura=debug` for model and solve logs, or pass `--trace-model`
//! with `RUST_LOG=procura=trace` to see every variable and constraint.

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use procura::{
    fixtures::ScenarioFixture,
    model::{ModelBuilder, NoopObserver, TracingObserver},
    plan::PurchasePlan,
    solvers,
    statement::write_plan,
    utils::PlanArgs,
};

/// Purchase Planning Example
pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("procura=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = PlanArgs::parse();

    let fixture = ScenarioFixture::from_set(&args.fixture)?;
    let params = fixture.parameters()?;
    let model_options = args.model_options(fixture.model_options());

    let builder = ModelBuilder::new(&params).with_options(model_options);

    let model = if args.trace_model {
        builder.build_with_observer(&mut TracingObserver)?
    } else {
        builder.build_with_observer(&mut NoopObserver)?
    };

    let (formulation, layout) = model.into_parts();
    let outcome = solvers::solve(formulation, &args.solve_options());
    let plan = PurchasePlan::from_outcome(&layout, &outcome);

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    write_plan(&mut handle, &plan, &params)?;

    Ok(())
}
