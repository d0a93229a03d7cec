//! Utils

use clap::Parser;

use crate::{model::ModelOptions, solvers::SolveOptions};

/// Arguments for the planning demo
#[derive(Debug, Parser)]
pub struct PlanArgs {
    /// Scenario fixture set to plan
    #[clap(short, long, default_value = "quarterly")]
    pub fixture: String,

    /// Wall-clock budget for the solver, in seconds
    #[clap(short, long)]
    pub time_limit: Option<u64>,

    /// Price every purchase at its first tier's rate
    #[clap(long)]
    pub flat: bool,

    /// Leave the supplier risk surcharge out of the objective
    #[clap(long)]
    pub no_risk: bool,

    /// Trace every variable and constraint as the model is built
    #[clap(long)]
    pub trace_model: bool,
}

impl PlanArgs {
    /// Apply the command-line switches on top of the scenario's own options.
    pub fn model_options(&self, scenario: ModelOptions) -> ModelOptions {
        ModelOptions {
            tiered_pricing: scenario.tiered_pricing && !self.flat,
            risk_penalty: scenario.risk_penalty && !self.no_risk,
        }
    }

    /// Solve options from the command line.
    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            time_limit: self.time_limit.map(std::time::Duration::from_secs),
        }
    }
}
