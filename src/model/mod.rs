//! Procurement Model
//!
//! Assembles the mixed-integer program from a [`ParameterSet`]:
//!
//! 1. one aggregate quantity variable per sourcing decision (item, supplier, period);
//! 2. pricing, either tiered (the tier encoder plus a linking equality tying the
//!    aggregate to its tier quantities) or flat at the first tier's rate;
//! 3. demand equalities over the aggregates only;
//! 4. capacity inequalities over the aggregates only;
//! 5. the per-supplier risk surcharge on the aggregates.
//!
//! The objective is kept as two components (purchase and risk) so the plan can price
//! them independently after the solve.

use std::fmt;

use good_lp::{Expression, ProblemVariables, Variable};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::parameters::{ParameterKind, ParameterSet, SourcingKey};

pub mod observer;
pub(crate) mod state;
pub mod tiers;

pub use observer::{ModelObserver, NoopObserver, TracingObserver};
pub use state::{ConstraintKind, ConstraintRelation, CostComponent, ModelConstraint};
pub use tiers::{TierBlock, TierVars};

use tiers::TierEncoder;

use state::{ModelState, StateParts};

/// Model Construction Errors
///
/// Any of these indicates a bug: validated parameters always carry the data the
/// builder needs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelConstructionError {
    /// A referenced supplier has no tier schedule.
    #[error("no tier schedule for {0}")]
    MissingTierSchedule(String),

    /// A referenced tier has no unit cost.
    #[error("no unit cost for {context} tier {}", .tier + 1)]
    MissingUnitCost {
        /// Sourcing decision
        context: String,
        /// Tier position
        tier: usize,
    },

    /// A referenced coefficient is missing.
    #[error("no {parameter} coefficient for {context}")]
    MissingCoefficient {
        /// Table the coefficient belongs to
        parameter: ParameterKind,
        /// Location of the coefficient
        context: String,
    },

    /// A coefficient would enter the model as NaN or infinity.
    #[error("coefficient for {context} is not finite: {value}")]
    NonFiniteCoefficient {
        /// Location of the coefficient
        context: String,
        /// Offending value
        value: f64,
    },

    /// Internal model invariant was violated (this is a bug).
    #[error("model invariant violated: {message}")]
    InvariantViolation {
        /// What invariant was violated
        message: &'static str,
    },
}

/// Optional model features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    /// Price purchases with the tiered discount encoding. When off, every sourcing
    /// decision is priced at its first tier's rate and the model is a pure LP.
    pub tiered_pricing: bool,

    /// Add the per-supplier risk surcharge to the objective.
    pub risk_penalty: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            tiered_pricing: true,
            risk_penalty: true,
        }
    }
}

/// How a sourcing decision is priced in the model.
#[derive(Debug, Clone)]
pub enum Pricing {
    /// Tiered discount variables
    Tiered(TierBlock),

    /// Single rate applied to the aggregate quantity
    Flat {
        /// Unit cost applied to every unit
        unit_cost: f64,
    },
}

/// Solver variables and coefficients of one sourcing decision.
#[derive(Debug, Clone)]
pub struct SourcingVars {
    /// Sourcing decision
    pub key: SourcingKey,

    /// Aggregate quantity variable
    pub total: Variable,

    /// Purchase pricing of the decision
    pub pricing: Pricing,

    /// Risk surcharge per unit, when the risk term is modelled
    pub risk_penalty: Option<f64>,
}

/// Structure of a built model, used to interpret solved values.
#[derive(Debug, Clone)]
pub struct ModelLayout {
    options: ModelOptions,
    sourcing: Vec<SourcingVars>,
}

impl ModelLayout {
    /// Options the model was built with
    pub fn options(&self) -> ModelOptions {
        self.options
    }

    /// Sourcing decisions in build order
    pub fn sourcing(&self) -> &[SourcingVars] {
        &self.sourcing
    }
}

/// The solver-facing half of a model: variables, objective and constraints.
pub struct Formulation {
    problem: ProblemVariables,
    variables: Vec<Variable>,
    binaries: usize,
    purchase_cost: Expression,
    risk_cost: Expression,
    constraints: Vec<ModelConstraint>,
}

impl fmt::Debug for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formulation")
            .field("problem", &"<ProblemVariables>")
            .field("variables", &format!("[{} variables]", self.variables.len()))
            .field("binaries", &self.binaries)
            .field(
                "constraints",
                &format!("[{} constraints]", self.constraints.len()),
            )
            .finish_non_exhaustive()
    }
}

impl Formulation {
    /// Every decision variable, in creation order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Number of decision variables
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of binary decision variables
    pub fn binary_count(&self) -> usize {
        self.binaries
    }

    /// Number of constraints of the given kind
    pub fn constraints_of(&self, kind: ConstraintKind) -> usize {
        self.constraints.iter().filter(|c| c.kind == kind).count()
    }

    /// Purchase component of the objective
    pub fn purchase_cost(&self) -> &Expression {
        &self.purchase_cost
    }

    /// Risk component of the objective
    pub fn risk_cost(&self) -> &Expression {
        &self.risk_cost
    }

    /// Full minimisation objective
    pub fn objective(&self) -> Expression {
        self.purchase_cost.clone() + self.risk_cost.clone()
    }

    /// Split into the pieces an engine needs to build its own model.
    pub fn into_parts(self) -> (ProblemVariables, Expression, Vec<ModelConstraint>, Vec<Variable>) {
        let objective = self.purchase_cost + self.risk_cost;

        (self.problem, objective, self.constraints, self.variables)
    }
}

/// A complete procurement model, ready to be solved once.
#[derive(Debug)]
pub struct ProcurementModel {
    formulation: Formulation,
    layout: ModelLayout,
}

impl ProcurementModel {
    /// Solver-facing formulation
    pub fn formulation(&self) -> &Formulation {
        &self.formulation
    }

    /// Structure used to interpret solved values
    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    /// Number of decision variables
    pub fn variable_count(&self) -> usize {
        self.formulation.variable_count()
    }

    /// Number of constraints
    pub fn constraint_count(&self) -> usize {
        self.formulation.constraints.len()
    }

    /// Number of constraints of the given kind
    pub fn constraints_of(&self, kind: ConstraintKind) -> usize {
        self.formulation.constraints_of(kind)
    }

    /// Split into the formulation handed to the solver and the layout kept for
    /// reading the result.
    pub fn into_parts(self) -> (Formulation, ModelLayout) {
        (self.formulation, self.layout)
    }
}

/// Builds a [`ProcurementModel`] from validated parameters.
#[derive(Debug, Clone, Copy)]
pub struct ModelBuilder<'p> {
    params: &'p ParameterSet,
    options: ModelOptions,
}

impl<'p> ModelBuilder<'p> {
    /// Create a builder with default options (tiered pricing and risk on).
    pub fn new(params: &'p ParameterSet) -> Self {
        Self {
            params,
            options: ModelOptions::default(),
        }
    }

    /// Replace the model options.
    #[must_use]
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the model.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelConstructionError`] if an internal invariant is violated.
    pub fn build(&self) -> Result<ProcurementModel, ModelConstructionError> {
        let mut observer = NoopObserver;

        self.build_with_observer(&mut observer)
    }

    /// Build the model, reporting every emitted variable, objective term and
    /// constraint to `observer`.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelConstructionError`] if an internal invariant is violated.
    #[tracing::instrument(
        name = "model.build",
        skip_all,
        fields(
            sourcing = self.params.sourcing_count(),
            tiered = self.options.tiered_pricing,
            risk = self.options.risk_penalty
        )
    )]
    pub fn build_with_observer(
        &self,
        observer: &mut dyn ModelObserver,
    ) -> Result<ProcurementModel, ModelConstructionError> {
        let mut state = ModelState::new(observer);

        let sourcing = self.add_sourcing(&mut state)?;

        if sourcing.len() != self.params.sourcing_count() {
            return Err(ModelConstructionError::InvariantViolation {
                message: "sourcing variable count does not match item x supplier x period",
            });
        }

        let totals: FxHashMap<SourcingKey, Variable> =
            sourcing.iter().map(|s| (s.key, s.total)).collect();

        self.add_demand_constraints(&totals, &mut state)?;
        self.add_capacity_constraints(&totals, &mut state)?;

        if self.options.risk_penalty {
            add_risk_terms(&sourcing, &mut state);
        }

        debug!(
            variables = state.variable_count(),
            constraints = state.constraint_count(),
            "built procurement model"
        );

        let StateParts {
            pb,
            variables,
            binaries,
            purchase_cost,
            risk_cost,
            constraints,
        } = state.into_parts();

        Ok(ProcurementModel {
            formulation: Formulation {
                problem: pb,
                variables,
                binaries,
                purchase_cost,
                risk_cost,
                constraints,
            },
            layout: ModelLayout {
                options: self.options,
                sourcing,
            },
        })
    }

    /// Aggregate variables and pricing for every sourcing decision.
    fn add_sourcing(
        &self,
        state: &mut ModelState<'_>,
    ) -> Result<Vec<SourcingVars>, ModelConstructionError> {
        let encoder = TierEncoder::new(self.params);
        let mut sourcing = Vec::with_capacity(self.params.sourcing_count());

        for key in self.params.sourcing_keys() {
            let label = self.label(key);
            let total = state.add_quantity(format!("x_{label}"));

            state.observer().on_sourcing_variable(key, total);

            let pricing = if self.options.tiered_pricing {
                let block = encoder.encode(key, &label, state)?;

                // x - sum_k q[k] = 0
                state.add_constraint(
                    ConstraintKind::Linking,
                    Expression::from(total) - block.quantity_sum(),
                    ConstraintRelation::Eq,
                    0.0,
                );

                Pricing::Tiered(block)
            } else {
                let unit_cost = self.params.unit_cost(key.tier(0)).ok_or_else(|| {
                    ModelConstructionError::MissingUnitCost {
                        context: self.params.describe(key),
                        tier: 0,
                    }
                })?;

                state.add_cost_term(CostComponent::Purchase, total, unit_cost);

                Pricing::Flat { unit_cost }
            };

            let risk_penalty = if self.options.risk_penalty {
                Some(self.params.risk_penalty(key.supplier).ok_or_else(|| {
                    ModelConstructionError::MissingCoefficient {
                        parameter: ParameterKind::RiskPenalty,
                        context: self.params.describe(key),
                    }
                })?)
            } else {
                None
            };

            sourcing.push(SourcingVars {
                key,
                total,
                pricing,
                risk_penalty,
            });
        }

        Ok(sourcing)
    }

    /// `sum_j x[i,j,t] = D[i,t]`
    fn add_demand_constraints(
        &self,
        totals: &FxHashMap<SourcingKey, Variable>,
        state: &mut ModelState<'_>,
    ) -> Result<(), ModelConstructionError> {
        for (item, item_meta) in self.params.items() {
            for (period, period_meta) in self.params.periods() {
                let context = || format!("item {}, period {}", item_meta.name, period_meta.name);

                let demand = self.params.demand(item, period).ok_or_else(|| {
                    ModelConstructionError::MissingCoefficient {
                        parameter: ParameterKind::Demand,
                        context: context(),
                    }
                })?;

                let mut lhs = Expression::default();

                for (supplier, _) in self.params.suppliers() {
                    lhs += aggregate(totals, SourcingKey::new(item, supplier, period))?;
                }

                state.add_constraint(ConstraintKind::Demand, lhs, ConstraintRelation::Eq, demand);
            }
        }

        Ok(())
    }

    /// `sum_i x[i,j,t] <= Cap[j,t]`
    fn add_capacity_constraints(
        &self,
        totals: &FxHashMap<SourcingKey, Variable>,
        state: &mut ModelState<'_>,
    ) -> Result<(), ModelConstructionError> {
        for (supplier, supplier_meta) in self.params.suppliers() {
            for (period, period_meta) in self.params.periods() {
                let capacity = self.params.capacity(supplier, period).ok_or_else(|| {
                    ModelConstructionError::MissingCoefficient {
                        parameter: ParameterKind::Capacity,
                        context: format!(
                            "supplier {}, period {}",
                            supplier_meta.name, period_meta.name
                        ),
                    }
                })?;

                let mut lhs = Expression::default();

                for (item, _) in self.params.items() {
                    lhs += aggregate(totals, SourcingKey::new(item, supplier, period))?;
                }

                state.add_constraint(
                    ConstraintKind::Capacity,
                    lhs,
                    ConstraintRelation::Leq,
                    capacity,
                );
            }
        }

        Ok(())
    }

    /// Variable-name safe label of a sourcing decision.
    fn label(&self, key: SourcingKey) -> String {
        let name = |n: Option<&str>| n.unwrap_or("?").replace(|c: char| !c.is_alphanumeric(), "_");

        format!(
            "{}_{}_{}",
            name(self.params.item(key.item).map(|i| i.name.as_str())),
            name(self.params.supplier(key.supplier).map(|s| s.name.as_str())),
            name(self.params.period(key.period).map(|p| p.name.as_str())),
        )
    }
}

/// Risk cost is a property of the supplier, so it is charged on the aggregate
/// quantity at a flat rate regardless of tier.
fn add_risk_terms(sourcing: &[SourcingVars], state: &mut ModelState<'_>) {
    for vars in sourcing {
        if let Some(penalty) = vars.risk_penalty {
            state.add_cost_term(CostComponent::Risk, vars.total, penalty);
        }
    }
}

fn aggregate(
    totals: &FxHashMap<SourcingKey, Variable>,
    key: SourcingKey,
) -> Result<Variable, ModelConstructionError> {
    totals
        .get(&key)
        .copied()
        .ok_or(ModelConstructionError::InvariantViolation {
            message: "aggregate variable missing for sourcing decision",
        })
}
