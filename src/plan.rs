//! Purchase Plan
//!
//! Translates solved values back into business quantities and costs, and
//! cross-checks them against the model's invariants.

use std::time::Duration;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::warn;

use crate::{
    model::{ModelLayout, Pricing, SourcingVars},
    parameters::{SourcingKey, SupplierKey},
    solvers::{SolveOutcome, SolveStatus, SolvedValues},
};

/// Binary threshold for determining truthiness
pub const BINARY_THRESHOLD: f64 = 0.5;

/// Relative tolerance for post-solve checks, scaled by `max(1, |x|)`
pub const TOLERANCE: f64 = 1e-6;

/// Post-solve check failures.
///
/// These are logged and kept on the plan; the plan is still returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconciliationError {
    /// Aggregate quantity differs from the sum of its tier quantities.
    #[error("aggregate {total} does not match tier sum {tier_sum} for {key:?}")]
    LinkingMismatch {
        /// Sourcing decision
        key: SourcingKey,
        /// Solved aggregate quantity
        total: f64,
        /// Sum of solved tier quantities
        tier_sum: f64,
    },

    /// More than one tier is active for a sourcing decision.
    #[error("{active} tiers active for {key:?}")]
    MultipleActiveTiers {
        /// Sourcing decision
        key: SourcingKey,
        /// Number of active tiers
        active: usize,
    },

    /// An active tier carries a quantity outside its band.
    #[error("tier {} quantity {quantity} outside [{lower}, {upper}] for {key:?}", .tier + 1)]
    QuantityOutsideBand {
        /// Sourcing decision
        key: SourcingKey,
        /// Zero-based tier position
        tier: usize,
        /// Solved tier quantity
        quantity: f64,
        /// Lower bound of the band
        lower: f64,
        /// Upper bound of the band
        upper: f64,
    },

    /// Reported objective differs from purchase plus risk cost.
    #[error("objective {objective} does not equal purchase {purchase} + risk {risk}")]
    ObjectiveMismatch {
        /// Objective evaluated from the solved formulation
        objective: f64,
        /// Recomputed purchase cost
        purchase: f64,
        /// Recomputed risk cost
        risk: f64,
    },
}

/// The tier a sourcing decision was bought under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTier {
    /// Zero-based tier position
    pub tier: usize,

    /// Unit cost under the tier
    pub unit_cost: f64,

    /// Quantity purchased under the tier
    pub quantity: f64,
}

/// Solved purchase of one item from one supplier in one period.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcingRecord {
    /// Sourcing decision
    pub key: SourcingKey,

    /// Aggregate quantity purchased
    pub quantity: f64,

    /// Active tier, if tiered pricing was modelled and a tier is selected
    pub tier: Option<ActiveTier>,

    /// Effective unit cost, if anything prices this decision
    pub unit_cost: Option<f64>,

    /// Purchase cost of this decision
    pub purchase_cost: f64,

    /// Risk cost of this decision
    pub risk_cost: f64,
}

/// Per-supplier totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupplierSummary {
    /// Supplier
    pub supplier: SupplierKey,

    /// Units sourced across items and periods
    pub units: f64,

    /// Purchase cost across items and periods
    pub purchase_cost: f64,

    /// Risk cost across items and periods
    pub risk_cost: f64,
}

/// Interpreted result of a solve.
#[derive(Debug, Clone)]
pub struct PurchasePlan {
    status: SolveStatus,
    objective_value: Option<f64>,
    purchase_cost: f64,
    risk_cost: f64,
    elapsed: Duration,
    records: Vec<SourcingRecord>,
    issues: SmallVec<[ReconciliationError; 2]>,
}

impl PurchasePlan {
    /// Interpret `outcome` using the layout of the model it solved.
    ///
    /// Non-optimal outcomes yield a plan that carries only the status.
    pub fn from_outcome(layout: &ModelLayout, outcome: &SolveOutcome) -> Self {
        let mut plan = Self {
            status: outcome.status,
            objective_value: None,
            purchase_cost: 0.0,
            risk_cost: 0.0,
            elapsed: outcome.elapsed,
            records: Vec::new(),
            issues: SmallVec::new(),
        };

        if !outcome.is_optimal() {
            return plan;
        }

        plan.objective_value = outcome.objective_value;
        plan.records.reserve(layout.sourcing().len());

        for vars in layout.sourcing() {
            let record = extract_record(vars, &outcome.values, &mut plan.issues);

            plan.purchase_cost += record.purchase_cost;
            plan.risk_cost += record.risk_cost;
            plan.records.push(record);
        }

        if let Some(objective) = plan.objective_value {
            let total = plan.purchase_cost + plan.risk_cost;

            if !approx_eq(objective, total) {
                plan.issues.push(ReconciliationError::ObjectiveMismatch {
                    objective,
                    purchase: plan.purchase_cost,
                    risk: plan.risk_cost,
                });
            }
        }

        for issue in &plan.issues {
            warn!(%issue, "reconciliation failed");
        }

        plan
    }

    /// Solve status
    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Whether the plan comes from a proven optimum
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    /// Objective value reported by the engine, only when optimal
    pub fn objective_value(&self) -> Option<f64> {
        self.objective_value
    }

    /// Purchase cost summed from solved values
    pub fn purchase_cost(&self) -> f64 {
        self.purchase_cost
    }

    /// Risk cost summed from solved values
    pub fn risk_cost(&self) -> f64 {
        self.risk_cost
    }

    /// Purchase plus risk cost
    pub fn total_cost(&self) -> f64 {
        self.purchase_cost + self.risk_cost
    }

    /// Time spent in the engine
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// One record per sourcing decision, in model order
    pub fn records(&self) -> &[SourcingRecord] {
        &self.records
    }

    /// Record of a single sourcing decision
    pub fn record(&self, key: SourcingKey) -> Option<&SourcingRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// Per-supplier totals, in order of first appearance
    pub fn supplier_summaries(&self) -> Vec<SupplierSummary> {
        let mut order: Vec<SupplierKey> = Vec::new();
        let mut totals: FxHashMap<SupplierKey, SupplierSummary> = FxHashMap::default();

        for record in &self.records {
            let supplier = record.key.supplier;

            let summary = totals.entry(supplier).or_insert_with(|| {
                order.push(supplier);

                SupplierSummary {
                    supplier,
                    units: 0.0,
                    purchase_cost: 0.0,
                    risk_cost: 0.0,
                }
            });

            summary.units += record.quantity;
            summary.purchase_cost += record.purchase_cost;
            summary.risk_cost += record.risk_cost;
        }

        order
            .into_iter()
            .filter_map(|supplier| totals.remove(&supplier))
            .collect()
    }

    /// Post-solve check failures
    pub fn reconciliation_issues(&self) -> &[ReconciliationError] {
        &self.issues
    }

    /// Whether every post-solve check passed
    pub fn is_reconciled(&self) -> bool {
        self.issues.is_empty()
    }
}

fn extract_record(
    vars: &SourcingVars,
    values: &SolvedValues,
    issues: &mut SmallVec<[ReconciliationError; 2]>,
) -> SourcingRecord {
    let key = vars.key;
    let quantity = values.get(vars.total).unwrap_or_default();
    let risk_cost = vars.risk_penalty.map_or(0.0, |penalty| penalty * quantity);

    let (tier, unit_cost, purchase_cost) = match &vars.pricing {
        Pricing::Flat { unit_cost } => (None, Some(*unit_cost), unit_cost * quantity),
        Pricing::Tiered(block) => {
            let mut tier_sum = 0.0;
            let mut purchase_cost = 0.0;
            let mut active: SmallVec<[ActiveTier; 2]> = SmallVec::new();

            for tier in block.tiers() {
                let tier_quantity = values.get(tier.quantity).unwrap_or_default();

                tier_sum += tier_quantity;
                purchase_cost += tier.unit_cost * tier_quantity;

                if values.get(tier.active).unwrap_or_default() > BINARY_THRESHOLD {
                    if !tier.band.contains(tier_quantity, scaled_tolerance(tier_quantity)) {
                        issues.push(ReconciliationError::QuantityOutsideBand {
                            key,
                            tier: tier.tier,
                            quantity: tier_quantity,
                            lower: tier.band.lower,
                            upper: tier.band.upper,
                        });
                    }

                    active.push(ActiveTier {
                        tier: tier.tier,
                        unit_cost: tier.unit_cost,
                        quantity: tier_quantity,
                    });
                }
            }

            if !approx_eq(quantity, tier_sum) {
                issues.push(ReconciliationError::LinkingMismatch {
                    key,
                    total: quantity,
                    tier_sum,
                });
            }

            if active.len() > 1 {
                issues.push(ReconciliationError::MultipleActiveTiers {
                    key,
                    active: active.len(),
                });
            }

            let tier = active.first().copied();

            (tier, tier.map(|t| t.unit_cost), purchase_cost)
        }
    };

    SourcingRecord {
        key,
        quantity,
        tier,
        unit_cost,
        purchase_cost,
        risk_cost,
    }
}

fn scaled_tolerance(value: f64) -> f64 {
    TOLERANCE * value.abs().max(1.0)
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= scaled_tolerance(a.abs().max(b.abs()))
}

#[cfg(test)]
mod tests {
    use good_lp::Variable;
    use testresult::TestResult;

    use crate::{
        model::{ModelBuilder, ModelOptions, ProcurementModel},
        parameters::{ParameterSet, TierSchedule, ValidationError},
    };

    use super::*;

    fn scenario_a() -> Result<ParameterSet, ValidationError> {
        let mut builder = ParameterSet::builder();

        let p1 = builder.add_item("P1");
        let alta = builder.add_supplier("S_Alta", 3.0);
        let baja = builder.add_supplier("S_Baja", 0.1);
        let q1 = builder.add_period("Q1");

        builder
            .tiers(TierSchedule::from_bounds(&[(0.0, 39.99), (40.0, 100.0)]))
            .demand(p1, q1, 40.0)
            .capacity(alta, q1, 100.0)
            .capacity(baja, q1, 100.0)
            .unit_costs(p1, alta, q1, &[10.0, 7.5])
            .unit_costs(p1, baja, q1, &[12.0, 9.5]);

        builder.build()
    }

    /// Values where `supplier` buys `quantity` under `tier` and everything else is zero.
    fn assign(
        model: &ProcurementModel,
        supplier: SupplierKey,
        tier: usize,
        quantity: f64,
    ) -> Vec<(Variable, f64)> {
        let mut values = Vec::new();

        for vars in model.layout().sourcing() {
            let buying = vars.key.supplier == supplier;

            values.push((vars.total, if buying { quantity } else { 0.0 }));

            if let Pricing::Tiered(block) = &vars.pricing {
                for t in block.tiers() {
                    let selected = buying && t.tier == tier;

                    values.push((t.quantity, if selected { quantity } else { 0.0 }));
                    values.push((t.active, if selected { 1.0 } else { 0.0 }));
                }
            }
        }

        values
    }

    fn optimal(values: Vec<(Variable, f64)>, objective_value: f64) -> SolveOutcome {
        SolveOutcome {
            status: SolveStatus::Optimal,
            objective_value: Some(objective_value),
            values: values.into_iter().collect(),
            elapsed: Duration::from_millis(3),
            detail: None,
        }
    }

    #[test]
    fn prices_purchase_and_risk_independently() -> TestResult {
        let params = scenario_a()?;
        let baja = params.supplier_key("S_Baja").ok_or("missing S_Baja")?;
        let model = ModelBuilder::new(&params).build()?;

        let outcome = optimal(assign(&model, baja, 1, 40.0), 384.0);
        let plan = PurchasePlan::from_outcome(model.layout(), &outcome);

        assert!(plan.is_optimal(), "plan should be optimal");
        assert!(plan.is_reconciled(), "issues: {:?}", plan.reconciliation_issues());
        assert!((plan.purchase_cost() - 380.0).abs() < 1e-9);
        assert!((plan.risk_cost() - 4.0).abs() < 1e-9);
        assert!((plan.total_cost() - 384.0).abs() < 1e-9);

        let record = plan
            .records()
            .iter()
            .find(|r| r.key.supplier == baja)
            .ok_or("missing S_Baja record")?;

        let tier = record.tier.ok_or("expected an active tier")?;

        assert_eq!(tier.tier, 1);
        assert!((tier.quantity - 40.0).abs() < 1e-9);
        assert!(record.unit_cost.is_some_and(|c| (c - 9.5).abs() < 1e-9));

        Ok(())
    }

    #[test]
    fn supplier_summaries_follow_model_order() -> TestResult {
        let params = scenario_a()?;
        let alta = params.supplier_key("S_Alta").ok_or("missing S_Alta")?;
        let baja = params.supplier_key("S_Baja").ok_or("missing S_Baja")?;
        let model = ModelBuilder::new(&params).build()?;

        let plan =
            PurchasePlan::from_outcome(model.layout(), &optimal(assign(&model, baja, 1, 40.0), 384.0));

        let summaries = plan.supplier_summaries();

        assert_eq!(
            summaries.iter().map(|s| s.supplier).collect::<Vec<_>>(),
            vec![alta, baja]
        );

        let baja_summary = summaries.get(1).ok_or("missing S_Baja summary")?;

        assert!((baja_summary.units - 40.0).abs() < 1e-9);
        assert!((baja_summary.risk_cost - 4.0).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn non_optimal_outcome_carries_status_only() -> TestResult {
        let params = scenario_a()?;
        let model = ModelBuilder::new(&params).build()?;

        let outcome = SolveOutcome {
            status: SolveStatus::Infeasible,
            objective_value: None,
            values: SolvedValues::default(),
            elapsed: Duration::ZERO,
            detail: Some("problem is infeasible".to_string()),
        };

        let plan = PurchasePlan::from_outcome(model.layout(), &outcome);

        assert_eq!(plan.status(), SolveStatus::Infeasible);
        assert!(plan.records().is_empty(), "no records without a solution");
        assert!(plan.objective_value().is_none(), "no objective");
        assert!(plan.total_cost().abs() < f64::EPSILON);
        assert!(plan.is_reconciled(), "nothing to reconcile");

        Ok(())
    }

    #[test]
    fn linking_mismatch_is_reported_not_fatal() -> TestResult {
        let params = scenario_a()?;
        let baja = params.supplier_key("S_Baja").ok_or("missing S_Baja")?;
        let model = ModelBuilder::new(&params).build()?;

        let mut values = assign(&model, baja, 1, 40.0);

        let total = model
            .layout()
            .sourcing()
            .iter()
            .find(|s| s.key.supplier == baja)
            .ok_or("missing S_Baja sourcing")?
            .total;

        values.push((total, 41.0));

        let plan = PurchasePlan::from_outcome(model.layout(), &optimal(values, 384.1));

        assert!(
            plan.reconciliation_issues()
                .iter()
                .any(|i| matches!(i, ReconciliationError::LinkingMismatch { .. })),
            "expected a linking mismatch"
        );
        assert_eq!(plan.records().len(), 2);

        Ok(())
    }

    #[test]
    fn multiple_active_tiers_and_band_violations_are_reported() -> TestResult {
        let params = scenario_a()?;
        let baja = params.supplier_key("S_Baja").ok_or("missing S_Baja")?;
        let model = ModelBuilder::new(&params).build()?;

        let mut values = assign(&model, baja, 1, 40.0);

        let block = model
            .layout()
            .sourcing()
            .iter()
            .find_map(|s| match &s.pricing {
                Pricing::Tiered(block) if s.key.supplier == baja => Some(block.clone()),
                _ => None,
            })
            .ok_or("missing S_Baja tiers")?;

        let base = block.tiers().first().ok_or("missing base tier")?;

        values.push((base.active, 1.0));

        let plan = PurchasePlan::from_outcome(model.layout(), &optimal(values, 384.0));

        assert!(
            plan.reconciliation_issues()
                .iter()
                .any(|i| matches!(i, ReconciliationError::MultipleActiveTiers { active: 2, .. })),
            "expected two active tiers"
        );

        Ok(())
    }

    #[test]
    fn objective_mismatch_is_reported() -> TestResult {
        let params = scenario_a()?;
        let baja = params.supplier_key("S_Baja").ok_or("missing S_Baja")?;
        let model = ModelBuilder::new(&params).build()?;

        let plan =
            PurchasePlan::from_outcome(model.layout(), &optimal(assign(&model, baja, 1, 40.0), 390.0));

        assert_eq!(plan.reconciliation_issues().len(), 1);
        assert!(
            matches!(
                plan.reconciliation_issues().first(),
                Some(ReconciliationError::ObjectiveMismatch { purchase, risk, .. })
                    if (purchase - 380.0).abs() < 1e-9 && (risk - 4.0).abs() < 1e-9
            ),
            "expected an objective mismatch, got {:?}",
            plan.reconciliation_issues()
        );

        Ok(())
    }

    #[test]
    fn flat_pricing_records_carry_no_tier() -> TestResult {
        let params = scenario_a()?;
        let baja = params.supplier_key("S_Baja").ok_or("missing S_Baja")?;
        let model = ModelBuilder::new(&params)
            .with_options(ModelOptions {
                tiered_pricing: false,
                risk_penalty: false,
            })
            .build()?;

        let plan =
            PurchasePlan::from_outcome(model.layout(), &optimal(assign(&model, baja, 0, 40.0), 480.0));

        assert!(plan.is_reconciled(), "issues: {:?}", plan.reconciliation_issues());
        assert!(plan.records().iter().all(|r| r.tier.is_none()));
        assert!(plan.risk_cost().abs() < f64::EPSILON);
        assert!((plan.purchase_cost() - 480.0).abs() < 1e-9);

        Ok(())
    }
}
