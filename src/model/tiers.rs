//! Discount Tier Encoding
//!
//! Tiered pricing makes cost a non-convex function of quantity (unit price falls as
//! volume rises), so it cannot be expressed as a convex piecewise-linear term. Each
//! tier instead gets its own quantity variable and binary selection variable:
//!
//! ```text
//! q[k] <= U[k] * y[k]      (no volume unless selected, never above the band)
//! q[k] >= L[k] * y[k]      (a selected tier carries at least its lower bound)
//! sum(y[k]) <= 1           (one rate per sourcing decision)
//! ```
//!
//! `U[k]` is the tier's own upper bound rather than a global big-M, which keeps the
//! relaxation tight. The lower bound is what stops the solver from claiming a
//! discounted rate on a trivial quantity.

use good_lp::{Expression, Variable};
use smallvec::SmallVec;

use crate::{
    model::{
        ModelConstructionError,
        state::{ConstraintKind, ConstraintRelation, CostComponent, ModelState},
    },
    parameters::{ParameterSet, SourcingKey, TierBand},
};

/// Solver variables and coefficients of a single tier.
#[derive(Debug, Clone, Copy)]
pub struct TierVars {
    /// Zero-based tier position
    pub tier: usize,

    /// Volume band of the tier
    pub band: TierBand,

    /// Unit cost under the tier
    pub unit_cost: f64,

    /// Quantity purchased under the tier
    pub quantity: Variable,

    /// Whether the tier is selected
    pub active: Variable,
}

/// Tier variables of one sourcing decision.
#[derive(Debug, Clone)]
pub struct TierBlock {
    key: SourcingKey,
    tiers: SmallVec<[TierVars; 4]>,
}

impl TierBlock {
    /// Sourcing decision the block prices
    pub fn key(&self) -> SourcingKey {
        self.key
    }

    /// Tier variables in tier order
    pub fn tiers(&self) -> &[TierVars] {
        &self.tiers
    }

    /// Sum of all tier quantities
    pub fn quantity_sum(&self) -> Expression {
        self.tiers.iter().map(|t| t.quantity).sum()
    }

    /// Sum of all tier selection variables
    pub fn active_sum(&self) -> Expression {
        self.tiers.iter().map(|t| t.active).sum()
    }
}

/// Emits the tier variables and constraints for one sourcing decision at a time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TierEncoder<'p> {
    params: &'p ParameterSet,
}

impl<'p> TierEncoder<'p> {
    /// Create an encoder over validated parameters.
    pub(crate) fn new(params: &'p ParameterSet) -> Self {
        Self { params }
    }

    /// Encode the tier schedule of `key` into the model state.
    ///
    /// Adds one quantity and one selection variable per tier, the band constraints of
    /// every tier, the exclusivity constraint, and the purchase-cost terms.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelConstructionError`] if the supplier has no tier schedule, a
    /// tier has no unit cost, or a coefficient is not finite.
    pub(crate) fn encode(
        &self,
        key: SourcingKey,
        label: &str,
        state: &mut ModelState<'_>,
    ) -> Result<TierBlock, ModelConstructionError> {
        let schedule = self.params.tier_schedule(key.supplier).ok_or_else(|| {
            ModelConstructionError::MissingTierSchedule(self.params.describe(key))
        })?;

        let mut tiers: SmallVec<[TierVars; 4]> = SmallVec::with_capacity(schedule.len());

        for (tier, band) in schedule.iter().enumerate() {
            let unit_cost = self.params.unit_cost(key.tier(tier)).ok_or_else(|| {
                ModelConstructionError::MissingUnitCost {
                    context: self.params.describe(key),
                    tier,
                }
            })?;

            ensure_finite(unit_cost, || format!("unit cost of {label} tier {}", tier + 1))?;
            ensure_finite(band.upper, || format!("upper bound of {label} tier {}", tier + 1))?;

            let quantity = state.add_quantity(format!("q_{label}_t{}", tier + 1));
            let active = state.add_binary(format!("y_{label}_t{}", tier + 1));

            state
                .observer()
                .on_tier_variables(key, tier, quantity, active);

            state.add_cost_term(CostComponent::Purchase, quantity, unit_cost);

            let vars = TierVars {
                tier,
                band: *band,
                unit_cost,
                quantity,
                active,
            };

            add_band_constraints(&vars, state);

            tiers.push(vars);
        }

        let block = TierBlock { key, tiers };

        // sum_k y[k] <= 1
        state.add_constraint(
            ConstraintKind::TierExclusivity,
            block.active_sum(),
            ConstraintRelation::Leq,
            1.0,
        );

        Ok(block)
    }
}

fn add_band_constraints(vars: &TierVars, state: &mut ModelState<'_>) {
    // q[k] - U[k] * y[k] <= 0
    state.add_constraint(
        ConstraintKind::TierUpperBound,
        Expression::from(vars.quantity) - Expression::from(vars.active) * vars.band.upper,
        ConstraintRelation::Leq,
        0.0,
    );

    // q[k] - L[k] * y[k] >= 0
    state.add_constraint(
        ConstraintKind::TierLowerBound,
        Expression::from(vars.quantity) - Expression::from(vars.active) * vars.band.lower,
        ConstraintRelation::Geq,
        0.0,
    );
}

fn ensure_finite(
    value: f64,
    context: impl FnOnce() -> String,
) -> Result<(), ModelConstructionError> {
    if value.is_finite() {
        return Ok(());
    }

    Err(ModelConstructionError::NonFiniteCoefficient {
        context: context(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use good_lp::Solution;
    use testresult::TestResult;

    use crate::{
        model::{
            observer::NoopObserver,
            state::{ConstraintKind, ModelConstraint},
        },
        parameters::{TierSchedule, ValidationError},
    };

    use super::*;

    fn single_sourcing_params() -> Result<(ParameterSet, SourcingKey), ValidationError> {
        let mut builder = ParameterSet::builder();

        let item = builder.add_item("P1");
        let supplier = builder.add_supplier("S_Baja", 0.1);
        let period = builder.add_period("Q1");

        builder
            .tiers(TierSchedule::from_bounds(&[(0.0, 39.99), (40.0, 100.0)]))
            .demand(item, period, 40.0)
            .capacity(supplier, period, 100.0)
            .unit_costs(item, supplier, period, &[12.0, 9.5]);

        Ok((builder.build()?, SourcingKey::new(item, supplier, period)))
    }

    fn satisfied(constraint: &ModelConstraint, values: &HashMap<Variable, f64>) -> bool {
        let lhs = values.eval(&constraint.lhs);

        match constraint.relation {
            ConstraintRelation::Eq => (lhs - constraint.rhs).abs() < 1e-9,
            ConstraintRelation::Leq => lhs <= constraint.rhs + 1e-9,
            ConstraintRelation::Geq => lhs >= constraint.rhs - 1e-9,
        }
    }

    #[test]
    fn emits_two_variables_and_two_bounds_per_tier() -> TestResult {
        let (params, key) = single_sourcing_params()?;
        let mut observer = NoopObserver;
        let mut state = ModelState::new(&mut observer);

        let block = TierEncoder::new(&params).encode(key, "P1_S_Baja_Q1", &mut state)?;
        let parts = state.into_parts();

        assert_eq!(block.key(), key);
        assert_eq!(block.tiers().len(), 2);
        assert_eq!(parts.variables.len(), 4);
        assert_eq!(parts.binaries, 2);

        let count = |kind| parts.constraints.iter().filter(|c| c.kind == kind).count();

        assert_eq!(count(ConstraintKind::TierUpperBound), 2);
        assert_eq!(count(ConstraintKind::TierLowerBound), 2);
        assert_eq!(count(ConstraintKind::TierExclusivity), 1);
        assert_eq!(count(ConstraintKind::Linking), 0);

        Ok(())
    }

    #[test]
    fn discount_tier_cannot_be_claimed_on_a_trivial_quantity() -> TestResult {
        let (params, key) = single_sourcing_params()?;
        let mut observer = NoopObserver;
        let mut state = ModelState::new(&mut observer);

        let block = TierEncoder::new(&params).encode(key, "P1_S_Baja_Q1", &mut state)?;
        let parts = state.into_parts();

        let base = block.tiers().first().ok_or("expected base tier")?;
        let discount = block.tiers().get(1).ok_or("expected discount tier")?;

        // One unit at the discounted rate with the discount tier selected.
        let cheating: HashMap<Variable, f64> = [
            (base.quantity, 0.0),
            (base.active, 0.0),
            (discount.quantity, 1.0),
            (discount.active, 1.0),
        ]
        .into_iter()
        .collect();

        assert!(
            !parts.constraints.iter().all(|c| satisfied(c, &cheating)),
            "lower bound must reject a trivial discounted purchase"
        );

        // Volume on a tier that is not selected.
        let unselected: HashMap<Variable, f64> = [
            (base.quantity, 10.0),
            (base.active, 0.0),
            (discount.quantity, 0.0),
            (discount.active, 0.0),
        ]
        .into_iter()
        .collect();

        assert!(
            !parts.constraints.iter().all(|c| satisfied(c, &unselected)),
            "upper bound must force unselected tiers to zero"
        );

        // Splitting one decision across both tiers.
        let split: HashMap<Variable, f64> = [
            (base.quantity, 10.0),
            (base.active, 1.0),
            (discount.quantity, 40.0),
            (discount.active, 1.0),
        ]
        .into_iter()
        .collect();

        assert!(
            !parts.constraints.iter().all(|c| satisfied(c, &split)),
            "exclusivity must reject two active tiers"
        );

        // Forty units at the discounted rate.
        let valid: HashMap<Variable, f64> = [
            (base.quantity, 0.0),
            (base.active, 0.0),
            (discount.quantity, 40.0),
            (discount.active, 1.0),
        ]
        .into_iter()
        .collect();

        assert!(
            parts.constraints.iter().all(|c| satisfied(c, &valid)),
            "a purchase inside the discount band is feasible"
        );
        assert!((valid.eval(&parts.purchase_cost) - 380.0).abs() < 1e-9);
        assert!((valid.eval(&block.quantity_sum()) - 40.0).abs() < 1e-9);

        Ok(())
    }
}
