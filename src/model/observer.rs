//! Model Observer

use good_lp::{Expression, Variable};

use crate::{
    model::state::{ConstraintKind, ConstraintRelation, CostComponent},
    parameters::SourcingKey,
};

/// Observer trait for capturing the formulation as it's built.
///
/// Callbacks fire at every emission point of the model builder, so observers can
/// record or render the exact formulation handed to the solver without duplicating
/// any model-building logic.
pub trait ModelObserver: Send {
    /// Called when the aggregate quantity variable of a sourcing decision is created.
    fn on_sourcing_variable(&mut self, _key: SourcingKey, _var: Variable) {}

    /// Called when the quantity and selection variables of one tier are created.
    ///
    /// # Parameters
    ///
    /// - `key`: Sourcing decision the tier belongs to
    /// - `tier`: Zero-based tier position
    /// - `quantity`: Continuous quantity purchased under the tier
    /// - `active`: Binary selection variable of the tier
    fn on_tier_variables(
        &mut self,
        _key: SourcingKey,
        _tier: usize,
        _quantity: Variable,
        _active: Variable,
    ) {
    }

    /// Called when a term is added to either objective component.
    fn on_objective_term(&mut self, _component: CostComponent, _var: Variable, _coefficient: f64) {}

    /// Called when a constraint is recorded.
    ///
    /// # Parameters
    ///
    /// - `kind`: What the constraint enforces
    /// - `lhs`: The left-hand side expression
    /// - `relation`: Relation operator
    /// - `rhs`: Right-hand side value
    fn on_constraint(
        &mut self,
        kind: ConstraintKind,
        lhs: &Expression,
        relation: ConstraintRelation,
        rhs: f64,
    );
}

/// No-op observer for unobserved builds.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ModelObserver for NoopObserver {
    fn on_constraint(&mut self, _: ConstraintKind, _: &Expression, _: ConstraintRelation, _: f64) {}
}

/// Observer emitting every variable and constraint as `trace` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ModelObserver for TracingObserver {
    fn on_sourcing_variable(&mut self, key: SourcingKey, var: Variable) {
        tracing::trace!(?key, ?var, "sourcing variable");
    }

    fn on_tier_variables(
        &mut self,
        key: SourcingKey,
        tier: usize,
        quantity: Variable,
        active: Variable,
    ) {
        tracing::trace!(?key, tier = tier + 1, ?quantity, ?active, "tier variables");
    }

    fn on_objective_term(&mut self, component: CostComponent, var: Variable, coefficient: f64) {
        tracing::trace!(?component, ?var, coefficient, "objective term");
    }

    fn on_constraint(
        &mut self,
        kind: ConstraintKind,
        lhs: &Expression,
        relation: ConstraintRelation,
        rhs: f64,
    ) {
        tracing::trace!(%kind, ?lhs, %relation, rhs, "constraint");
    }
}
