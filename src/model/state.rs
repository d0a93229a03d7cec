//! Model State

use std::fmt;

use good_lp::{Expression, ProblemVariables, Variable, variable};

use crate::model::observer::ModelObserver;

/// Relation operator for a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintRelation {
    /// Equality (`lhs == rhs`)
    Eq,

    /// Less than or equal (`lhs <= rhs`)
    Leq,

    /// Greater than or equal (`lhs >= rhs`)
    Geq,
}

impl fmt::Display for ConstraintRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintRelation::Eq => "=",
            ConstraintRelation::Leq => "<=",
            ConstraintRelation::Geq => ">=",
        })
    }
}

/// What a constraint enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Aggregate quantity equals the sum of its tier quantities
    Linking,

    /// Purchases of an item in a period meet its demand exactly
    Demand,

    /// Purchases from a supplier in a period stay within its capacity
    Capacity,

    /// At most one tier is active per sourcing decision
    TierExclusivity,

    /// A tier carries at most its upper bound, and nothing unless active
    TierUpperBound,

    /// An active tier carries at least its lower bound
    TierLowerBound,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintKind::Linking => "linking",
            ConstraintKind::Demand => "demand",
            ConstraintKind::Capacity => "capacity",
            ConstraintKind::TierExclusivity => "tier exclusivity",
            ConstraintKind::TierUpperBound => "tier upper bound",
            ConstraintKind::TierLowerBound => "tier lower bound",
        })
    }
}

/// The two priced components of the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostComponent {
    /// Tier-rate sensitive purchase cost
    Purchase,

    /// Flat per-supplier risk surcharge
    Risk,
}

/// Recorded linear constraint emitted during model construction.
#[derive(Debug, Clone)]
pub struct ModelConstraint {
    /// What the constraint enforces
    pub kind: ConstraintKind,

    /// Left-hand side expression
    pub lhs: Expression,

    /// Relation operator
    pub relation: ConstraintRelation,

    /// Right-hand side scalar
    pub rhs: f64,
}

/// Builder state for model variables, objective components and constraints.
///
/// Every emission is forwarded to the attached observer.
pub(crate) struct ModelState<'o> {
    pb: ProblemVariables,
    variables: Vec<Variable>,
    binaries: usize,
    purchase_cost: Expression,
    risk_cost: Expression,
    constraints: Vec<ModelConstraint>,
    observer: &'o mut dyn ModelObserver,
}

impl fmt::Debug for ModelState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelState")
            .field("pb", &"<ProblemVariables>")
            .field("variables", &format!("[{} variables]", self.variables.len()))
            .field("binaries", &self.binaries)
            .field("purchase_cost", &"<Expression>")
            .field("risk_cost", &"<Expression>")
            .field(
                "constraints",
                &format!("[{} constraints]", self.constraints.len()),
            )
            .finish_non_exhaustive()
    }
}

/// Parts of a finished model state.
pub(crate) struct StateParts {
    pub(crate) pb: ProblemVariables,
    pub(crate) variables: Vec<Variable>,
    pub(crate) binaries: usize,
    pub(crate) purchase_cost: Expression,
    pub(crate) risk_cost: Expression,
    pub(crate) constraints: Vec<ModelConstraint>,
}

impl<'o> ModelState<'o> {
    /// Create an empty state reporting to `observer`
    pub(crate) fn new(observer: &'o mut dyn ModelObserver) -> Self {
        Self {
            pb: ProblemVariables::new(),
            variables: Vec::new(),
            binaries: 0,
            purchase_cost: Expression::default(),
            risk_cost: Expression::default(),
            constraints: Vec::new(),
            observer,
        }
    }

    /// Access the observer for structural callbacks that have no state counterpart.
    pub(crate) fn observer(&mut self) -> &mut dyn ModelObserver {
        &mut *self.observer
    }

    /// Add a non-negative continuous variable.
    pub(crate) fn add_quantity(&mut self, name: String) -> Variable {
        let var = self.pb.add(variable().min(0.0).name(name));

        self.variables.push(var);

        var
    }

    /// Add a binary variable.
    pub(crate) fn add_binary(&mut self, name: String) -> Variable {
        let var = self.pb.add(variable().binary().name(name));

        self.variables.push(var);
        self.binaries += 1;

        var
    }

    /// Add a term to one of the objective components.
    pub(crate) fn add_cost_term(&mut self, component: CostComponent, var: Variable, coefficient: f64) {
        match component {
            CostComponent::Purchase => self.purchase_cost += var * coefficient,
            CostComponent::Risk => self.risk_cost += var * coefficient,
        }

        self.observer.on_objective_term(component, var, coefficient);
    }

    /// Record a constraint.
    pub(crate) fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        lhs: Expression,
        relation: ConstraintRelation,
        rhs: f64,
    ) {
        self.observer.on_constraint(kind, &lhs, relation, rhs);

        self.constraints.push(ModelConstraint {
            kind,
            lhs,
            relation,
            rhs,
        });
    }

    /// Number of variables added so far
    pub(crate) fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints recorded so far
    pub(crate) fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Release the built parts.
    pub(crate) fn into_parts(self) -> StateParts {
        StateParts {
            pb: self.pb,
            variables: self.variables,
            binaries: self.binaries,
            purchase_cost: self.purchase_cost,
            risk_cost: self.risk_cost,
            constraints: self.constraints,
        }
    }
}
