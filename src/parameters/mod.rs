//! Procurement Parameters
//!
//! The validated, immutable input of a planning run: the item, supplier and period
//! sets, the tier schedules, and the demand, capacity, unit cost and risk tables
//! keyed by explicit composite keys.

use std::fmt;

use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};
use thiserror::Error;

pub mod keys;
pub mod tiers;

pub use keys::{CapacityKey, CostKey, DemandKey, ItemKey, PeriodKey, SourcingKey, SupplierKey};
pub use tiers::{TierBand, TierSchedule};

/// The sets making up a procurement problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// Products to be procured
    Items,

    /// Sourcing candidates
    Suppliers,

    /// Time buckets
    Periods,

    /// Discount tiers
    Tiers,
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SetKind::Items => "items",
            SetKind::Suppliers => "suppliers",
            SetKind::Periods => "periods",
            SetKind::Tiers => "tiers",
        })
    }
}

/// The coefficient tables making up a procurement problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Required quantity per item and period
    Demand,

    /// Deliverable quantity per supplier and period
    Capacity,

    /// Price per unit per item, supplier, tier and period
    UnitCost,

    /// Per-unit surcharge per supplier
    RiskPenalty,

    /// Per-supplier tier schedule override
    TierSchedule,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterKind::Demand => "demand",
            ParameterKind::Capacity => "capacity",
            ParameterKind::UnitCost => "unit cost",
            ParameterKind::RiskPenalty => "risk penalty",
            ParameterKind::TierSchedule => "tier schedule",
        })
    }
}

/// Parameter Validation Errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// One of the sets has no members.
    #[error("{0} set is empty")]
    EmptySet(SetKind),

    /// Two members of the same set share a name.
    #[error("duplicate name in {set}: {name}")]
    DuplicateName {
        /// Set containing the duplicate
        set: SetKind,
        /// Duplicated name
        name: String,
    },

    /// A coefficient is negative, NaN or infinite.
    #[error("{parameter} for {context} must be finite and non-negative, got {value}")]
    InvalidValue {
        /// Table holding the value
        parameter: ParameterKind,
        /// Human readable location of the value
        context: String,
        /// Offending value
        value: f64,
    },

    /// A tier's lower bound is negative or exceeds its upper bound.
    #[error("tier {} has invalid bounds [{lower}, {upper}]", .tier + 1)]
    InvalidTierBand {
        /// Tier position
        tier: usize,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// A tier bound is NaN or infinite.
    #[error("tier {} has a non-finite bound", .tier + 1)]
    NonFiniteTierBound {
        /// Tier position
        tier: usize,
    },

    /// A tier's band is below the band of the tier before it.
    #[error("tier {} covers less volume than the tier before it", .tier + 1)]
    NonMonotoneTierBounds {
        /// Tier position
        tier: usize,
    },

    /// A unit cost rises from one tier to the next.
    #[error("unit cost rises at tier {} for {context}", .tier + 1)]
    NonMonotoneUnitCost {
        /// Human readable sourcing decision
        context: String,
        /// Tier position where the cost rises
        tier: usize,
    },

    /// An (item, period) pair has no demand entry.
    #[error("missing demand for item {item} in period {period}")]
    MissingDemand {
        /// Item name
        item: String,
        /// Period name
        period: String,
    },

    /// A (supplier, period) pair has no capacity entry.
    #[error("missing capacity for supplier {supplier} in period {period}")]
    MissingCapacity {
        /// Supplier name
        supplier: String,
        /// Period name
        period: String,
    },

    /// An (item, supplier, tier, period) combination has no unit cost entry.
    #[error("missing unit cost for item {item}, supplier {supplier}, tier {}, period {period}", .tier + 1)]
    MissingUnitCost {
        /// Item name
        item: String,
        /// Supplier name
        supplier: String,
        /// Tier position
        tier: usize,
        /// Period name
        period: String,
    },

    /// A table entry references a key outside its set.
    #[error("{0} entry references an unknown item, supplier or period")]
    UnknownReference(ParameterKind),

    /// A unit cost entry references a tier outside the supplier's schedule.
    #[error("unit cost references tier {} but the schedule has {tiers} tiers", .tier + 1)]
    TierOutOfRange {
        /// Tier position referenced
        tier: usize,
        /// Number of tiers in the schedule
        tiers: usize,
    },
}

/// Item to be procured
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Item name
    pub name: String,
}

/// Sourcing candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Supplier {
    /// Supplier name
    pub name: String,

    /// Per-unit cost surcharge reflecting supplier reliability risk
    pub risk_penalty: f64,
}

/// Time bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    /// Period name
    pub name: String,
}

/// Validated procurement parameters.
///
/// Only obtainable through [`ParameterSetBuilder::build`], so every (item, supplier,
/// tier, period) combination the model references is guaranteed to be priced and
/// every coefficient is finite and non-negative. Immutable once built.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    items: SlotMap<ItemKey, Item>,
    suppliers: SlotMap<SupplierKey, Supplier>,
    periods: SlotMap<PeriodKey, Period>,
    item_keys: FxHashMap<String, ItemKey>,
    supplier_keys: FxHashMap<String, SupplierKey>,
    period_keys: FxHashMap<String, PeriodKey>,
    tier_schedules: SecondaryMap<SupplierKey, TierSchedule>,
    demand: FxHashMap<DemandKey, f64>,
    capacity: FxHashMap<CapacityKey, f64>,
    unit_costs: FxHashMap<CostKey, f64>,
}

impl ParameterSet {
    /// Start building a parameter set
    pub fn builder() -> ParameterSetBuilder {
        ParameterSetBuilder::default()
    }

    /// Iterate over items in insertion order
    pub fn items(&self) -> impl Iterator<Item = (ItemKey, &Item)> {
        self.items.iter()
    }

    /// Iterate over suppliers in insertion order
    pub fn suppliers(&self) -> impl Iterator<Item = (SupplierKey, &Supplier)> {
        self.suppliers.iter()
    }

    /// Iterate over periods in order
    pub fn periods(&self) -> impl Iterator<Item = (PeriodKey, &Period)> {
        self.periods.iter()
    }

    /// Look up an item
    pub fn item(&self, key: ItemKey) -> Option<&Item> {
        self.items.get(key)
    }

    /// Look up a supplier
    pub fn supplier(&self, key: SupplierKey) -> Option<&Supplier> {
        self.suppliers.get(key)
    }

    /// Look up a period
    pub fn period(&self, key: PeriodKey) -> Option<&Period> {
        self.periods.get(key)
    }

    /// Find an item by name
    pub fn item_key(&self, name: &str) -> Option<ItemKey> {
        self.item_keys.get(name).copied()
    }

    /// Find a supplier by name
    pub fn supplier_key(&self, name: &str) -> Option<SupplierKey> {
        self.supplier_keys.get(name).copied()
    }

    /// Find a period by name
    pub fn period_key(&self, name: &str) -> Option<PeriodKey> {
        self.period_keys.get(name).copied()
    }

    /// Required quantity of `item` in `period`
    pub fn demand(&self, item: ItemKey, period: PeriodKey) -> Option<f64> {
        self.demand.get(&DemandKey { item, period }).copied()
    }

    /// Deliverable quantity of `supplier` in `period`
    pub fn capacity(&self, supplier: SupplierKey, period: PeriodKey) -> Option<f64> {
        self.capacity.get(&CapacityKey { supplier, period }).copied()
    }

    /// Unit cost of a priced combination
    pub fn unit_cost(&self, key: CostKey) -> Option<f64> {
        self.unit_costs.get(&key).copied()
    }

    /// Per-unit risk surcharge of `supplier`
    pub fn risk_penalty(&self, supplier: SupplierKey) -> Option<f64> {
        self.suppliers.get(supplier).map(|s| s.risk_penalty)
    }

    /// Tier schedule in force for `supplier`
    pub fn tier_schedule(&self, supplier: SupplierKey) -> Option<&TierSchedule> {
        self.tier_schedules.get(supplier)
    }

    /// Number of sourcing decisions (item × supplier × period)
    pub fn sourcing_count(&self) -> usize {
        self.items.len() * self.suppliers.len() * self.periods.len()
    }

    /// Iterate over every sourcing decision, item-major, then supplier, then period.
    pub fn sourcing_keys(&self) -> impl Iterator<Item = SourcingKey> + '_ {
        self.items.keys().flat_map(move |item| {
            self.suppliers.keys().flat_map(move |supplier| {
                self.periods
                    .keys()
                    .map(move |period| SourcingKey::new(item, supplier, period))
            })
        })
    }

    /// Human readable `item / supplier / period` label for a sourcing decision
    pub fn describe(&self, key: SourcingKey) -> String {
        format!(
            "{} / {} / {}",
            self.items.get(key.item).map_or("?", |i| i.name.as_str()),
            self.suppliers
                .get(key.supplier)
                .map_or("?", |s| s.name.as_str()),
            self.periods.get(key.period).map_or("?", |p| p.name.as_str()),
        )
    }
}

/// Builder collecting raw procurement parameters ahead of validation.
#[derive(Debug, Default)]
pub struct ParameterSetBuilder {
    items: SlotMap<ItemKey, Item>,
    suppliers: SlotMap<SupplierKey, Supplier>,
    periods: SlotMap<PeriodKey, Period>,
    default_tiers: Option<TierSchedule>,
    supplier_tiers: FxHashMap<SupplierKey, TierSchedule>,
    demand: FxHashMap<DemandKey, f64>,
    capacity: FxHashMap<CapacityKey, f64>,
    unit_costs: FxHashMap<CostKey, f64>,
    allow_non_monotone: bool,
}

impl ParameterSetBuilder {
    /// Add an item
    pub fn add_item(&mut self, name: impl Into<String>) -> ItemKey {
        self.items.insert(Item { name: name.into() })
    }

    /// Add a supplier with its per-unit risk penalty
    pub fn add_supplier(&mut self, name: impl Into<String>, risk_penalty: f64) -> SupplierKey {
        self.suppliers.insert(Supplier {
            name: name.into(),
            risk_penalty,
        })
    }

    /// Add a period. Periods are ordered by insertion.
    pub fn add_period(&mut self, name: impl Into<String>) -> PeriodKey {
        self.periods.insert(Period { name: name.into() })
    }

    /// Set the tier schedule applying to every supplier without an override
    pub fn tiers(&mut self, schedule: TierSchedule) -> &mut Self {
        self.default_tiers = Some(schedule);
        self
    }

    /// Override the tier schedule of one supplier
    pub fn supplier_tiers(&mut self, supplier: SupplierKey, schedule: TierSchedule) -> &mut Self {
        self.supplier_tiers.insert(supplier, schedule);
        self
    }

    /// Set the demand of `item` in `period`
    pub fn demand(&mut self, item: ItemKey, period: PeriodKey, quantity: f64) -> &mut Self {
        self.demand.insert(DemandKey { item, period }, quantity);
        self
    }

    /// Set the capacity of `supplier` in `period`
    pub fn capacity(
        &mut self,
        supplier: SupplierKey,
        period: PeriodKey,
        quantity: f64,
    ) -> &mut Self {
        self.capacity.insert(CapacityKey { supplier, period }, quantity);
        self
    }

    /// Set a single unit cost entry
    pub fn unit_cost(&mut self, key: CostKey, cost: f64) -> &mut Self {
        self.unit_costs.insert(key, cost);
        self
    }

    /// Set the unit costs of every tier of one sourcing decision, in tier order
    pub fn unit_costs(
        &mut self,
        item: ItemKey,
        supplier: SupplierKey,
        period: PeriodKey,
        costs: &[f64],
    ) -> &mut Self {
        let sourcing = SourcingKey::new(item, supplier, period);

        for (tier, &cost) in costs.iter().enumerate() {
            self.unit_costs.insert(sourcing.tier(tier), cost);
        }

        self
    }

    /// Accept tier schedules whose bands shrink, and unit costs that rise with volume.
    pub fn allow_non_monotone_tiers(&mut self) -> &mut Self {
        self.allow_non_monotone = true;
        self
    }

    /// Validate the collected parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for the first problem found: empty sets,
    /// duplicate names, negative or non-finite values, malformed tiers, missing
    /// table entries, or entries referencing unknown keys.
    pub fn build(self) -> Result<ParameterSet, ValidationError> {
        let item_keys = name_index(&self.items, SetKind::Items, |i| &i.name)?;
        let supplier_keys = name_index(&self.suppliers, SetKind::Suppliers, |s| &s.name)?;
        let period_keys = name_index(&self.periods, SetKind::Periods, |p| &p.name)?;

        for supplier in self.suppliers.values() {
            check_value(
                ParameterKind::RiskPenalty,
                supplier.risk_penalty,
                || format!("supplier {}", supplier.name),
            )?;
        }

        let tier_schedules = self.resolve_tier_schedules()?;

        self.check_references(&tier_schedules)?;
        self.check_demand()?;
        self.check_capacity()?;
        self.check_unit_costs(&tier_schedules)?;

        Ok(ParameterSet {
            items: self.items,
            suppliers: self.suppliers,
            periods: self.periods,
            item_keys,
            supplier_keys,
            period_keys,
            tier_schedules,
            demand: self.demand,
            capacity: self.capacity,
            unit_costs: self.unit_costs,
        })
    }

    fn resolve_tier_schedules(
        &self,
    ) -> Result<SecondaryMap<SupplierKey, TierSchedule>, ValidationError> {
        if self
            .supplier_tiers
            .keys()
            .any(|key| !self.suppliers.contains_key(*key))
        {
            return Err(ValidationError::UnknownReference(ParameterKind::TierSchedule));
        }

        let mut schedules = SecondaryMap::new();

        for supplier in self.suppliers.keys() {
            let schedule = self
                .supplier_tiers
                .get(&supplier)
                .or(self.default_tiers.as_ref())
                .ok_or(ValidationError::EmptySet(SetKind::Tiers))?;

            schedule.validate(!self.allow_non_monotone)?;
            schedules.insert(supplier, schedule.clone());
        }

        Ok(schedules)
    }

    fn check_references(
        &self,
        tier_schedules: &SecondaryMap<SupplierKey, TierSchedule>,
    ) -> Result<(), ValidationError> {
        if self
            .demand
            .keys()
            .any(|k| !self.items.contains_key(k.item) || !self.periods.contains_key(k.period))
        {
            return Err(ValidationError::UnknownReference(ParameterKind::Demand));
        }

        if self.capacity.keys().any(|k| {
            !self.suppliers.contains_key(k.supplier) || !self.periods.contains_key(k.period)
        }) {
            return Err(ValidationError::UnknownReference(ParameterKind::Capacity));
        }

        for key in self.unit_costs.keys() {
            if !self.items.contains_key(key.item) || !self.periods.contains_key(key.period) {
                return Err(ValidationError::UnknownReference(ParameterKind::UnitCost));
            }

            let tiers = tier_schedules
                .get(key.supplier)
                .ok_or(ValidationError::UnknownReference(ParameterKind::UnitCost))?
                .len();

            if key.tier >= tiers {
                return Err(ValidationError::TierOutOfRange {
                    tier: key.tier,
                    tiers,
                });
            }
        }

        Ok(())
    }

    fn check_demand(&self) -> Result<(), ValidationError> {
        for (item_key, item) in &self.items {
            for (period_key, period) in &self.periods {
                let quantity = self
                    .demand
                    .get(&DemandKey {
                        item: item_key,
                        period: period_key,
                    })
                    .ok_or_else(|| ValidationError::MissingDemand {
                        item: item.name.clone(),
                        period: period.name.clone(),
                    })?;

                check_value(ParameterKind::Demand, *quantity, || {
                    format!("item {}, period {}", item.name, period.name)
                })?;
            }
        }

        Ok(())
    }

    fn check_capacity(&self) -> Result<(), ValidationError> {
        for (supplier_key, supplier) in &self.suppliers {
            for (period_key, period) in &self.periods {
                let quantity = self
                    .capacity
                    .get(&CapacityKey {
                        supplier: supplier_key,
                        period: period_key,
                    })
                    .ok_or_else(|| ValidationError::MissingCapacity {
                        supplier: supplier.name.clone(),
                        period: period.name.clone(),
                    })?;

                check_value(ParameterKind::Capacity, *quantity, || {
                    format!("supplier {}, period {}", supplier.name, period.name)
                })?;
            }
        }

        Ok(())
    }

    fn check_unit_costs(
        &self,
        tier_schedules: &SecondaryMap<SupplierKey, TierSchedule>,
    ) -> Result<(), ValidationError> {
        for (item_key, item) in &self.items {
            for (supplier_key, supplier) in &self.suppliers {
                let tiers = tier_schedules.get(supplier_key).map_or(0, TierSchedule::len);

                for (period_key, period) in &self.periods {
                    let sourcing = SourcingKey::new(item_key, supplier_key, period_key);
                    let context = || {
                        format!(
                            "item {}, supplier {}, period {}",
                            item.name, supplier.name, period.name
                        )
                    };

                    let mut previous: Option<f64> = None;

                    for tier in 0..tiers {
                        let cost = *self.unit_costs.get(&sourcing.tier(tier)).ok_or_else(|| {
                            ValidationError::MissingUnitCost {
                                item: item.name.clone(),
                                supplier: supplier.name.clone(),
                                tier,
                                period: period.name.clone(),
                            }
                        })?;

                        check_value(ParameterKind::UnitCost, cost, context)?;

                        if !self.allow_non_monotone
                            && let Some(previous) = previous
                            && cost > previous
                        {
                            return Err(ValidationError::NonMonotoneUnitCost {
                                context: context(),
                                tier,
                            });
                        }

                        previous = Some(cost);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Build a name -> key index, rejecting empty sets and duplicate names.
fn name_index<K: slotmap::Key, V>(
    set: &SlotMap<K, V>,
    kind: SetKind,
    name: impl Fn(&V) -> &String,
) -> Result<FxHashMap<String, K>, ValidationError> {
    if set.is_empty() {
        return Err(ValidationError::EmptySet(kind));
    }

    let mut index = FxHashMap::default();

    for (key, value) in set {
        let name = name(value);

        if index.insert(name.clone(), key).is_some() {
            return Err(ValidationError::DuplicateName {
                set: kind,
                name: name.clone(),
            });
        }
    }

    Ok(index)
}

fn check_value(
    parameter: ParameterKind,
    value: f64,
    context: impl FnOnce() -> String,
) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }

    Err(ValidationError::InvalidValue {
        parameter,
        context: context(),
        value,
    })
}
