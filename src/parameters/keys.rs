//! Parameter Keys

use slotmap::new_key_type;

new_key_type! {
    /// Item Key
    pub struct ItemKey;

    /// Supplier Key
    pub struct SupplierKey;

    /// Period Key
    pub struct PeriodKey;
}

/// Key of a demand entry: one item in one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DemandKey {
    /// Item being demanded
    pub item: ItemKey,

    /// Period the demand falls in
    pub period: PeriodKey,
}

/// Key of a capacity entry: one supplier in one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapacityKey {
    /// Supplier offering the capacity
    pub supplier: SupplierKey,

    /// Period the capacity applies to
    pub period: PeriodKey,
}

/// Key of a single sourcing decision: buying one item from one supplier in one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcingKey {
    /// Item being bought
    pub item: ItemKey,

    /// Supplier being bought from
    pub supplier: SupplierKey,

    /// Period of the purchase
    pub period: PeriodKey,
}

impl SourcingKey {
    /// Create a sourcing key.
    pub fn new(item: ItemKey, supplier: SupplierKey, period: PeriodKey) -> Self {
        Self {
            item,
            supplier,
            period,
        }
    }

    /// Cost key for the given tier position of this sourcing decision.
    pub fn tier(self, tier: usize) -> CostKey {
        CostKey {
            item: self.item,
            supplier: self.supplier,
            tier,
            period: self.period,
        }
    }
}

/// Key of a unit cost entry.
///
/// `tier` is the zero-based position of the tier in the supplier's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CostKey {
    /// Item being priced
    pub item: ItemKey,

    /// Supplier quoting the price
    pub supplier: SupplierKey,

    /// Tier position
    pub tier: usize,

    /// Period the price applies to
    pub period: PeriodKey,
}
