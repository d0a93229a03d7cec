//! Scenario Fixture Documents

use serde::Deserialize;

use crate::{model::ModelOptions, parameters::TierBand};

/// Wrapper for a scenario YAML document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    /// Item names, in order
    pub items: Vec<String>,

    /// Period names, in order
    pub periods: Vec<String>,

    /// Suppliers, in order
    pub suppliers: Vec<SupplierFixture>,

    /// Default tier schedule
    pub tiers: Vec<TierBand>,

    /// Demand entries
    pub demand: Vec<DemandFixture>,

    /// Capacity entries
    pub capacity: Vec<CapacityFixture>,

    /// Unit cost entries, one per sourcing decision
    pub unit_costs: Vec<UnitCostFixture>,

    /// Model options
    #[serde(default)]
    pub options: OptionsFixture,
}

/// Supplier entry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupplierFixture {
    /// Supplier name
    pub name: String,

    /// Per-unit risk surcharge
    pub risk_penalty: f64,

    /// Supplier-specific tier schedule
    #[serde(default)]
    pub tiers: Option<Vec<TierBand>>,
}

/// Demand entry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemandFixture {
    /// Item name
    pub item: String,

    /// Period name
    pub period: String,

    /// Units required
    pub quantity: f64,
}

/// Capacity entry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapacityFixture {
    /// Supplier name
    pub supplier: String,

    /// Period name
    pub period: String,

    /// Units available across all items
    pub quantity: f64,
}

/// Unit costs of one sourcing decision, one per tier
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitCostFixture {
    /// Item name
    pub item: String,

    /// Supplier name
    pub supplier: String,

    /// Period name
    pub period: String,

    /// Cost per unit under each tier, in tier order
    pub tiers: Vec<f64>,
}

/// Model options entry
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsFixture {
    /// Price with tiered discounts
    #[serde(default = "enabled")]
    pub tiered_pricing: bool,

    /// Charge the supplier risk surcharge
    #[serde(default = "enabled")]
    pub risk_penalty: bool,
}

impl Default for OptionsFixture {
    fn default() -> Self {
        Self {
            tiered_pricing: true,
            risk_penalty: true,
        }
    }
}

impl From<OptionsFixture> for ModelOptions {
    fn from(options: OptionsFixture) -> Self {
        ModelOptions {
            tiered_pricing: options.tiered_pricing,
            risk_penalty: options.risk_penalty,
        }
    }
}

fn enabled() -> bool {
    true
}
