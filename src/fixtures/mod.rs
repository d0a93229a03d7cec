//! Fixtures

use std::{fs, path::Path};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::{
    model::ModelOptions,
    parameters::{
        CapacityKey, DemandKey, ItemKey, ParameterKind, ParameterSet, ParameterSetBuilder,
        PeriodKey, SourcingKey, SupplierKey, TierSchedule, ValidationError,
    },
};

pub mod scenario;

use scenario::ScenarioDocument;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// Supplier not found
    #[error("Supplier not found: {0}")]
    SupplierNotFound(String),

    /// Period not found
    #[error("Period not found: {0}")]
    PeriodNotFound(String),

    /// Two rows of one table address the same entry
    #[error("Duplicate {table} entry for {key}")]
    DuplicateEntry {
        /// Table holding the duplicate rows
        table: ParameterKind,
        /// Names identifying the entry
        key: String,
    },

    /// Parameters failed validation
    #[error("Invalid scenario parameters: {0}")]
    Validation(#[from] ValidationError),
}

/// Scenario loaded from YAML
#[derive(Debug)]
pub struct ScenarioFixture {
    document: ScenarioDocument,
}

impl ScenarioFixture {
    /// Load a bundled scenario from `./fixtures/scenarios/{name}.yml`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::from_path(
            Path::new("./fixtures")
                .join("scenarios")
                .join(format!("{name}.yml")),
        )
    }

    /// Load a scenario from any YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Parse a scenario from a YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or contains unknown fields.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let document: ScenarioDocument = serde_norway::from_str(contents)?;

        Ok(Self { document })
    }

    /// Model options declared by the scenario
    pub fn model_options(&self) -> ModelOptions {
        self.document.options.into()
    }

    /// Build the validated parameter set
    ///
    /// # Errors
    ///
    /// Returns an error if an entry references an unknown name, or the parameters
    /// fail validation.
    pub fn parameters(&self) -> Result<ParameterSet, FixtureError> {
        let doc = &self.document;
        let mut builder = ParameterSet::builder();

        let items: FxHashMap<&str, ItemKey> = doc
            .items
            .iter()
            .map(|name| (name.as_str(), builder.add_item(name.as_str())))
            .collect();

        let periods: FxHashMap<&str, PeriodKey> = doc
            .periods
            .iter()
            .map(|name| (name.as_str(), builder.add_period(name.as_str())))
            .collect();

        let mut suppliers: FxHashMap<&str, SupplierKey> = FxHashMap::default();

        for supplier in &doc.suppliers {
            let key = builder.add_supplier(supplier.name.as_str(), supplier.risk_penalty);

            if let Some(tiers) = &supplier.tiers {
                builder.supplier_tiers(key, TierSchedule::new(tiers.iter().copied()));
            }

            suppliers.insert(supplier.name.as_str(), key);
        }

        builder.tiers(TierSchedule::new(doc.tiers.iter().copied()));

        let lookup = Lookup {
            items: &items,
            suppliers: &suppliers,
            periods: &periods,
        };

        load_tables(doc, &lookup, &mut builder)?;

        Ok(builder.build()?)
    }
}

struct Lookup<'a> {
    items: &'a FxHashMap<&'a str, ItemKey>,
    suppliers: &'a FxHashMap<&'a str, SupplierKey>,
    periods: &'a FxHashMap<&'a str, PeriodKey>,
}

impl Lookup<'_> {
    fn item(&self, name: &str) -> Result<ItemKey, FixtureError> {
        self.items
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::ItemNotFound(name.to_string()))
    }

    fn supplier(&self, name: &str) -> Result<SupplierKey, FixtureError> {
        self.suppliers
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::SupplierNotFound(name.to_string()))
    }

    fn period(&self, name: &str) -> Result<PeriodKey, FixtureError> {
        self.periods
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::PeriodNotFound(name.to_string()))
    }
}

fn load_tables(
    doc: &ScenarioDocument,
    lookup: &Lookup<'_>,
    builder: &mut ParameterSetBuilder,
) -> Result<(), FixtureError> {
    let mut demand = FxHashSet::default();

    for entry in &doc.demand {
        let item = lookup.item(&entry.item)?;
        let period = lookup.period(&entry.period)?;

        if !demand.insert(DemandKey { item, period }) {
            return Err(FixtureError::DuplicateEntry {
                table: ParameterKind::Demand,
                key: format!("item {}, period {}", entry.item, entry.period),
            });
        }

        builder.demand(item, period, entry.quantity);
    }

    let mut capacity = FxHashSet::default();

    for entry in &doc.capacity {
        let supplier = lookup.supplier(&entry.supplier)?;
        let period = lookup.period(&entry.period)?;

        if !capacity.insert(CapacityKey { supplier, period }) {
            return Err(FixtureError::DuplicateEntry {
                table: ParameterKind::Capacity,
                key: format!("supplier {}, period {}", entry.supplier, entry.period),
            });
        }

        builder.capacity(supplier, period, entry.quantity);
    }

    let mut unit_costs = FxHashSet::default();

    for entry in &doc.unit_costs {
        let item = lookup.item(&entry.item)?;
        let supplier = lookup.supplier(&entry.supplier)?;
        let period = lookup.period(&entry.period)?;

        if !unit_costs.insert(SourcingKey::new(item, supplier, period)) {
            return Err(FixtureError::DuplicateEntry {
                table: ParameterKind::UnitCost,
                key: format!(
                    "item {}, supplier {}, period {}",
                    entry.item, entry.supplier, entry.period
                ),
            });
        }

        builder.unit_costs(item, supplier, period, &entry.tiers);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::parameters::SetKind;

    use super::*;

    const MINIMAL: &str = r"
items: [P1]
periods: [Q1]
suppliers:
  - { name: S1, risk_penalty: 0.5 }
tiers:
  - { lower: 0, upper: 100 }
demand:
  - { item: P1, period: Q1, quantity: 10 }
capacity:
  - { supplier: S1, period: Q1, quantity: 20 }
unit_costs:
  - { item: P1, supplier: S1, period: Q1, tiers: [4.0] }
";

    #[test]
    fn minimal_scenario_builds_parameters() -> TestResult {
        let fixture = ScenarioFixture::from_yaml(MINIMAL)?;
        let params = fixture.parameters()?;

        let item = params.item_key("P1").ok_or("missing P1")?;
        let period = params.period_key("Q1").ok_or("missing Q1")?;

        assert_eq!(params.sourcing_count(), 1);
        assert!(params.demand(item, period).is_some_and(|d| (d - 10.0).abs() < 1e-9));
        assert_eq!(fixture.model_options(), ModelOptions::default());

        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = MINIMAL.replace("risk_penalty: 0.5", "risk_penalty: 0.5, rating: 3");

        assert!(
            matches!(ScenarioFixture::from_yaml(&yaml), Err(FixtureError::Yaml(_))),
            "unknown field must fail to parse"
        );
    }

    #[test]
    fn unknown_names_are_reported() -> TestResult {
        let yaml = MINIMAL.replace("{ supplier: S1, period: Q1, quantity: 20 }", "{ supplier: S9, period: Q1, quantity: 20 }");
        let fixture = ScenarioFixture::from_yaml(&yaml)?;

        assert!(
            matches!(fixture.parameters(), Err(FixtureError::SupplierNotFound(name)) if name == "S9"),
            "expected unknown supplier"
        );

        Ok(())
    }

    #[test]
    fn repeated_demand_rows_are_rejected() -> TestResult {
        let yaml = MINIMAL.replace(
            "  - { item: P1, period: Q1, quantity: 10 }\n",
            "  - { item: P1, period: Q1, quantity: 10 }\n  - { item: P1, period: Q1, quantity: 90 }\n",
        );
        let fixture = ScenarioFixture::from_yaml(&yaml)?;

        assert!(
            matches!(
                fixture.parameters(),
                Err(FixtureError::DuplicateEntry {
                    table: ParameterKind::Demand,
                    ref key,
                }) if key == "item P1, period Q1"
            ),
            "second demand row must not replace the first"
        );

        Ok(())
    }

    #[test]
    fn repeated_capacity_and_cost_rows_are_rejected() -> TestResult {
        let yaml = MINIMAL.replace(
            "  - { supplier: S1, period: Q1, quantity: 20 }\n",
            "  - { supplier: S1, period: Q1, quantity: 20 }\n  - { supplier: S1, period: Q1, quantity: 5 }\n",
        );

        assert!(matches!(
            ScenarioFixture::from_yaml(&yaml)?.parameters(),
            Err(FixtureError::DuplicateEntry {
                table: ParameterKind::Capacity,
                ..
            })
        ));

        let yaml = MINIMAL.replace(
            "  - { item: P1, supplier: S1, period: Q1, tiers: [4.0] }\n",
            "  - { item: P1, supplier: S1, period: Q1, tiers: [4.0] }\n  - { item: P1, supplier: S1, period: Q1, tiers: [2.0] }\n",
        );

        assert!(matches!(
            ScenarioFixture::from_yaml(&yaml)?.parameters(),
            Err(FixtureError::DuplicateEntry {
                table: ParameterKind::UnitCost,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn validation_errors_are_wrapped() -> TestResult {
        let yaml = MINIMAL.replace("tiers:\n  - { lower: 0, upper: 100 }\n", "tiers: []\n");
        let fixture = ScenarioFixture::from_yaml(&yaml)?;

        assert!(
            matches!(
                fixture.parameters(),
                Err(FixtureError::Validation(ValidationError::EmptySet(SetKind::Tiers)))
            ),
            "expected empty tier set"
        );

        Ok(())
    }

    #[test]
    fn supplier_tier_override_is_applied() -> TestResult {
        let yaml = MINIMAL.replace(
            "{ name: S1, risk_penalty: 0.5 }",
            "{ name: S1, risk_penalty: 0.5, tiers: [{ lower: 0, upper: 10 }, { lower: 10, upper: 60 }] }",
        );
        let yaml = yaml.replace("tiers: [4.0]", "tiers: [4.0, 3.5]");

        let params = ScenarioFixture::from_yaml(&yaml)?.parameters()?;
        let supplier = params.supplier_key("S1").ok_or("missing S1")?;

        assert_eq!(params.tier_schedule(supplier).map(TierSchedule::len), Some(2));

        Ok(())
    }

    #[test]
    fn options_override_defaults() -> TestResult {
        let yaml = format!("{MINIMAL}options:\n  risk_penalty: false\n");
        let fixture = ScenarioFixture::from_yaml(&yaml)?;

        assert_eq!(
            fixture.model_options(),
            ModelOptions {
                tiered_pricing: true,
                risk_penalty: false,
            }
        );

        Ok(())
    }
}
