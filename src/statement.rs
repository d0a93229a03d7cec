//! Purchase Statement
//!
//! Renders a [`PurchasePlan`] as console tables.

use std::io;

use humanize_duration::{Truncate, prelude::DurationExt};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{parameters::ParameterSet, plan::PurchasePlan};

/// Quantities at or below this are left out of the statement
const DISPLAY_EPSILON: f64 = 1e-9;

/// Errors that can occur when writing a statement.
#[derive(Debug, Error)]
pub enum StatementError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Write `plan` to `out`: one row per non-zero purchase, per-supplier totals and the
/// cost summary. Non-optimal plans only report their status.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn write_plan(
    mut out: impl io::Write,
    plan: &PurchasePlan,
    params: &ParameterSet,
) -> Result<(), StatementError> {
    writeln!(out, "\nStatus: {}", plan.status())?;

    if !plan.is_optimal() {
        return Ok(());
    }

    write_purchase_table(&mut out, plan, params)?;
    write_supplier_table(&mut out, plan, params)?;
    write_summary(&mut out, plan)?;

    for issue in plan.reconciliation_issues() {
        writeln!(out, "  warning: {issue}")?;
    }

    Ok(())
}

fn write_purchase_table(
    out: &mut impl io::Write,
    plan: &PurchasePlan,
    params: &ParameterSet,
) -> Result<(), StatementError> {
    let mut builder = Builder::default();

    builder.push_record([
        "Item",
        "Supplier",
        "Period",
        "Tier",
        "Quantity",
        "Unit cost",
        "Purchase",
        "Risk",
    ]);

    for record in plan.records() {
        if record.quantity <= DISPLAY_EPSILON {
            continue;
        }

        let key = record.key;

        builder.push_record([
            params
                .item(key.item)
                .map_or("<unknown>", |i| i.name.as_str())
                .to_string(),
            params
                .supplier(key.supplier)
                .map_or("<unknown>", |s| s.name.as_str())
                .to_string(),
            params
                .period(key.period)
                .map_or("<unknown>", |p| p.name.as_str())
                .to_string(),
            record
                .tier
                .map_or_else(|| "-".to_string(), |t| (t.tier + 1).to_string()),
            format!("{:.2}", record.quantity),
            record
                .unit_cost
                .map_or_else(String::new, |c| format!("{c:.2}")),
            format!("{:.2}", record.purchase_cost),
            format!("{:.2}", record.risk_cost),
        ]);
    }

    write_table(out, builder, 3..8)
}

fn write_supplier_table(
    out: &mut impl io::Write,
    plan: &PurchasePlan,
    params: &ParameterSet,
) -> Result<(), StatementError> {
    let mut builder = Builder::default();

    builder.push_record(["Supplier", "Units", "Purchase", "Risk"]);

    for summary in plan.supplier_summaries() {
        builder.push_record([
            params
                .supplier(summary.supplier)
                .map_or("<unknown>", |s| s.name.as_str())
                .to_string(),
            format!("{:.2}", summary.units),
            format!("{:.2}", summary.purchase_cost),
            format!("{:.2}", summary.risk_cost),
        ]);
    }

    write_table(out, builder, 1..4)
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    numeric: std::ops::Range<usize>,
) -> Result<(), StatementError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(
        1,
        HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
    );

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(numeric), Alignment::right());

    writeln!(out, "\n{table}")?;

    Ok(())
}

fn write_summary(out: &mut impl io::Write, plan: &PurchasePlan) -> Result<(), StatementError> {
    let lines = [
        ("Purchase cost:", format!("{:.2}", plan.purchase_cost())),
        ("Risk cost:", format!("{:.2}", plan.risk_cost())),
        ("Total cost:", format!("{:.2}", plan.total_cost())),
        (
            "Objective:",
            plan.objective_value()
                .map_or_else(|| "-".to_string(), |v| format!("{v:.2}")),
        ),
        (
            "Solve time:",
            format!("{}", plan.elapsed().human(Truncate::Micro)),
        ),
    ];

    let label_width = lines.iter().map(|(l, _)| l.len()).max().unwrap_or_default();
    let value_width = lines.iter().map(|(_, v)| v.len()).max().unwrap_or_default();

    for (label, value) in &lines {
        writeln!(out, " {label:>label_width$}  {value:>value_width$}")?;
    }

    writeln!(out)?;

    Ok(())
}
