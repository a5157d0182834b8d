// 📦 Output Assembler - named results for the presentation layer
//
// Pure packaging: tables arrive already computed. A report that failed is
// kept as Failed next to the ones that succeeded.

use crate::aggregate::AggregateTable;
use crate::correlation::CorrelationMatrix;
use crate::error::PipelineResult;
use crate::metrics::Measure;
use crate::pivot::PivotTable;
use crate::seasonal::{SeasonalComparison, SeasonalProfile};
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// REPORT TABLES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportTable {
    Grouped(AggregateTable),
    Pivot(PivotTable),
    Seasonal(SeasonalProfile),
    SeasonalComparison(SeasonalComparison),
    Correlation(CorrelationMatrix),
}

/// One cell in long form, the shape persisted by the result store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCell {
    pub row_label: String,
    pub column: String,
    pub value: Measure,
}

impl ReportCell {
    fn new(row_label: impl Into<String>, column: impl Into<String>, value: Measure) -> Self {
        ReportCell {
            row_label: row_label.into(),
            column: column.into(),
            value,
        }
    }
}

impl ReportTable {
    pub fn kind(&self) -> &'static str {
        match self {
            ReportTable::Grouped(_) => "grouped",
            ReportTable::Pivot(_) => "pivot",
            ReportTable::Seasonal(_) => "seasonal",
            ReportTable::SeasonalComparison(_) => "seasonal_comparison",
            ReportTable::Correlation(_) => "correlation",
        }
    }

    /// Flatten to `(row label, column, value)` cells in display order
    pub fn cells(&self) -> Vec<ReportCell> {
        let mut cells = Vec::new();

        match self {
            ReportTable::Grouped(table) => {
                for row in &table.rows {
                    let label = row.label();
                    for (column, value) in table.columns.iter().zip(&row.values) {
                        cells.push(ReportCell::new(label.clone(), column.clone(), *value));
                    }
                }
            }
            ReportTable::Pivot(table) => {
                for (r, row_label) in table.row_labels.iter().enumerate() {
                    for (c, column_label) in table.column_labels.iter().enumerate() {
                        cells.push(ReportCell::new(
                            row_label.to_string(),
                            column_label.to_string(),
                            table.cells[r][c],
                        ));
                    }
                }
            }
            ReportTable::Seasonal(profile) => {
                for month in &profile.months {
                    cells.push(ReportCell::new(month.month.name(), "value", Measure::Value(month.value)));
                    cells.push(ReportCell::new(month.month.name(), "percent_of_mean", month.percent_of_mean));
                }
                cells.push(ReportCell::new("summary", "mean", Measure::Value(profile.mean)));
                cells.push(ReportCell::new("summary", "peak_value", Measure::Value(profile.peak_value)));
                cells.push(ReportCell::new("summary", "low_value", Measure::Value(profile.low_value)));
                cells.push(ReportCell::new("summary", "spread_percent", profile.spread_percent));
                cells.push(ReportCell::new("summary", "present_mean", profile.present_mean));
                cells.push(ReportCell::new("summary", "present_spread_percent", profile.present_spread_percent));
            }
            ReportTable::SeasonalComparison(comparison) => {
                for entity in &comparison.entities {
                    let label = entity.label.to_string();
                    cells.push(ReportCell::new(label.clone(), "spread_percent", entity.spread_percent));
                    cells.push(ReportCell::new(
                        label.clone(),
                        "peak_month",
                        Measure::Value(entity.peak_month.number() as f64),
                    ));
                    cells.push(ReportCell::new(
                        label,
                        "low_month",
                        Measure::Value(entity.low_month.number() as f64),
                    ));
                }
            }
            ReportTable::Correlation(matrix) => {
                for (i, a) in matrix.labels.iter().enumerate() {
                    for (j, b) in matrix.labels.iter().enumerate() {
                        cells.push(ReportCell::new(a.to_string(), b.to_string(), matrix.cells[i][j]));
                    }
                }
            }
        }

        cells
    }
}

// ============================================================================
// RESULT BUNDLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Ready { table: ReportTable },
    Failed { error: String },
}

impl ReportOutcome {
    pub fn table(&self) -> Option<&ReportTable> {
        match self {
            ReportOutcome::Ready { table } => Some(table),
            ReportOutcome::Failed { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReportOutcome::Ready { .. })
    }
}

/// Result name → outcome, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultBundle {
    reports: BTreeMap<String, ReportOutcome>,
}

impl ResultBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one report; an error is kept as Failed and logged
    pub fn insert(&mut self, name: &str, result: PipelineResult<ReportTable>) {
        let outcome = match result {
            Ok(table) => ReportOutcome::Ready { table },
            Err(e) => {
                log::warn!("report '{}' failed: {}", name, e);
                ReportOutcome::Failed { error: e.to_string() }
            }
        };
        self.reports.insert(name.to_string(), outcome);
    }

    pub fn get(&self, name: &str) -> Option<&ReportOutcome> {
        self.reports.get(name)
    }

    pub fn table(&self, name: &str) -> Option<&ReportTable> {
        self.get(name).and_then(|o| o.table())
    }

    pub fn grouped(&self, name: &str) -> Option<&AggregateTable> {
        match self.table(name)? {
            ReportTable::Grouped(t) => Some(t),
            _ => None,
        }
    }

    pub fn pivot(&self, name: &str) -> Option<&PivotTable> {
        match self.table(name)? {
            ReportTable::Pivot(t) => Some(t),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReportOutcome)> {
        self.reports.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.reports.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// `(name, error)` of every failed report
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.reports
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                ReportOutcome::Failed { error } => Some((name.as_str(), error.as_str())),
                ReportOutcome::Ready { .. } => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
