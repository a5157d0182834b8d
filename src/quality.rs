// ✅ Data Quality Engine - missing-value and key audit of the input tables
//
// Runs on the typed source tables before the join. Nothing here stops the
// pipeline; issues are reported next to the results.

use crate::schema::SourceTables;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Rows cannot be attributed (blank keys, empty fact table)
    Warning,  // Results for some groups will be Unknown or not computable
    Info,     // Worth a look, no effect on results
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub table: String,
    pub field: String,
    pub issue: String,
    pub recommendation: String,
}

// ============================================================================
// PER-TABLE AUDIT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableQuality {
    pub table: String,
    pub row_count: usize,
    /// Blank values per column; columns without blanks are absent
    pub missing_by_column: BTreeMap<String, usize>,
    /// Natural keys that appear more than once, in first-repeat order
    pub duplicate_keys: Vec<String>,
}

impl TableQuality {
    fn new(table: &str, row_count: usize) -> Self {
        TableQuality {
            table: table.to_string(),
            row_count,
            missing_by_column: BTreeMap::new(),
            duplicate_keys: Vec::new(),
        }
    }

    fn check_blank(&mut self, column: &str, value: &str) {
        if value.trim().is_empty() {
            *self.missing_by_column.entry(column.to_string()).or_insert(0) += 1;
        }
    }

    fn check_unique<K: Eq + Hash + Display>(&mut self, keys: impl Iterator<Item = K>) {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for key in keys {
            let label = key.to_string();
            if !seen.insert(key) && reported.insert(label.clone()) {
                self.duplicate_keys.push(label);
            }
        }
    }

    pub fn missing_total(&self) -> usize {
        self.missing_by_column.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.missing_by_column.is_empty() && self.duplicate_keys.is_empty()
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub tables: Vec<TableQuality>,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn summary(&self) -> String {
        let rows: usize = self.tables.iter().map(|t| t.row_count).sum();
        let missing: usize = self.tables.iter().map(|t| t.missing_total()).sum();
        format!(
            "Tables: {}, Rows: {}, Missing values: {}, Issues: {} ({} critical)",
            self.tables.len(),
            rows,
            missing,
            self.issues.len(),
            self.count(Severity::Critical)
        )
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.count(Severity::Critical) > 0
    }

    pub fn table(&self, name: &str) -> Option<&TableQuality> {
        self.tables.iter().find(|t| t.table == name)
    }
}

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine {
    /// Columns whose blanks leave a row unattributable
    key_columns: Vec<&'static str>,
}

impl Default for DataQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DataQualityEngine {
    pub fn new() -> Self {
        DataQualityEngine {
            key_columns: vec!["OrderNumber", "state", "State"],
        }
    }

    pub fn audit(&self, sources: &SourceTables) -> QualityReport {
        let mut issues = Vec::new();

        // Transactions
        let mut transactions = TableQuality::new("transactions", sources.transactions.len());
        let mut negative_totals = 0;
        for tx in &sources.transactions {
            transactions.check_blank("OrderNumber", &tx.order_number);
            transactions.check_blank("Channel", &tx.channel);
            if tx.line_total < 0.0 {
                negative_totals += 1;
            }
        }
        if sources.transactions.is_empty() {
            issues.push(issue(
                Severity::Critical,
                "transactions",
                "*",
                "Fact table is empty".to_string(),
                "Check the transactions file; every report will be empty",
            ));
        }
        if negative_totals > 0 {
            issues.push(issue(
                Severity::Info,
                "transactions",
                "LineTotal",
                format!("{} rows with a negative line total", negative_totals),
                "Confirm returns are meant to reduce revenue",
            ));
        }

        // Regions
        let mut regions = TableQuality::new("regions", sources.regions.len());
        for r in &sources.regions {
            regions.check_blank("state", &r.state);
        }
        regions.check_unique(sources.regions.iter().map(|r| r.id));

        // State regions
        let mut state_regions = TableQuality::new("state_regions", sources.state_regions.len());
        for sr in &sources.state_regions {
            state_regions.check_blank("State", &sr.state);
            state_regions.check_blank("Region", &sr.region);
            if sr.households == 0 {
                issues.push(issue(
                    Severity::Warning,
                    "state_regions",
                    "households",
                    format!("State '{}' has zero households", sr.state),
                    "Per-household metrics for its region may be not computable",
                ));
            }
        }
        state_regions.check_unique(sources.state_regions.iter().map(|sr| sr.state.as_str()));

        // Products
        let mut products = TableQuality::new("products", sources.products.len());
        for p in &sources.products {
            products.check_blank("productName", &p.product_name);
        }
        products.check_unique(sources.products.iter().map(|p| p.id));

        let tables = vec![transactions, regions, state_regions, products];
        for table in &tables {
            for (column, count) in &table.missing_by_column {
                let severity = if self.key_columns.contains(&column.as_str()) {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                issues.push(issue(
                    severity,
                    &table.table,
                    column,
                    format!("{} blank values", count),
                    "Fill the column or expect an Unknown group in the reports",
                ));
            }
            if !table.duplicate_keys.is_empty() {
                issues.push(issue(
                    Severity::Warning,
                    &table.table,
                    "key",
                    format!("Duplicate keys: {}", table.duplicate_keys.join(", ")),
                    "Only the first row per key is used by the join",
                ));
            }
        }

        let report = QualityReport { tables, issues };
        if report.has_critical_issues() {
            log::warn!("data quality: {}", report.summary());
        } else {
            log::info!("data quality: {}", report.summary());
        }
        report
    }
}

fn issue(severity: Severity, table: &str, field: &str, issue: String, recommendation: &str) -> QualityIssue {
    QualityIssue {
        severity,
        table: table.to_string(),
        field: field.to_string(),
        issue,
        recommendation: recommendation.to_string(),
    }
}
