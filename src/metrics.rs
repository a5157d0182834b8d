// 💰 Metric Deriver - profit per row, zero-safe ratios per group
//
// Every ratio in the system goes through `ratio`/`percent`. A zero, missing,
// or non-finite denominator yields Measure::NotComputable, never NaN or inf.

use crate::schema::{DerivedTransaction, EnrichedTransaction};
use serde::{Serialize, Serializer};
use std::fmt;

// ============================================================================
// MEASURE
// ============================================================================

/// A numeric result cell.
///
/// `NotComputable` is the explicit sentinel for undefined ratios. It is
/// distinct from zero and serializes as the string `"not_computable"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Value(f64),
    NotComputable,
}

impl Measure {
    pub fn value(self) -> Option<f64> {
        match self {
            Measure::Value(v) => Some(v),
            Measure::NotComputable => None,
        }
    }

    pub fn is_computable(self) -> bool {
        matches!(self, Measure::Value(_))
    }

    /// Divide two measures; either side non-computable propagates
    pub fn ratio(self, denominator: Measure) -> Measure {
        match (self, denominator) {
            (Measure::Value(n), Measure::Value(d)) => ratio(n, d),
            _ => Measure::NotComputable,
        }
    }

    /// Multiply two measures; either side non-computable propagates
    pub fn times(self, other: Measure) -> Measure {
        match (self, other) {
            (Measure::Value(a), Measure::Value(b)) => Measure::from_f64(a * b),
            _ => Measure::NotComputable,
        }
    }

    pub fn scale(self, factor: f64) -> Measure {
        match self {
            Measure::Value(v) => Measure::from_f64(v * factor),
            Measure::NotComputable => Measure::NotComputable,
        }
    }

    /// Wrap a raw float, mapping NaN/inf to the sentinel
    pub fn from_f64(value: f64) -> Measure {
        if value.is_finite() {
            Measure::Value(value)
        } else {
            Measure::NotComputable
        }
    }
}

impl From<f64> for Measure {
    fn from(value: f64) -> Self {
        Measure::from_f64(value)
    }
}

impl Serialize for Measure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Measure::Value(v) => serializer.serialize_f64(*v),
            Measure::NotComputable => serializer.serialize_str("not_computable"),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Value(v) => write!(f, "{:.2}", v),
            Measure::NotComputable => f.write_str("n/a"),
        }
    }
}

// ============================================================================
// PER-ROW METRICS
// ============================================================================

/// Profit of one line: revenue minus total unit cost
pub fn profit(revenue: f64, total_unit_cost: f64) -> f64 {
    revenue - total_unit_cost
}

/// Attach calendar fields and profit to every fact row.
/// Row count and order are preserved.
pub fn derive_transactions(enriched: Vec<EnrichedTransaction>) -> Vec<DerivedTransaction> {
    let derived: Vec<DerivedTransaction> = enriched
        .into_iter()
        .map(DerivedTransaction::from_enriched)
        .collect();

    log::debug!("derived metrics for {} fact rows", derived.len());
    derived
}

// ============================================================================
// GROUP RATIOS
// ============================================================================

pub fn ratio(numerator: f64, denominator: f64) -> Measure {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return Measure::NotComputable;
    }
    Measure::from_f64(numerator / denominator)
}

/// `numerator / denominator * 100`
pub fn percent(numerator: f64, denominator: f64) -> Measure {
    ratio(numerator, denominator).scale(100.0)
}

/// Group total normalized by the group's household count
pub fn per_household(total: f64, households: Option<f64>) -> Measure {
    match households {
        Some(h) => ratio(total, h),
        None => Measure::NotComputable,
    }
}

/// `mean_profit / mean_revenue * 100`
pub fn profit_margin_percent(mean_profit: f64, mean_revenue: f64) -> Measure {
    percent(mean_profit, mean_revenue)
}
