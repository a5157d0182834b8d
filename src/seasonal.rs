// 🌦️ Seasonal Variance - monthly series against their own average
//
// The domain is the twelve calendar months in calendar order, never sorted
// by value. Months without sales count as zero; the present-months
// statistics skip them instead.

use crate::aggregate::{AggregateTable, GroupKey, KeyValue};
use crate::calendar::Month;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{self, Measure};
use crate::pivot::PivotTable;
use serde::Serialize;

// ============================================================================
// MONTHLY SERIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MonthlySeries {
    values: [f64; 12],
    #[serde(skip)]
    present: [bool; 12],
}

impl MonthlySeries {
    /// Every month counts as present
    pub fn from_values(values: [f64; 12]) -> Self {
        MonthlySeries {
            values,
            present: [true; 12],
        }
    }

    /// Read one column of a month-keyed aggregate; absent months are zero
    pub fn from_table(table: &AggregateTable, column: &str) -> PipelineResult<Self> {
        if table.key_columns != [GroupKey::Month] {
            return Err(PipelineError::KeyArity {
                operation: "monthly series",
                expected: 1,
                actual: table.key_columns.len(),
            });
        }
        let idx = table.column_index(column)?;

        let mut series = MonthlySeries::default();
        for row in &table.rows {
            if let (Some(KeyValue::Month(month)), Some(v)) = (row.keys.first(), row.values[idx].value()) {
                series.set(*month, v);
            }
        }
        Ok(series)
    }

    /// One row of an entity × month pivot
    pub fn from_pivot_row(pivot: &PivotTable, label: &KeyValue) -> PipelineResult<Self> {
        if pivot.column_key != GroupKey::Month {
            return Err(PipelineError::UnknownColumn {
                table: format!("pivot {} x {}", pivot.row_key.name(), pivot.column_key.name()),
                column: GroupKey::Month.name().to_string(),
            });
        }

        let mut series = MonthlySeries::default();
        if let Some(r) = pivot.row_labels.iter().position(|k| k == label) {
            for (c, column) in pivot.column_labels.iter().enumerate() {
                if let (KeyValue::Month(month), Some(v)) = (column, pivot.cells[r][c].value()) {
                    series.set(*month, v);
                }
            }
        }
        Ok(series)
    }

    fn set(&mut self, month: Month, value: f64) {
        self.values[month.index()] = value;
        self.present[month.index()] = true;
    }

    /// Whether the month appeared in the source table
    pub fn is_present(&self, month: Month) -> bool {
        self.present[month.index()]
    }

    pub fn present_months(&self) -> usize {
        self.present.iter().filter(|p| **p).count()
    }

    /// Mean over the months that appeared; not computable when none did
    pub fn present_mean(&self) -> Measure {
        let total: f64 = self.iter().filter(|(m, _)| self.is_present(*m)).map(|(_, v)| v).sum();
        metrics::ratio(total, self.present_months() as f64)
    }

    /// Lowest month among those that appeared; the earliest month wins ties
    pub fn present_low(&self) -> Option<(Month, f64)> {
        self.iter()
            .filter(|(m, _)| self.is_present(*m))
            .fold(None, |best: Option<(Month, f64)>, (m, v)| match best {
                Some((_, low)) if v >= low => best,
                _ => Some((m, v)),
            })
    }

    pub fn get(&self, month: Month) -> f64 {
        self.values[month.index()]
    }

    pub fn values(&self) -> &[f64; 12] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Month, f64)> + '_ {
        Month::ALL.iter().map(move |m| (*m, self.values[m.index()]))
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.total() / 12.0
    }

    /// Highest month; the earliest month wins ties
    pub fn peak(&self) -> (Month, f64) {
        self.iter()
            .fold((Month::January, self.values[0]), |best, (m, v)| if v > best.1 { (m, v) } else { best })
    }

    /// Lowest month; the earliest month wins ties
    pub fn low(&self) -> (Month, f64) {
        self.iter()
            .fold((Month::January, self.values[0]), |best, (m, v)| if v < best.1 { (m, v) } else { best })
    }
}

// ============================================================================
// SEASONAL PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthVariance {
    pub month: Month,
    pub value: f64,
    /// Month as a percentage of the yearly mean (100 = average)
    pub percent_of_mean: Measure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalProfile {
    pub months: Vec<MonthVariance>,
    pub mean: f64,
    pub peak_month: Month,
    pub peak_value: f64,
    pub low_month: Month,
    pub low_value: f64,
    /// `(peak - low) / low * 100`; not computable when low is zero
    pub spread_percent: Measure,
    /// Months with sales; the two fields below ignore the others
    pub present_months: usize,
    pub present_mean: Measure,
    pub present_spread_percent: Measure,
}

pub fn seasonal_profile(series: &MonthlySeries) -> SeasonalProfile {
    let mean = series.mean();
    let (peak_month, peak_value) = series.peak();
    let (low_month, low_value) = series.low();
    let present_spread_percent = match series.present_low() {
        Some((_, low)) => metrics::percent(peak_value - low, low),
        None => Measure::NotComputable,
    };

    let months = series
        .iter()
        .map(|(month, value)| MonthVariance {
            month,
            value,
            percent_of_mean: metrics::percent(value, mean),
        })
        .collect();

    SeasonalProfile {
        months,
        mean,
        peak_month,
        peak_value,
        low_month,
        low_value,
        spread_percent: metrics::percent(peak_value - low_value, low_value),
        present_months: series.present_months(),
        present_mean: series.present_mean(),
        present_spread_percent,
    }
}

// ============================================================================
// CROSS-ENTITY COMPARISON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySeasonality {
    pub label: KeyValue,
    pub peak_month: Month,
    pub low_month: Month,
    pub spread_percent: Measure,
}

/// Seasonality of several entities (e.g. the top products) side by side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalComparison {
    pub entities: Vec<EntitySeasonality>,
}

impl SeasonalComparison {
    pub fn from_series(series: &[(KeyValue, MonthlySeries)]) -> Self {
        let entities = series
            .iter()
            .map(|(label, s)| {
                let profile = seasonal_profile(s);
                EntitySeasonality {
                    label: label.clone(),
                    peak_month: profile.peak_month,
                    low_month: profile.low_month,
                    spread_percent: profile.spread_percent,
                }
            })
            .collect();

        SeasonalComparison { entities }
    }

    /// How many entities peak in each month, most common first (calendar order on ties)
    pub fn peak_month_distribution(&self) -> Vec<(Month, usize)> {
        let mut counts = [0usize; 12];
        for entity in &self.entities {
            counts[entity.peak_month.index()] += 1;
        }

        let mut distribution: Vec<(Month, usize)> = Month::ALL
            .iter()
            .map(|m| (*m, counts[m.index()]))
            .filter(|(_, c)| *c > 0)
            .collect();
        distribution.sort_by(|a, b| b.1.cmp(&a.1));
        distribution
    }

    /// True when every entity peaks in the same month
    pub fn has_uniform_peak(&self) -> bool {
        self.peak_month_distribution().len() <= 1
    }
}
