// 🔄 Pivot - reshape a two-key aggregate into a 2-D table
//
// Missing combinations are zero: absence of sales is a count of zero, not
// missing data. Row and column labels follow KeyValue ordering (months and
// quarters in calendar order, Unknown last).

use crate::aggregate::{AggregateRow, AggregateTable, GroupKey, KeyValue};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{self, Measure};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    pub row_key: GroupKey,
    pub column_key: GroupKey,
    pub metric: String,
    pub row_labels: Vec<KeyValue>,
    pub column_labels: Vec<KeyValue>,
    /// `cells[row][column]`
    pub cells: Vec<Vec<Measure>>,
}

/// Pivot one metric of a two-key aggregate: first key → rows, second → columns
pub fn pivot(table: &AggregateTable, metric: &str) -> PipelineResult<PivotTable> {
    if table.key_columns.len() != 2 {
        return Err(PipelineError::KeyArity {
            operation: "pivot",
            expected: 2,
            actual: table.key_columns.len(),
        });
    }
    let idx = table.column_index(metric)?;

    let row_labels: Vec<KeyValue> = table
        .rows
        .iter()
        .map(|r| r.keys[0].clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let column_labels: Vec<KeyValue> = table
        .rows
        .iter()
        .map(|r| r.keys[1].clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let row_pos: HashMap<&KeyValue, usize> =
        row_labels.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let col_pos: HashMap<&KeyValue, usize> =
        column_labels.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let mut cells = vec![vec![Measure::Value(0.0); column_labels.len()]; row_labels.len()];
    for row in &table.rows {
        let (Some(&r), Some(&c)) = (row_pos.get(&row.keys[0]), col_pos.get(&row.keys[1])) else {
            continue;
        };
        cells[r][c] = row.values[idx];
    }

    Ok(PivotTable {
        row_key: table.key_columns[0],
        column_key: table.key_columns[1],
        metric: metric.to_string(),
        row_labels,
        column_labels,
        cells,
    })
}

impl PivotTable {
    pub fn cell(&self, row: &KeyValue, column: &KeyValue) -> Option<Measure> {
        let r = self.row_labels.iter().position(|k| k == row)?;
        let c = self.column_labels.iter().position(|k| k == column)?;
        Some(self.cells[r][c])
    }

    /// Sum of the computable cells in one row
    pub fn row_total(&self, row: usize) -> f64 {
        self.cells[row].iter().filter_map(|m| m.value()).sum()
    }

    /// Each cell as a percentage of its row total.
    /// A zero row total gives a row of zeros.
    pub fn percent_of_row(&self) -> PivotTable {
        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let total = self.row_total(r);
                row.iter()
                    .map(|cell| match cell {
                        Measure::Value(_) if total == 0.0 => Measure::Value(0.0),
                        Measure::Value(v) => metrics::percent(*v, total),
                        Measure::NotComputable => Measure::NotComputable,
                    })
                    .collect()
            })
            .collect();

        PivotTable {
            row_key: self.row_key,
            column_key: self.column_key,
            metric: format!("{}_pct_of_row", self.metric),
            row_labels: self.row_labels.clone(),
            column_labels: self.column_labels.clone(),
            cells,
        }
    }

    /// Keep only the given row labels, in the given order.
    /// Labels without a row become rows of zeros.
    pub fn restrict_rows(&self, labels: &[KeyValue]) -> PivotTable {
        let cells = labels
            .iter()
            .map(|label| match self.row_labels.iter().position(|k| k == label) {
                Some(r) => self.cells[r].clone(),
                None => vec![Measure::Value(0.0); self.column_labels.len()],
            })
            .collect();

        PivotTable {
            row_key: self.row_key,
            column_key: self.column_key,
            metric: self.metric.clone(),
            row_labels: labels.to_vec(),
            column_labels: self.column_labels.clone(),
            cells,
        }
    }

    /// Back to long form: one row per (row label, column label), zero cells included
    pub fn unpivot(&self) -> AggregateTable {
        let mut rows = Vec::with_capacity(self.row_labels.len() * self.column_labels.len());
        for (r, row_label) in self.row_labels.iter().enumerate() {
            for (c, column_label) in self.column_labels.iter().enumerate() {
                rows.push(AggregateRow {
                    keys: vec![row_label.clone(), column_label.clone()],
                    values: vec![self.cells[r][c]],
                });
            }
        }

        AggregateTable {
            key_columns: vec![self.row_key, self.column_key],
            columns: vec![self.metric.clone()],
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::row;
    use crate::aggregate::{aggregate, AggregateSpec, Field};
    use crate::calendar::Month;

    fn region_channel() -> AggregateTable {
        let rows = vec![
            row("SO-1", "2018-01-05", "Wholesale", Some("West"), None, 600.0, 400.0, None),
            row("SO-2", "2018-01-06", "Export", Some("West"), None, 200.0, 100.0, None),
            row("SO-3", "2018-02-01", "Wholesale", Some("South"), None, 300.0, 100.0, None),
            row("SO-4", "2018-02-02", "Wholesale", Some("West"), None, 200.0, 100.0, None),
        ];
        aggregate(
            &rows,
            &AggregateSpec::group_by(&[GroupKey::Region, GroupKey::Channel]).sum(Field::Revenue, "revenue"),
        )
    }

    #[test]
    fn test_pivot_zero_fills_missing_combinations() {
        let table = pivot(&region_channel(), "revenue").unwrap();

        assert_eq!(table.row_labels, vec![KeyValue::text("South"), KeyValue::text("West")]);
        assert_eq!(table.column_labels, vec![KeyValue::text("Export"), KeyValue::text("Wholesale")]);

        assert_eq!(
            table.cell(&KeyValue::text("South"), &KeyValue::text("Export")),
            Some(Measure::Value(0.0))
        );
        assert_eq!(
            table.cell(&KeyValue::text("West"), &KeyValue::text("Wholesale")),
            Some(Measure::Value(800.0))
        );
    }

    #[test]
    fn test_percent_of_row() {
        let pct = pivot(&region_channel(), "revenue").unwrap().percent_of_row();

        assert_eq!(pct.cell(&KeyValue::text("West"), &KeyValue::text("Export")), Some(Measure::Value(20.0)));
        assert_eq!(pct.cell(&KeyValue::text("West"), &KeyValue::text("Wholesale")), Some(Measure::Value(80.0)));
        assert_eq!(pct.cell(&KeyValue::text("South"), &KeyValue::text("Wholesale")), Some(Measure::Value(100.0)));
    }

    #[test]
    fn test_percent_of_zero_row_is_zero() {
        let table = PivotTable {
            row_key: GroupKey::Region,
            column_key: GroupKey::Channel,
            metric: "revenue".to_string(),
            row_labels: vec![KeyValue::text("Empty")],
            column_labels: vec![KeyValue::text("A"), KeyValue::text("B")],
            cells: vec![vec![Measure::Value(0.0), Measure::Value(0.0)]],
        };

        let pct = table.percent_of_row();

        assert_eq!(pct.cells[0], vec![Measure::Value(0.0), Measure::Value(0.0)]);
    }

    #[test]
    fn test_unpivot_round_trip() {
        let grouped = region_channel();
        let long = pivot(&grouped, "revenue").unwrap().unpivot();

        for original in &grouped.rows {
            assert_eq!(long.value(&original.keys, "revenue").unwrap(), Some(original.values[0]));
        }
        // Extra long-form rows are exactly the zero-filled gaps
        for extra in long.rows.iter().filter(|r| !grouped.rows.iter().any(|g| g.keys == r.keys)) {
            assert_eq!(extra.values[0], Measure::Value(0.0));
        }
    }

    #[test]
    fn test_month_columns_in_calendar_order() {
        let rows = vec![
            row("SO-1", "2018-12-05", "Wholesale", Some("West"), None, 1.0, 0.0, None),
            row("SO-2", "2018-02-06", "Wholesale", Some("West"), None, 1.0, 0.0, None),
            row("SO-3", "2018-07-01", "Wholesale", Some("West"), None, 1.0, 0.0, None),
        ];
        let grouped = aggregate(
            &rows,
            &AggregateSpec::group_by(&[GroupKey::Region, GroupKey::Month]).sum(Field::Revenue, "revenue"),
        );

        let table = pivot(&grouped, "revenue").unwrap();

        assert_eq!(
            table.column_labels,
            vec![
                KeyValue::Month(Month::February),
                KeyValue::Month(Month::July),
                KeyValue::Month(Month::December)
            ]
        );
    }

    #[test]
    fn test_pivot_requires_two_keys() {
        let grouped = AggregateTable::empty(vec![GroupKey::Region], vec!["revenue".to_string()]);
        assert!(matches!(
            pivot(&grouped, "revenue"),
            Err(PipelineError::KeyArity { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_restrict_rows_keeps_requested_order() {
        let table = pivot(&region_channel(), "revenue").unwrap();
        let restricted = table.restrict_rows(&[KeyValue::text("West"), KeyValue::text("North")]);

        assert_eq!(restricted.row_labels[0], KeyValue::text("West"));
        assert_eq!(restricted.cells[1], vec![Measure::Value(0.0), Measure::Value(0.0)]);
    }
}
