// 🏆 Ranking - top-N, arg-max / arg-min over an aggregate column
//
// Sorting is stable over the table's current order (first-seen for fresh
// aggregates), so equal values keep that order. Non-computable cells sort
// after every computable one in both directions.

use crate::aggregate::{AggregateRow, AggregateTable, KeyValue};
use crate::error::PipelineResult;
use crate::metrics::Measure;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Largest,
    Smallest,
}

fn compare(a: Measure, b: Measure, direction: Direction) -> Ordering {
    match (a.value(), b.value()) {
        (Some(x), Some(y)) => {
            let ord = match direction {
                Direction::Largest => y.partial_cmp(&x),
                Direction::Smallest => x.partial_cmp(&y),
            };
            ord.unwrap_or(Ordering::Equal)
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Whole table reordered by one column
pub fn sort_by(table: &AggregateTable, column: &str, direction: Direction) -> PipelineResult<AggregateTable> {
    let idx = table.column_index(column)?;

    let mut rows = table.rows.clone();
    rows.sort_by(|a, b| compare(a.values[idx], b.values[idx], direction));

    Ok(AggregateTable {
        key_columns: table.key_columns.clone(),
        columns: table.columns.clone(),
        rows,
    })
}

/// The `n` best rows by `column`; fewer when the table is smaller
pub fn top_n(
    table: &AggregateTable,
    column: &str,
    n: usize,
    direction: Direction,
) -> PipelineResult<AggregateTable> {
    let mut sorted = sort_by(table, column, direction)?;
    sorted.rows.truncate(n);
    Ok(sorted)
}

/// Leading key of each of the top `n` rows, e.g. the top product names
pub fn top_keys(
    table: &AggregateTable,
    column: &str,
    n: usize,
    direction: Direction,
) -> PipelineResult<Vec<KeyValue>> {
    Ok(top_n(table, column, n, direction)?.leading_keys())
}

/// Row with the largest computable value; first-seen wins ties
pub fn arg_max<'t>(table: &'t AggregateTable, column: &str) -> PipelineResult<Option<&'t AggregateRow>> {
    extreme(table, column, Direction::Largest)
}

/// Row with the smallest computable value; first-seen wins ties
pub fn arg_min<'t>(table: &'t AggregateTable, column: &str) -> PipelineResult<Option<&'t AggregateRow>> {
    extreme(table, column, Direction::Smallest)
}

fn extreme<'t>(
    table: &'t AggregateTable,
    column: &str,
    direction: Direction,
) -> PipelineResult<Option<&'t AggregateRow>> {
    let idx = table.column_index(column)?;

    let mut best: Option<&AggregateRow> = None;
    for row in &table.rows {
        if !row.values[idx].is_computable() {
            continue;
        }
        match best {
            Some(current) if compare(row.values[idx], current.values[idx], direction) != Ordering::Less => {}
            _ => best = Some(row),
        }
    }
    Ok(best)
}
