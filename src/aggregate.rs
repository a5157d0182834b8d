// 🧮 Aggregator - one group-by primitive for every report
//
// An AggregateSpec names typed group keys and (field, reduction) pairs.
// Groups come out in first-seen order; every later sort is stable, so
// first-seen order is also the tie-break for ranking.
//
// Rows with an unresolved dimension group under KeyValue::Unknown.

use crate::calendar::Month;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::Measure;
use crate::schema::DerivedTransaction;
use serde::{Serialize, Serializer};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;

// ============================================================================
// GROUP KEYS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Region,
    State,
    Channel,
    ProductName,
    Year,
    Quarter,
    Month,
}

impl GroupKey {
    pub fn name(&self) -> &'static str {
        match self {
            GroupKey::Region => "region",
            GroupKey::State => "state",
            GroupKey::Channel => "channel",
            GroupKey::ProductName => "product_name",
            GroupKey::Year => "year",
            GroupKey::Quarter => "quarter",
            GroupKey::Month => "month",
        }
    }

    pub fn extract(&self, row: &DerivedTransaction) -> KeyValue {
        match self {
            GroupKey::Region => KeyValue::from_optional(row.enriched.region.as_deref()),
            GroupKey::State => KeyValue::from_optional(row.enriched.state.as_deref()),
            GroupKey::Channel => KeyValue::Text(row.transaction().channel.clone()),
            GroupKey::ProductName => {
                KeyValue::from_optional(row.enriched.product_name.as_deref())
            }
            GroupKey::Year => KeyValue::Int(row.calendar.year as i64),
            GroupKey::Quarter => KeyValue::Int(row.calendar.quarter as i64),
            GroupKey::Month => KeyValue::Month(row.calendar.month),
        }
    }
}

/// One component of a group key.
///
/// The derived `Ord` puts `Unknown` after every known value, so the
/// unknown bucket always sorts last in pivots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Month(Month),
    Text(String),
    Unknown,
}

impl KeyValue {
    pub fn from_optional(value: Option<&str>) -> KeyValue {
        match value {
            Some(v) => KeyValue::Text(v.to_string()),
            None => KeyValue::Unknown,
        }
    }

    pub fn text(value: &str) -> KeyValue {
        KeyValue::Text(value.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, KeyValue::Unknown)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Month(m) => f.write_str(m.name()),
            KeyValue::Text(s) => f.write_str(s),
            KeyValue::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeyValue::Int(v) => serializer.serialize_i64(*v),
            other => serializer.collect_str(other),
        }
    }
}

// ============================================================================
// FIELDS & REDUCTIONS
// ============================================================================

/// Source column of a reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Revenue,
    UnitCost,
    Profit,
    Households,
    OrderNumber,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Revenue => "revenue",
            Field::UnitCost => "unit_cost",
            Field::Profit => "profit",
            Field::Households => "households",
            Field::OrderNumber => "order_number",
        }
    }

    /// Numeric view of the field; `None` when missing or non-numeric
    pub fn numeric(&self, row: &DerivedTransaction) -> Option<f64> {
        match self {
            Field::Revenue => Some(row.revenue()),
            Field::UnitCost => Some(row.unit_cost()),
            Field::Profit => Some(row.profit),
            Field::Households => row.enriched.households.map(|h| h as f64),
            Field::OrderNumber => None,
        }
    }

    /// Identity of the value for distinct counting
    fn token(&self, row: &DerivedTransaction) -> Option<String> {
        match self {
            Field::OrderNumber => Some(row.transaction().order_number.clone()),
            Field::Households => row.enriched.households.map(|h| h.to_string()),
            other => other.numeric(row).map(|v| v.to_bits().to_string()),
        }
    }

    fn is_present(&self, row: &DerivedTransaction) -> bool {
        match self {
            Field::OrderNumber => !row.transaction().order_number.is_empty(),
            other => other.numeric(row).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
    Mean,
    /// Rows where the field is present
    Count,
    CountDistinct,
    /// First present value; expected constant within the group
    First,
}

impl Reduction {
    pub fn name(&self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Mean => "mean",
            Reduction::Count => "count",
            Reduction::CountDistinct => "count_distinct",
            Reduction::First => "first",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    pub field: Field,
    pub reduction: Reduction,
    pub alias: String,
}

impl MetricSpec {
    pub fn new(field: Field, reduction: Reduction) -> Self {
        MetricSpec {
            field,
            reduction,
            alias: format!("{}_{}", field.name(), reduction.name()),
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }
}

/// `{group_keys, metrics}` - the whole vocabulary of the Aggregator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSpec {
    pub group_keys: Vec<GroupKey>,
    pub metrics: Vec<MetricSpec>,
}

impl AggregateSpec {
    pub fn group_by(keys: &[GroupKey]) -> Self {
        AggregateSpec {
            group_keys: keys.to_vec(),
            metrics: Vec::new(),
        }
    }

    pub fn metric(mut self, field: Field, reduction: Reduction, alias: &str) -> Self {
        self.metrics.push(MetricSpec::new(field, reduction).alias(alias));
        self
    }

    pub fn sum(self, field: Field, alias: &str) -> Self {
        self.metric(field, Reduction::Sum, alias)
    }

    pub fn mean(self, field: Field, alias: &str) -> Self {
        self.metric(field, Reduction::Mean, alias)
    }

    pub fn count(self, field: Field, alias: &str) -> Self {
        self.metric(field, Reduction::Count, alias)
    }
}

// ============================================================================
// ACCUMULATORS
// ============================================================================

enum Accumulator {
    Sum(f64),
    Mean { sum: f64, count: usize },
    Count(usize),
    CountDistinct(HashSet<String>),
    First { value: Option<f64>, conflicting: bool },
}

impl Accumulator {
    fn new(reduction: Reduction) -> Self {
        match reduction {
            Reduction::Sum => Accumulator::Sum(0.0),
            Reduction::Mean => Accumulator::Mean { sum: 0.0, count: 0 },
            Reduction::Count => Accumulator::Count(0),
            Reduction::CountDistinct => Accumulator::CountDistinct(HashSet::new()),
            Reduction::First => Accumulator::First {
                value: None,
                conflicting: false,
            },
        }
    }

    fn add(&mut self, field: Field, row: &DerivedTransaction) {
        match self {
            Accumulator::Sum(total) => {
                if let Some(v) = field.numeric(row) {
                    *total += v;
                }
            }
            Accumulator::Mean { sum, count } => {
                if let Some(v) = field.numeric(row) {
                    *sum += v;
                    *count += 1;
                }
            }
            Accumulator::Count(count) => {
                if field.is_present(row) {
                    *count += 1;
                }
            }
            Accumulator::CountDistinct(seen) => {
                if let Some(token) = field.token(row) {
                    seen.insert(token);
                }
            }
            Accumulator::First { value, conflicting } => {
                if let Some(v) = field.numeric(row) {
                    match value {
                        None => *value = Some(v),
                        Some(first) if *first != v => *conflicting = true,
                        Some(_) => {}
                    }
                }
            }
        }
    }

    fn is_conflicting(&self) -> bool {
        matches!(self, Accumulator::First { conflicting: true, .. })
    }

    fn finish(self) -> Measure {
        match self {
            Accumulator::Sum(total) => Measure::from_f64(total),
            Accumulator::Mean { sum, count } => {
                if count == 0 {
                    Measure::NotComputable
                } else {
                    Measure::from_f64(sum / count as f64)
                }
            }
            Accumulator::Count(count) => Measure::Value(count as f64),
            Accumulator::CountDistinct(seen) => Measure::Value(seen.len() as f64),
            Accumulator::First { value, .. } => match value {
                Some(v) => Measure::from_f64(v),
                None => Measure::NotComputable,
            },
        }
    }
}

// ============================================================================
// AGGREGATE TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub keys: Vec<KeyValue>,
    pub values: Vec<Measure>,
}

impl AggregateRow {
    /// Group keys joined for display, e.g. `2019 | West`
    pub fn label(&self) -> String {
        self.keys
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Flat grouped result: one row per distinct key tuple
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateTable {
    pub key_columns: Vec<GroupKey>,
    pub columns: Vec<String>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn empty(key_columns: Vec<GroupKey>, columns: Vec<String>) -> Self {
        AggregateTable {
            key_columns,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> PipelineResult<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PipelineError::UnknownColumn {
                table: format!("group by {}", self.key_label()),
                column: column.to_string(),
            })
    }

    /// Cell for an exact key tuple
    pub fn value(&self, keys: &[KeyValue], column: &str) -> PipelineResult<Option<Measure>> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .find(|row| row.keys == keys)
            .map(|row| row.values[idx]))
    }

    /// Sum of the computable cells of one column
    pub fn total(&self, column: &str) -> PipelineResult<f64> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.values[idx].value())
            .sum())
    }

    /// First key of every row, in row order
    pub fn leading_keys(&self) -> Vec<KeyValue> {
        self.rows
            .iter()
            .filter_map(|row| row.keys.first().cloned())
            .collect()
    }

    /// Append a column computed per row from existing columns
    pub fn with_derived_column<F>(mut self, name: &str, inputs: &[&str], derive: F) -> PipelineResult<Self>
    where
        F: Fn(&[Measure]) -> Measure,
    {
        let indexes = inputs
            .iter()
            .map(|c| self.column_index(c))
            .collect::<PipelineResult<Vec<usize>>>()?;

        let mut args = Vec::with_capacity(indexes.len());
        for row in &mut self.rows {
            args.clear();
            args.extend(indexes.iter().map(|&i| row.values[i]));
            row.values.push(derive(&args));
        }

        self.columns.push(name.to_string());
        Ok(self)
    }

    /// Rows ordered by their key tuples (calendar order for months, Unknown last)
    pub fn sorted_by_keys(mut self) -> Self {
        self.rows.sort_by(|a, b| a.keys.cmp(&b.keys));
        self
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, columns: &[&str]) -> PipelineResult<Self> {
        let indexes = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<PipelineResult<Vec<usize>>>()?;

        Ok(AggregateTable {
            key_columns: self.key_columns.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| AggregateRow {
                    keys: row.keys.clone(),
                    values: indexes.iter().map(|&i| row.values[i]).collect(),
                })
                .collect(),
        })
    }

    fn key_label(&self) -> String {
        self.key_columns
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Group `rows` by `spec.group_keys` and reduce each metric.
///
/// Empty input yields an empty table. With no group keys every row falls
/// into one group keyed by the empty tuple.
pub fn aggregate<'a, I>(rows: I, spec: &AggregateSpec) -> AggregateTable
where
    I: IntoIterator<Item = &'a DerivedTransaction>,
{
    let mut order: Vec<Vec<KeyValue>> = Vec::new();
    let mut groups: HashMap<Vec<KeyValue>, Vec<Accumulator>> = HashMap::new();

    for row in rows {
        let key: Vec<KeyValue> = spec.group_keys.iter().map(|k| k.extract(row)).collect();

        let accumulators = match groups.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                order.push(entry.key().clone());
                entry.insert(
                    spec.metrics
                        .iter()
                        .map(|m| Accumulator::new(m.reduction))
                        .collect(),
                )
            }
        };

        for (acc, metric) in accumulators.iter_mut().zip(&spec.metrics) {
            acc.add(metric.field, row);
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for keys in order {
        let Some(accumulators) = groups.remove(&keys) else {
            continue;
        };

        let mut values = Vec::with_capacity(accumulators.len());
        for (acc, metric) in accumulators.into_iter().zip(&spec.metrics) {
            if acc.is_conflicting() {
                log::warn!(
                    "'{}' is not constant within group [{}]; keeping first value",
                    metric.field.name(),
                    keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(" | ")
                );
            }
            values.push(acc.finish());
        }

        out.push(AggregateRow { keys, values });
    }

    AggregateTable {
        key_columns: spec.group_keys.clone(),
        columns: spec.metrics.iter().map(|m| m.alias.clone()).collect(),
        rows: out,
    }
}
