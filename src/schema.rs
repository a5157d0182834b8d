// 📐 Record Model - typed rows for every table the pipeline touches
//
// Column names are a fixed contract. Each source table maps onto one struct
// through serde renames, so differently-cased headers (`state` in Regions,
// `State` in StateRegions) meet as the same Rust field before any join runs.

use crate::calendar::{self, CalendarFields};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// SOURCE RECORDS
// ============================================================================

/// One sales-order line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "OrderNumber")]
    pub order_number: String,

    #[serde(rename = "OrderDate", deserialize_with = "calendar::deserialize_timestamp")]
    pub order_date: NaiveDateTime,

    #[serde(rename = "Channel")]
    pub channel: String,

    #[serde(rename = "DeliveryRegionId")]
    pub delivery_region_id: i64,

    #[serde(rename = "ProductId")]
    pub product_id: i64,

    /// Pre-computed line revenue
    #[serde(rename = "LineTotal")]
    pub line_total: f64,

    #[serde(rename = "TotalUnitCost")]
    pub total_unit_cost: f64,
}

/// Delivery location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub state: String,
}

/// Geographic grouping of a state, with its household count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRegion {
    #[serde(rename = "State")]
    pub state: String,

    #[serde(rename = "Region")]
    pub region: String,

    pub households: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,

    #[serde(rename = "productName")]
    pub product_name: String,
}

/// The four validated input tables, as handed over by an ingestion adapter
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub transactions: Vec<Transaction>,
    pub regions: Vec<Region>,
    pub state_regions: Vec<StateRegion>,
    pub products: Vec<Product>,
}

// ============================================================================
// DERIVED RECORDS
// ============================================================================

/// Fact-table row: a transaction with every dimension it could be joined to.
///
/// Enrichment fields are `None` from the first join that failed to match
/// onward; a missing region also leaves state-level fields empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTransaction {
    pub transaction: Transaction,
    pub state: Option<String>,
    pub region: Option<String>,
    pub households: Option<u64>,
    pub product_name: Option<String>,
}

/// Fact-table row plus calendar dimensions and per-row profit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedTransaction {
    pub enriched: EnrichedTransaction,
    pub calendar: CalendarFields,
    pub profit: f64,
}

impl DerivedTransaction {
    pub fn from_enriched(enriched: EnrichedTransaction) -> Self {
        let calendar = CalendarFields::from_timestamp(&enriched.transaction.order_date);
        let profit = metrics::profit(
            enriched.transaction.line_total,
            enriched.transaction.total_unit_cost,
        );

        DerivedTransaction {
            enriched,
            calendar,
            profit,
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.enriched.transaction
    }

    pub fn revenue(&self) -> f64 {
        self.enriched.transaction.line_total
    }

    pub fn unit_cost(&self) -> f64 {
        self.enriched.transaction.total_unit_cost
    }

    pub fn region(&self) -> Option<&str> {
        self.enriched.region.as_deref()
    }

    pub fn product_name(&self) -> Option<&str> {
        self.enriched.product_name.as_deref()
    }
}

// ============================================================================
// TABLE SCHEMAS
// ============================================================================

/// Required header set of one ingestion table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

pub const TRANSACTIONS_SCHEMA: TableSchema = TableSchema {
    table: "Transactions",
    columns: &[
        "OrderNumber",
        "OrderDate",
        "Channel",
        "DeliveryRegionId",
        "ProductId",
        "LineTotal",
        "TotalUnitCost",
    ],
};

pub const REGIONS_SCHEMA: TableSchema = TableSchema {
    table: "Regions",
    columns: &["id", "state"],
};

pub const STATE_REGIONS_SCHEMA: TableSchema = TableSchema {
    table: "StateRegions",
    columns: &["State", "Region", "households"],
};

pub const PRODUCTS_SCHEMA: TableSchema = TableSchema {
    table: "Products",
    columns: &["id", "productName"],
};

impl TableSchema {
    /// First required column absent from `headers`, if any
    pub fn missing_column(&self, headers: &[&str]) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|required| !headers.contains(*required))
            .copied()
    }

    pub fn validate_headers(&self, headers: &[&str]) -> PipelineResult<()> {
        match self.missing_column(headers) {
            Some(column) => Err(PipelineError::SchemaMismatch {
                table: self.table.to_string(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{parse_timestamp, Month};

    #[test]
    fn test_validate_headers_accepts_extra_columns() {
        let headers = ["id", "state", "city", "latitude"];
        assert!(REGIONS_SCHEMA.validate_headers(&headers).is_ok());
    }

    #[test]
    fn test_validate_headers_is_case_sensitive() {
        // StateRegions uses `State`, not `state`
        let headers = ["state", "Region", "households"];
        let err = STATE_REGIONS_SCHEMA
            .validate_headers(&headers)
            .unwrap_err();

        match err {
            PipelineError::SchemaMismatch { table, column } => {
                assert_eq!(table, "StateRegions");
                assert_eq!(column, "State");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_derived_transaction_profit_and_calendar() {
        let enriched = EnrichedTransaction {
            transaction: Transaction {
                order_number: "SO-000101".to_string(),
                order_date: parse_timestamp("2017-02-14").unwrap(),
                channel: "Wholesale".to_string(),
                delivery_region_id: 7,
                product_id: 3,
                line_total: 1500.0,
                total_unit_cost: 900.0,
            },
            state: Some("Ohio".to_string()),
            region: Some("Midwest".to_string()),
            households: Some(4_700_000),
            product_name: Some("Product 3".to_string()),
        };

        let derived = DerivedTransaction::from_enriched(enriched);

        assert_eq!(derived.profit, 600.0);
        assert_eq!(derived.calendar.year, 2017);
        assert_eq!(derived.calendar.quarter, 1);
        assert_eq!(derived.calendar.month, Month::February);
        assert_eq!(derived.region(), Some("Midwest"));
    }
}
