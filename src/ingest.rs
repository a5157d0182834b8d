// 📥 CSV ingestion - one file per source table
//
// Headers are matched by name against the table schema, so column order in
// the file does not matter. A banner line above the header (spreadsheet
// exports of the state-region sheet carry one) is skipped.

use crate::config::InputFiles;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{
    Product, Region, SourceTables, StateRegion, TableSchema, Transaction, PRODUCTS_SCHEMA, REGIONS_SCHEMA,
    STATE_REGIONS_SCHEMA, TRANSACTIONS_SCHEMA,
};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Lines inspected for the header row
const HEADER_SEARCH_DEPTH: usize = 2;

/// Parse one table from any reader, validating its header against `schema`
pub fn parse_table<T, R>(reader: R, schema: &TableSchema) -> PipelineResult<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut headers: Option<StringRecord> = None;
    let mut first_miss: Option<&'static str> = None;
    let mut rows = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;

        if headers.is_none() {
            let fields: Vec<&str> = record.iter().collect();
            match schema.missing_column(&fields) {
                None => headers = Some(record.clone()),
                Some(column) if line + 1 < HEADER_SEARCH_DEPTH => {
                    log::debug!("{}: skipping banner line {:?}", schema.table, fields);
                    first_miss.get_or_insert(column);
                }
                Some(column) => {
                    return Err(PipelineError::SchemaMismatch {
                        table: schema.table.to_string(),
                        column: first_miss.unwrap_or(column).to_string(),
                    })
                }
            }
            continue;
        }

        // Spreadsheet exports pad the sheet with empty rows
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if let Some(header) = &headers {
            rows.push(record.deserialize(Some(header))?);
        }
    }

    if headers.is_none() {
        return Err(PipelineError::SchemaMismatch {
            table: schema.table.to_string(),
            column: first_miss.or_else(|| schema.columns.first().copied()).unwrap_or("*").to_string(),
        });
    }

    log::debug!("{}: parsed {} rows", schema.table, rows.len());
    Ok(rows)
}

pub fn load_table<T: DeserializeOwned>(path: &Path, schema: &TableSchema) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let rows = parse_table(file, schema).with_context(|| format!("Failed to load {}", path.display()))?;
    log::info!("loaded {} {} rows from {}", rows.len(), schema.table, path.display());
    Ok(rows)
}

pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    load_table(path, &TRANSACTIONS_SCHEMA)
}

pub fn load_regions(path: &Path) -> Result<Vec<Region>> {
    load_table(path, &REGIONS_SCHEMA)
}

pub fn load_state_regions(path: &Path) -> Result<Vec<StateRegion>> {
    load_table(path, &STATE_REGIONS_SCHEMA)
}

pub fn load_products(path: &Path) -> Result<Vec<Product>> {
    load_table(path, &PRODUCTS_SCHEMA)
}

/// Load all four tables from `dir`
pub fn load_sources(dir: &Path, inputs: &InputFiles) -> Result<SourceTables> {
    Ok(SourceTables {
        transactions: load_transactions(&dir.join(&inputs.transactions))?,
        regions: load_regions(&dir.join(&inputs.regions))?,
        state_regions: load_state_regions(&dir.join(&inputs.state_regions))?,
        products: load_products(&dir.join(&inputs.products))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_transactions() {
        let data = "\
OrderNumber,OrderDate,Channel,DeliveryRegionId,ProductId,LineTotal,TotalUnitCost
SO - 000101, 2017-05-31 ,Wholesale,1,10,1000.5,600
SO - 000102,06/01/2017,Export,2,11,250,100
";
        let rows: Vec<Transaction> = parse_table(data.as_bytes(), &TRANSACTIONS_SCHEMA).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].order_number, "SO - 000101");
        assert_eq!(rows[0].line_total, 1000.5);
        assert_eq!(
            rows[1].order_date.date(),
            NaiveDate::from_ymd_opt(2017, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let data = "state,id\nCA,1\nNY,2\n";
        let rows: Vec<Region> = parse_table(data.as_bytes(), &REGIONS_SCHEMA).unwrap();

        assert_eq!(rows[1], Region { id: 2, state: "NY".to_string() });
    }

    #[test]
    fn test_banner_row_is_skipped() {
        let data = "\
US Census households by state,,
State,Region,households
California,West,13000000
,,
";
        let rows: Vec<StateRegion> = parse_table(data.as_bytes(), &STATE_REGIONS_SCHEMA).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region, "West");
        assert_eq!(rows[0].households, 13_000_000);
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let data = "id,name\n1,Widget\n";
        let err = parse_table::<Product, _>(data.as_bytes(), &PRODUCTS_SCHEMA).unwrap_err();

        match err {
            PipelineError::SchemaMismatch { table, column } => {
                assert_eq!(table, "Products");
                assert_eq!(column, "productName");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_empty_input_is_schema_mismatch() {
        let err = parse_table::<Product, _>("".as_bytes(), &PRODUCTS_SCHEMA).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_bad_timestamp_fails() {
        let data = "\
OrderNumber,OrderDate,Channel,DeliveryRegionId,ProductId,LineTotal,TotalUnitCost
SO-1,not a date,Wholesale,1,10,1,1
";
        assert!(parse_table::<Transaction, _>(data.as_bytes(), &TRANSACTIONS_SCHEMA).is_err());
    }
}
