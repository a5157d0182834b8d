// 🗄️ Result store - pipeline runs and their report cells in SQLite
//
// Reports are stored in long form, one row per cell, so every report kind
// shares two tables. NotComputable cells keep a NULL value and computable = 0.

use crate::error::PipelineResult;
use crate::metrics::Measure;
use crate::pipeline::PipelineOutput;
use crate::report::ReportOutcome;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub input_rows: i64,
    pub fact_rows: i64,
    pub unmatched_region_rows: i64,
    pub unmatched_state_rows: i64,
    pub unmatched_product_rows: i64,
    pub report_count: i64,
    pub failed_reports: i64,
}

/// Status line of one report in one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredReport {
    pub report: String,
    pub kind: Option<String>,
    pub error: Option<String>,
    pub cell_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCell {
    pub row_index: i64,
    pub row_label: String,
    pub column: String,
    pub value: Measure,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> PipelineResult<()> {
    // Enable WAL mode so the API server can read while a run is written
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pipeline_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL,
            input_rows INTEGER NOT NULL,
            fact_rows INTEGER NOT NULL,
            unmatched_region_rows INTEGER NOT NULL,
            unmatched_state_rows INTEGER NOT NULL,
            unmatched_product_rows INTEGER NOT NULL,
            report_count INTEGER NOT NULL,
            failed_reports INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            report TEXT NOT NULL,
            kind TEXT,
            error TEXT,
            UNIQUE(run_id, report)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_cells (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            report TEXT NOT NULL,
            row_index INTEGER NOT NULL,
            row_label TEXT NOT NULL,
            column_name TEXT NOT NULL,
            value REAL,
            computable INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_cells_report ON report_cells(run_id, report)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_runs_created_at ON pipeline_runs(created_at)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITE
// ============================================================================

/// Persist one run with every report outcome, in a single transaction
pub fn insert_run(conn: &mut Connection, output: &PipelineOutput) -> PipelineResult<RunRecord> {
    let record = RunRecord {
        run_id: output.run_id.clone(),
        created_at: output.generated_at,
        input_rows: output.input_rows as i64,
        fact_rows: output.fact_rows as i64,
        unmatched_region_rows: output.join_report.unmatched_region_rows() as i64,
        unmatched_state_rows: output.join_report.unmatched_state_rows() as i64,
        unmatched_product_rows: output.join_report.unmatched_product_rows() as i64,
        report_count: output.reports.len() as i64,
        failed_reports: output.reports.failures().len() as i64,
    };

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO pipeline_runs (
            run_id, created_at, input_rows, fact_rows,
            unmatched_region_rows, unmatched_state_rows, unmatched_product_rows,
            report_count, failed_reports
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.run_id,
            record.created_at.to_rfc3339(),
            record.input_rows,
            record.fact_rows,
            record.unmatched_region_rows,
            record.unmatched_state_rows,
            record.unmatched_product_rows,
            record.report_count,
            record.failed_reports,
        ],
    )?;

    let mut cells_written = 0;
    {
        let mut report_stmt =
            tx.prepare("INSERT INTO reports (run_id, report, kind, error) VALUES (?1, ?2, ?3, ?4)")?;
        let mut cell_stmt = tx.prepare(
            "INSERT INTO report_cells (run_id, report, row_index, row_label, column_name, value, computable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for (name, outcome) in output.reports.iter() {
            match outcome {
                ReportOutcome::Ready { table } => {
                    report_stmt.execute(params![record.run_id, name, table.kind(), None::<String>])?;

                    for (i, cell) in table.cells().iter().enumerate() {
                        cell_stmt.execute(params![
                            record.run_id,
                            name,
                            i as i64,
                            cell.row_label,
                            cell.column,
                            cell.value.value(),
                            cell.value.is_computable(),
                        ])?;
                        cells_written += 1;
                    }
                }
                ReportOutcome::Failed { error } => {
                    report_stmt.execute(params![record.run_id, name, None::<String>, error])?;
                }
            }
        }
    }
    tx.commit()?;

    log::info!(
        "stored run {} ({} reports, {} cells)",
        record.run_id,
        record.report_count,
        cells_written
    );
    Ok(record)
}

// ============================================================================
// READ
// ============================================================================

const RUN_COLUMNS: &str = "run_id, created_at, input_rows, fact_rows,
    unmatched_region_rows, unmatched_state_rows, unmatched_product_rows,
    report_count, failed_reports";

fn run_from_row(row: &Row) -> rusqlite::Result<RunRecord> {
    let created_at: String = row.get(1)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(RunRecord {
        run_id: row.get(0)?,
        created_at,
        input_rows: row.get(2)?,
        fact_rows: row.get(3)?,
        unmatched_region_rows: row.get(4)?,
        unmatched_state_rows: row.get(5)?,
        unmatched_product_rows: row.get(6)?,
        report_count: row.get(7)?,
        failed_reports: row.get(8)?,
    })
}

/// All runs, newest first
pub fn list_runs(conn: &Connection) -> PipelineResult<Vec<RunRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM pipeline_runs ORDER BY id DESC",
        RUN_COLUMNS
    ))?;

    let runs = stmt
        .query_map([], run_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

pub fn latest_run(conn: &Connection) -> PipelineResult<Option<RunRecord>> {
    let run = conn
        .query_row(
            &format!("SELECT {} FROM pipeline_runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
            [],
            run_from_row,
        )
        .optional()?;

    Ok(run)
}

pub fn get_run(conn: &Connection, run_id: &str) -> PipelineResult<Option<RunRecord>> {
    let run = conn
        .query_row(
            &format!("SELECT {} FROM pipeline_runs WHERE run_id = ?1", RUN_COLUMNS),
            params![run_id],
            run_from_row,
        )
        .optional()?;

    Ok(run)
}

/// Reports of one run in name order
pub fn list_reports(conn: &Connection, run_id: &str) -> PipelineResult<Vec<StoredReport>> {
    let mut stmt = conn.prepare(
        "SELECT r.report, r.kind, r.error,
                (SELECT COUNT(*) FROM report_cells c WHERE c.run_id = r.run_id AND c.report = r.report)
         FROM reports r
         WHERE r.run_id = ?1
         ORDER BY r.report",
    )?;

    let reports = stmt
        .query_map(params![run_id], |row| {
            Ok(StoredReport {
                report: row.get(0)?,
                kind: row.get(1)?,
                error: row.get(2)?,
                cell_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(reports)
}

/// Cells of one report in display order; empty when the report is unknown
pub fn load_report(conn: &Connection, run_id: &str, report: &str) -> PipelineResult<Vec<StoredCell>> {
    let mut stmt = conn.prepare(
        "SELECT row_index, row_label, column_name, value, computable
         FROM report_cells
         WHERE run_id = ?1 AND report = ?2
         ORDER BY row_index",
    )?;

    let cells = stmt
        .query_map(params![run_id, report], |row| {
            let value: Option<f64> = row.get(3)?;
            let computable: bool = row.get(4)?;
            Ok(StoredCell {
                row_index: row.get(0)?,
                row_label: row.get(1)?,
                column: row.get(2)?,
                value: match (computable, value) {
                    (true, Some(v)) => Measure::Value(v),
                    _ => Measure::NotComputable,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateRow, AggregateTable, GroupKey, KeyValue};
    use crate::error::PipelineError;
    use crate::join::JoinReport;
    use crate::quality::QualityReport;
    use crate::report::{ReportTable, ResultBundle};

    fn create_output() -> PipelineOutput {
        let mut reports = ResultBundle::new();
        reports.insert(
            "region_household_metrics",
            Ok(ReportTable::Grouped(AggregateTable {
                key_columns: vec![GroupKey::Region],
                columns: vec!["revenue".to_string(), "revenue_per_household".to_string()],
                rows: vec![
                    AggregateRow {
                        keys: vec![KeyValue::text("West")],
                        values: vec![Measure::Value(300.0), Measure::Value(0.2)],
                    },
                    AggregateRow {
                        keys: vec![KeyValue::text("East")],
                        values: vec![Measure::Value(100.0), Measure::NotComputable],
                    },
                ],
            })),
        );
        reports.insert(
            "broken",
            Err(PipelineError::DependencyFailed {
                report: "product_summary".to_string(),
            }),
        );

        PipelineOutput {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            input_rows: 3,
            fact_rows: 3,
            join_report: JoinReport {
                input_rows: 3,
                output_rows: 3,
                ..JoinReport::default()
            },
            quality: QualityReport {
                tables: Vec::new(),
                issues: Vec::new(),
            },
            reports,
        }
    }

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_load_report() {
        let mut conn = open();
        let output = create_output();

        let record = insert_run(&mut conn, &output).unwrap();
        assert_eq!(record.report_count, 2);
        assert_eq!(record.failed_reports, 1);

        let cells = load_report(&conn, &output.run_id, "region_household_metrics").unwrap();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[0].row_label, "West");
        assert_eq!(cells[0].value, Measure::Value(300.0));
        assert_eq!(cells[3].column, "revenue_per_household");
        assert_eq!(cells[3].value, Measure::NotComputable);
    }

    #[test]
    fn test_failed_report_is_listed_with_error() {
        let mut conn = open();
        let output = create_output();
        insert_run(&mut conn, &output).unwrap();

        let reports = list_reports(&conn, &output.run_id).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].report, "broken");
        assert!(reports[0].kind.is_none());
        assert!(reports[0].error.as_deref().unwrap().contains("product_summary"));
        assert_eq!(reports[1].kind.as_deref(), Some("grouped"));
        assert_eq!(reports[1].cell_count, 4);
    }

    #[test]
    fn test_latest_run() {
        let mut conn = open();
        assert!(latest_run(&conn).unwrap().is_none());

        let first = create_output();
        let second = create_output();
        insert_run(&mut conn, &first).unwrap();
        insert_run(&mut conn, &second).unwrap();

        let latest = latest_run(&conn).unwrap().unwrap();
        assert_eq!(latest.run_id, second.run_id);
        assert_eq!(list_runs(&conn).unwrap().len(), 2);
        assert!(get_run(&conn, &first.run_id).unwrap().is_some());
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = open();
        setup_database(&conn).unwrap();
        assert!(load_report(&conn, "missing", "sales_by_region").unwrap().is_empty());
    }
}
