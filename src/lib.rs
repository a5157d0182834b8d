// Regional Sales Analytics - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod config;
pub mod calendar;
pub mod schema;      // Record model and ingestion schemas
pub mod ingest;      // CSV adapter
pub mod join;        // Join Engine
pub mod metrics;     // Metric Deriver
pub mod aggregate;   // Aggregator
pub mod pivot;
pub mod rank;
pub mod seasonal;    // Variance-from-average
pub mod correlation;
pub mod report;      // Output Assembler
pub mod analysis;    // Report battery
pub mod quality;     // Data Quality Engine
pub mod pipeline;
pub mod store;       // SQLite result store

// Re-export commonly used types
pub use error::{PipelineError, PipelineResult};
pub use config::{InputFiles, PipelineConfig};
pub use calendar::{CalendarFields, Month};
pub use schema::{
    DerivedTransaction, EnrichedTransaction, Product, Region, SourceTables, StateRegion, Transaction,
};
pub use ingest::{load_sources, parse_table};
pub use join::{JoinEngine, JoinReport};
pub use metrics::Measure;
pub use aggregate::{aggregate, AggregateSpec, AggregateTable, Field, GroupKey, KeyValue, Reduction};
pub use pivot::{pivot, PivotTable};
pub use rank::{arg_max, arg_min, sort_by, top_keys, top_n, Direction};
pub use seasonal::{seasonal_profile, MonthlySeries, SeasonalComparison, SeasonalProfile};
pub use correlation::{correlation_matrix, CorrelationMatrix};
pub use report::{ReportOutcome, ReportTable, ResultBundle};
pub use analysis::{run_reports, ReportBattery};
pub use quality::{DataQualityEngine, QualityIssue, QualityReport, Severity};
pub use pipeline::{Pipeline, PipelineOutput};
pub use store::{
    get_run, insert_run, latest_run, list_reports, list_runs, load_report, setup_database, RunRecord,
    StoredCell, StoredReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
