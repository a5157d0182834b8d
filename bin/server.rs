// Regional Sales Analytics - API Server
// Read-only REST API over the SQLite result store

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use regional_sales::{get_run, latest_run, list_reports, list_runs, load_report, RunRecord, StoredCell, StoredReport};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Response> {
        self.db
            .lock()
            .map_err(|_| error_response(StatusCode::INTERNAL_SERVER_ERROR, "database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        data: None,
        error: Some(message.to_string()),
    };
    (status, Json(body)).into_response()
}

/// Run overview with its report list
#[derive(Serialize)]
struct RunResponse {
    run: RunRecord,
    reports: Vec<StoredReport>,
}

#[derive(Serialize)]
struct ReportResponse {
    run_id: String,
    report: String,
    cells: Vec<StoredCell>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/runs - All stored runs, newest first
async fn get_runs(State(state): State<AppState>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match list_runs(&conn) {
        Ok(runs) => (StatusCode::OK, Json(ApiResponse::ok(runs))).into_response(),
        Err(e) => {
            log::error!("Error listing runs: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn run_response(conn: &Connection, run: Option<RunRecord>) -> Response {
    let Some(run) = run else {
        return error_response(StatusCode::NOT_FOUND, "run not found");
    };

    match list_reports(conn, &run.run_id) {
        Ok(reports) => (StatusCode::OK, Json(ApiResponse::ok(RunResponse { run, reports }))).into_response(),
        Err(e) => {
            log::error!("Error listing reports of run {}: {}", run.run_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// GET /api/runs/latest - Most recent run and its reports
async fn get_latest_run(State(state): State<AppState>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match latest_run(&conn) {
        Ok(run) => run_response(&conn, run),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /api/runs/:run_id - One run and its reports
async fn get_run_by_id(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match get_run(&conn, &run_id) {
        Ok(run) => run_response(&conn, run),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn report_response(conn: &Connection, run_id: String, report: String) -> Response {
    match load_report(conn, &run_id, &report) {
        Ok(cells) if cells.is_empty() => error_response(StatusCode::NOT_FOUND, "report not found or empty"),
        Ok(cells) => {
            let body = ReportResponse { run_id, report, cells };
            (StatusCode::OK, Json(ApiResponse::ok(body))).into_response()
        }
        Err(e) => {
            log::error!("Error loading report {}: {}", report, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// GET /api/reports/:name - One report of the latest run
async fn get_latest_report(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match latest_run(&conn) {
        Ok(Some(run)) => report_response(&conn, run.run_id, name),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "no runs stored yet"),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// GET /api/runs/:run_id/reports/:name - One report of a given run
async fn get_run_report(State(state): State<AppState>, Path((run_id, name)): Path<(String, String)>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    report_response(&conn, run_id, name)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("🌐 Regional Sales Analytics - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Database path: first argument, then REGIONAL_SALES_DB, then ./results.db
    let db_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REGIONAL_SALES_DB").ok())
        .unwrap_or_else(|| "results.db".to_string());
    let db_path = std::path::PathBuf::from(db_path);

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: regional-sales <data_dir> --db {}", db_path.display());
        eprintln!("   to store a run first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&db_path)?;
    println!("✓ Database opened: {:?}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/runs", get(get_runs))
        .route("/runs/latest", get(get_latest_run))
        .route("/runs/:run_id", get(get_run_by_id))
        .route("/runs/:run_id/reports/:name", get(get_run_report))
        .route("/reports/:name", get(get_latest_report))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   API: http://localhost:3000/api/reports/sales_by_region");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
