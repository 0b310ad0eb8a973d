//! HTTP driver: dashboard JSON endpoints and the CSV upload trigger.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::db::{get_connection, open_existing};
use crate::error::Result;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};
use crate::reports::{self, AnomalyRow, BreakdownItem, Dashboard, MonthlyTrend};
use crate::settings::Settings;

pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;
pub const UPLOAD_FAILED: &str = "Error processing file. Please check file format and column names.";

pub struct AppState {
    pub settings: Settings,
    /// Held for the whole of a pipeline run; uploads queue behind it.
    run_lock: Mutex<()>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            run_lock: Mutex::new(()),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/breakdown", get(breakdown))
        .route("/api/monthly", get(monthly))
        .route("/api/anomalies", get(anomaly_list))
        .route("/upload", post(upload))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.server_addr.clone();
    let state = Arc::new(AppState::new(settings));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "dashboard listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

/// Run a read query on a blocking thread. No database yet and storage
/// failures both degrade to an empty result so the dashboard keeps rendering.
async fn query<T, F>(state: &AppState, what: &'static str, f: F) -> T
where
    T: Default + Send + 'static,
    F: FnOnce(&rusqlite::Connection, f64) -> Result<T> + Send + 'static,
{
    let db_path = state.settings.db_path();
    let threshold = state.settings.breakdown_threshold;
    let result = tokio::task::spawn_blocking(move || match open_existing(&db_path)? {
        Some(conn) => f(&conn, threshold),
        None => Ok(T::default()),
    })
    .await;
    match result {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            warn!(query = what, error = %e, "query failed, serving empty result");
            T::default()
        }
        Err(e) => {
            warn!(query = what, error = %e, "query task failed, serving empty result");
            T::default()
        }
    }
}

async fn dashboard(State(state): State<Arc<AppState>>) -> Json<Dashboard> {
    Json(query(&state, "dashboard", |conn, threshold| reports::dashboard(conn, threshold)).await)
}

async fn breakdown(State(state): State<Arc<AppState>>) -> Json<Vec<BreakdownItem>> {
    Json(
        query(&state, "breakdown", |conn, threshold| {
            reports::category_breakdown(conn, threshold)
        })
        .await,
    )
}

async fn monthly(State(state): State<Arc<AppState>>) -> Json<MonthlyTrend> {
    Json(query(&state, "monthly", |conn, _| reports::monthly_trend(conn)).await)
}

async fn anomaly_list(State(state): State<Arc<AppState>>) -> Json<Vec<AnomalyRow>> {
    Json(query(&state, "anomalies", |conn, _| reports::anomalies(conn)).await)
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

fn is_csv(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Keep only characters that are safe in a single path component.
fn secure_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn run_pipeline(settings: &Settings, path: &Path) -> Result<PipelineReport> {
    let config = PipelineConfig::load(settings)?;
    let mut conn = get_connection(&settings.db_path())?;
    Ok(Pipeline::new(config).run_file(path, &mut conn)?.report)
}

/// The temporary copy is deleted on every path out of here, including a
/// failed write.
fn process_upload(settings: &Settings, filename: &str, data: &[u8]) -> Result<PipelineReport> {
    let uploads = settings.uploads_dir();
    std::fs::create_dir_all(&uploads)?;
    let mut temp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&format!("-{}", secure_filename(filename)))
        .tempfile_in(&uploads)?;
    temp.write_all(data)?;
    temp.flush()?;

    let result = run_pipeline(settings, temp.path());
    let temp_path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!(path = %temp_path.display(), error = %e, "could not remove temporary upload");
    }
    result
}

/// POST /upload - replace the dataset with an uploaded CSV
///
/// Expects a multipart form with a `file` field whose name ends in `.csv`.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> std::result::Result<Response, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read file data"))?;
        file = Some((filename, bytes.to_vec()));
    }

    let Some((filename, data)) = file else {
        return Ok(Redirect::to("/").into_response());
    };
    if filename.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }
    if !is_csv(&filename) {
        return Err(AppError::bad_request("Only .csv files are accepted"));
    }

    let _guard = state.run_lock.lock().await;
    let settings = state.settings.clone();
    let name = filename.clone();
    let outcome = tokio::task::spawn_blocking(move || process_upload(&settings, &name, &data))
        .await
        .map_err(|e| {
            error!(error = %e, "pipeline task panicked");
            AppError::internal(UPLOAD_FAILED)
        })?;

    match outcome {
        Ok(report) => {
            info!(
                file = %filename,
                kept = report.rows_kept,
                dropped = report.rejected.len(),
                anomalies = report.anomalies,
                "upload processed"
            );
            Ok(Redirect::to("/").into_response())
        }
        Err(e) => {
            error!(file = %filename, error = %e, "upload processing failed");
            Ok((StatusCode::UNPROCESSABLE_ENTITY, UPLOAD_FAILED).into_response())
        }
    }
}
