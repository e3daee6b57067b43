//! HTTP front end.
//!
//! Serves the pipeline over a small JSON API. The pipeline lives behind a
//! [`tokio::sync::RwLock`]: questions take the read lock and run in
//! parallel. Ingestion and uploads are serialized by a separate writer mutex;
//! they stage the next generation under the read lock, save it, and take the
//! write lock only to swap it in. File system work runs on the blocking pool.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/ask` | Answer a question, log it to the session |
//! | `POST` | `/api/upload` | Save uploaded text files and append them to the index |
//! | `POST` | `/api/ingest` | Ingest server-local paths |
//! | `GET`  | `/api/history` | Events of one session (`?session_id=`) |
//! | `GET`  | `/api/sessions` | Known session ids, most recent first |
//! | `GET`  | `/api/stats` | Index statistics |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use grounded_qa_core::models::{IngestStats, QAResult, RawDocument};
use grounded_qa_core::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::ask::{answer, log_result};
use crate::config::Config;
use crate::history::{SessionEvent, SessionLog, DEFAULT_SESSION};
use crate::ingest::{ingest_paths, stage_ingest};
use crate::snapshot::open_pipeline;
use crate::stats::IndexStats;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pipeline: Arc<RwLock<Pipeline>>,
    /// Held by an upload or ingest from its first write to its commit.
    writer: Arc<Mutex<()>>,
    history: SessionLog,
}

impl AppState {
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        let history = SessionLog::new(&config.history.dir);
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(RwLock::new(pipeline)),
            writer: Arc::new(Mutex::new(())),
            history,
        }
    }
}

/// All routes with permissive CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/ask", post(handle_ask))
        .route("/api/upload", post(handle_upload))
        .route("/api/ingest", post(handle_ingest))
        .route("/api/history", get(handle_history))
        .route("/api/sessions", get(handle_sessions))
        .route("/api/stats", get(handle_stats))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(state)
}

/// Load the index and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pipeline = open_pipeline(config)?;
    let app = build_router(AppState::new(config.clone(), pipeline));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: format!("{:#}", err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

async fn handle_not_found() -> AppError {
    not_found("no such route")
}

/// Run blocking file work off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .context("blocking task failed")?;
    Ok(result?)
}

/// Stage `docs` against the current generation, save it, then swap it in.
/// Callers must hold `state.writer`.
async fn ingest_documents(
    state: &AppState,
    docs: Vec<RawDocument>,
    append: bool,
) -> Result<IngestStats, AppError> {
    let current = state.pipeline.clone().read_owned().await;
    let config = state.config.clone();
    let staged = run_blocking(move || stage_ingest(&config, &current, &docs, append)).await?;
    let stats = state.pipeline.write().await.commit(staged)?;
    Ok(stats)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
    top_k: Option<usize>,
    session_id: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<QAResult>, AppError> {
    let Json(req) = payload?;
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let top_k = req.top_k.unwrap_or(state.config.retrieval.top_k);
    if top_k == 0 {
        return Err(bad_request("top_k must be >= 1"));
    }
    let session_id = session_or_default(req.session_id.as_deref());

    let result = {
        let pipeline = state.pipeline.read().await;
        answer(&pipeline, question, top_k)
    };
    let history = state.history.clone();
    let session_id = session_id.to_string();
    let logged = result.clone();
    run_blocking(move || log_result(&history, &session_id, &logged)).await?;

    Ok(Json(result))
}

fn session_or_default(session_id: Option<&str>) -> &str {
    match session_id.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => DEFAULT_SESSION,
    }
}

// ============ POST /api/upload ============

#[derive(Deserialize)]
struct UploadFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct UploadRequest {
    #[serde(default)]
    files: Vec<UploadFile>,
}

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    saved_paths: Vec<String>,
    stats: IngestStats,
}

/// Reduce an uploaded file name to a safe base name.
fn safe_upload_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    let kept: String = base
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect();
    let kept = kept.trim();
    if kept.is_empty() || kept.chars().all(|c| c == '.') {
        "uploaded.txt".to_string()
    } else {
        kept.to_string()
    }
}

fn write_uploads(upload_dir: &Path, files: &[UploadFile]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(upload_dir)
        .with_context(|| format!("Failed to create upload dir: {}", upload_dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::with_capacity(files.len());
    for file in files {
        let path = upload_dir.join(safe_upload_name(&file.name));
        std::fs::write(&path, &file.content)
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

async fn handle_upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let Json(req) = payload?;
    if req.files.is_empty() {
        return Err(bad_request("files must not be empty"));
    }

    // Same-named uploads overwrite each other's files, so the write and the
    // ingest that reads it back happen under one writer hold.
    let _writer = state.writer.lock().await;
    let config = state.config.clone();
    let files = req.files;
    let (paths, docs) = run_blocking(move || {
        let paths = write_uploads(&config.server.upload_dir, &files)?;
        let docs = ingest_paths(&paths, &config.ingest)?;
        Ok((paths, docs))
    })
    .await?;

    let stats = ingest_documents(&state, docs, true).await?;
    tracing::info!(files = paths.len(), chunks = stats.chunks, "ingested upload");

    Ok(Json(UploadResponse {
        status: "ok",
        saved_paths: paths.iter().map(|p| p.display().to_string()).collect(),
        stats,
    }))
}

// ============ POST /api/ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    paths: Vec<PathBuf>,
    #[serde(default)]
    append: bool,
}

#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    #[serde(flatten)]
    stats: IngestStats,
}

async fn handle_ingest(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(req) = payload?;
    if req.paths.is_empty() {
        return Err(bad_request("paths must not be empty"));
    }

    let _writer = state.writer.lock().await;
    let config = state.config.clone();
    let paths = req.paths;
    let docs = run_blocking(move || ingest_paths(&paths, &config.ingest)).await?;
    let stats = ingest_documents(&state, docs, req.append).await?;

    Ok(Json(IngestResponse {
        status: "ok",
        stats,
    }))
}

// ============ GET /api/history, /api/sessions ============

#[derive(Deserialize)]
struct HistoryQuery {
    session_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    history: Vec<SessionEvent>,
}

async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let session_id = session_or_default(query.session_id.as_deref()).to_string();
    let limit = query.limit.unwrap_or(state.config.history.limit);
    let log = state.history.clone();
    let id = session_id.clone();
    let history = run_blocking(move || log.read(&id, limit)).await?;
    Ok(Json(HistoryResponse {
        session_id,
        history,
    }))
}

#[derive(Serialize)]
struct SessionsResponse {
    sessions: Vec<String>,
}

async fn handle_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, AppError> {
    let log = state.history.clone();
    let sessions = run_blocking(move || log.list_sessions()).await?;
    Ok(Json(SessionsResponse { sessions }))
}

// ============ GET /api/stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<IndexStats> {
    let pipeline = state.pipeline.read().await;
    Json(IndexStats::from_chunks(pipeline.chunks()))
}
