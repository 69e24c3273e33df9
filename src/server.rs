//! HTTP server: the upload/ask page and its JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Upload and question page |
//! | `POST` | `/upload` | Multipart upload, repeatable `files` field |
//! | `POST` | `/ask` | `{ "query": "..." }` → answer |
//! | `GET`  | `/files` | Stored file metadata |
//! | `GET`  | `/health` | Health check (version, backend, file count, cache size) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Please enter a question." } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_files` (404), `internal` (500).

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::ingest::{self, IngestError};
use crate::models::{FileInfo, UploadedFile};
use crate::query::{QueryEngine, QueryError};
use crate::store;
use crate::summarize::Summarizer;

const UI_PAGE: &str = include_str!("ui.html");

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<QueryEngine>,
}

/// Starts the server on `[server].bind` and runs until Ctrl-C.
///
/// The summarizer is created once here and torn down after the server stops.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let summarizer = Arc::new(Summarizer::from_config(&config.summarizer)?);
    let engine = Arc::new(QueryEngine::new(
        summarizer.clone(),
        config.summarizer.cache_summaries,
    ));
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Project Chat listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped, releasing models");
    summarizer.shutdown().await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/", get(handle_index))
        .route("/upload", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/files", get(handle_files))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
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

/// User-input errors become 400s, an empty store becomes 404, anything
/// else (storage, model backends) is a 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<QueryError>() {
            return match e {
                QueryError::EmptyQuery => bad_request("Please enter a question."),
                QueryError::NoFiles => AppError {
                    status: StatusCode::NOT_FOUND,
                    code: "no_files",
                    message: e.to_string(),
                },
            };
        }
        if let Some(e) = err.downcast_ref::<IngestError>() {
            return bad_request(e.to_string());
        }

        tracing::error!(error = %format!("{:#}", err), "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: format!("{:#}", err),
        }
    }
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(UI_PAGE)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    summarizer: String,
    files: i64,
    cached_summaries: usize,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        summarizer: state.engine.provider().to_string(),
        files: store::count_files(&state.config).await?,
        cached_summaries: state.engine.cached_summaries().await,
    }))
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    uploaded: Vec<UploadedFile>,
    message: String,
}

struct IncomingFile {
    name: String,
    declared_type: Option<String>,
    bytes: Vec<u8>,
}

/// Accepts every part that carries a file name. All names are checked before
/// anything is stored, so a rejected extension stores nothing.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut incoming = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        // Browsers send an empty, nameless part when no file is chosen.
        let name = match field.file_name() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => continue,
        };
        let declared_type = field.content_type().map(|t| t.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        incoming.push(IncomingFile {
            name,
            declared_type,
            bytes: bytes.to_vec(),
        });
    }

    if incoming.is_empty() {
        return Err(bad_request("Please upload at least one file."));
    }
    if let Some(rejected) = incoming
        .iter()
        .find(|f| !crate::mime::is_accepted_upload(&f.name))
    {
        return Err(bad_request(
            IngestError::NotAccepted(rejected.name.clone()).to_string(),
        ));
    }

    let mut uploaded = Vec::new();
    for file in &incoming {
        uploaded.extend(
            ingest::upload(
                &state.config,
                &file.name,
                file.declared_type.as_deref(),
                &file.bytes,
            )
            .await?,
        );
    }

    Ok(Json(UploadResponse {
        uploaded,
        message: "Files uploaded and processed successfully".to_string(),
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    file_id: i64,
    file_name: String,
    summary: String,
    score: f64,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let answer = state.engine.answer(&state.config, &req.query).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        file_id: answer.file_id,
        file_name: answer.file_name,
        summary: answer.summary,
        score: answer.score,
    }))
}

// ============ GET /files ============

#[derive(Serialize)]
struct FilesResponse {
    files: Vec<FileInfo>,
}

async fn handle_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, AppError> {
    let files = store::list_file_info(&state.config).await?;
    Ok(Json(FilesResponse { files }))
}
