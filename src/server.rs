//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Welcome message |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ingest` | Multipart upload of PDFs (field `files`), saved then ingested |
//! | `POST` | `/ingest_url` | Fetch and ingest one web page: `{"url": "..."}` |
//! | `POST` | `/ask` | Answer a question: `{"question": "...", "top_k": 5}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `source_fetch` (502), `generation` (502),
//! `config` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can call the API directly.
//!
//! Every request builds its own embedder, index handle, and model client
//! from the shared [`Config`]; nothing is cached between requests.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::answer;
use crate::config::{ensure_dirs, Config};
use crate::error::RagError;
use crate::ingest::{self, IngestFailure};
use crate::models::Answer;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn router(config: Arc<Config>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let upload_limit = config.server.max_upload_bytes;

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/ingest_url", post(handle_ingest_url))
        .route("/ask", post(handle_ask))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { config })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    ensure_dirs(config)?;
    let bind_addr = config.server.bind.clone();
    let app = router(Arc::new(config.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Research assistant listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::Validation(_) => StatusCode::BAD_REQUEST,
            RagError::SourceFetch { .. } | RagError::Generation(_) => StatusCode::BAD_GATEWAY,
            RagError::Config(_)
            | RagError::Embedding(_)
            | RagError::Index(_)
            | RagError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET / and /health ============

#[derive(Serialize)]
struct WelcomeResponse {
    message: String,
}

async fn handle_root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Research assistant API. POST /ingest, /ingest_url, or /ask.".to_string(),
    })
}

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

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    ingested: Vec<String>,
    failed: Vec<IngestFailure>,
    chunks: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let config = state.config.as_ref();
    ensure_dirs(config)?;

    let mut saved: Vec<PathBuf> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = sanitize_file_name(field.file_name());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload {}: {}", name, e)))?;

        let path = config.paths.documents_dir.join(&name);
        tokio::fs::write(&path, &bytes).await.map_err(RagError::from)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved upload");
        saved.push(path);
    }

    if saved.is_empty() {
        return Ok(Json(IngestResponse {
            ingested: Vec::new(),
            failed: Vec::new(),
            chunks: 0,
        }));
    }

    let report = ingest::ingest_pdfs(config, &saved).await?;
    Ok(Json(IngestResponse {
        ingested: report.ingested,
        failed: report.failed,
        chunks: report.chunks,
    }))
}

/// Reduce a client-supplied file name to a safe single path component.
fn sanitize_file_name(name: Option<&str>) -> String {
    let base = name
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        format!("upload-{}.pdf", uuid::Uuid::new_v4())
    } else {
        cleaned
    }
}

// ============ POST /ingest_url ============

#[derive(Deserialize)]
struct IngestUrlRequest {
    url: String,
}

#[derive(Serialize)]
struct IngestUrlResponse {
    ingested_url: String,
    chunks: usize,
}

async fn handle_ingest_url(
    State(state): State<AppState>,
    payload: Result<Json<IngestUrlRequest>, JsonRejection>,
) -> Result<Json<IngestUrlResponse>, AppError> {
    let Json(request) = payload?;
    if request.url.trim().is_empty() {
        return Err(bad_request("url must not be empty"));
    }

    let outcome = ingest::ingest_url(&state.config, request.url.trim()).await?;
    Ok(Json(IngestUrlResponse {
        ingested_url: outcome.source,
        chunks: outcome.chunks,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(request) = payload?;
    let answer = answer::ask(&state.config, &request.question, request.top_k).await?;
    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize_file_name(Some("C:\\Users\\me\\paper.pdf")), "paper.pdf");
        assert_eq!(sanitize_file_name(Some("my paper (v2).pdf")), "my_paper__v2_.pdf");
    }

    #[test]
    fn test_sanitize_rejects_hidden_and_empty() {
        assert_eq!(sanitize_file_name(Some(".env")), "env");
        assert!(sanitize_file_name(None).starts_with("upload-"));
        assert!(sanitize_file_name(Some("..")).starts_with("upload-"));
    }

    #[test]
    fn test_error_status_mapping() {
        let e = AppError::from(RagError::validation("x"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "bad_request");
        let e = AppError::from(RagError::source_fetch("u", "down"));
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        assert_eq!(e.code, "source_fetch");
        let e = AppError::from(RagError::Generation("t".into()));
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        let e = AppError::from(RagError::config("c"));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, "config");
    }
}
