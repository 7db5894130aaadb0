//! HTTP API for the portfolio assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ingest/` | Embed and store text or an uploaded file |
//! | `POST` | `/api/chat/` | Nearest stored chunk, no LLM |
//! | `GET`  | `/api/vectordb/` | Stored chunk count and previews |
//! | `POST` | `/api/rag/` | Retrieval-augmented answer |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! The `/api/*` routes are served with and without the trailing slash.
//!
//! # Ingest bodies
//!
//! `POST /api/ingest/` accepts JSON (`{"text": "..."}`), a URL-encoded
//! form with a `text` field, or `multipart/form-data` with a `text` field
//! and/or a `file` part. Text wins when both are present.
//!
//! # Error Contract
//!
//! ```json
//! { "error": "No query provided." }
//! ```
//!
//! Request problems are `400`, embedding service failures during ingest
//! or chat are `502`, store failures are `500`. Completion failures on
//! `/api/rag/` are not errors: they come back as the answer text.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the portfolio site
//! can call the API from the browser.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::assistant::{Assistant, AssistantError, IngestReport, Inspection, RagAnswer};
use crate::config::Config;

/// Upper bound on request bodies; uploads are embedded whole.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    assistant: Arc<Assistant>,
}

impl AppState {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }
}

/// Build the router with every route, CORS, and request tracing.
///
/// Split from [`run_server`] so tests can serve it on an ephemeral port
/// with fake components.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ingest/", post(handle_ingest))
        .route("/api/ingest", post(handle_ingest))
        .route("/api/chat/", post(handle_chat))
        .route("/api/chat", post(handle_chat))
        .route("/api/vectordb/", get(handle_inspect))
        .route("/api/vectordb", get(handle_inspect))
        .route("/api/rag/", post(handle_rag))
        .route("/api/rag", post(handle_rag))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server.
///
/// Opens the store and builds the embedder and LLM client from `config`,
/// then binds to `[server].bind` and serves until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = Arc::new(Assistant::from_config(config)?);
    let app = build_router(AppState::new(assistant));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "portfolio assistant listening");
    println!("Listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        let status = match &err {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            AssistantError::Embedding(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

// ============ POST /api/ingest/ ============

#[derive(Deserialize, Default)]
struct IngestTextRequest {
    #[serde(default)]
    text: Option<String>,
}

/// Upload payload after body decoding, before validation.
#[derive(Default)]
struct IngestPayload {
    text: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn handle_ingest(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<IngestReport>, AppError> {
    let payload = read_ingest_payload(request, &state).await?;

    let report = match payload {
        IngestPayload {
            text: Some(text), ..
        } if !text.trim().is_empty() => state.assistant.ingest_text(&text).await?,
        IngestPayload {
            file: Some((name, bytes)),
            ..
        } => state.assistant.ingest_file(&name, bytes).await?,
        _ => return Err(AssistantError::MissingInput.into()),
    };
    Ok(Json(report))
}

async fn read_ingest_payload(request: Request, state: &AppState) -> Result<IngestPayload, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        return read_multipart(multipart).await;
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<IngestTextRequest>::from_request(request, state)
            .await
            .map_err(|e| bad_request(e.body_text()))?;
        return Ok(IngestPayload {
            text: form.text,
            file: None,
        });
    }

    let body = axum::body::Bytes::from_request(request, state)
        .await
        .map_err(|e| bad_request(e.body_text()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(IngestPayload::default());
    }
    let parsed: IngestTextRequest = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("Invalid JSON body: {}", e)))?;
    Ok(IngestPayload {
        text: parsed.text,
        file: None,
    })
}

async fn read_multipart(mut multipart: Multipart) -> Result<IngestPayload, AppError> {
    let mut payload = IngestPayload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        match field.name() {
            Some("text") => {
                payload.text = Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
                payload.file = Some((name, bytes.to_vec()));
            }
            _ => {}
        }
    }
    Ok(payload)
}

// ============ POST /api/chat/ and POST /api/rag/ ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

fn query_from(payload: Result<Json<QueryRequest>, JsonRejection>) -> Result<String, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    Ok(req.query)
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let query = query_from(payload)?;
    let response = state.assistant.chat(&query).await?;
    Ok(Json(ChatResponse { response }))
}

async fn handle_rag(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<RagAnswer>, AppError> {
    let query = query_from(payload)?;
    let answer = state.assistant.answer(&query).await?;
    Ok(Json(answer))
}

// ============ GET /api/vectordb/ ============

async fn handle_inspect(State(state): State<AppState>) -> Result<Json<Inspection>, AppError> {
    Ok(Json(state.assistant.inspect()?))
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
