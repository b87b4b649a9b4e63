//! HTTP server for ingestion and the retrieval tool API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/resources` | Multipart file upload, text pipeline |
//! | `POST` | `/resources/multimodal` | Multipart file upload, multimodal pipeline |
//! | `GET`  | `/tools/list` | List registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "No file provided" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500),
//! `internal` (500). Ingestion failures past input validation are logged
//! with context and surfaced as a generic `internal` error so provider and
//! datastore details never leak to clients.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! upload clients and cross-origin tool calls.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use guidebase_core::retrieve::RetrievalPolicy;

use crate::config::Config;
use crate::db;
use crate::pipeline::{self, IngestError, IngestOptions};
use crate::providers::{create_multimodal_embedder, create_text_embedder};
use crate::sqlite_store::SqliteStore;
use crate::tools::{ToolContext, ToolRegistry};

/// Shared application state passed to all route handlers.
///
/// The store and both embedding clients are built once at startup and
/// injected here; handlers never construct their own.
#[derive(Clone)]
struct AppState {
    ctx: Arc<ToolContext>,
    tools: Arc<ToolRegistry>,
    ingest_opts: Arc<IngestOptions>,
}

/// Starts the HTTP server.
///
/// Connects to the database, constructs the configured embedding providers,
/// registers the retrieval tool for the configured pipeline, and serves
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = db::connect(&config).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let text_embedder: Arc<dyn guidebase_core::embedding::TextEmbedder> =
        Arc::from(create_text_embedder(&config.embedding.text)?);
    let multimodal_embedder: Arc<dyn guidebase_core::embedding::MultimodalEmbedder> =
        Arc::from(create_multimodal_embedder(&config.embedding.multimodal)?);

    let policy = RetrievalPolicy {
        similarity_threshold: config.retrieval.similarity_threshold,
        limit: config.retrieval.limit,
    };

    let state = AppState {
        ingest_opts: Arc::new(IngestOptions::from_config(&config)),
        ctx: Arc::new(ToolContext::new(
            store,
            text_embedder,
            multimodal_embedder,
            policy,
        )),
        tools: Arc::new(ToolRegistry::for_pipeline(&config.chat.pipeline)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/resources", post(handle_upload_text))
        .route("/resources/multimodal", post(handle_upload_multimodal))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("guidebase listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

/// Generic 500 for failures whose details must not leak to clients.
fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "internal error".to_string(),
    }
}

/// Map an ingestion failure to a response: input problems are the client's
/// to fix, everything else is logged and anonymized.
fn classify_ingest_error(file_name: &str, err: IngestError) -> AppError {
    match err {
        IngestError::Input(message) => bad_request(message),
        other => {
            tracing::error!(file_name, error = %other, "ingestion failed");
            internal_error()
        }
    }
}

/// Map tool execution errors: validation failures become 400s, the rest
/// surface as tool errors.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("must not be empty") {
        bad_request(format!("{tool_name}: {msg}"))
    } else {
        tracing::error!(tool_name, error = %err, "tool execution failed");
        tool_error(format!("{tool_name}: execution failed"))
    }
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

// ============ POST /resources ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    ok: bool,
    resource_id: String,
}

/// Pull the `file` field out of a multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|name| name.to_string())
            .ok_or_else(|| bad_request("No file provided"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(bad_request("No file provided"))
}

async fn handle_upload_text(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;

    let resource_id = pipeline::ingest_text(
        state.ctx.store.as_ref(),
        state.ctx.text_embedder.as_ref(),
        &state.ingest_opts,
        &file_name,
        &bytes,
        chrono::Utc::now().timestamp(),
    )
    .await
    .map_err(|e| classify_ingest_error(&file_name, e))?;

    Ok(Json(UploadResponse {
        ok: true,
        resource_id,
    }))
}

async fn handle_upload_multimodal(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;

    let resource_id = pipeline::ingest_multimodal(
        state.ctx.store.as_ref(),
        state.ctx.multimodal_embedder.as_ref(),
        &state.ingest_opts,
        &file_name,
        &bytes,
        chrono::Utc::now().timestamp(),
    )
    .await
    .map_err(|e| classify_ingest_error(&file_name, e))?;

    Ok(Json(UploadResponse {
        ok: true,
        resource_id,
    }))
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            parameters: t.parameters_schema(),
        })
        .collect();

    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {name}")))?;

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
