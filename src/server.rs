//! HTTP server: JSON tool API plus an MCP Streamable HTTP endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Store round trip; 503 when the database is unreachable |
//! | `GET`  | `/tools/list` | Registered tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool; response is `{ "result": ... }` |
//! | `*`    | `/mcp` | MCP JSON-RPC over Streamable HTTP |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "search_skills: validation error: ..." } }
//! ```
//!
//! | Failure | Status | Code |
//! |---------|--------|------|
//! | validation | 400 | `bad_request` |
//! | embeddings disabled | 400 | `embeddings_disabled` |
//! | unknown tool / skill | 404 | `not_found` |
//! | store unreachable | 503 | `unavailable` |
//! | index missing | 503 | `missing_index` |
//! | consistency fault | 500 | `consistency` |
//! | anything else | 500 | `internal` |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use skillbank_core::SkillError;

use crate::config::Config;
use crate::db;
use crate::mcp::McpBridge;
use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    ctx: Arc<ToolContext>,
    tools: Arc<ToolRegistry>,
}

/// Connect, ensure indexes, and serve until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ctx = Arc::new(ToolContext::open(config).await?);
    let tools = Arc::new(ToolRegistry::with_builtins());
    for t in tools.tools() {
        tracing::debug!(tool = t.name(), "registered tool");
    }

    let pool = ctx.library().store().pool().clone();
    let app = router(ctx, tools);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "skill server listening");
    eprintln!("Skill server listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db::close(&pool).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Build the full router. Exposed so tests can drive it without a socket.
pub fn router(ctx: Arc<ToolContext>, tools: Arc<ToolRegistry>) -> Router {
    let bridge = McpBridge::new(ctx.clone(), tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { ctx, tools })
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

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
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

fn from_skill_error(err: &SkillError, message: String) -> AppError {
    let (status, code) = match err {
        SkillError::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        SkillError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SkillError::Connectivity(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        SkillError::MissingIndex(_) => (StatusCode::SERVICE_UNAVAILABLE, "missing_index"),
        SkillError::Consistency(_) => (StatusCode::INTERNAL_SERVER_ERROR, "consistency"),
        SkillError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    AppError::new(status, code, message)
}

/// Map a tool failure onto a status code, preferring the typed error.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);
    if let Some(skill_err) = err.downcast_ref::<SkillError>() {
        return from_skill_error(skill_err, message);
    }
    if message.contains("provider is disabled") {
        return AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", message);
    }
    tracing::error!(tool = tool_name, error = %err, "tool failed");
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sqlite_version: String,
    result: i64,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let report = db::health_check(state.ctx.library().store().pool())
        .await
        .map_err(|e| {
            let message = e.to_string();
            from_skill_error(&e, message)
        })?;
    Ok(Json(HealthResponse {
        status: report.status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        sqlite_version: report.sqlite_version,
        result: report.result,
    }))
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    let params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, "bad_request", format!("{}: {}", name, e)))?;

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
