//! HTTP Transport
//!
//! Serves the JSON-RPC dispatcher on `POST /mcp` and the REST queue surface
//! used by the dashboard:
//!
//! | route | |
//! |---|---|
//! | `GET /mcp/status` | process info |
//! | `GET /mcp/div` | all packets, newest first |
//! | `POST /mcp/div` | submit a whole packet as a new draft |
//! | `GET /mcp/div/:id` | one packet |
//! | `POST /mcp/div/:id/validate` | `{valid, error?}` |
//! | `POST /mcp/div/:id/apply` | `{ok: true}`, 400 with the report if invalid |
//! | `POST /mcp/div/:id/rollback` | `{ok: true}` |
//!
//! Every request takes the same lock and runs on the blocking pool, so the
//! engine still sees one call at a time.

use crate::packets::{Packet, PacketId};
use crate::policy::ValidationReport;
use crate::server::McpServer;
use crate::service::EngineError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Clone)]
struct HttpState {
    server: Arc<Mutex<McpServer>>,
    port: u16,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({ "error": "Not found" }),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "error": message.into() }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) => ApiError::not_found(),
            EngineError::Invalid(violation) => {
                let report = ValidationReport::from(&Err::<(), _>(violation));
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    body: serde_json::to_value(report).unwrap_or(Value::Null),
                }
            }
            other => {
                warn!("Request failed: {}", other);
                ApiError::internal(other.to_string())
            }
        }
    }
}

/// Build the router around a server.
pub fn router(server: McpServer, port: u16) -> Router {
    let state = HttpState {
        server: Arc::new(Mutex::new(server)),
        port,
    };

    Router::new()
        .route("/mcp", post(rpc))
        .route("/mcp/status", get(status))
        .route("/mcp/div", get(list_packets).post(submit_packet))
        .route("/mcp/div/:id", get(get_packet))
        .route("/mcp/div/:id/validate", post(validate_packet))
        .route("/mcp/div/:id/apply", post(apply_packet))
        .route("/mcp/div/:id/rollback", post(rollback_packet))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(server: McpServer, addr: SocketAddr) -> anyhow::Result<()> {
    let root = server.config().working_root.clone();
    let app = router(server, addr.port());

    let listener = TcpListener::bind(addr).await?;
    info!("MCP HTTP server listening on {} (root: {})", addr, root.display());

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("MCP HTTP server stopped");
    Ok(())
}

/// Run `f` against the server on the blocking pool, holding the lock.
async fn with_server<T, F>(state: &HttpState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&McpServer) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let server = Arc::clone(&state.server);
    tokio::task::spawn_blocking(move || {
        let guard = server
            .lock()
            .map_err(|_| ApiError::internal("Server lock poisoned"))?;
        f(&*guard)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Request task failed: {}", e)))?
}

async fn rpc(State(state): State<HttpState>, body: String) -> Result<Response, ApiError> {
    let response = with_server(&state, move |server| Ok(server.handle_line(&body))).await?;

    Ok(match response {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn status(State(state): State<HttpState>) -> Result<Json<Value>, ApiError> {
    let port = state.port;
    with_server(&state, move |server| {
        Ok(Json(json!({
            "status": "running",
            "port": port,
            "pid": std::process::id(),
            "cwd": server.service().root().display().to_string(),
        })))
    })
    .await
}

async fn list_packets(State(state): State<HttpState>) -> Result<Json<Vec<Packet>>, ApiError> {
    with_server(&state, |server| Ok(Json(server.service().list()?))).await
}

async fn submit_packet(
    State(state): State<HttpState>,
    Json(packet): Json<Packet>,
) -> Result<Json<Value>, ApiError> {
    with_server(&state, move |server| {
        let stored = server.service().submit(packet)?;
        Ok(Json(json!({ "ok": true, "id": stored.id })))
    })
    .await
}

async fn get_packet(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Packet>, ApiError> {
    let id = PacketId::from_string(id);
    with_server(&state, move |server| Ok(Json(server.service().get(&id)?))).await
}

async fn validate_packet(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<ValidationReport>, ApiError> {
    let id = PacketId::from_string(id);
    with_server(&state, move |server| Ok(Json(server.service().validate(&id)?))).await
}

async fn apply_packet(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = PacketId::from_string(id);
    with_server(&state, move |server| {
        server.service().apply(&id)?;
        Ok(Json(json!({ "ok": true })))
    })
    .await
}

async fn rollback_packet(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = PacketId::from_string(id);
    with_server(&state, move |server| {
        server.service().rollback(&id)?;
        Ok(Json(json!({ "ok": true })))
    })
    .await
}
