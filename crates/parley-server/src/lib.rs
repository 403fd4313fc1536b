//! # parley-server
//!
//! HTTP surface for the orchestration engine:
//!
//! - `POST /api/chat` runs one turn for the web chat
//! - `POST /api/sessions/{id}/reset` and `GET /api/sessions/{id}/transcript`
//! - `GET /health`
//! - the static web chat UI from `server.web_dir`

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parley_config::ServerConfig;
use parley_core::{Attachment, ParleyError, Turn};
use parley_runtime::{Engine, InboundMessage};

/// Shared server state.
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
}

/// Chat request body, as sent by the web client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: Option<String>,
    /// Base64 image bytes, optionally as a `data:` URI.
    pub image_data: Option<String>,
    pub mime_type: Option<String>,
    pub session_id: Option<String>,
}

impl ChatRequest {
    fn attachment(&self) -> Option<Attachment> {
        let data = self.image_data.as_deref()?.trim();
        if data.is_empty() {
            return None;
        }
        // "data:image/png;base64,AAAA" carries its own mime type
        if let Some(rest) = data.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',')?;
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            return Some(Attachment::new(mime, payload));
        }
        let mime = self.mime_type.as_deref().filter(|m| !m.is_empty())?;
        Some(Attachment::new(mime, data))
    }
}

/// Chat response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub updated_history: Vec<Turn>,
}

/// Engine errors rendered as `{"error": ...}` with a matching status.
struct ApiError(ParleyError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ParleyError::EmptyInput => (StatusCode::BAD_REQUEST, self.0.user_message()),
            ParleyError::Blocked(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.user_message()),
            ParleyError::CompletionTransport(_) => {
                (StatusCode::BAD_GATEWAY, format!("Server error: {}", self.0))
            }
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Server error: {other}"),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the Axum router.
pub fn build_router(config: &ServerConfig, engine: Arc<Engine>) -> Router {
    let state = Arc::new(AppState { engine });

    let api_routes = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/{id}/reset", post(reset_handler))
        .route("/api/sessions/{id}/transcript", get(transcript_handler))
        .layer(DefaultBodyLimit::max(config.body_limit_mb * 1024 * 1024));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(api_routes);

    if config.web_ui {
        if config.web_dir.join("index.html").exists() {
            info!(path = %config.web_dir.display(), "serving web UI");
        } else {
            warn!(path = %config.web_dir.display(), "web UI enabled but index.html not found");
        }
        router = router.fallback_service(ServeDir::new(&config.web_dir));
    }

    let router = router
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if config.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: state.engine.store().session_count().await,
    })
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let msg = InboundMessage {
        attachment: req.attachment(),
        session_id: req.session_id,
        text: req.prompt,
    };
    info!(session = ?msg.session_id, image = msg.attachment.is_some(), "web chat request");

    let reply = state.engine.handle(msg).await.map_err(|e| {
        warn!(error = %e, "web chat turn failed");
        ApiError(e)
    })?;

    Ok(Json(ChatResponse {
        response: reply.response_text,
        session_id: reply.session_id,
        updated_history: reply.transcript,
    }))
}

async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    let removed = state.engine.reset(&session_id).await;
    info!(session = %session_id, removed, "session reset via API");
    Json(json!({ "sessionId": session_id, "cleared": true }))
}

async fn transcript_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<serde_json::Value> {
    let turns = state.engine.store().get(&session_id).await;
    Json(json!({ "sessionId": session_id, "turns": turns }))
}

/// Start the HTTP server.
pub async fn start_server(config: ServerConfig, engine: Arc<Engine>) -> parley_core::Result<()> {
    let listen = config.listen.clone();
    let router = build_router(&config, engine);

    info!(listen = %listen, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .map_err(|e| ParleyError::Config(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, router)
        .await
        .map_err(ParleyError::Io)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_from_fields() {
        let req = ChatRequest {
            image_data: Some("AAAA".into()),
            mime_type: Some("image/png".into()),
            ..Default::default()
        };
        let att = req.attachment().unwrap();
        assert_eq!(att.mime_type, "image/png");
        assert_eq!(att.data, "AAAA");
    }

    #[test]
    fn test_attachment_from_data_uri() {
        let req = ChatRequest {
            image_data: Some("data:image/webp;base64,UklGR".into()),
            ..Default::default()
        };
        let att = req.attachment().unwrap();
        assert_eq!(att.mime_type, "image/webp");
        assert_eq!(att.data, "UklGR");
    }

    #[test]
    fn test_attachment_requires_mime_type() {
        let req = ChatRequest {
            image_data: Some("AAAA".into()),
            ..Default::default()
        };
        assert!(req.attachment().is_none());
        assert!(ChatRequest::default().attachment().is_none());
    }
}
