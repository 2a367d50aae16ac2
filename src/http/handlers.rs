use super::state::AppState;
use crate::session::SessionOrchestrator;
use crate::transport::{decode_ws_message, InboundMessage, TransportLink, WebSocketLink};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_sessions: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            active_sessions: state.registry.len().await,
            timestamp: Utc::now(),
        }),
    )
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.registry.stats().await))
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&session_id).await {
        Some(session) => (StatusCode::OK, Json(session.stats().await)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session {} not found", session_id),
            }),
        )
            .into_response(),
    }
}

/// GET / and GET /media
/// Upgrade to the call's media WebSocket
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_call(socket, state))
}

/// Drive one call from accept to transport close
async fn run_call(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();
    let link = WebSocketLink::spawn(sink, state.transport.framing);
    let format = state.transport.format();
    let transport: Arc<dyn TransportLink> = link.clone();

    let session = match SessionOrchestrator::start(
        transport,
        state.services.clone(),
        (*state.session_config).clone(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start session: {}", e);
            return;
        }
    };

    state.registry.insert(Arc::clone(&session)).await;

    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                link.mark_closed();
                session
                    .handle_inbound(InboundMessage::Error(e.to_string()))
                    .await;
                break;
            }
        };

        let Some(inbound) = decode_ws_message(message, format) else {
            continue;
        };

        let closing = matches!(inbound, InboundMessage::Closed);
        if closing {
            link.mark_closed();
        }

        session.handle_inbound(inbound).await;

        if closing {
            break;
        }
    }

    info!("[{}] Connection closed", session.id());
    link.mark_closed();
    session.close("transport closed").await;
    state.registry.remove(session.id()).await;
    link.close().await;
}
