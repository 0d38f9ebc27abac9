//! HTTP API endpoints for server-initiated pushes and inspection.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::broadcast::BroadcastError;
use crate::state::AppState;
use crate::types::Frame;
use crate::ws::connections::ConnectionInfo;

/// Body of a push request
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientsResponse {
    pub count: usize,
    pub max_clients: usize,
    pub clients: Vec<ConnectionInfo>,
}

/// Push a text message to every connected client.
///
/// POST /api/broadcast
///
/// Returns `{ "attempted": n, "delivered": m }`. There is no originator, so
/// nobody is skipped.
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BroadcastRequest>,
) -> Response {
    match state
        .broadcaster
        .try_broadcast(&Frame::text(request.text), None)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(BroadcastError::EmptyMessage) => {
            (StatusCode::BAD_REQUEST, "Message must not be empty").into_response()
        }
        Err(e) => {
            tracing::warn!("API broadcast abandoned: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// List the connections currently known to the server.
///
/// GET /api/clients
pub async fn list_clients(State(state): State<Arc<AppState>>) -> Json<ClientsResponse> {
    let clients = state.connections.list().await;

    Json(ClientsResponse {
        count: clients.len(),
        max_clients: state.broadcaster.config().max_clients,
        clients,
    })
}
