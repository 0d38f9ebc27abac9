// Public API for integration tests and potential library usage

pub mod announcer;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod state;
pub mod types;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the HTTP router: the WebSocket endpoint plus the JSON API
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/broadcast", post(api::broadcast))
        .route("/api/clients", get(api::list_clients))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
