//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::domain::EventBus;

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The subscription is registered before the upgrade completes, so no event
/// published after the handshake is missed.
pub async fn ws_handler(ws: WebSocketUpgrade, State(event_bus): State<EventBus>) -> impl IntoResponse {
    let subscriber = event_bus.subscribe();
    ws.on_upgrade(move |socket| run_connection(socket, subscriber))
}
