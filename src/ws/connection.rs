//! Per-connection relay loop.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::domain::Subscriber;

/// Relays frames from `subscriber` to the socket until either side goes
/// away.
///
/// - Client text and binary messages are ignored; pings are answered by
///   the transport.
/// - The subscription ends when the bus drops it (buffer overflow) or the
///   client closes the socket. Either way the [`Subscriber`] is dropped on
///   return, which unregisters it.
pub async fn run_connection(socket: WebSocket, mut subscriber: Subscriber) {
    let subscriber_id = subscriber.id();
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!(%subscriber_id, "ws connection opened");

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            // Frame from EventBus
            frame = subscriber.recv() => {
                let Some(frame) = frame else {
                    tracing::info!(%subscriber_id, "ws subscriber dropped by event bus");
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                if ws_tx.send(Message::text(frame.as_ref())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(%subscriber_id, "ws connection closed");
}
