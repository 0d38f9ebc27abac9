pub mod connections;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{
    sink::{Sink, SinkExt},
    stream::StreamExt,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::types::{ConnectionHandle, Frame, TriggerContext};

/// Pending Pong replies per connection
const CONTROL_QUEUE: usize = 8;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!("WebSocket connection request from {}", peer);

    let handle = match state.connections.register(peer).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!("Rejecting WebSocket from {}: {}", peer, e);
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    let connections = state.connections.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!("WebSocket upgrade failed for {}: {}", handle, e);
        tokio::spawn(async move { connections.unregister(handle).await });
    })
    .on_upgrade(move |socket| handle_socket(socket, peer, handle, state))
}

/// Convert an outbound frame into a WebSocket message
pub fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
    }
}

/// Drain the outbound queue (and control replies such as Pong) into the
/// socket until either side goes away.
///
/// Runs as its own task so the queue keeps moving while the reader is busy
/// relaying a broadcast.
pub async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Frame>,
    mut control: mpsc::Receiver<Message>,
) where
    S: Sink<Message> + Unpin,
{
    loop {
        let message = tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => frame_to_message(frame),
                None => break,
            },
            reply = control.recv() => match reply {
                Some(reply) => reply,
                None => break,
            },
        };

        if sink.send(message).await.is_err() {
            break;
        }
    }

    let _ = sink.close().await;
}

/// Handle individual WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    peer: SocketAddr,
    handle: ConnectionHandle,
    state: Arc<AppState>,
) {
    let (sender, mut receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(state.server_config.outbound_queue);
    let (control_tx, control_rx) = mpsc::channel::<Message>(CONTROL_QUEUE);

    if !state.connections.promote(handle, outbound_tx).await {
        tracing::warn!("Connection {} vanished before upgrade completed", handle);
        return;
    }

    let mut writer = tokio::spawn(write_loop(sender, outbound_rx, control_rx));

    tracing::info!("WebSocket {} connected from {}", handle, peer);

    let welcome = Frame::text(format!("connected as {}", handle));
    if let Err(e) = state.broadcaster.send_to(handle, &welcome).await {
        tracing::warn!("Failed to queue welcome for {}: {}", handle, e);
    }

    let trigger = TriggerContext::new(peer);

    loop {
        tokio::select! {
            // Writer finished: socket broken or table closed
            _ = &mut writer => break,

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received text from {}: {}", handle, text);
                        let delivered = state
                            .broadcaster
                            .broadcast_text(Some(&trigger), text.as_str())
                            .await;
                        tracing::debug!("Relayed text from {} to {} clients", handle, delivered);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let result = state
                            .broadcaster
                            .broadcast(&Frame::binary(data.to_vec()), Some(handle))
                            .await;
                        tracing::debug!(
                            "Relayed {} bytes from {} to {}/{} clients",
                            data.len(),
                            handle,
                            result.delivered,
                            result.attempted
                        );
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if control_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket {} closed", handle);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error on {}: {}", handle, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.connections.unregister(handle).await;
    writer.abort();
    tracing::info!("WebSocket connection closed for {}", handle);
}
