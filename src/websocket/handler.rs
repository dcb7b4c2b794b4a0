use std::sync::Arc;
use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use tracing::{info, warn, debug};
use futures_util::{StreamExt, SinkExt};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::Outbox;
use super::connection::{ConnectionHandler, Flow};


/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    debug!("New WebSocket connection attempt");
    let max_message_bytes = app_state.config.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {

    // Transport-assigned identity of this participant
    let connection_id = Uuid::new_v4();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    // Everything sent to this client goes through its outbox
    let (outbox, mut outbox_rx) = Outbox::channel(app_state.config.outbox_capacity);
    let mut handler = ConnectionHandler::new(app_state, connection_id, outbox);

    let mut send_task = tokio::spawn(async move {
        let overflow = outbox_rx.overflow_signal();
        loop {
            let frame = tokio::select! {
                biased;
                _ = overflow.triggered() => {
                    // It already missed a frame, so its view of the room is stale
                    warn!("Closing connection {}: too slow to keep up with its room", connection_id);
                    break;
                }
                frame = outbox_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                debug!("Client {} went away while sending", connection_id);
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(Message::Binary(_)) => {
                    warn!("Ignoring binary frame from {}", connection_id);
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
            };

            if handler.handle_frame(&text) == Flow::Close {
                break;
            }
        }
        // Dropping the handler deregisters the participant
        handler.close();
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => {
            // Give the writer a moment to flush what is already queued
            if tokio::time::timeout(std::time::Duration::from_secs(1), &mut send_task).await.is_err() {
                send_task.abort();
            }
        }
    };
    info!("WebSocket connection {} terminated", connection_id);
}
