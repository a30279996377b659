//! Push channel: every vehicle change is forwarded to connected clients
//! as a JSON text frame.

use axum::extract::ws::{Message, WebSocket};
use shared::VehicleChanged;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub async fn forward_events(mut socket: WebSocket, mut events: broadcast::Receiver<VehicleChanged>) {
    tracing::debug!("Push subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not encode push message");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // at-most-once delivery: dropped messages are not replayed
                    tracing::warn!(skipped, "Push subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Push subscriber disconnected");
}
