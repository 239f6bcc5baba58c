use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::messages::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::drawing_service,
    state::{SharedState, Subscription, ViewerTransport},
};

/// Internal error type for viewer socket operations.
#[derive(Debug, Error)]
enum ViewerError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Inbound frame is not a known client message.
    #[error("malformed client message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Error from the drawing engine.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle for an individual viewer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let subscription = match state.engine().subscribe().await {
        Ok(subscription) => subscription,
        Err(err) => {
            warn!(error = %err, "cannot subscribe websocket viewer");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let viewer_id = state.register_viewer(ViewerTransport::WebSocket);
    info!(
        id = %viewer_id,
        websocket_viewers = state.viewer_count(ViewerTransport::WebSocket),
        viewers = state.viewers().len(),
        "viewer connected"
    );

    let forward_task = match forward_events(viewer_id, subscription, outbound_tx.clone()) {
        Ok(task) => task,
        Err(err) => {
            info!(id = %viewer_id, error = %err, "connection closed before the snapshot was sent");
            state.unregister_viewer(&viewer_id);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Err(err) = handle_text(&state, &text).await {
                    warn!(id = %viewer_id, error = %err, "ignoring viewer message");
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(id = %viewer_id, "viewer closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(id = %viewer_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forward_task.abort();
    state.unregister_viewer(&viewer_id);

    finalize(writer_task, outbound_tx).await;
}

/// Queue the snapshot, then spawn a task relaying every subsequent broadcast to the writer.
fn forward_events(
    viewer_id: Uuid,
    subscription: Subscription,
    tx: mpsc::UnboundedSender<Message>,
) -> Result<JoinHandle<()>, ViewerError> {
    send_message_to_websocket(&tx, &subscription.init_message())?;

    let mut events = subscription.events;
    Ok(tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(message) => {
                    if send_message_to_websocket(&tx, &message).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(id = %viewer_id, skipped, "viewer lagging; skipped messages");
                }
                Err(RecvError::Closed) => {
                    let _ = tx.send(Message::Close(None));
                    break;
                }
            }
        }
    }))
}

async fn handle_text(state: &SharedState, text: &str) -> Result<(), ViewerError> {
    match serde_json::from_str::<ClientMessage>(text)? {
        ClientMessage::ChatSend(request) => {
            drawing_service::post_chat(state, request).await?;
        }
    }
    Ok(())
}

/// Serialize a server message and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message_to_websocket(
    tx: &mpsc::UnboundedSender<Message>,
    message: &ServerMessage,
) -> Result<(), ViewerError> {
    let payload = match serde_json::to_string(message) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, event = message.name(), "failed to serialize message");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ViewerError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
