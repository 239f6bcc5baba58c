use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::messages::ServerMessage,
    error::ServiceError,
    state::{SharedState, Subscription, ViewerTransport},
};

/// Subscribe a new SSE viewer to the drawing broadcast.
pub async fn subscribe(state: &SharedState) -> Result<Subscription, ServiceError> {
    state.engine().subscribe().await
}

/// Encode a server message as one SSE event named after it, carrying the full envelope.
pub fn to_event(message: &ServerMessage) -> Result<Event, axum::Error> {
    Event::default().event(message.name()).json_data(message)
}

/// Convert a subscription into an SSE response: the snapshot first, then every broadcast.
///
/// The viewer stays registered until the client disconnects or the engine stops.
pub fn to_sse_stream(
    state: SharedState,
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);
    let viewer_id = state.register_viewer(ViewerTransport::Sse);
    info!(
        id = %viewer_id,
        sse_viewers = state.viewer_count(ViewerTransport::Sse),
        viewers = state.viewers().len(),
        "SSE viewer connected"
    );

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        let init = subscription.init_message();
        let mut events = subscription.events;
        let mut next = Some(init);

        loop {
            let message = match next.take() {
                Some(message) => message,
                None => tokio::select! {
                    _ = tx.closed() => break,
                    recv_result = events.recv() => match recv_result {
                        Ok(message) => message,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(id = %viewer_id, skipped, "SSE viewer lagging; skipped messages");
                            continue;
                        }
                    },
                },
            };

            match to_event(&message) {
                Ok(event) => {
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, event = message.name(), "failed to encode SSE event")
                }
            }
        }

        state.unregister_viewer(&viewer_id);
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
