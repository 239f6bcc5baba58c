use tokio::sync::broadcast;
use tracing::trace;

use crate::dto::messages::{ServerMessage, StateSnapshot};

/// Fan-out hub for server messages, backed by a Tokio broadcast channel.
///
/// Publishing never blocks: a subscriber that falls more than `capacity`
/// messages behind observes a lag and skips ahead.
#[derive(Debug)]
pub struct BroadcastHub {
    sender: broadcast::Sender<ServerMessage>,
}

impl BroadcastHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.sender.subscribe()
    }

    /// Send a message to all current subscribers, ignoring the no-subscriber case.
    pub fn publish(&self, message: ServerMessage) {
        let event = message.name();
        match self.sender.send(message) {
            Ok(receivers) => trace!(event, receivers, "published"),
            Err(_) => trace!(event, "published with no subscribers"),
        }
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A new viewer's starting point: the full state, then every change after it.
///
/// Both halves are taken together by the engine so no message falls between
/// the snapshot and the first received event. Dropping the subscription
/// unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    /// State at the moment of subscribing.
    pub snapshot: StateSnapshot,
    /// Messages published after the snapshot.
    pub events: broadcast::Receiver<ServerMessage>,
}

impl Subscription {
    /// The snapshot wrapped in its `state:init` envelope.
    pub fn init_message(&self) -> ServerMessage {
        ServerMessage::StateInit(self.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber_in_order() {
        let hub = BroadcastHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(ServerMessage::DrawingStart {});
        hub.publish(ServerMessage::DrawingComplete {});

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.recv().await.unwrap(), ServerMessage::DrawingStart {});
            assert_eq!(receiver.recv().await.unwrap(), ServerMessage::DrawingComplete {});
        }
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let hub = BroadcastHub::new(1);
        hub.publish(ServerMessage::DrawingStart {});
        let receiver = hub.subscribe();
        drop(receiver);
        hub.publish(ServerMessage::DrawingStart {});
        assert_eq!(hub.subscriber_count(), 0);
    }
}
