/// Fan-out of server messages to subscribers.
pub mod broadcast;
/// The drawings the engine rotates through.
pub mod catalog;
/// Bounded chat history.
pub mod chat;
/// Actor task owning the server state.
pub mod engine;
/// Bounded, deduplicated gallery of retired drawings.
pub mod gallery;
/// Rotation policies over the catalog.
pub mod rotation;
/// Aggregate state mutated by the engine.
pub mod server;
/// Countdown and reveal phases.
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::{clock::now_millis, config::AppConfig};

pub use self::broadcast::{BroadcastHub, Subscription};
pub use self::engine::{Engine, EngineHandle};

/// Application state shared by every handler.
pub type SharedState = Arc<AppState>;

/// Transport a viewer is connected through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerTransport {
    /// `/ws` socket.
    WebSocket,
    /// `/sse` stream.
    Sse,
}

/// Bookkeeping for one connected viewer.
#[derive(Debug, Clone)]
pub struct ViewerConnection {
    /// Registry key.
    pub id: Uuid,
    /// Transport the viewer connected through.
    pub transport: ViewerTransport,
    /// Epoch milliseconds.
    pub connected_at: u64,
}

impl ViewerConnection {
    /// Milliseconds since the viewer connected, as of `now`.
    pub fn connected_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.connected_at)
    }
}

/// Central application state: configuration, the engine handle and live viewers.
pub struct AppState {
    config: AppConfig,
    engine: EngineHandle,
    viewers: DashMap<Uuid, ViewerConnection>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, engine: EngineHandle) -> SharedState {
        Arc::new(Self {
            config,
            engine,
            viewers: DashMap::new(),
        })
    }

    /// Configuration the server was started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the drawing engine owning the shared state.
    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Record a new viewer and return its identifier.
    pub fn register_viewer(&self, transport: ViewerTransport) -> Uuid {
        let id = Uuid::new_v4();
        self.viewers.insert(
            id,
            ViewerConnection {
                id,
                transport,
                connected_at: now_millis(),
            },
        );
        id
    }

    /// Forget a viewer, returning its record when it was still registered.
    pub fn unregister_viewer(&self, id: &Uuid) -> Option<ViewerConnection> {
        let (_, viewer) = self.viewers.remove(id)?;
        info!(
            id = %id,
            transport = ?viewer.transport,
            connected_ms = viewer.connected_for(now_millis()),
            viewers = self.viewers.len(),
            "viewer disconnected"
        );
        Some(viewer)
    }

    /// Registry of connected viewers keyed by their identifier.
    pub fn viewers(&self) -> &DashMap<Uuid, ViewerConnection> {
        &self.viewers
    }

    /// Number of connected viewers using `transport`.
    pub fn viewer_count(&self, transport: ViewerTransport) -> usize {
        self.viewers
            .iter()
            .filter(|viewer| viewer.transport == transport)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::server::ServerState;

    #[tokio::test]
    async fn viewers_are_counted_per_transport() {
        let config = AppConfig::from_json_str(r#"{"catalog": ["/a.png"]}"#).unwrap();
        let engine = Engine::spawn(ServerState::new(config.engine().clone(), now_millis()));
        let state = AppState::new(config, engine.handle());

        let socket = state.register_viewer(ViewerTransport::WebSocket);
        state.register_viewer(ViewerTransport::Sse);
        state.register_viewer(ViewerTransport::Sse);
        assert_eq!(state.viewer_count(ViewerTransport::WebSocket), 1);
        assert_eq!(state.viewer_count(ViewerTransport::Sse), 2);

        let viewer = state.unregister_viewer(&socket).unwrap();
        assert_eq!(viewer.transport, ViewerTransport::WebSocket);
        assert_eq!(viewer.connected_for(viewer.connected_at + 1_500), 1_500);
        assert!(state.unregister_viewer(&socket).is_none());
        assert_eq!(state.viewers().len(), 2);

        engine.shutdown().await;
    }
}
