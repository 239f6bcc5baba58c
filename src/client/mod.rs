//! Client-side synchronization: a view rebuilt from server messages, feed
//! connectors, and an agent that falls back to a local engine when offline.

/// Connection state machine with the offline fallback.
pub mod agent;
/// Sources of server messages.
pub mod connector;
/// Feed read from a server's `/sse` endpoint.
pub mod sse_feed;
/// View rebuilt from server messages.
pub mod view;

pub use self::agent::{AgentStatus, ClientSyncAgent, ConnectionState};
pub use self::connector::{Connector, EngineConnector, FeedError, RemoteFeed};
pub use self::sse_feed::SseConnector;
pub use self::view::ClientView;
