use futures::{
    StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};
use thiserror::Error;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;

use crate::{dto::messages::ServerMessage, error::ServiceError, state::EngineHandle};

/// Stream of server messages from one connection; the first item is expected to be `state:init`.
pub type RemoteFeed = BoxStream<'static, Result<ServerMessage, FeedError>>;

/// Errors raised while connecting to or reading from a server feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP transport failure or non-success status.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The in-process engine is not running.
    #[error("engine unavailable: {0}")]
    Engine(#[from] ServiceError),
    /// The first message of a connection was not the snapshot.
    #[error("expected state:init, got `{0}`")]
    Handshake(&'static str),
    /// The feed ended before delivering anything.
    #[error("feed closed")]
    Closed,
    /// An SSE event grew past the buffering limit before it was terminated.
    #[error("SSE event exceeds {limit} bytes")]
    EventTooLarge {
        /// Maximum buffered bytes per event.
        limit: usize,
    },
}

/// Opens feeds to a drawing server.
pub trait Connector: Send + Sync + 'static {
    /// Open a new feed; its first message must be `state:init`.
    fn connect(&self) -> BoxFuture<'static, Result<RemoteFeed, FeedError>>;
}

/// Connects directly to an engine running in the same process.
#[derive(Debug, Clone)]
pub struct EngineConnector {
    handle: EngineHandle,
}

impl EngineConnector {
    /// Connector subscribing through `handle`.
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle }
    }
}

impl Connector for EngineConnector {
    fn connect(&self) -> BoxFuture<'static, Result<RemoteFeed, FeedError>> {
        let handle = self.handle.clone();
        Box::pin(async move {
            let subscription = handle.subscribe().await?;
            let init = subscription.init_message();
            let events = BroadcastStream::new(subscription.events).filter_map(|item| async move {
                match item {
                    Ok(message) => Some(Ok::<_, FeedError>(message)),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "local feed lagging; skipped messages");
                        None
                    }
                }
            });
            Ok(stream::once(async move { Ok(init) }).chain(events).boxed())
        })
    }
}
