//! SSE client for the `/sse` endpoint.

use std::time::Duration;

use futures::{StreamExt, future::BoxFuture};
use reqwest::header::ACCEPT;
use tracing::{debug, warn};

use crate::{
    client::connector::{Connector, FeedError, RemoteFeed},
    dto::messages::ServerMessage,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Largest event the parser buffers; a snapshot carries up to 50 chat lines with inline avatars.
pub const MAX_EVENT_BYTES: usize = 16 * 1024 * 1024;

/// Connects to a drawing server over Server-Sent Events.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    url: String,
}

impl SseConnector {
    /// Build a connector for the server at `base_url` (e.g. `http://localhost:3001`).
    pub fn new(base_url: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/sse", base_url.trim_end_matches('/')),
        })
    }

    /// Full URL of the event stream.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for SseConnector {
    fn connect(&self) -> BoxFuture<'static, Result<RemoteFeed, FeedError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let response = client
                .get(&url)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await?
                .error_for_status()?;
            debug!(%url, "SSE feed opened");

            let mut bytes = response.bytes_stream().boxed();
            let feed = async_stream::stream! {
                let mut parser = SseParser::default();
                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            yield Err(FeedError::from(err));
                            break;
                        }
                    };
                    let events = match parser.push(&chunk) {
                        Ok(events) => events,
                        Err(err) => {
                            yield Err(err);
                            break;
                        }
                    };
                    for data in events {
                        match serde_json::from_str::<ServerMessage>(&data) {
                            Ok(message) => yield Ok(message),
                            Err(err) => warn!(error = %err, "skipping malformed SSE event"),
                        }
                    }
                }
            };
            Ok(feed.boxed())
        })
    }
}

/// Incremental `text/event-stream` decoder yielding the `data` of each complete event.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere. Comments and fields
/// other than `data` are ignored since the envelope carries the event name.
#[derive(Debug)]
pub struct SseParser {
    pending: Vec<u8>,
    data: Vec<String>,
    limit: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl SseParser {
    /// Parser refusing events that buffer more than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: Vec::new(),
            limit,
        }
    }

    /// Feed a chunk, returning the `data` of every event it completed.
    ///
    /// Fails once the unterminated event buffered so far exceeds the limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, FeedError> {
        self.pending.extend_from_slice(chunk);
        let mut complete = Vec::new();

        while let Some(newline) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw = self.pending.drain(..=newline).collect::<Vec<_>>();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    complete.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }

        let buffered = self.pending.len() + self.data.iter().map(String::len).sum::<usize>();
        if buffered > self.limit {
            self.pending.clear();
            self.data.clear();
            return Err(FeedError::EventTooLarge { limit: self.limit });
        }
        Ok(complete)
    }
}

#[cfg(test)]
mod tests {
    use tokio::{net::TcpListener, time::timeout};

    use super::*;
    use crate::{
        client::{ClientSyncAgent, ConnectionState},
        clock::now_millis,
        config::AppConfig,
        dto::chat::ChatSendRequest,
        routes,
        state::{AppState, Engine, server::ServerState},
    };

    #[test]
    fn events_split_across_chunks_are_reassembled() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"event: drawing:start\nda").unwrap().is_empty());
        assert!(parser.push(b"ta: {\"event\":\"drawing:start\",").unwrap().is_empty());
        let events = parser.push(b"\"data\":{}}\r\n\r\n:keep-alive\n\n").unwrap();
        assert_eq!(events, [r#"{"event":"drawing:start","data":{}}"#]);

        let message = serde_json::from_str::<ServerMessage>(&events[0]).unwrap();
        assert_eq!(message, ServerMessage::DrawingStart {});
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut parser = SseParser::default();
        let payload = "data: é\n\n".as_bytes();
        let (head, tail) = payload.split_at(7);
        assert!(parser.push(head).unwrap().is_empty());
        assert_eq!(parser.push(tail).unwrap(), ["é"]);
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let mut parser = SseParser::default();
        assert_eq!(
            parser.push(b"data: a\ndata:b\n\ndata: c\n\n").unwrap(),
            ["a\nb", "c"]
        );
    }

    #[test]
    fn unterminated_line_past_the_limit_fails() {
        let mut parser = SseParser::with_limit(16);
        assert!(parser.push(b"data: 0123456789").unwrap().is_empty());
        assert!(matches!(
            parser.push(b"abcdef"),
            Err(FeedError::EventTooLarge { limit: 16 })
        ));
        // The buffer was dropped, so a fresh event parses again.
        assert_eq!(parser.push(b"\ndata: ok\n\n").unwrap(), ["ok"]);
    }

    #[test]
    fn data_lines_count_towards_the_limit() {
        let mut parser = SseParser::with_limit(6);
        assert!(parser.push(b"data: 1234\n").unwrap().is_empty());
        assert!(matches!(
            parser.push(b"data: 5678\n"),
            Err(FeedError::EventTooLarge { .. })
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let connector = SseConnector::new("http://localhost:3001/").unwrap();
        assert_eq!(connector.url(), "http://localhost:3001/sse");
    }

    #[tokio::test]
    async fn agent_follows_a_served_sse_endpoint() {
        let config = AppConfig::from_json_str(r#"{"catalog": ["/a.png", "/b.png"]}"#).unwrap();
        let engine = Engine::spawn(ServerState::new(config.engine().clone(), now_millis()));
        let handle = engine.handle();
        let state = AppState::new(config.clone(), handle.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server =
            tokio::spawn(async move { axum::serve(listener, routes::router(state)).await });

        let connector = SseConnector::new(&format!("http://{addr}")).unwrap();
        let agent = ClientSyncAgent::spawn(connector, config.agent(), config.engine().clone());
        let mut status = agent.status();
        timeout(
            Duration::from_secs(5),
            status.wait_for(|status| status.connection == ConnectionState::Connected),
        )
        .await
        .unwrap()
        .unwrap();

        let message = handle
            .post_chat(ChatSendRequest {
                username: "noah".into(),
                text: "hello over sse".into(),
                color: "#4ECDC4".into(),
                avatar: None,
            })
            .await
            .unwrap();
        let synced = timeout(
            Duration::from_secs(5),
            status.wait_for(|status| status.view.chat().last() == Some(&message)),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();

        let live = handle.snapshot().await.unwrap();
        assert_eq!(synced.connection, ConnectionState::Connected);
        assert_eq!(synced.failures, 0);
        assert!(!synced.local_timer_running);
        assert_eq!(synced.view.chat(), live.chat.as_slice());
        assert_eq!(synced.view.current_drawing(), live.current_drawing.as_ref());
        assert_eq!(synced.view.gallery(), live.gallery.as_slice());

        agent.shutdown().await;
        server.abort();
        engine.shutdown().await;
    }
}
