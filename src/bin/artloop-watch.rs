//! Follow a drawing server from the terminal, falling back to a local timer when it is unreachable.
//!
//! Usage: `artloop-watch [SERVER_URL]` (defaults to `ARTLOOP_SERVER_URL` or `http://localhost:3001`).

use std::env;

use anyhow::Context;
use artloop_back::{
    client::{AgentStatus, ClientSyncAgent, ConnectionState, SseConnector},
    clock::now_millis,
    config::AppConfig,
};
use tracing::{info, warn};

const DEFAULT_SERVER_URL: &str = "http://localhost:3001";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server_url = env::args()
        .nth(1)
        .or_else(|| env::var("ARTLOOP_SERVER_URL").ok())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let config = AppConfig::load().context("loading configuration")?;
    let connector = SseConnector::new(&server_url).context("building HTTP client")?;
    info!(url = connector.url(), "watching drawing server");

    let agent = ClientSyncAgent::spawn(connector, config.agent(), config.engine().clone());
    let mut status = agent.status();
    let mut last = Rendered::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("client sync agent stopped");
                    break;
                }
                let current = status.borrow_and_update().clone();
                last = render(&current, last);
            }
        }
    }

    agent.shutdown().await;
    Ok(())
}

/// Fields worth a log line when they change.
#[derive(Debug, Default, PartialEq, Eq)]
struct Rendered {
    connection: Option<ConnectionState>,
    seconds: u32,
    drawing: Option<String>,
    gallery: usize,
    chat: usize,
    drawing_in_progress: bool,
}

fn render(status: &AgentStatus, previous: Rendered) -> Rendered {
    let view = &status.view;
    let next = Rendered {
        connection: Some(status.connection),
        seconds: view.seconds_remaining(now_millis()),
        drawing: view.current_drawing().map(|entry| entry.to_string()),
        gallery: view.gallery().len(),
        chat: view.chat().len(),
        drawing_in_progress: view.is_drawing(),
    };

    if next.connection != previous.connection {
        info!(
            connection = ?status.connection,
            failures = status.failures,
            local_timer = status.local_timer_running,
            "connection changed"
        );
    }
    if next.drawing != previous.drawing {
        info!(
            drawing = next.drawing.as_deref().unwrap_or("-"),
            gallery = next.gallery,
            "new drawing"
        );
    }
    if next.chat > previous.chat {
        if let Some(message) = view.chat().last() {
            info!(username = %message.username, text = %message.text, "chat");
        }
    }
    if next.drawing_in_progress && !previous.drawing_in_progress {
        info!("avatar is drawing");
    } else if !next.drawing_in_progress && next.seconds != previous.seconds {
        info!(seconds = next.seconds, "next drawing in");
    }

    next
}
