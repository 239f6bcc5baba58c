use futures::StreamExt;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc, watch,
    },
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    client::{
        connector::{Connector, FeedError, RemoteFeed},
        view::ClientView,
    },
    clock::now_millis,
    config::{AgentSettings, EngineSettings},
    dto::messages::{ServerMessage, StateSnapshot},
    state::{Engine, server::ServerState},
};

/// Connection state of a [`ClientSyncAgent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to reach the server.
    Connecting,
    /// Receiving the server's feed.
    Connected,
    /// The server is unreachable and a local engine drives the view.
    Offline,
}

/// Everything a UI needs to render the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    /// Where the view currently comes from.
    pub connection: ConnectionState,
    /// Consecutive failed attempts in the current connection budget.
    pub failures: u32,
    /// Whether the offline engine is running.
    pub local_timer_running: bool,
    /// State to render.
    pub view: ClientView,
}

#[derive(Debug)]
enum AgentCommand {
    Retry,
    Shutdown,
}

/// Keeps a [`ClientView`] in sync with a drawing server, falling back to a
/// local engine when the server cannot be reached.
pub struct ClientSyncAgent {
    commands: mpsc::Sender<AgentCommand>,
    status: watch::Receiver<AgentStatus>,
    task: JoinHandle<()>,
}

impl ClientSyncAgent {
    /// Spawn the agent task; it starts connecting immediately.
    ///
    /// `engine` configures the local fallback engine.
    pub fn spawn<C: Connector>(
        connector: C,
        settings: AgentSettings,
        engine: EngineSettings,
    ) -> Self {
        let view = ClientView::new(engine.chat_max);
        let (status_tx, status_rx) = watch::channel(AgentStatus {
            connection: ConnectionState::Connecting,
            failures: 0,
            local_timer_running: false,
            view: view.clone(),
        });
        let (commands_tx, commands_rx) = mpsc::channel(8);

        let task = AgentTask {
            connector,
            settings,
            engine,
            view,
            connection: ConnectionState::Connecting,
            failures: 0,
            local: None,
            status: status_tx,
            commands: commands_rx,
        };

        Self {
            commands: commands_tx,
            status: status_rx,
            task: tokio::spawn(task.run()),
        }
    }

    /// Subscribe to status changes.
    pub fn status(&self) -> watch::Receiver<AgentStatus> {
        self.status.clone()
    }

    /// Latest published status.
    pub fn current(&self) -> AgentStatus {
        self.status.borrow().clone()
    }

    /// Reset the failure budget, stop any local engine and reconnect.
    pub async fn retry(&self) -> bool {
        self.commands.send(AgentCommand::Retry).await.is_ok()
    }

    /// Stop the agent and its local engine, if any.
    pub async fn shutdown(self) {
        if self.commands.send(AgentCommand::Shutdown).await.is_err() {
            debug!("client sync agent already stopped");
        }
        if let Err(err) = self.task.await {
            warn!(error = %err, "client sync agent ended abnormally");
        }
    }
}

struct LocalFallback {
    engine: Engine,
    events: broadcast::Receiver<ServerMessage>,
}

enum Phase {
    Connecting,
    Connected(RemoteFeed),
    Offline,
    Stopped,
}

enum Wake {
    Command(Option<AgentCommand>),
    TimedOut,
    Attempt(Result<(RemoteFeed, StateSnapshot), FeedError>),
    Local(Result<ServerMessage, RecvError>),
}

struct AgentTask<C> {
    connector: C,
    settings: AgentSettings,
    engine: EngineSettings,
    view: ClientView,
    connection: ConnectionState,
    failures: u32,
    local: Option<LocalFallback>,
    status: watch::Sender<AgentStatus>,
    commands: mpsc::Receiver<AgentCommand>,
}

impl<C: Connector> AgentTask<C> {
    async fn run(mut self) {
        let mut phase = Phase::Connecting;
        loop {
            phase = match phase {
                Phase::Connecting => self.connecting().await,
                Phase::Connected(feed) => self.connected(feed).await,
                Phase::Offline => self.offline().await,
                Phase::Stopped => break,
            };
        }
        self.stop_local().await;
        debug!("client sync agent stopped");
    }

    async fn connecting(&mut self) -> Phase {
        self.connection = ConnectionState::Connecting;
        self.failures = 0;
        self.publish();

        let mut deadline = Instant::now() + self.settings.connection_timeout;
        let mut next_attempt = Instant::now();

        loop {
            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => Wake::Command(command),
                _ = sleep_until(deadline) => Wake::TimedOut,
                result = handshake(&self.connector, next_attempt) => Wake::Attempt(result),
            };

            match wake {
                Wake::Command(Some(AgentCommand::Retry)) => {
                    info!("retry requested; resetting connection budget");
                    self.failures = 0;
                    self.publish();
                    deadline = Instant::now() + self.settings.connection_timeout;
                    next_attempt = Instant::now();
                }
                Wake::Command(Some(AgentCommand::Shutdown) | None) => return Phase::Stopped,
                Wake::TimedOut => {
                    warn!(
                        timeout_ms = self.settings.connection_timeout.as_millis() as u64,
                        "no handshake before the connection timeout; going offline"
                    );
                    return Phase::Offline;
                }
                Wake::Attempt(Ok((feed, snapshot))) => {
                    self.stop_local().await;
                    self.view.apply(&ServerMessage::StateInit(snapshot));
                    return Phase::Connected(feed);
                }
                Wake::Attempt(Err(err)) => {
                    self.failures += 1;
                    warn!(
                        attempt = self.failures,
                        max = self.settings.max_retry_attempts,
                        error = %err,
                        "connection attempt failed"
                    );
                    self.publish();
                    if self.failures >= self.settings.max_retry_attempts {
                        return Phase::Offline;
                    }
                    next_attempt = Instant::now() + self.settings.retry_delay;
                }
                Wake::Local(_) => {}
            }
        }
    }

    async fn connected(&mut self, mut feed: RemoteFeed) -> Phase {
        self.connection = ConnectionState::Connected;
        self.failures = 0;
        info!("connected to drawing server");
        self.publish();

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(AgentCommand::Retry) => {
                        info!("retry requested; reconnecting");
                        return Phase::Connecting;
                    }
                    Some(AgentCommand::Shutdown) | None => return Phase::Stopped,
                },
                item = feed.next() => match item {
                    Some(Ok(message)) => {
                        self.view.apply(&message);
                        self.publish();
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "feed failed; reconnecting");
                        return Phase::Connecting;
                    }
                    None => {
                        info!("feed ended; reconnecting");
                        return Phase::Connecting;
                    }
                },
            }
        }
    }

    async fn offline(&mut self) -> Phase {
        self.connection = ConnectionState::Offline;
        self.start_local().await;
        self.publish();

        loop {
            let wake = match self.local.as_mut() {
                Some(local) => tokio::select! {
                    biased;
                    command = self.commands.recv() => Wake::Command(command),
                    event = local.events.recv() => Wake::Local(event),
                },
                None => Wake::Command(self.commands.recv().await),
            };

            match wake {
                Wake::Command(Some(AgentCommand::Retry)) => {
                    info!("retry requested; stopping local timer");
                    self.stop_local().await;
                    return Phase::Connecting;
                }
                Wake::Command(Some(AgentCommand::Shutdown) | None) => return Phase::Stopped,
                Wake::Local(Ok(message)) => {
                    self.view.apply(&message);
                    self.publish();
                }
                Wake::Local(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "local engine feed lagging; skipped messages");
                }
                Wake::Local(Err(RecvError::Closed)) => {
                    warn!("local engine stopped unexpectedly");
                    self.stop_local().await;
                    self.publish();
                }
                Wake::TimedOut | Wake::Attempt(_) => {}
            }
        }
    }

    /// Start the single local engine, seeded from the current view.
    async fn start_local(&mut self) {
        self.stop_local().await;

        let seeded = self.view.is_initialized();
        let state = ServerState::seeded(self.engine.clone(), now_millis(), self.view.seed());
        let engine = Engine::spawn(state);
        match engine.handle().subscribe().await {
            Ok(subscription) => {
                self.view.apply(&subscription.init_message());
                info!(
                    seeded,
                    drawing = ?self.view.current_drawing().map(|entry| entry.as_str()),
                    "local timer started"
                );
                self.local = Some(LocalFallback {
                    engine,
                    events: subscription.events,
                });
            }
            Err(err) => {
                warn!(error = %err, "local engine failed to start");
                engine.shutdown().await;
            }
        }
    }

    async fn stop_local(&mut self) {
        if let Some(local) = self.local.take() {
            drop(local.events);
            local.engine.shutdown().await;
            info!("local timer stopped");
        }
    }

    fn publish(&self) {
        self.status.send_replace(AgentStatus {
            connection: self.connection,
            failures: self.failures,
            local_timer_running: self.local.is_some(),
            view: self.view.clone(),
        });
    }
}

/// Wait until `not_before`, connect and require the snapshot as the first message.
async fn handshake<C: Connector>(
    connector: &C,
    not_before: Instant,
) -> Result<(RemoteFeed, StateSnapshot), FeedError> {
    sleep_until(not_before).await;
    let mut feed = connector.connect().await?;
    match feed.next().await {
        Some(Ok(ServerMessage::StateInit(snapshot))) => Ok((feed, snapshot)),
        Some(Ok(other)) => Err(FeedError::Handshake(other.name())),
        Some(Err(err)) => Err(err),
        None => Err(FeedError::Closed),
    }
}
