use std::{future, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at, sleep_until},
};
use tracing::{debug, info, warn};

use crate::{
    clock::now_millis,
    dto::{chat::ChatSendRequest, messages::StateSnapshot},
    error::ServiceError,
    state::{
        broadcast::Subscription, chat::ChatMessage, server::ServerState, state_machine::CycleId,
    },
};

/// Period of the countdown tick.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 64;

/// Requests accepted by the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    /// Register a subscriber; replies with its snapshot and event receiver.
    Subscribe {
        reply: oneshot::Sender<Subscription>,
    },
    /// Read the current state without subscribing.
    Snapshot {
        reply: oneshot::Sender<StateSnapshot>,
    },
    /// Validate and broadcast a chat line.
    PostChat {
        request: ChatSendRequest,
        reply: oneshot::Sender<Result<ChatMessage, ServiceError>>,
    },
    /// Stop the task.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContinuationKind {
    Reveal,
    Grace,
}

/// The single delayed step the engine waits for, if any.
#[derive(Debug, Clone, Copy)]
struct Continuation {
    kind: ContinuationKind,
    cycle: CycleId,
    at: Instant,
}

/// What applying a continuation left the engine waiting for.
#[derive(Debug, Clone, Copy)]
enum Resumed {
    Next(Continuation),
    CountdownRestarted,
    Stale,
}

/// Cloneable handle used to talk to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Subscribe to the broadcast, receiving the current snapshot first.
    pub async fn subscribe(&self) -> Result<Subscription, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Subscribe { reply }).await?;
        rx.await.map_err(|_| ServiceError::EngineStopped)
    }

    /// Read the current state without subscribing.
    pub async fn snapshot(&self) -> Result<StateSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| ServiceError::EngineStopped)
    }

    /// Validate a chat line and broadcast it to every subscriber.
    pub async fn post_chat(&self, request: ChatSendRequest) -> Result<ChatMessage, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::PostChat { request, reply }).await?;
        rx.await.map_err(|_| ServiceError::EngineStopped)?
    }

    /// Whether the engine task is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn send(&self, command: EngineCommand) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServiceError::EngineStopped)
    }
}

/// A spawned engine task owning one [`ServerState`].
pub struct Engine {
    handle: EngineHandle,
    task: JoinHandle<()>,
}

impl Engine {
    /// Spawn the engine on the current runtime. The first tick fires one period from now.
    pub fn spawn(state: ServerState) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run(state, rx));
        Self {
            handle: EngineHandle { commands: tx },
            task,
        }
    }

    /// A new handle to the running engine.
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the task and wait for it to exit, dropping every subscriber's sender.
    pub async fn shutdown(self) {
        if self.handle.commands.send(EngineCommand::Shutdown).await.is_err() {
            debug!("engine already stopped");
        }
        if let Err(err) = self.task.await {
            warn!(error = %err, "engine task ended abnormally");
        }
    }
}

async fn run(mut state: ServerState, mut commands: mpsc::Receiver<EngineCommand>) {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<Continuation> = None;

    info!(
        drawings = state.settings().catalog.len(),
        duration = state.settings().timer_duration,
        "drawing engine started"
    );

    loop {
        let deadline = pending.map(|continuation| continuation.at);
        // Continuations first, so a grace ending on a tick boundary restarts before that tick.
        tokio::select! {
            biased;
            _ = wait_until(deadline) => {
                if let Some(continuation) = pending.take() {
                    match resume(&mut state, continuation) {
                        Resumed::Next(next) => pending = Some(next),
                        // Count whole seconds from the new `startedAt`.
                        Resumed::CountdownRestarted => ticker.reset(),
                        Resumed::Stale => {}
                    }
                }
            }
            _ = ticker.tick() => {
                if let Some(ticket) = state.tick() {
                    pending = Some(Continuation {
                        kind: ContinuationKind::Reveal,
                        cycle: ticket.cycle,
                        at: Instant::now() + ticket.delay,
                    });
                }
            }
            command = commands.recv() => match command {
                Some(EngineCommand::Shutdown) | None => break,
                Some(command) => handle_command(&mut state, command),
            }
        }
    }

    info!("drawing engine stopped");
}

/// Run a continuation and report what follows it.
fn resume(state: &mut ServerState, continuation: Continuation) -> Resumed {
    let Continuation { kind, cycle, .. } = continuation;
    match kind {
        ContinuationKind::Reveal => match state.complete_reveal(cycle, now_millis()) {
            Some(grace) => Resumed::Next(Continuation {
                kind: ContinuationKind::Grace,
                cycle,
                at: Instant::now() + grace,
            }),
            None => Resumed::Stale,
        },
        ContinuationKind::Grace => {
            if state.finish_grace(cycle, now_millis()) {
                Resumed::CountdownRestarted
            } else {
                Resumed::Stale
            }
        }
    }
}

fn handle_command(state: &mut ServerState, command: EngineCommand) {
    match command {
        EngineCommand::Subscribe { reply } => {
            if reply.send(state.subscribe()).is_err() {
                debug!("subscriber left before receiving its snapshot");
            } else {
                debug!(subscribers = state.subscriber_count(), "subscriber registered");
            }
        }
        EngineCommand::Snapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        EngineCommand::PostChat { request, reply } => {
            let result = state.post_chat(request, now_millis());
            if let Err(err) = &result {
                warn!(error = %err, "rejected chat message");
            }
            let _ = reply.send(result);
        }
        EngineCommand::Shutdown => {}
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use tokio::sync::broadcast;

    use super::*;
    use crate::{
        client::view::ClientView,
        config::EngineSettings,
        dto::messages::ServerMessage,
        state::catalog::{CatalogEntry, DrawingCatalog},
    };

    fn settings(duration: u32) -> EngineSettings {
        settings_with_reveal(duration, Duration::from_millis(3_000))
    }

    fn settings_with_reveal(duration: u32, reveal: Duration) -> EngineSettings {
        let mut settings =
            EngineSettings::new(DrawingCatalog::from_paths(["A", "B", "C"]).unwrap());
        settings.timer_duration = duration;
        settings.reveal_delay_min = reveal;
        settings.reveal_delay_max = reveal;
        settings
    }

    fn spawn(duration: u32) -> Engine {
        spawn_with(settings(duration))
    }

    fn spawn_with(settings: EngineSettings) -> Engine {
        Engine::spawn(ServerState::with_rng(
            settings,
            now_millis(),
            StdRng::seed_from_u64(3),
        ))
    }

    async fn next_name(events: &mut broadcast::Receiver<ServerMessage>) -> &'static str {
        events.recv().await.unwrap().name()
    }

    fn chat(text: &str) -> ChatSendRequest {
        ChatSendRequest {
            username: "mila".into(),
            text: text.into(),
            color: "#45B7D1".into(),
            avatar: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sixty_ticks_start_exactly_one_reveal() {
        let engine = spawn(60);
        let mut subscription = engine.handle().subscribe().await.unwrap();
        let started = Instant::now();
        assert!(!subscription.snapshot.timer.is_drawing);

        for _ in 0..59 {
            assert_eq!(next_name(&mut subscription.events).await, "timer:update");
        }
        let ServerMessage::TimerUpdate(timer) = subscription.events.recv().await.unwrap() else {
            panic!("expected the drawing timer update");
        };
        assert!(timer.is_drawing);
        assert_eq!(next_name(&mut subscription.events).await, "drawing:start");
        assert_eq!(started.elapsed(), Duration::from_secs(60));

        assert_eq!(next_name(&mut subscription.events).await, "drawing:update");
        assert_eq!(started.elapsed(), Duration::from_secs(63));
        assert_eq!(next_name(&mut subscription.events).await, "gallery:update");
        assert_eq!(next_name(&mut subscription.events).await, "drawing:complete");

        let ServerMessage::TimerUpdate(timer) = subscription.events.recv().await.unwrap() else {
            panic!("expected the countdown restart");
        };
        assert!(!timer.is_drawing);
        assert_eq!(started.elapsed(), Duration::from_secs(65));

        // Ticks during the reveal were skipped, so counting resumes from the full duration.
        assert_eq!(next_name(&mut subscription.events).await, "timer:update");
        let snapshot = engine.handle().snapshot().await.unwrap();
        assert_eq!(snapshot.current_drawing, Some(CatalogEntry::new("A")));
        assert!(snapshot.gallery.is_empty());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_countdown_lasts_the_full_duration() {
        // A reveal delay off the tick grid ends the grace period between two ticks.
        let engine = spawn_with(settings_with_reveal(10, Duration::from_millis(3_300)));
        let mut events = engine.handle().subscribe().await.unwrap().events;

        let mut restarted: Option<Instant> = None;
        let mut reveals = 0;
        while reveals < 2 {
            match events.recv().await.unwrap() {
                ServerMessage::DrawingStart {} => {
                    reveals += 1;
                    if let Some(restarted) = restarted {
                        assert_eq!(restarted.elapsed(), Duration::from_secs(10));
                    }
                }
                ServerMessage::TimerUpdate(timer) if !timer.is_drawing && reveals == 1 => {
                    restarted.get_or_insert_with(Instant::now);
                }
                _ => {}
            }
        }
        assert!(restarted.is_some());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_plus_replay_matches_live_state() {
        let engine = spawn(2);
        let handle = engine.handle();
        let subscription = handle.subscribe().await.unwrap();
        let mut view = ClientView::new(settings(2).chat_max);
        view.apply(&subscription.init_message());
        let mut events = subscription.events;

        handle.post_chat(chat("hello")).await.unwrap();
        // Three full cycles: 2 s countdown, 3 s reveal, 2 s grace.
        tokio::time::sleep(Duration::from_secs(21) + Duration::from_millis(500)).await;
        handle.post_chat(chat("bye")).await.unwrap();

        let live = handle.snapshot().await.unwrap();
        while let Ok(message) = events.try_recv() {
            view.apply(&message);
        }
        assert_eq!(view.to_snapshot(), Some(live.clone()));
        assert_eq!(live.current_drawing, Some(CatalogEntry::new("C")));
        assert_eq!(live.gallery.len(), 2);
        assert_eq!(live.chat.len(), 2);

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_chat_is_rejected() {
        let engine = spawn(60);
        let err = engine.handle().post_chat(chat("")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(engine.handle().snapshot().await.unwrap().chat.is_empty());
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_subscriptions_and_handles() {
        let engine = spawn(60);
        let handle = engine.handle();
        let mut subscription = handle.subscribe().await.unwrap();
        engine.shutdown().await;

        assert!(matches!(
            subscription.events.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(!handle.is_running());
        assert!(matches!(
            handle.snapshot().await,
            Err(ServiceError::EngineStopped)
        ));
    }
}
