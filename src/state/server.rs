use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::EngineSettings,
    dto::{
        chat::ChatSendRequest,
        messages::{ServerMessage, StateSnapshot},
    },
    error::ServiceError,
    state::{
        broadcast::{BroadcastHub, Subscription},
        catalog::CatalogEntry,
        chat::{ChatLog, ChatMessage},
        gallery::{GalleryEntry, GalleryLedger},
        rotation::{Pick, RotationCursor},
        state_machine::{CycleId, TickOutcome, TimerStateMachine},
    },
};

/// Reveal cycle started by a tick, to be completed after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTicket {
    /// Cycle the reveal continuation must carry.
    pub cycle: CycleId,
    /// Simulated drawing time.
    pub delay: Duration,
}

/// State carried over into a fresh engine, e.g. a client's last view when it goes offline.
#[derive(Debug, Clone, Default)]
pub struct EngineSeed {
    /// Drawing to resume after.
    pub current_drawing: Option<CatalogEntry>,
    /// Most recent first.
    pub gallery: Vec<GalleryEntry>,
    /// Oldest first.
    pub chat: Vec<ChatMessage>,
}

/// The single mutable aggregate behind a drawing engine.
///
/// Every mutation publishes its messages on the owned [`BroadcastHub`] before
/// returning, so subscribers observe changes in the order they were applied.
pub struct ServerState {
    settings: EngineSettings,
    machine: TimerStateMachine,
    cursor: RotationCursor,
    current: Option<Pick>,
    gallery: GalleryLedger,
    chat: ChatLog,
    hub: BroadcastHub,
    rng: StdRng,
}

impl ServerState {
    /// Fresh state with an OS-seeded RNG.
    pub fn new(settings: EngineSettings, now: u64) -> Self {
        Self::with_rng(settings, now, StdRng::from_os_rng())
    }

    /// Fresh state with a caller-provided RNG (deterministic in tests).
    pub fn with_rng(settings: EngineSettings, now: u64, rng: StdRng) -> Self {
        Self {
            machine: TimerStateMachine::new(settings.timer_duration, now),
            cursor: RotationCursor::new(settings.rotation),
            current: None,
            gallery: GalleryLedger::new(settings.gallery_max),
            chat: ChatLog::new(settings.chat_max),
            hub: BroadcastHub::new(settings.channel_capacity),
            rng,
            settings,
        }
    }

    /// Fresh countdown that continues from previously observed drawings and chat.
    ///
    /// A seeded current drawing that is not part of the catalog is dropped,
    /// since its gallery id could not be derived.
    pub fn seeded(settings: EngineSettings, now: u64, seed: EngineSeed) -> Self {
        let mut state = Self::new(settings, now);
        state.gallery = GalleryLedger::from_entries(state.settings.gallery_max, seed.gallery);
        state.chat = ChatLog::from_messages(state.settings.chat_max, seed.chat);

        if let Some(entry) = seed.current_drawing {
            match state.settings.catalog.position(&entry) {
                Some(position) => {
                    state.cursor.resume_after(&state.settings.catalog, position);
                    state.current = Some(Pick { position, entry });
                }
                None => warn!(drawing = %entry, "seeded drawing is not in the catalog; ignoring"),
            }
        }

        state
    }

    /// Settings the engine runs with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Advance the countdown by one second.
    ///
    /// Returns a ticket when this tick started a reveal cycle; the caller
    /// must call [`ServerState::complete_reveal`] once its delay elapsed.
    pub fn tick(&mut self) -> Option<RevealTicket> {
        match self.machine.tick() {
            TickOutcome::Counting { .. } => {
                self.publish_timer();
                None
            }
            TickOutcome::RevealStarted { cycle } => {
                self.publish_timer();
                self.hub.publish(ServerMessage::DrawingStart {});
                let delay = self.reveal_delay();
                info!(cycle, delay_ms = delay.as_millis() as u64, "reveal started");
                Some(RevealTicket { cycle, delay })
            }
            TickOutcome::Skipped => None,
        }
    }

    /// Retire the current drawing, pick the next one and announce both.
    ///
    /// Returns the grace delay to wait before [`ServerState::finish_grace`],
    /// or `None` when `cycle` is stale.
    pub fn complete_reveal(&mut self, cycle: CycleId, now: u64) -> Option<Duration> {
        if !self.machine.complete_reveal(cycle) {
            debug!(cycle, "ignoring stale reveal continuation");
            return None;
        }

        if let Some(previous) = self.current.take() {
            let entry = GalleryEntry::positional(
                previous.number(),
                previous.entry,
                &self.settings.gallery_title_prefix,
                now,
            );
            self.gallery.record(entry);
        }

        let pick = self.cursor.next(&self.settings.catalog, &mut self.rng);
        info!(cycle, drawing = %pick.entry, number = pick.number(), "drawing revealed");
        self.hub.publish(ServerMessage::DrawingUpdate {
            current_drawing: pick.entry.clone(),
        });
        self.current = Some(pick);
        self.hub.publish(ServerMessage::GalleryUpdate {
            gallery: self.gallery.snapshot(),
        });
        self.hub.publish(ServerMessage::DrawingComplete {});

        Some(self.settings.grace_delay)
    }

    /// Restart the countdown once the grace delay of `cycle` elapsed.
    pub fn finish_grace(&mut self, cycle: CycleId, now: u64) -> bool {
        if !self.machine.finish_grace(cycle, now) {
            debug!(cycle, "ignoring stale grace continuation");
            return false;
        }
        self.publish_timer();
        true
    }

    /// Validate, stamp and broadcast a chat line.
    pub fn post_chat(
        &mut self,
        request: ChatSendRequest,
        now: u64,
    ) -> Result<ChatMessage, ServiceError> {
        let request = request.normalized();
        request.validate()?;

        let message = ChatMessage {
            id: Uuid::new_v4().simple().to_string(),
            username: request.username,
            text: request.text,
            color: request.color,
            avatar: request.avatar,
            timestamp: now,
        };
        self.chat.append(message.clone());
        self.hub.publish(ServerMessage::ChatMessage(message.clone()));
        Ok(message)
    }

    /// Register a subscriber together with the state it starts from.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            events: self.hub.subscribe(),
            snapshot: self.snapshot(),
        }
    }

    /// Current timer, drawing, gallery and chat.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            timer: self.machine.timer().clone(),
            current_drawing: self.current.as_ref().map(|pick| pick.entry.clone()),
            gallery: self.gallery.snapshot(),
            chat: self.chat.recent(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn publish_timer(&self) {
        self.hub.publish(ServerMessage::TimerUpdate(self.machine.timer().clone()));
    }

    fn reveal_delay(&mut self) -> Duration {
        let min = self.settings.reveal_delay_min.as_millis() as u64;
        let max = self.settings.reveal_delay_max.as_millis() as u64;
        Duration::from_millis(self.rng.random_range(min..=max))
    }
}
