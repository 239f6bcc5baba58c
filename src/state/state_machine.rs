use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Countdown state shared with every viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Epoch milliseconds at which the current countdown started.
    pub started_at: u64,
    /// Countdown length in seconds; always greater than zero.
    pub duration: u32,
    /// True between the reveal start and the countdown restart.
    pub is_drawing: bool,
}

impl TimerState {
    /// Fresh idle countdown starting at `now`.
    pub fn fresh(now: u64, duration: u32) -> Self {
        Self {
            started_at: now,
            duration,
            is_drawing: false,
        }
    }

    /// Whole seconds left at wall-clock `now`, floored at zero and zero while drawing.
    pub fn seconds_remaining(&self, now: u64) -> u32 {
        if self.is_drawing {
            return 0;
        }
        let elapsed = now.saturating_sub(self.started_at) / 1000;
        u64::from(self.duration).saturating_sub(elapsed) as u32
    }
}

/// Sequence number identifying one reveal cycle.
pub type CycleId = u64;

/// Phases of the drawing timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// Counting down towards the next reveal.
    Idle {
        /// Ticks left before the reveal starts.
        remaining: u32,
    },
    /// The avatar is "drawing"; the new artwork is not picked yet.
    Revealing {
        /// Reveal in flight.
        cycle: CycleId,
    },
    /// The new artwork is shown; the countdown restarts once the grace delay elapses.
    Settling {
        /// Reveal that just completed.
        cycle: CycleId,
    },
}

/// Result of feeding one tick to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting down.
    Counting {
        /// Ticks left after this one.
        remaining: u32,
    },
    /// The countdown expired and a reveal cycle began.
    RevealStarted {
        /// Identifier the reveal continuation must carry.
        cycle: CycleId,
    },
    /// A reveal is already in flight; the tick was ignored.
    Skipped,
}

/// Timer driving the reveal cadence.
///
/// The machine only tracks phases; picking artworks and publishing events is
/// left to the owner. Continuations carry the [`CycleId`] they were scheduled
/// for and are ignored when it no longer matches, so a late or duplicated
/// continuation can never advance the drawing twice.
#[derive(Debug, Clone)]
pub struct TimerStateMachine {
    duration: u32,
    phase: TimerPhase,
    timer: TimerState,
    next_cycle: CycleId,
}

impl TimerStateMachine {
    /// Start a countdown of `duration` seconds at wall-clock `now`.
    pub fn new(duration: u32, now: u64) -> Self {
        Self {
            duration,
            phase: TimerPhase::Idle {
                remaining: duration,
            },
            timer: TimerState::fresh(now, duration),
            next_cycle: 1,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    /// Countdown as broadcast to viewers.
    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        let TimerPhase::Idle { remaining } = self.phase else {
            return TickOutcome::Skipped;
        };

        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.phase = TimerPhase::Idle { remaining };
            return TickOutcome::Counting { remaining };
        }

        let cycle = self.next_cycle;
        self.next_cycle += 1;
        self.phase = TimerPhase::Revealing { cycle };
        self.timer.is_drawing = true;
        TickOutcome::RevealStarted { cycle }
    }

    /// Move from revealing to settling once the simulated drawing time has elapsed.
    pub fn complete_reveal(&mut self, cycle: CycleId) -> bool {
        if self.phase != (TimerPhase::Revealing { cycle }) {
            return false;
        }
        self.phase = TimerPhase::Settling { cycle };
        true
    }

    /// Restart the countdown after the grace delay.
    pub fn finish_grace(&mut self, cycle: CycleId, now: u64) -> bool {
        if self.phase != (TimerPhase::Settling { cycle }) {
            return false;
        }
        self.phase = TimerPhase::Idle {
            remaining: self.duration,
        };
        self.timer = TimerState::fresh(now, self.duration);
        true
    }
}
