use std::time::{Duration, Instant};

pub const QUIET_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    PendingRecompile { deadline: Instant },
}

/// Coalesces change notifications into one recompile after a quiet period.
///
/// Every change (re)starts the timer; only an expiry without an intervening change
/// fires and returns to [`DebounceState::Idle`].
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn changed(&mut self, now: Instant) {
        self.state = DebounceState::PendingRecompile {
            deadline: now + self.quiet,
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::PendingRecompile { deadline } => Some(deadline),
        }
    }

    /// Whether the recompile is due at `now`; if so the state is back to idle.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::PendingRecompile { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}
