//! Debounce gate for remote PTT toggles.
//!
//! A held or repeated key on the far end arrives as a burst of DTMF
//! messages.  Only the first toggle of a burst is honoured; the next one is
//! accepted once `interval` has elapsed since the last accepted toggle.

use std::time::{Duration, Instant};

/// Default minimum spacing between honoured toggles.
pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(300);

/// Tracks the last accepted toggle and rejects toggles that come too soon.
#[derive(Debug, Clone)]
pub struct ToggleDebouncer {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl ToggleDebouncer {
    /// Creates a debouncer that has not accepted anything yet.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    /// Returns the configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records `now` if a toggle at `now` is allowed.
    ///
    /// Rejected attempts do not move the window.
    pub fn try_accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

impl Default for ToggleDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_INTERVAL)
    }
}
