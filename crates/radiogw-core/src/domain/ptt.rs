//! PTT (push-to-talk) state machine.
//!
//! The controller owns the key state and the physical line that keys the
//! transmitter.  Both are kept behind one mutex so that the receive loop
//! (which toggles PTT on DTMF) and the transmit loop (which only reads it)
//! always agree on whether the radio is transmitting.
//!
//! # States
//!
//! ```text
//!            set(On)  ─ line asserted, then keying delay ─►
//!   ┌─────┐                                                ┌────┐
//!   │ Off │                                                │ On │
//!   └─────┘                                                └────┘
//!            ◄─ line deasserted, no delay ─  set(Off)
//! ```
//!
//! Setting the state that is already held is a no-op: no line write and no
//! delay.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

/// Default transmitter key-up time.
pub const DEFAULT_KEYING_DELAY: Duration = Duration::from_millis(100);

/// Key state of the transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttState {
    /// Not transmitting (RX mode).
    Off,
    /// Transmitting (TX mode).
    On,
}

impl PttState {
    /// Returns `true` for [`PttState::On`].
    pub fn is_on(self) -> bool {
        self == PttState::On
    }

    /// Returns the opposite state.
    pub fn inverse(self) -> Self {
        match self {
            PttState::Off => PttState::On,
            PttState::On => PttState::Off,
        }
    }
}

/// Error raised by a [`ControlLine`] implementation.
#[derive(Debug, Error)]
pub enum ControlLineError {
    #[error("control line I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("control line device error: {0}")]
    Device(String),
}

/// Error type for PTT transitions.
#[derive(Debug, Error)]
pub enum PttError {
    #[error("failed to drive PTT line {target:?}: {source}")]
    Line {
        target: PttState,
        #[source]
        source: ControlLineError,
    },
}

/// The single output signal that keys the transmitter (RTS on a serial
/// adapter in production).
#[cfg_attr(test, mockall::automock)]
pub trait ControlLine {
    /// Drives the line; `true` keys the transmitter.
    fn set_asserted(&mut self, asserted: bool) -> Result<(), ControlLineError>;
}

struct PttInner {
    state: PttState,
    line: Box<dyn ControlLine + Send>,
}

/// Thread-safe owner of the PTT state and its control line.
pub struct PttController {
    inner: Mutex<PttInner>,
    keying_delay: Duration,
}

impl PttController {
    /// Creates a controller in the [`PttState::Off`] state.
    ///
    /// The line is assumed to already be deasserted; nothing is written here.
    pub fn new(line: Box<dyn ControlLine + Send>, keying_delay: Duration) -> Self {
        Self {
            inner: Mutex::new(PttInner {
                state: PttState::Off,
                line,
            }),
            keying_delay,
        }
    }

    /// Returns the configured key-up delay.
    pub fn keying_delay(&self) -> Duration {
        self.keying_delay
    }

    /// Returns the state left by the last completed transition.
    pub fn state(&self) -> PttState {
        self.lock().state
    }

    /// Shorthand for `state().is_on()`.
    pub fn is_on(&self) -> bool {
        self.state().is_on()
    }

    /// Moves to `target`.
    ///
    /// Returns `Ok(true)` if the state changed.  A transition to
    /// [`PttState::On`] holds the lock for the keying delay before returning,
    /// so the caller cannot route transmit audio until the radio is keyed.
    ///
    /// # Errors
    ///
    /// Returns [`PttError::Line`] if the line write fails; the state is left
    /// unchanged in that case.
    pub fn set(&self, target: PttState) -> Result<bool, PttError> {
        let mut inner = self.lock();
        self.transition(&mut inner, target)
    }

    /// Flips the state and returns the new one.
    ///
    /// # Errors
    ///
    /// Same as [`PttController::set`].
    pub fn toggle(&self) -> Result<PttState, PttError> {
        let mut inner = self.lock();
        let target = inner.state.inverse();
        self.transition(&mut inner, target)?;
        Ok(target)
    }

    /// Drops PTT unconditionally.
    ///
    /// The state becomes [`PttState::Off`] even when the line write fails, so
    /// a session teardown never leaves the gateway believing it transmits.
    ///
    /// # Errors
    ///
    /// Returns [`PttError::Line`] if the line could not be deasserted.
    pub fn force_off(&self) -> Result<(), PttError> {
        let mut inner = self.lock();
        if inner.state == PttState::Off {
            return Ok(());
        }
        inner.state = PttState::Off;
        info!("PTT forced OFF (RX)");
        inner
            .line
            .set_asserted(false)
            .map_err(|source| PttError::Line {
                target: PttState::Off,
                source,
            })
    }

    fn transition(&self, inner: &mut PttInner, target: PttState) -> Result<bool, PttError> {
        if inner.state == target {
            return Ok(false);
        }

        inner
            .line
            .set_asserted(target.is_on())
            .map_err(|source| PttError::Line { target, source })?;
        inner.state = target;

        match target {
            PttState::On => {
                info!("PTT ON (TX)");
                thread::sleep(self.keying_delay);
            }
            PttState::Off => info!("PTT OFF (RX)"),
        }
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, PttInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PttController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PttController")
            .field("state", &self.state())
            .field("keying_delay", &self.keying_delay)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::Arc;
    use std::time::Instant;

    fn controller(line: MockControlLine, delay_ms: u64) -> PttController {
        PttController::new(Box::new(line), Duration::from_millis(delay_ms))
    }

    #[test]
    fn test_new_controller_starts_off() {
        let ptt = controller(MockControlLine::new(), 0);
        assert_eq!(ptt.state(), PttState::Off);
        assert!(!ptt.is_on());
    }

    #[test]
    fn test_set_on_asserts_line_and_waits_keying_delay() {
        // Arrange
        let mut line = MockControlLine::new();
        line.expect_set_asserted()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(()));
        let ptt = controller(line, 60);

        // Act
        let started = Instant::now();
        let changed = ptt.set(PttState::On).unwrap();

        // Assert
        assert!(changed);
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(ptt.state(), PttState::On);
    }

    #[test]
    fn test_set_same_state_writes_nothing() {
        // Arrange: no expectations, so any line write panics the mock
        let ptt = controller(MockControlLine::new(), 500);

        // Act
        let started = Instant::now();
        let changed = ptt.set(PttState::Off).unwrap();

        // Assert
        assert!(!changed);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_set_off_has_no_delay() {
        let mut line = MockControlLine::new();
        line.expect_set_asserted().times(2).returning(|_| Ok(()));
        let ptt = controller(line, 200);
        ptt.set(PttState::On).unwrap();

        let started = Instant::now();
        ptt.set(PttState::Off).unwrap();

        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(ptt.state(), PttState::Off);
    }

    #[test]
    fn test_toggle_alternates_and_drives_line_in_order() {
        // Arrange
        let mut seq = Sequence::new();
        let mut line = MockControlLine::new();
        line.expect_set_asserted()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        line.expect_set_asserted()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let ptt = controller(line, 0);

        // Act / Assert
        assert_eq!(ptt.toggle().unwrap(), PttState::On);
        assert_eq!(ptt.toggle().unwrap(), PttState::Off);
    }

    #[test]
    fn test_failed_line_write_leaves_state_unchanged() {
        let mut line = MockControlLine::new();
        line.expect_set_asserted()
            .returning(|_| Err(ControlLineError::Device("unplugged".to_string())));
        let ptt = controller(line, 0);

        let result = ptt.set(PttState::On);

        assert!(matches!(result, Err(PttError::Line { target: PttState::On, .. })));
        assert_eq!(ptt.state(), PttState::Off);
    }

    #[test]
    fn test_force_off_when_already_off_writes_nothing() {
        let ptt = controller(MockControlLine::new(), 0);
        assert!(ptt.force_off().is_ok());
    }

    #[test]
    fn test_force_off_clears_state_even_if_line_fails() {
        // Arrange
        let mut seq = Sequence::new();
        let mut line = MockControlLine::new();
        line.expect_set_asserted()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        line.expect_set_asserted()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ControlLineError::Device("gone".to_string())));
        let ptt = controller(line, 0);
        ptt.set(PttState::On).unwrap();

        // Act
        let result = ptt.force_off();

        // Assert
        assert!(result.is_err());
        assert_eq!(ptt.state(), PttState::Off);
    }

    #[test]
    fn test_reader_blocks_until_keying_delay_completes() {
        // Arrange
        let mut line = MockControlLine::new();
        line.expect_set_asserted().returning(|_| Ok(()));
        let ptt = Arc::new(controller(line, 150));
        let keyer = Arc::clone(&ptt);

        // Act: key up on another thread, then read state while it waits
        let started = Instant::now();
        let handle = std::thread::spawn(move || keyer.set(PttState::On).unwrap());
        std::thread::sleep(Duration::from_millis(30));
        let observed = ptt.state();
        let observed_at = started.elapsed();
        handle.join().unwrap();

        // Assert: the read serialized behind the transition
        assert_eq!(observed, PttState::On);
        assert!(observed_at >= Duration::from_millis(150));
    }
}
