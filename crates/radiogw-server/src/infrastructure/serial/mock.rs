//! Recording control line for tests.
//!
//! Every write is appended to a shared log so a test can assert on the exact
//! sequence of RTS levels after handing the line to a `PttController`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use radiogw_core::{ControlLine, ControlLineError};

/// Control line that records writes and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingControlLine {
    writes: Arc<Mutex<Vec<bool>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingControlLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels written so far, oldest first.
    pub fn writes(&self) -> Vec<bool> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last level written, or `false` if none.
    pub fn is_asserted(&self) -> bool {
        self.writes().last().copied().unwrap_or(false)
    }

    /// Makes every following write fail until reset.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ControlLine for RecordingControlLine {
    fn set_asserted(&mut self, asserted: bool) -> Result<(), ControlLineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControlLineError::Device("mock line failure".to_string()));
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(asserted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_write_log() {
        let probe = RecordingControlLine::new();
        let mut line = probe.clone();

        line.set_asserted(true).unwrap();
        line.set_asserted(false).unwrap();

        assert_eq!(probe.writes(), vec![true, false]);
        assert!(!probe.is_asserted());
    }

    #[test]
    fn test_failing_line_records_nothing() {
        let probe = RecordingControlLine::new();
        let mut line = probe.clone();
        probe.set_failing(true);

        assert!(line.set_asserted(true).is_err());
        assert!(probe.writes().is_empty());
    }
}
