//! AudioBridge: the capture/playback pair held by one session.
//!
//! The bridge makes no routing decisions.  It opens both halves together,
//! moves single frames in and out, and closes both halves together.  Each
//! half sits behind its own mutex so the receive loop (playback) and the
//! transmit loop (capture) never wait on each other, while `close` from the
//! teardown path waits for at most one in-flight device call per half.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{AudioBackend, AudioError, AudioParams, CaptureDevice, PlaybackDevice};

/// An open capture/playback pair.
pub struct AudioBridge {
    capture: Mutex<Option<Box<dyn CaptureDevice>>>,
    playback: Mutex<Option<Box<dyn PlaybackDevice>>>,
    frame_bytes: usize,
}

impl AudioBridge {
    /// Opens capture then playback.
    ///
    /// # Errors
    ///
    /// Returns the first [`AudioError`]; if playback fails, the already-open
    /// capture device is closed before returning.
    pub fn open(backend: &dyn AudioBackend, params: &AudioParams) -> Result<Self, AudioError> {
        let capture = backend.open_capture(params)?;
        // `capture` is dropped (closed) by `?` if playback fails.
        let playback = backend.open_playback(params)?;
        debug!(device = %params.device, frame_bytes = params.frame_bytes(), "audio devices opened");
        Ok(Self {
            capture: Mutex::new(Some(capture)),
            playback: Mutex::new(Some(playback)),
            frame_bytes: params.frame_bytes(),
        })
    }

    /// Size of one period in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Reads one capture period; returns an empty frame once closed.
    pub fn capture_one(&self) -> Result<Vec<u8>, AudioError> {
        match lock(&self.capture).as_mut() {
            Some(device) => device.read_frame(),
            None => Ok(Vec::new()),
        }
    }

    /// Writes one playback period; does nothing once closed.
    pub fn play_one(&self, frame: &[u8]) -> Result<(), AudioError> {
        match lock(&self.playback).as_mut() {
            Some(device) => device.write_frame(frame),
            None => Ok(()),
        }
    }

    /// Returns `true` while both halves are open.
    pub fn is_open(&self) -> bool {
        lock(&self.capture).is_some() && lock(&self.playback).is_some()
    }

    /// Closes both halves.  Safe to call more than once.
    pub fn close(&self) {
        let capture = lock(&self.capture).take();
        let playback = lock(&self.playback).take();
        if capture.is_some() || playback.is_some() {
            debug!("audio devices closed");
        }
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
