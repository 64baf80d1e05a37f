//! In-memory audio backend for tests.
//!
//! `MockAudioBackend` is cheap to clone; every clone shares the same state,
//! so a test keeps one handle for assertions and hands another to the code
//! under test.  Capture devices pace themselves like real hardware: each read
//! sleeps for one period before returning, which keeps transmit-loop tests
//! from spinning.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::{AudioBackend, AudioError, AudioParams, CaptureDevice, PlaybackDevice, StreamDirection};

#[derive(Default)]
struct Shared {
    /// Frames returned by capture reads, oldest first.
    queued: Mutex<VecDeque<Vec<u8>>>,
    /// Returned when the queue is empty; `None` means an empty read.
    live_frame: Mutex<Option<Vec<u8>>>,
    played: Mutex<Vec<Vec<u8>>>,
    fail_open: Mutex<Option<StreamDirection>>,
    open_devices: AtomicUsize,
    opens: AtomicUsize,
    capture_reads: AtomicUsize,
}

/// Recording audio backend with scripted capture.
#[derive(Clone, Default)]
pub struct MockAudioBackend {
    shared: Arc<Shared>,
    period: Duration,
}

impl MockAudioBackend {
    /// Creates a backend whose capture reads take 1 ms.
    pub fn new() -> Self {
        Self::with_period(Duration::from_millis(1))
    }

    /// Creates a backend whose capture reads take `period`.
    pub fn with_period(period: Duration) -> Self {
        Self {
            shared: Arc::default(),
            period,
        }
    }

    /// Queues one frame for a future capture read.
    pub fn push_capture_frame(&self, frame: Vec<u8>) {
        lock(&self.shared.queued).push_back(frame);
    }

    /// Sets the frame returned on every read once the queue is drained.
    pub fn set_live_frame(&self, frame: Option<Vec<u8>>) {
        *lock(&self.shared.live_frame) = frame;
    }

    /// Makes the next open in `direction` fail.
    pub fn fail_next_open(&self, direction: StreamDirection) {
        *lock(&self.shared.fail_open) = Some(direction);
    }

    /// Frames written to playback so far.
    pub fn played_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.shared.played).clone()
    }

    /// Devices currently open (capture and playback counted separately).
    pub fn open_devices(&self) -> usize {
        self.shared.open_devices.load(Ordering::SeqCst)
    }

    /// Devices opened since creation.
    pub fn total_opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Capture reads performed since creation.
    pub fn capture_reads(&self) -> usize {
        self.shared.capture_reads.load(Ordering::SeqCst)
    }

    fn open(&self, params: &AudioParams, direction: StreamDirection) -> Result<(), AudioError> {
        let mut fail = lock(&self.shared.fail_open);
        if *fail == Some(direction) {
            *fail = None;
            return Err(AudioError::Open {
                device: params.device.clone(),
                direction,
                reason: "mock open failure".to_string(),
            });
        }
        self.shared.open_devices.fetch_add(1, Ordering::SeqCst);
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl AudioBackend for MockAudioBackend {
    fn open_capture(&self, params: &AudioParams) -> Result<Box<dyn CaptureDevice>, AudioError> {
        self.open(params, StreamDirection::Capture)?;
        Ok(Box::new(MockCapture {
            shared: Arc::clone(&self.shared),
            period: self.period,
        }))
    }

    fn open_playback(&self, params: &AudioParams) -> Result<Box<dyn PlaybackDevice>, AudioError> {
        self.open(params, StreamDirection::Playback)?;
        Ok(Box::new(MockPlayback {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockCapture {
    shared: Arc<Shared>,
    period: Duration,
}

impl CaptureDevice for MockCapture {
    fn read_frame(&mut self) -> Result<Vec<u8>, AudioError> {
        thread::sleep(self.period);
        self.shared.capture_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(frame) = lock(&self.shared.queued).pop_front() {
            return Ok(frame);
        }
        Ok(lock(&self.shared.live_frame).clone().unwrap_or_default())
    }
}

impl Drop for MockCapture {
    fn drop(&mut self) {
        self.shared.open_devices.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockPlayback {
    shared: Arc<Shared>,
}

impl PlaybackDevice for MockPlayback {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), AudioError> {
        lock(&self.shared.played).push(frame.to_vec());
        Ok(())
    }
}

impl Drop for MockPlayback {
    fn drop(&mut self) {
        self.shared.open_devices.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_frames_come_before_live_frame() {
        let backend = MockAudioBackend::new();
        backend.push_capture_frame(vec![1]);
        backend.set_live_frame(Some(vec![2]));
        let mut capture = backend.open_capture(&AudioParams::default()).unwrap();

        assert_eq!(capture.read_frame().unwrap(), vec![1]);
        assert_eq!(capture.read_frame().unwrap(), vec![2]);
        assert_eq!(capture.read_frame().unwrap(), vec![2]);
        assert_eq!(backend.capture_reads(), 3);
    }

    #[test]
    fn test_dropping_devices_updates_open_count() {
        let backend = MockAudioBackend::new();
        let capture = backend.open_capture(&AudioParams::default()).unwrap();
        let playback = backend.open_playback(&AudioParams::default()).unwrap();
        assert_eq!(backend.open_devices(), 2);

        drop(capture);
        drop(playback);

        assert_eq!(backend.open_devices(), 0);
        assert_eq!(backend.total_opens(), 2);
    }

    #[test]
    fn test_fail_next_open_applies_once() {
        let backend = MockAudioBackend::new();
        backend.fail_next_open(StreamDirection::Capture);

        assert!(backend.open_capture(&AudioParams::default()).is_err());
        assert!(backend.open_capture(&AudioParams::default()).is_ok());
    }
}
