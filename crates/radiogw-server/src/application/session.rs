//! SessionCoordinator: runs one client connection from open to teardown.
//!
//! A session owns three things for its lifetime: the TCP connection, an
//! [`AudioBridge`] and the right to drive the shared [`PttController`].  It
//! runs two loops:
//!
//! ```text
//!   client ──SOUND/DTMF/HANGUP──► receive loop ──playOne──► playback (radio TX)
//!                                     │ toggle()
//!                                     ▼
//!                                PttController
//!                                     │ is_on()
//!                                     ▼
//!   client ◄──────SOUND──────── transmit loop ◄──captureOne── capture (radio RX)
//! ```
//!
//! # Half-duplex rule
//!
//! Receive-loop SOUND payloads reach the playback device only while PTT is
//! ON; capture frames reach the client only while PTT is OFF.  Frames on the
//! wrong side of the rule are dropped, never queued.
//!
//! # Teardown
//!
//! The transmit loop is a scoped thread.  A drop guard created before it is
//! spawned clears the `connected` flag, forces PTT off, closes both audio
//! devices and shuts the socket down.  The guard runs on every exit path of
//! the receive loop, including a panic, and the scope then joins the
//! transmit thread, so no thread outlives its session.

use std::fmt;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use radiogw_core::domain::debounce::DEFAULT_DEBOUNCE_INTERVAL;
use radiogw_core::domain::dtmf::DEFAULT_TOGGLE_DIGIT;
use radiogw_core::protocol::messages::format_call_id;
use radiogw_core::{
    decode_dtmf_digit, read_message, write_message, Message, ProtocolError, PttController,
    PttError, ToggleDebouncer,
};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::infrastructure::audio::bridge::AudioBridge;
use crate::infrastructure::audio::{AudioBackend, AudioError, AudioParams};

/// Default transmit-loop sleep while PTT is ON.
pub const DEFAULT_TRANSMIT_IDLE: Duration = Duration::from_millis(20);

/// Error raised inside a session loop.  Always ends the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("PTT error: {0}")]
    Ptt(#[from] PttError),
    #[error("failed to start transmit loop: {0}")]
    Spawn(#[source] io::Error),
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client sent HANGUP.
    Hangup,
    /// The client closed the connection between messages.
    PeerClosed,
    /// Audio devices could not be opened; no loop was started.
    DeviceOpenFailed(String),
    /// A protocol, socket, audio or PTT error ended the receive loop.
    Failed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Hangup => f.write_str("hangup"),
            SessionEnd::PeerClosed => f.write_str("peer closed connection"),
            SessionEnd::DeviceOpenFailed(e) => write!(f, "audio device open failed: {e}"),
            SessionEnd::Failed(e) => write!(f, "session error: {e}"),
        }
    }
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub audio: AudioParams,
    /// DTMF digit that toggles PTT.
    pub toggle_digit: char,
    /// Minimum spacing between accepted toggles.
    pub debounce_interval: Duration,
    /// Transmit-loop sleep while PTT is ON.
    pub transmit_idle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            audio: AudioParams::default(),
            toggle_digit: DEFAULT_TOGGLE_DIGIT,
            debounce_interval: DEFAULT_DEBOUNCE_INTERVAL,
            transmit_idle: DEFAULT_TRANSMIT_IDLE,
        }
    }
}

/// Runs sessions against a shared audio backend and PTT controller.
pub struct SessionCoordinator {
    backend: Arc<dyn AudioBackend>,
    ptt: Arc<PttController>,
    config: SessionConfig,
}

impl SessionCoordinator {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        ptt: Arc<PttController>,
        config: SessionConfig,
    ) -> Self {
        Self {
            backend,
            ptt,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ptt(&self) -> &Arc<PttController> {
        &self.ptt
    }

    /// Runs one session on `stream` until it ends, then tears it down.
    ///
    /// Never returns an error: every failure is a reason for the session to
    /// end, reported in the returned [`SessionEnd`].  On return the socket is
    /// shut down, both audio devices are closed, PTT is OFF (or its line
    /// failure has been logged) and the transmit thread has exited.
    pub fn run(&self, stream: TcpStream) -> SessionEnd {
        let peer = stream.peer_addr().ok();

        let bridge = match AudioBridge::open(self.backend.as_ref(), &self.config.audio) {
            Ok(bridge) => bridge,
            Err(e) => {
                warn!(?peer, error = %e, "cannot open audio devices; dropping connection");
                let _ = stream.shutdown(Shutdown::Both);
                return SessionEnd::DeviceOpenFailed(e.to_string());
            }
        };

        info!(?peer, device = %self.config.audio.device, "session started");
        let connected = AtomicBool::new(true);

        let outcome = thread::scope(|scope| {
            let _teardown = Teardown {
                connected: &connected,
                ptt: &self.ptt,
                bridge: &bridge,
                stream: &stream,
            };

            let spawned = thread::Builder::new()
                .name("radiogw-tx".to_string())
                .spawn_scoped(scope, || {
                    if let Err(e) = self.transmit_loop(&stream, &bridge, &connected) {
                        // The receive loop keeps running; only outbound audio stops.
                        warn!(?peer, error = %e, "transmit loop ended");
                    }
                });
            if let Err(e) = spawned {
                return Err(SessionError::Spawn(e));
            }

            self.receive_loop(&stream, &bridge, peer)
        });

        let end = match outcome {
            Ok(end) => end,
            Err(SessionError::Protocol(ProtocolError::ConnectionClosed)) => SessionEnd::PeerClosed,
            Err(e) => SessionEnd::Failed(e.to_string()),
        };
        match &end {
            SessionEnd::Failed(_) => warn!(?peer, reason = %end, "session ended"),
            _ => info!(?peer, reason = %end, "session ended"),
        }
        end
    }

    // ── Receive loop ──────────────────────────────────────────────────────────

    fn receive_loop(
        &self,
        mut reader: &TcpStream,
        bridge: &AudioBridge,
        peer: Option<SocketAddr>,
    ) -> Result<SessionEnd, SessionError> {
        let mut debouncer = ToggleDebouncer::new(self.config.debounce_interval);

        loop {
            match read_message(&mut reader)? {
                Message::Sound(frame) => {
                    if self.ptt.is_on() {
                        bridge.play_one(&frame)?;
                    } else {
                        trace!(len = frame.len(), "PTT off; dropping inbound SOUND");
                    }
                }
                Message::Dtmf(payload) => self.handle_dtmf(&payload, &mut debouncer)?,
                Message::Hangup => {
                    info!(?peer, "client sent HANGUP");
                    return Ok(SessionEnd::Hangup);
                }
                Message::Uuid(id) => {
                    debug!(?peer, call_id = %format_call_id(&id), "call identifier received");
                }
                Message::Other {
                    message_type,
                    payload,
                } => {
                    debug!(
                        message_type = format_args!("{message_type:#04x}"),
                        len = payload.len(),
                        "ignoring unknown message type"
                    );
                }
            }
        }
    }

    fn handle_dtmf(&self, payload: &[u8], debouncer: &mut ToggleDebouncer) -> Result<(), SessionError> {
        let Some(digit) = decode_dtmf_digit(payload) else {
            debug!(?payload, "undecodable DTMF payload ignored");
            return Ok(());
        };
        debug!(%digit, "DTMF received");

        if digit != self.config.toggle_digit {
            return Ok(());
        }
        if !debouncer.try_accept(Instant::now()) {
            debug!(%digit, "toggle inside debounce window ignored");
            return Ok(());
        }

        let state = self.ptt.toggle()?;
        debug!(?state, "PTT toggled by DTMF");
        Ok(())
    }

    // ── Transmit loop ─────────────────────────────────────────────────────────

    fn transmit_loop(
        &self,
        mut writer: &TcpStream,
        bridge: &AudioBridge,
        connected: &AtomicBool,
    ) -> Result<(), SessionError> {
        while connected.load(Ordering::SeqCst) {
            if self.ptt.is_on() {
                thread::sleep(self.config.transmit_idle);
                continue;
            }

            let frame = bridge.capture_one()?;
            if !connected.load(Ordering::SeqCst) {
                break;
            }
            // PTT may have been keyed while the read was blocked.
            if self.ptt.is_on() {
                trace!("PTT keyed during capture; dropping frame");
                continue;
            }
            if frame.is_empty() {
                continue;
            }
            write_message(&mut writer, &Message::Sound(frame))?;
        }
        Ok(())
    }
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("config", &self.config)
            .field("ptt", &self.ptt)
            .finish_non_exhaustive()
    }
}

// ── Teardown guard ────────────────────────────────────────────────────────────

/// Runs session teardown when dropped.  Every step tolerates repetition.
struct Teardown<'a> {
    connected: &'a AtomicBool,
    ptt: &'a PttController,
    bridge: &'a AudioBridge,
    stream: &'a TcpStream,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.ptt.force_off() {
            error!(error = %e, "failed to drop PTT line during teardown");
        }
        self.bridge.close();
        // NotConnected just means the peer beat us to it.
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                debug!(error = %e, "socket shutdown failed");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;

    use radiogw_core::{encode_message, PttState};

    use super::*;
    use crate::infrastructure::audio::mock::MockAudioBackend;
    use crate::infrastructure::audio::StreamDirection;
    use crate::infrastructure::serial::mock::RecordingControlLine;

    struct Harness {
        backend: MockAudioBackend,
        line: RecordingControlLine,
        coordinator: Arc<SessionCoordinator>,
    }

    fn harness() -> Harness {
        let backend = MockAudioBackend::new();
        let line = RecordingControlLine::new();
        let ptt = Arc::new(PttController::new(
            Box::new(line.clone()),
            Duration::from_millis(5),
        ));
        let config = SessionConfig {
            debounce_interval: Duration::from_millis(50),
            transmit_idle: Duration::from_millis(2),
            ..SessionConfig::default()
        };
        let coordinator = Arc::new(SessionCoordinator::new(
            Arc::new(backend.clone()),
            ptt,
            config,
        ));
        Harness {
            backend,
            line,
            coordinator,
        }
    }

    /// Connects a client and runs the session on a background thread.
    fn start(h: &Harness) -> (TcpStream, thread::JoinHandle<SessionEnd>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        let coordinator = Arc::clone(&h.coordinator);
        let handle = thread::spawn(move || coordinator.run(server));
        (client, handle)
    }

    fn send(client: &mut TcpStream, msg: &Message) {
        client.write_all(&encode_message(msg).unwrap()).unwrap();
    }

    #[test]
    fn test_hangup_ends_session_and_releases_everything() {
        // Arrange
        let h = harness();
        let (mut client, handle) = start(&h);

        // Act
        send(&mut client, &Message::Hangup);
        let end = handle.join().unwrap();

        // Assert
        assert_eq!(end, SessionEnd::Hangup);
        assert_eq!(h.backend.open_devices(), 0);
        assert_eq!(h.coordinator.ptt().state(), PttState::Off);
    }

    #[test]
    fn test_peer_close_between_messages_is_reported_as_peer_closed() {
        let h = harness();
        let (client, handle) = start(&h);

        drop(client);

        assert_eq!(handle.join().unwrap(), SessionEnd::PeerClosed);
        assert_eq!(h.backend.open_devices(), 0);
    }

    #[test]
    fn test_device_open_failure_ends_session_without_loops() {
        // Arrange
        let h = harness();
        h.backend.fail_next_open(StreamDirection::Capture);

        // Act
        let (_client, handle) = start(&h);
        let end = handle.join().unwrap();

        // Assert
        assert!(matches!(end, SessionEnd::DeviceOpenFailed(_)));
        assert_eq!(h.backend.capture_reads(), 0);
        assert!(h.line.writes().is_empty());
    }

    #[test]
    fn test_non_toggle_digit_does_not_key() {
        let h = harness();
        let (mut client, handle) = start(&h);

        send(&mut client, &Message::Dtmf(b"5".to_vec()));
        send(&mut client, &Message::Dtmf(Vec::new()));
        send(&mut client, &Message::Hangup);
        handle.join().unwrap();

        assert!(h.line.writes().is_empty());
    }

    #[test]
    fn test_unknown_message_type_is_ignored() {
        let h = harness();
        let (mut client, handle) = start(&h);

        send(
            &mut client,
            &Message::Other {
                message_type: 0x42,
                payload: vec![1, 2, 3],
            },
        );
        send(&mut client, &Message::Uuid(vec![0xAB; 16]));
        send(&mut client, &Message::Hangup);

        assert_eq!(handle.join().unwrap(), SessionEnd::Hangup);
    }

    #[test]
    fn test_ptt_line_failure_ends_session() {
        // Arrange
        let h = harness();
        h.line.set_failing(true);
        let (mut client, handle) = start(&h);

        // Act
        send(&mut client, &Message::Dtmf(b"*".to_vec()));
        let end = handle.join().unwrap();

        // Assert
        assert!(matches!(end, SessionEnd::Failed(_)));
        assert_eq!(h.coordinator.ptt().state(), PttState::Off);
        assert_eq!(h.backend.open_devices(), 0);
    }

    #[test]
    fn test_session_end_display() {
        assert_eq!(SessionEnd::Hangup.to_string(), "hangup");
        assert!(SessionEnd::Failed("boom".into()).to_string().contains("boom"));
    }
}
