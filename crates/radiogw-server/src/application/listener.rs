//! Listener: accepts one client at a time and runs its session to completion.
//!
//! The gateway has exactly one radio, so it serves exactly one client.  A
//! [`SessionSlot`] makes that rule explicit: the listener must hold the slot
//! before it calls `accept`, and the slot is released only after the session
//! has been torn down.  While a session runs, nobody calls `accept`, so a
//! second client waits in the kernel's listen queue and is picked up as soon
//! as the first session ends.  The queue is sized for [`LISTEN_BACKLOG`]
//! pending client; further attempts are left unanswered by the kernel.  No
//! rejection message is ever sent.
//!
//! # Shutdown
//!
//! The socket is non-blocking and polled every [`ACCEPT_POLL_INTERVAL`] so
//! the loop notices the `running` flag dropping while idle.  Accepted
//! connections are switched back to blocking mode for the session loops.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::session::{SessionCoordinator, SessionEnd};

/// Pending connections the kernel queues while a session is running.
pub const LISTEN_BACKLOG: i32 = 1;

/// How often an idle listener re-checks the `running` flag.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Back-off after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The TCP socket could not be bound.
    #[error("failed to bind listener on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// `accept` failed for a reason other than "nothing pending".
    #[error("accept error: {0}")]
    Accept(#[source] io::Error),
    /// A session already holds the slot.
    #[error("a session is already active")]
    SessionActive,
}

// ── Session slot ──────────────────────────────────────────────────────────────

/// Single-occupancy marker for the active session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    occupied: AtomicBool,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot, or returns `None` if it is taken.
    pub fn try_acquire(&self) -> Option<SessionGuard<'_>> {
        self.occupied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionGuard { slot: self })
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }
}

/// Releases the [`SessionSlot`] when dropped.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    slot: &'a SessionSlot,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.slot.occupied.store(false, Ordering::Release);
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// Sequential accept loop bound to one local address.
#[derive(Debug)]
pub struct Listener {
    socket: TcpListener,
    slot: SessionSlot,
    in_session: AtomicBool,
    coordinator: SessionCoordinator,
}

impl Listener {
    /// Binds `addr` and prepares the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindFailed`] if the address is in use or not
    /// local.
    pub fn bind(addr: SocketAddr, coordinator: SessionCoordinator) -> Result<Self, NetworkError> {
        let bind_failed = |source| NetworkError::BindFailed { addr, source };
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_failed)?;
        #[cfg(not(windows))]
        socket.set_reuse_address(true).map_err(bind_failed)?;
        socket.bind(&addr.into()).map_err(bind_failed)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_failed)?;
        let socket: TcpListener = socket.into();
        socket.set_nonblocking(true).map_err(bind_failed)?;
        let bound = socket.local_addr().unwrap_or(addr);
        info!("listening for AudioSocket clients on TCP {bound}");
        Ok(Self {
            socket,
            slot: SessionSlot::new(),
            in_session: AtomicBool::new(false),
            coordinator,
        })
    }

    /// Address actually bound (useful when binding port 0).
    ///
    /// # Errors
    ///
    /// Propagates the OS error from `getsockname`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Returns `true` between accepting a client and finishing its teardown.
    pub fn is_session_active(&self) -> bool {
        self.in_session.load(Ordering::Acquire)
    }

    /// Waits for one client and runs its session.
    ///
    /// Returns `Ok(None)` if `running` dropped before a client arrived.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SessionActive`] if called while another call
    /// is mid-session, or [`NetworkError::Accept`] on a socket error.
    pub fn serve_one(&self, running: &AtomicBool) -> Result<Option<SessionEnd>, NetworkError> {
        let _guard = self.slot.try_acquire().ok_or(NetworkError::SessionActive)?;

        let Some((stream, peer)) = self.accept(running)? else {
            return Ok(None);
        };
        info!(%peer, "client connected");
        self.in_session.store(true, Ordering::Release);
        let end = self.coordinator.run(stream);
        self.in_session.store(false, Ordering::Release);
        Ok(Some(end))
    }

    /// Serves clients one after another until `running` is cleared.
    ///
    /// Accept errors are logged and retried; they never end the loop.
    pub fn serve(&self, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            match self.serve_one(running) {
                Ok(Some(end)) => debug!(reason = %end, "ready for next client"),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "listener error; retrying");
                    thread::sleep(ACCEPT_RETRY_DELAY);
                }
            }
        }
        info!("listener stopped");
    }

    fn accept(&self, running: &AtomicBool) -> Result<Option<(TcpStream, SocketAddr)>, NetworkError> {
        loop {
            match self.socket.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false).map_err(NetworkError::Accept)?;
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(error = %e, "could not disable Nagle");
                    }
                    return Ok(Some((stream, peer)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if !running.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(NetworkError::Accept(e)),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use radiogw_core::PttController;

    use super::*;
    use crate::application::session::SessionConfig;
    use crate::infrastructure::audio::mock::MockAudioBackend;
    use crate::infrastructure::serial::mock::RecordingControlLine;

    fn coordinator() -> SessionCoordinator {
        let ptt = PttController::new(
            Box::new(RecordingControlLine::new()),
            Duration::from_millis(1),
        );
        SessionCoordinator::new(
            Arc::new(MockAudioBackend::new()),
            Arc::new(ptt),
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_slot_admits_one_holder_at_a_time() {
        // Arrange
        let slot = SessionSlot::new();

        // Act
        let first = slot.try_acquire();
        let second = slot.try_acquire();

        // Assert
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(slot.is_occupied());
    }

    #[test]
    fn test_slot_is_released_when_guard_drops() {
        let slot = SessionSlot::new();
        drop(slot.try_acquire());
        assert!(!slot.is_occupied());
        assert!(slot.try_acquire().is_some());
    }

    #[test]
    fn test_bind_port_zero_reports_real_port() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), coordinator()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert!(!listener.is_session_active());
    }

    #[test]
    fn test_bind_on_used_port_fails() {
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), coordinator()).unwrap();
        let addr = first.local_addr().unwrap();

        let result = Listener::bind(addr, coordinator());

        assert!(matches!(result, Err(NetworkError::BindFailed { .. })));
    }

    #[test]
    fn test_serve_one_returns_none_when_stopped() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), coordinator()).unwrap();
        let running = AtomicBool::new(false);

        let result = listener.serve_one(&running).unwrap();

        assert!(result.is_none());
        assert!(!listener.is_session_active());
    }
}
