//! # radiogw-core
//!
//! Shared library for the radio gateway: the framed wire codec spoken by the
//! network client and the push-to-talk (PTT) state machine that keeps the
//! radio half-duplex.
//!
//! This crate has zero dependencies on sockets, sound cards, or serial ports.
//! Everything that touches hardware is reached through the [`ControlLine`]
//! trait, so the state machine can be exercised in plain unit tests.
//!
//! # Architecture overview (for beginners)
//!
//! The gateway sits between one TCP client (for example an Asterisk
//! `AudioSocket()` channel) and an analog transceiver wired to a USB sound
//! card and a USB serial adapter:
//!
//! - **`protocol`** – How bytes travel over the TCP stream.  Every message is
//!   a 3-byte header (type + big-endian length) followed by the payload.
//!   Audio is raw 8 kHz mono 16-bit PCM.
//!
//! - **`domain`** – Pure rules with no I/O of their own.  The
//!   [`PttController`] decides when the transmitter is keyed, the
//!   [`ToggleDebouncer`] suppresses bursts of repeated DTMF key presses, and
//!   [`dtmf`](domain::dtmf) turns a DTMF payload into a character.

pub mod domain;
pub mod protocol;

pub use domain::debounce::ToggleDebouncer;
pub use domain::dtmf::decode_dtmf_digit;
pub use domain::ptt::{ControlLine, ControlLineError, PttController, PttError, PttState};
pub use protocol::codec::{decode_message, encode_message, read_message, write_message, ProtocolError};
pub use protocol::messages::{Message, MessageType};
