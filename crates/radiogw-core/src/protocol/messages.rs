//! Message types carried on the gateway's TCP stream.
//!
//! The framing is the one used by Asterisk's `AudioSocket` application: a
//! type byte, a big-endian `u16` payload length, then the payload.  Only the
//! four types the gateway acts on get their own variants; everything else is
//! preserved as [`Message::Other`] so it can be skipped without tearing the
//! session down.

use uuid::Uuid;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Total size of the message header in bytes (type + length).
pub const HEADER_SIZE: usize = 3;

/// Largest payload a single message can carry (the length field is a `u16`).
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Sample rate of every SOUND payload, in Hz.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Channel count of every SOUND payload.
pub const CHANNELS: u16 = 1;

/// Bytes per sample of every SOUND payload (signed 16-bit little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

// ── Message type codes ────────────────────────────────────────────────────────

/// Message type codes the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Graceful end of the session; empty payload.
    Hangup = 0x00,
    /// Opaque call identifier sent by the client.
    Uuid = 0x01,
    /// One DTMF character.
    Dtmf = 0x03,
    /// One period of raw PCM audio.
    Sound = 0x10,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x00 => Ok(MessageType::Hangup),
            0x01 => Ok(MessageType::Uuid),
            0x03 => Ok(MessageType::Dtmf),
            0x10 => Ok(MessageType::Sound),
            _ => Err(()),
        }
    }
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// A decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// HANGUP (0x00).  Any payload bytes are discarded on decode.
    Hangup,
    /// UUID (0x01): identifier of the call on the client side, uninterpreted.
    Uuid(Vec<u8>),
    /// DTMF (0x03): raw payload, normally a single ASCII character.
    Dtmf(Vec<u8>),
    /// SOUND (0x10): one frame of S16LE mono 8 kHz PCM.
    Sound(Vec<u8>),
    /// Any type byte the gateway does not act on.
    Other { message_type: u8, payload: Vec<u8> },
}

impl Message {
    /// Returns the type byte written in the header for this message.
    pub fn type_byte(&self) -> u8 {
        match self {
            Message::Hangup => MessageType::Hangup as u8,
            Message::Uuid(_) => MessageType::Uuid as u8,
            Message::Dtmf(_) => MessageType::Dtmf as u8,
            Message::Sound(_) => MessageType::Sound as u8,
            Message::Other { message_type, .. } => *message_type,
        }
    }

    /// Returns the payload bytes (empty for [`Message::Hangup`]).
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Hangup => &[],
            Message::Uuid(p) | Message::Dtmf(p) | Message::Sound(p) => p,
            Message::Other { payload, .. } => payload,
        }
    }

    /// Builds a message from a raw type byte and payload.
    pub fn from_parts(message_type: u8, payload: Vec<u8>) -> Self {
        match MessageType::try_from(message_type) {
            Ok(MessageType::Hangup) => Message::Hangup,
            Ok(MessageType::Uuid) => Message::Uuid(payload),
            Ok(MessageType::Dtmf) => Message::Dtmf(payload),
            Ok(MessageType::Sound) => Message::Sound(payload),
            Err(()) => Message::Other {
                message_type,
                payload,
            },
        }
    }
}

/// Renders a UUID payload for logging.
///
/// AudioSocket sends the call UUID as 16 raw bytes; anything else is shown
/// as lowercase hex.
pub fn format_call_id(payload: &[u8]) -> String {
    match Uuid::from_slice(payload) {
        Ok(id) => id.to_string(),
        Err(_) => payload.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_try_from_known_values() {
        assert_eq!(MessageType::try_from(0x00), Ok(MessageType::Hangup));
        assert_eq!(MessageType::try_from(0x01), Ok(MessageType::Uuid));
        assert_eq!(MessageType::try_from(0x03), Ok(MessageType::Dtmf));
        assert_eq!(MessageType::try_from(0x10), Ok(MessageType::Sound));
    }

    #[test]
    fn test_message_type_try_from_unknown_value_fails() {
        assert!(MessageType::try_from(0x02).is_err());
        assert!(MessageType::try_from(0xFF).is_err());
    }

    #[test]
    fn test_from_parts_maps_unknown_type_to_other() {
        let msg = Message::from_parts(0xFF, vec![1, 2]);
        assert_eq!(
            msg,
            Message::Other {
                message_type: 0xFF,
                payload: vec![1, 2]
            }
        );
        assert_eq!(msg.type_byte(), 0xFF);
    }

    #[test]
    fn test_hangup_has_empty_payload() {
        assert!(Message::Hangup.payload().is_empty());
        assert_eq!(Message::from_parts(0x00, vec![9, 9]), Message::Hangup);
    }

    #[test]
    fn test_format_call_id_renders_sixteen_bytes_as_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(format_call_id(id.as_bytes()), id.to_string());
    }

    #[test]
    fn test_format_call_id_renders_other_lengths_as_hex() {
        assert_eq!(format_call_id(&[0xAB, 0x01]), "ab01");
        assert_eq!(format_call_id(&[]), "");
    }
}
