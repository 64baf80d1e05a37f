//! Binary codec for encoding and decoding gateway messages.
//!
//! Wire format:
//! ```text
//! [msg_type:1][payload_len:2][payload:N]
//! ```
//! Total header size: 3 bytes.  The length is big-endian.  There is no
//! terminator and no checksum: framing relies entirely on the length field,
//! so a stream that ends part-way through a message cannot be resynchronised
//! and is reported as [`ProtocolError::Truncated`].
//!
//! Two flavours are provided:
//!
//! - [`encode_message`] / [`decode_message`] work on byte slices.
//! - [`write_message`] / [`read_message`] work on any `Write` / `Read`
//!   (normally a `TcpStream`) and block until a whole message is transferred.

use std::io::{self, Read, Write};

use crate::protocol::messages::{Message, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use thiserror::Error;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The byte slice is shorter than the header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The header declares more payload than the slice holds.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The payload does not fit in the 16-bit length field.
    #[error("payload of {0} bytes exceeds the 65535-byte limit")]
    PayloadTooLarge(usize),

    /// The stream ended cleanly before the first byte of a message.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended part-way through a message.
    #[error("connection closed mid-message: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ── Slice API ─────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into a byte vector including the 3-byte header.
///
/// The length field is always computed from the payload.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] when the payload is longer than
/// 65535 bytes.
///
/// # Examples
///
/// ```rust
/// use radiogw_core::protocol::{decode_message, encode_message, Message};
///
/// let msg = Message::Dtmf(b"*".to_vec());
/// let bytes = encode_message(&msg).unwrap();
/// assert_eq!(bytes, [0x03, 0x00, 0x01, b'*']);
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = msg.payload();
    let payload_len = payload_len_field(payload.len())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(msg.type_byte());
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes one [`Message`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if the header is incomplete
/// and [`ProtocolError::PayloadLengthMismatch`] if the payload is.
pub fn decode_message(bytes: &[u8]) -> Result<(Message, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let (msg_type, payload_len) = parse_header([bytes[0], bytes[1], bytes[2]]);
    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let payload = bytes[HEADER_SIZE..total_needed].to_vec();
    Ok((Message::from_parts(msg_type, payload), total_needed))
}

// ── Stream API ────────────────────────────────────────────────────────────────

/// Reads exactly one message from `reader`.
///
/// Blocks until the 3 header bytes and then `length` payload bytes have
/// arrived.
///
/// # Errors
///
/// - [`ProtocolError::ConnectionClosed`] if the stream is at EOF before the
///   first header byte.
/// - [`ProtocolError::Truncated`] if it ends inside the header or payload.
/// - [`ProtocolError::Io`] for any other read failure.
pub fn read_message<R: Read + ?Sized>(reader: &mut R) -> Result<Message, ProtocolError> {
    let mut header = [0u8; HEADER_SIZE];
    match fill(reader, &mut header)? {
        0 => return Err(ProtocolError::ConnectionClosed),
        n if n < HEADER_SIZE => {
            return Err(ProtocolError::Truncated {
                expected: HEADER_SIZE,
                received: n,
            })
        }
        _ => {}
    }

    let (msg_type, payload_len) = parse_header(header);
    let mut payload = vec![0u8; payload_len];
    let received = fill(reader, &mut payload)?;
    if received < payload_len {
        return Err(ProtocolError::Truncated {
            expected: payload_len,
            received,
        });
    }

    Ok(Message::from_parts(msg_type, payload))
}

/// Encodes `msg` and writes it to `writer` with a single `write_all`.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] for oversized payloads and
/// [`ProtocolError::Io`] if the write fails.
pub fn write_message<W: Write + ?Sized>(writer: &mut W, msg: &Message) -> Result<(), ProtocolError> {
    let bytes = encode_message(msg)?;
    writer.write_all(&bytes)?;
    Ok(())
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn payload_len_field(len: usize) -> Result<u16, ProtocolError> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(len));
    }
    Ok(len as u16)
}

fn parse_header(header: [u8; HEADER_SIZE]) -> (u8, usize) {
    let payload_len = u16::from_be_bytes([header[1], header[2]]) as usize;
    (header[0], payload_len)
}

/// Reads until `buf` is full or the stream reaches EOF.
///
/// Returns the number of bytes read; a value below `buf.len()` means EOF.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(msg: &Message) -> Message {
        let encoded = encode_message(msg).expect("encode failed");
        let (decoded, consumed) = decode_message(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "consumed bytes should equal total encoded size");
        decoded
    }

    // ── Header layout ─────────────────────────────────────────────────────────

    #[test]
    fn test_hangup_encodes_to_bare_header() {
        let bytes = encode_message(&Message::Hangup).unwrap();
        assert_eq!(bytes, [0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_sound_length_is_big_endian() {
        let bytes = encode_message(&Message::Sound(vec![0u8; 320])).unwrap();
        assert_eq!(bytes[0], 0x10);
        assert_eq!(&bytes[1..3], &[0x01, 0x40]);
        assert_eq!(bytes.len(), HEADER_SIZE + 320);
    }

    #[test]
    fn test_uuid_round_trip() {
        let msg = Message::Uuid(uuid::Uuid::new_v4().as_bytes().to_vec());
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_dtmf_round_trip() {
        let msg = Message::Dtmf(b"*".to_vec());
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_sound_round_trip_at_max_payload() {
        let msg = Message::Sound((0..MAX_PAYLOAD_SIZE).map(|i| i as u8).collect());
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_other_type_round_trip() {
        let msg = Message::Other {
            message_type: 0xFF,
            payload: vec![0x01],
        };
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Error conditions ──────────────────────────────────────────────────────

    #[test]
    fn test_encode_oversized_payload_is_rejected() {
        let result = encode_message(&Message::Sound(vec![0u8; MAX_PAYLOAD_SIZE + 1]));
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge(65536))));
    }

    #[test]
    fn test_decode_empty_bytes_returns_insufficient_data() {
        let result = decode_message(&[]);
        assert!(matches!(result, Err(ProtocolError::InsufficientData { needed: 3, available: 0 })));
    }

    #[test]
    fn test_decode_truncated_payload_returns_length_mismatch() {
        let result = decode_message(&[0x10, 0x00, 0x04, 0xAA]);
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadLengthMismatch { declared: 4, available: 1 })
        ));
    }

    #[test]
    fn test_decode_leaves_trailing_bytes_unconsumed() {
        let mut bytes = encode_message(&Message::Dtmf(b"1".to_vec())).unwrap();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00]);
        let (msg, consumed) = decode_message(&bytes).unwrap();
        assert_eq!(msg, Message::Dtmf(b"1".to_vec()));
        assert_eq!(consumed, 4);
    }

    // ── Stream API ────────────────────────────────────────────────────────────

    #[test]
    fn test_read_message_reads_consecutive_messages() {
        let mut bytes = encode_message(&Message::Sound(vec![1, 2, 3, 4])).unwrap();
        bytes.extend(encode_message(&Message::Hangup).unwrap());
        let mut cursor = Cursor::new(bytes);

        assert_eq!(read_message(&mut cursor).unwrap(), Message::Sound(vec![1, 2, 3, 4]));
        assert_eq!(read_message(&mut cursor).unwrap(), Message::Hangup);
        assert!(matches!(read_message(&mut cursor), Err(ProtocolError::ConnectionClosed)));
    }

    #[test]
    fn test_read_message_short_header_is_truncated() {
        let mut cursor = Cursor::new(vec![0x10, 0x00]);
        let result = read_message(&mut cursor);
        assert!(matches!(result, Err(ProtocolError::Truncated { expected: 3, received: 2 })));
    }

    #[test]
    fn test_read_message_short_payload_is_truncated() {
        let mut cursor = Cursor::new(vec![0x10, 0x00, 0x05, 1, 2]);
        let result = read_message(&mut cursor);
        assert!(matches!(result, Err(ProtocolError::Truncated { expected: 5, received: 2 })));
    }

    #[test]
    fn test_write_message_writes_encoded_bytes() {
        let mut out = Vec::new();
        write_message(&mut out, &Message::Dtmf(b"#".to_vec())).unwrap();
        assert_eq!(out, [0x03, 0x00, 0x01, b'#']);
    }
}
