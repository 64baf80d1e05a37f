//! Best-effort decoding of DTMF payloads.
//!
//! A DTMF message should carry exactly one ASCII character, but clients are
//! not always tidy.  Invalid UTF-8 is dropped rather than rejected; whatever
//! is left must be a single character to count as a digit.

/// The digit that flips PTT when received, unless configured otherwise.
pub const DEFAULT_TOGGLE_DIGIT: char = '*';

/// Decodes a DTMF payload into a single character.
///
/// Returns `None` when nothing decodable remains or when more than one
/// character does; callers treat `None` as a no-op control message.
///
/// # Examples
///
/// ```rust
/// use radiogw_core::decode_dtmf_digit;
///
/// assert_eq!(decode_dtmf_digit(b"*"), Some('*'));
/// assert_eq!(decode_dtmf_digit(&[0xFF]), None);
/// assert_eq!(decode_dtmf_digit(b""), None);
/// ```
pub fn decode_dtmf_digit(payload: &[u8]) -> Option<char> {
    let text = String::from_utf8_lossy(payload);
    let mut chars = text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER);
    match (chars.next(), chars.next()) {
        (Some(digit), None) => Some(digit),
        _ => None,
    }
}
