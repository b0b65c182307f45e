//! JOSE payloads: an immutable byte sequence with cached views.

use once_cell::sync::OnceCell;

use crate::codec::{base64url_decode, base64url_encode};
use crate::errors::Error;

/// The secured content of a JWS or JWE.
///
/// Constructed once and immutable afterwards; the Base64URL view is
/// computed on first use and cached.
#[derive(Debug, Default)]
pub struct Payload {
    bytes: Vec<u8>,
    base64: OnceCell<String>,
}

impl Payload {
    /// A payload over raw bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Payload {
            bytes,
            base64: OnceCell::new(),
        }
    }

    /// Decode a payload from its Base64URL form, retaining the exact
    /// encoding for round-trips.
    pub fn from_base64url(encoded: &str) -> Result<Self, Error> {
        let bytes = base64url_decode(encoded)?;
        let base64 = OnceCell::new();
        base64.set(encoded.to_owned()).expect("freshly created");
        Ok(Payload { bytes, base64 })
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload as text, when it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// The Base64URL view, cached after the first call.
    pub fn to_base64url(&self) -> &str {
        self.base64.get_or_init(|| base64url_encode(&self.bytes))
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Clone for Payload {
    fn clone(&self) -> Self {
        Payload {
            bytes: self.bytes.clone(),
            base64: self.base64.clone(),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Payload {}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::new(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::new(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::new(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::new(s.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_agree() {
        let payload = Payload::from("Hello, world!");
        assert_eq!(payload.as_bytes(), b"Hello, world!");
        assert_eq!(payload.as_str(), Some("Hello, world!"));
        assert_eq!(payload.to_base64url(), "SGVsbG8sIHdvcmxkIQ");
        assert_eq!(payload.len(), 13);
    }

    #[test]
    fn parsed_base64_is_retained_verbatim() {
        let payload = Payload::from_base64url("SGVsbG8sIHdvcmxkIQ").unwrap();
        assert_eq!(payload.as_str(), Some("Hello, world!"));
        assert_eq!(payload.to_base64url(), "SGVsbG8sIHdvcmxkIQ");
    }

    #[test]
    fn non_utf8_payloads_have_no_text_view() {
        let payload = Payload::new(vec![0xFF, 0xFE]);
        assert_eq!(payload.as_str(), None);
        assert_eq!(payload.to_base64url(), "__4");
    }
}
