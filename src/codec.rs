//! Byte-level primitives shared by every other module: unpadded Base64URL,
//! minimum-length unsigned big-endian integers, and constant-time
//! comparison.

use base64ct::Encoding;

use crate::errors::Error;
use crate::B64;

/// Encode bytes as unpadded Base64URL (RFC 4648 section 5).
pub fn base64url_encode(data: &[u8]) -> String {
    B64::encode_string(data)
}

/// Decode unpadded Base64URL. Characters outside `[A-Za-z0-9_-]` and inputs
/// whose length is 1 mod 4 are rejected.
pub fn base64url_decode(s: &str) -> Result<Vec<u8>, Error> {
    Ok(B64::decode_vec(s)?)
}

/// Encode an unsigned integer as its shortest big-endian byte string.
///
/// Leading zero bytes are stripped; the value zero encodes as a single zero
/// byte.
pub fn unsigned_be_trim(bytes: &[u8]) -> Vec<u8> {
    match bytes.iter().position(|&b| b != 0) {
        Some(i) => bytes[i..].to_vec(),
        None => vec![0],
    }
}

/// Left-pad an unsigned big-endian byte string to `len` bytes.
///
/// Returns `None` when the value does not fit.
pub fn unsigned_be_pad(bytes: &[u8], len: usize) -> Option<Vec<u8>> {
    let trimmed = match bytes.iter().position(|&b| b != 0) {
        Some(i) => &bytes[i..],
        None => &[],
    };
    if trimmed.len() > len {
        return None;
    }
    let mut out = vec![0u8; len];
    out[len - trimmed.len()..].copy_from_slice(trimmed);
    Some(out)
}

/// Compare two byte strings in constant time.
///
/// Unequal lengths short-circuit to `false`; for equal lengths the
/// comparison examines every byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}

/// Concatenate byte slices into one owned buffer.
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(len);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64url_round_trip() {
        use rand::RngCore;
        let mut rng = rand::thread_rng();
        for len in [0usize, 1, 2, 3, 4, 31, 32, 33, 1024] {
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);
            assert_eq!(base64url_decode(&base64url_encode(&data)).unwrap(), data);
        }
    }

    #[test]
    fn base64url_rejects_padding_and_invalid_characters() {
        assert!(base64url_decode("ab=").is_err());
        assert!(base64url_decode("a+b").is_err());
        assert!(base64url_decode("a/b").is_err());
        // length 1 mod 4 can never be produced by the encoder
        assert!(base64url_decode("abcde").is_err());
    }

    #[test]
    fn known_vector() {
        // RFC 7515 appendix C
        assert_eq!(base64url_encode(&[3, 236, 255, 224, 193]), "A-z_4ME");
    }

    #[test]
    fn unsigned_be_trims_to_minimum_length() {
        assert_eq!(unsigned_be_trim(&[0, 0, 1, 2]), vec![1, 2]);
        assert_eq!(unsigned_be_trim(&[1, 0]), vec![1, 0]);
        assert_eq!(unsigned_be_trim(&[0, 0, 0]), vec![0]);
        assert_eq!(unsigned_be_trim(&[]), vec![0]);
    }

    #[test]
    fn unsigned_be_pads_and_rejects_overflow() {
        assert_eq!(unsigned_be_pad(&[1, 2], 4).unwrap(), vec![0, 0, 1, 2]);
        assert_eq!(unsigned_be_pad(&[0, 0, 1, 2], 2).unwrap(), vec![1, 2]);
        assert!(unsigned_be_pad(&[1, 2, 3], 2).is_none());
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"same bytes", b"same bytes"));
        assert!(!constant_time_eq(b"same bytes", b"same bytez"));
        assert!(!constant_time_eq(b"short", b"longer input"));
    }

    #[test]
    fn concat_joins_in_order() {
        assert_eq!(concat(&[b"a", b"", b"bc"]), b"abc".to_vec());
    }
}
