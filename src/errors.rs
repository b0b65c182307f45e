//! Error types returned by the library.
//!
//! The crypto backends each come with their own error types; everything is
//! mapped into the taxonomy below before it crosses the crate boundary so
//! callers never match on provider internals. Decryption failures are
//! deliberately uninformative.

use std::fmt;

use crate::jwk::source::SourceError;

/// All the errors the library can return.
#[derive(Debug)]
pub enum Error {
    /// Malformed input: bad Base64URL, bad JSON, bad header, oversized data.
    Parse(ParseError),
    /// The algorithm identifier is unknown, or the key/provider cannot
    /// perform it.
    AlgorithmUnsupported(String),
    /// A key or CEK has a length inconsistent with the algorithm.
    KeyLength(String),
    /// A key failed validation (off-curve point, inconsistent RSA CRT
    /// parameters, wrong symmetric size, missing private part).
    InvalidKey(String),
    /// Authenticated decryption or key unwrapping failed. Reported without
    /// detail.
    Decryption,
    /// Signature verification returned false.
    SignatureInvalid,
    /// An operation was invoked in a state that does not allow it.
    IllegalState(&'static str),
    /// A JWK source failed while supplying keys.
    KeySource(SourceError),
}

/// Errors produced while parsing wire forms.
#[derive(Debug)]
pub enum ParseError {
    /// Input was not valid unpadded Base64URL.
    Base64(base64ct::Error),
    /// Input was not valid JSON, or not the expected JSON shape.
    Json(String),
    /// A compact serialization had the wrong number of `.` separated parts.
    PartsLength {
        /// parts the serialization requires
        expected: usize,
        /// parts found in the input
        actual: usize,
    },
    /// A required member was absent.
    MissingField(&'static str),
    /// The decoded protected header exceeded the configured maximum.
    HeaderTooLarge {
        /// decoded size encountered
        len: usize,
        /// configured cap
        max: usize,
    },
    /// A parameter name appeared in both the protected and the unprotected
    /// header.
    HeaderCollision(String),
    /// The input mixed members of the general and flattened JSON
    /// serializations.
    UnexpectedSerialization(&'static str),
    /// An unencoded (`b64=false`) payload cannot be carried in the requested
    /// serialization.
    UnencodedPayloadChars,
    /// Bytes were not valid UTF-8 where text was required.
    Utf8,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Base64(e) => write!(f, "invalid base64url: {e}"),
            ParseError::Json(e) => write!(f, "invalid JSON: {e}"),
            ParseError::PartsLength { expected, actual } => {
                write!(f, "compact serialization has {actual} parts, expected {expected}")
            }
            ParseError::MissingField(name) => write!(f, "missing required member `{name}`"),
            ParseError::HeaderTooLarge { len, max } => {
                write!(f, "protected header is {len} bytes, maximum is {max}")
            }
            ParseError::HeaderCollision(name) => {
                write!(f, "parameter `{name}` present in both protected and unprotected headers")
            }
            ParseError::UnexpectedSerialization(msg) => f.write_str(msg),
            ParseError::UnencodedPayloadChars => {
                f.write_str("unencoded payload contains characters not allowed in a compact serialization")
            }
            ParseError::Utf8 => f.write_str("bytes are not valid UTF-8"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "parse error: {e}"),
            Error::AlgorithmUnsupported(msg) => write!(f, "unsupported algorithm: {msg}"),
            Error::KeyLength(msg) => f.write_str(msg),
            Error::InvalidKey(msg) => write!(f, "invalid key: {msg}"),
            Error::Decryption => f.write_str("decryption failed"),
            Error::SignatureInvalid => f.write_str("signature verification failed"),
            Error::IllegalState(msg) => write!(f, "illegal object state: {msg}"),
            Error::KeySource(e) => write!(f, "key source error: {e}"),
        }
    }
}

impl std::error::Error for ParseError {}
impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<base64ct::Error> for ParseError {
    fn from(e: base64ct::Error) -> Self {
        ParseError::Base64(e)
    }
}

impl From<base64ct::Error> for Error {
    fn from(e: base64ct::Error) -> Self {
        Error::Parse(ParseError::Base64(e))
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Json(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(ParseError::Json(e.to_string()))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::Parse(ParseError::Utf8)
    }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        Error::KeySource(e)
    }
}
