//! Header algebra shared by JWS and JWE: protected header parsing with the
//! size cap, kind dispatch, unprotected headers, disjointness and `crit`
//! enforcement.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::base64url_decode;
use crate::errors::{Error, ParseError};
use crate::jwa::SignatureAlgorithm;
use crate::{jwe, jws};

/// Hard limit on the decoded size of a protected header.
pub const DEFAULT_MAX_HEADER_LEN: usize = 20_000;

/// Options honored while parsing wire forms.
#[derive(Debug, Copy, Clone)]
pub struct ParseOptions {
    /// Maximum decoded protected header size in bytes
    pub max_header_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_header_len: DEFAULT_MAX_HEADER_LEN,
        }
    }
}

/// Decode a protected header segment, enforcing the size cap before any
/// JSON work happens.
pub(crate) fn decode_protected(encoded: &str, options: &ParseOptions) -> Result<Vec<u8>, Error> {
    let bytes = base64url_decode(encoded)?;
    if bytes.len() > options.max_header_len {
        return Err(Error::Parse(ParseError::HeaderTooLarge {
            len: bytes.len(),
            max: options.max_header_len,
        }));
    }
    Ok(bytes)
}

/// A parsed protected header of any JOSE kind.
///
/// Dispatch inspects `enc` first (JWE when present), then `alg: none`
/// (unsecured), and falls back to JWS.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtectedHeader {
    /// A JWS protected header
    JWS(jws::Header),
    /// A JWE protected header
    JWE(Box<jwe::Header>),
    /// An unsecured object header (`alg: none`)
    Plain(jws::Header),
}

impl ProtectedHeader {
    /// Parse a Base64URL protected header with default options.
    pub fn parse(encoded: &str) -> Result<Self, Error> {
        Self::parse_with_options(encoded, &ParseOptions::default())
    }

    /// Parse a Base64URL protected header.
    pub fn parse_with_options(encoded: &str, options: &ParseOptions) -> Result<Self, Error> {
        let bytes = decode_protected(encoded, options)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let object = value
            .as_object()
            .ok_or(ParseError::Json("header is not a JSON object".to_string()))?;
        if object.get("alg").is_none() {
            return Err(Error::Parse(ParseError::MissingField("alg")));
        }

        if object.contains_key("enc") {
            let header: jwe::Header = serde_json::from_value(value)?;
            return Ok(ProtectedHeader::JWE(Box::new(header)));
        }
        let header: jws::Header = serde_json::from_value(value)?;
        if header.registered.algorithm == SignatureAlgorithm::None {
            Ok(ProtectedHeader::Plain(header))
        } else {
            Ok(ProtectedHeader::JWS(header))
        }
    }
}

/// An unprotected header: a plain JSON object whose parameter names must
/// not collide with the accompanying protected header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnprotectedHeader(pub BTreeMap<String, Value>);

impl UnprotectedHeader {
    /// The parameter names present in this header.
    pub fn param_names(&self) -> BTreeSet<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Whether the header has no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The set of parameter names a serializable header would emit.
pub(crate) fn param_names<T: Serialize>(header: &T) -> Result<BTreeSet<String>, Error> {
    match serde_json::to_value(header)? {
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        _ => Err(Error::Parse(ParseError::Json(
            "header is not a JSON object".to_string(),
        ))),
    }
}

/// Enforce that a protected and an unprotected header share no parameter
/// names.
pub(crate) fn ensure_disjoint<T: Serialize>(
    protected: &T,
    unprotected: &UnprotectedHeader,
) -> Result<(), Error> {
    let protected_names = param_names(protected)?;
    for name in unprotected.param_names() {
        if protected_names.contains(name) {
            return Err(Error::Parse(ParseError::HeaderCollision(name.to_string())));
        }
    }
    Ok(())
}

/// Merge an unprotected header into the JSON view of a protected header
/// after checking disjointness.
pub(crate) fn join<T: Serialize>(
    protected: &T,
    unprotected: &UnprotectedHeader,
) -> Result<serde_json::Map<String, Value>, Error> {
    ensure_disjoint(protected, unprotected)?;
    let mut merged = match serde_json::to_value(protected)? {
        Value::Object(map) => map,
        _ => {
            return Err(Error::Parse(ParseError::Json(
                "header is not a JSON object".to_string(),
            )))
        }
    };
    for (name, value) in &unprotected.0 {
        merged.insert(name.clone(), value.clone());
    }
    Ok(merged)
}

/// Enforce `crit`: every listed name must be understood by this library or
/// deferred to by the caller.
pub(crate) fn ensure_critical_understood(
    critical: Option<&Vec<String>>,
    deferred: &[&str],
) -> Result<(), Error> {
    let Some(critical) = critical else {
        return Ok(());
    };
    for name in critical {
        // b64 is processed natively (RFC 7797)
        if name == "b64" || deferred.contains(&name.as_str()) {
            continue;
        }
        return Err(Error::AlgorithmUnsupported(format!(
            "critical header parameter `{name}` is not understood"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::base64url_encode;

    #[test]
    fn dispatch_plain_header() {
        // spec example: {"alg":"none"}
        let header = ProtectedHeader::parse("eyJhbGciOiJub25lIn0").unwrap();
        match header {
            ProtectedHeader::Plain(h) => {
                assert_eq!(h.registered.algorithm, SignatureAlgorithm::None);
            }
            other => panic!("expected a plain header, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_jws_header_with_whitespace_preserved() {
        // RFC 7515 A.1 header, which contains embedded CRLF whitespace
        let header =
            ProtectedHeader::parse("eyJ0eXAiOiJKV1QiLA0KICJhbGciOiJIUzI1NiJ9").unwrap();
        match header {
            ProtectedHeader::JWS(h) => {
                assert_eq!(h.registered.algorithm, SignatureAlgorithm::HS256);
                assert_eq!(h.registered.media_type.as_deref(), Some("JWT"));
            }
            other => panic!("expected a JWS header, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_jwe_header_by_enc_presence() {
        let encoded = base64url_encode(br#"{"alg":"dir","enc":"A128GCM"}"#);
        match ProtectedHeader::parse(&encoded).unwrap() {
            ProtectedHeader::JWE(h) => {
                assert_eq!(
                    h.registered.enc_algorithm,
                    crate::jwa::ContentEncryptionAlgorithm::A128GCM
                );
            }
            other => panic!("expected a JWE header, got {other:?}"),
        }
    }

    #[test]
    fn oversized_header_is_rejected_before_json_parsing() {
        let huge = format!(
            r#"{{"alg":"HS256","x":"{}"}}"#,
            "a".repeat(DEFAULT_MAX_HEADER_LEN)
        );
        let encoded = base64url_encode(huge.as_bytes());
        match ProtectedHeader::parse(&encoded) {
            Err(Error::Parse(ParseError::HeaderTooLarge { max, .. })) => {
                assert_eq!(max, DEFAULT_MAX_HEADER_LEN);
            }
            other => panic!("expected a size failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_alg_is_rejected() {
        let encoded = base64url_encode(br#"{"typ":"JWT"}"#);
        assert!(matches!(
            ProtectedHeader::parse(&encoded),
            Err(Error::Parse(ParseError::MissingField("alg")))
        ));
    }

    #[test]
    fn disjointness_is_enforced() {
        let protected = crate::jws::Header::from_registered_header(Default::default());
        let mut unprotected = UnprotectedHeader::default();
        unprotected
            .0
            .insert("kid".to_string(), Value::String("a".to_string()));
        ensure_disjoint(&protected, &unprotected).unwrap();

        unprotected
            .0
            .insert("alg".to_string(), Value::String("HS256".to_string()));
        assert!(matches!(
            ensure_disjoint(&protected, &unprotected),
            Err(Error::Parse(ParseError::HeaderCollision(name))) if name == "alg"
        ));
    }

    #[test]
    fn critical_parameters_must_be_understood() {
        let crit = vec!["exp".to_string()];
        assert!(ensure_critical_understood(Some(&crit), &["exp"]).is_ok());
        assert!(ensure_critical_understood(Some(&crit), &[]).is_err());
        assert!(ensure_critical_understood(None, &[]).is_ok());

        let b64 = vec!["b64".to_string()];
        assert!(ensure_critical_understood(Some(&b64), &[]).is_ok());
    }
}
