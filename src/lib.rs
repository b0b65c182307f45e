//! # empanada
//!
//! A library to work with JavaScript Object Signing and Encryption (JOSE):
//! * JSON Web Signature (JWS), compact and JSON serializations
//! * JSON Web Encryption (JWE), compact and JSON serializations
//! * JSON Web Algorithms (JWA)
//! * JSON Web Keys (JWK), thumbprints, matching, and remote sourcing
//! * JSON Web Tokens (JWT)
//!
//! # Examples
//!
//! ## Sign and verify with HS256
//!
//! ```rust
//! use empanada::jwa::SignatureAlgorithm;
//! use empanada::jwk::JWK;
//! use empanada::jws::{Header, JwkSigner, JwkVerifier, RegisteredHeader, JWS};
//! use empanada::Payload;
//!
//! let key = JWK::new_octet_key(&[0x0B; 32]);
//!
//! let header = Header::from_registered_header(RegisteredHeader {
//!     algorithm: SignatureAlgorithm::HS256,
//!     ..Default::default()
//! });
//! let jws = JWS::new(header, Payload::from("Hello, world!")).unwrap();
//! jws.sign(&JwkSigner::new(key.clone())).unwrap();
//! let token = jws.serialize().unwrap();
//!
//! // ... some time later, we get the token back!
//! let jws = JWS::parse(&token).unwrap();
//! jws.verify(&JwkVerifier::new(key)).unwrap();
//! assert_eq!(jws.payload().as_str(), Some("Hello, world!"));
//! ```
//!
//! ## Encrypt and decrypt with A256GCMKW and A256GCM
//!
//! ```rust
//! use empanada::jwa::{ContentEncryptionAlgorithm, KeyManagementAlgorithm};
//! use empanada::jwe::{Header, JwkDecrypter, JwkEncrypter, RegisteredHeader, JWE};
//! use empanada::jwk::JWK;
//! use empanada::Payload;
//!
//! let key = JWK::new_octet_key(&[0x0B; 32]);
//!
//! let header = Header::from_registered_header(RegisteredHeader {
//!     cek_algorithm: KeyManagementAlgorithm::A256GCMKW,
//!     enc_algorithm: ContentEncryptionAlgorithm::A256GCM,
//!     ..Default::default()
//! });
//! let jwe = JWE::new(header, Payload::from("Attack at dawn"));
//! jwe.encrypt(&JwkEncrypter::new(key.clone())).unwrap();
//! let token = jwe.serialize().unwrap();
//!
//! let jwe = JWE::parse(&token).unwrap();
//! let payload = jwe.decrypt(&JwkDecrypter::new(key)).unwrap();
//! assert_eq!(payload.as_str(), Some("Attack at dawn"));
//! ```

// ### RFCs
// - [JSON Web Signature RFC](https://tools.ietf.org/html/rfc7515)
// - [JSON Web Encryption RFC](https://tools.ietf.org/html/rfc7516)
// - [JSON Web Key RFC](https://tools.ietf.org/html/rfc7517)
// - [JSON Web Algorithms RFC](https://tools.ietf.org/html/rfc7518)
// - [JSON Web Tokens RFC](https://tools.ietf.org/html/rfc7519)
// - [JWS Unencoded Payload Option](https://tools.ietf.org/html/rfc7797)
// - [JWK Thumbprint](https://tools.ietf.org/html/rfc7638)
// - [CFRG curves in JOSE](https://tools.ietf.org/html/rfc8037)
// - [ECDH-1PU](https://datatracker.ietf.org/doc/html/draft-madden-jose-ecdh-1pu-04)

#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::default_trait_access,
    clippy::similar_names,
    clippy::enum_glob_use
)]

use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

pub mod codec;
pub mod errors;
pub mod header;
pub mod jwa;
pub mod jwe;
pub mod jwk;
pub mod jws;
pub mod jwt;
pub mod plain;
mod payload;
pub mod proc;
mod serde_custom;

#[cfg(test)]
mod test_keys;

pub use header::{ParseOptions, ProtectedHeader, UnprotectedHeader, DEFAULT_MAX_HEADER_LEN};
pub use payload::Payload;

pub(crate) type B64 = base64ct::Base64UrlUnpadded;

/// Wrapper around `OffsetDateTime` serializing as seconds since the Unix
/// epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

impl Deref for Timestamp {
    type Target = OffsetDateTime;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(datetime: OffsetDateTime) -> Self {
        Timestamp(datetime)
    }
}

impl From<Timestamp> for OffsetDateTime {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl TryFrom<i64> for Timestamp {
    type Error = time::error::ComponentRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        OffsetDateTime::from_unix_timestamp(value).map(Self)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time::serde::timestamp::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        time::serde::timestamp::deserialize(deserializer).map(Self)
    }
}

/// Either a single string value or a list of them, as the `aud` claim
/// allows.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SingleOrMultiple {
    /// One single value
    Single([String; 1]),
    /// Multiple values
    Multiple(Vec<String>),
}

impl SingleOrMultiple {
    /// Whether `value` is (or is among) the contained values.
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single([single]) => single == value,
            Self::Multiple(vector) => vector.iter().any(|v| v == value),
        }
    }

    /// Iterate the contained values.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        match self {
            Self::Single(single) => single.iter(),
            Self::Multiple(vector) => vector.iter(),
        }
    }
}

impl From<&str> for SingleOrMultiple {
    fn from(t: &str) -> Self {
        Self::Single([t.to_owned()])
    }
}

impl From<String> for SingleOrMultiple {
    fn from(t: String) -> Self {
        Self::Single([t])
    }
}

impl From<&[&str]> for SingleOrMultiple {
    fn from(t: &[&str]) -> Self {
        Self::Multiple(t.iter().map(|&s| s.to_owned()).collect())
    }
}

impl From<Vec<String>> for SingleOrMultiple {
    fn from(t: Vec<String>) -> Self {
        Self::Multiple(t)
    }
}

impl Serialize for SingleOrMultiple {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SingleOrMultiple::Single([field]) => field.serialize(serializer),
            SingleOrMultiple::Multiple(field) => field.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SingleOrMultiple {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = SingleOrMultiple;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("single or multiple strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(v.into())
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(v.into())
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(value) = seq.next_element()? {
                    values.push(value);
                }
                Ok(SingleOrMultiple::Multiple(values))
            }
        }
        deserializer.deserialize_any(Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_or_multiple_round_trips() {
        let single: SingleOrMultiple = "foobar".into();
        let json = serde_json::to_string(&single).unwrap();
        assert_eq!(json, r#""foobar""#);
        assert_eq!(serde_json::from_str::<SingleOrMultiple>(&json).unwrap(), single);

        let multiple: SingleOrMultiple = ["foo", "bar"].as_slice().into();
        let json = serde_json::to_string(&multiple).unwrap();
        assert_eq!(json, r#"["foo","bar"]"#);
        assert_eq!(
            serde_json::from_str::<SingleOrMultiple>(&json).unwrap(),
            multiple
        );
        assert!(multiple.contains("bar"));
        assert!(!multiple.contains("baz"));
    }

    #[test]
    fn timestamp_round_trips() {
        let ts: Timestamp = 1300819380.try_into().unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1300819380");
        assert_eq!(serde_json::from_str::<Timestamp>(&json).unwrap(), ts);
    }
}
