//! [JSON Web Signatures](https://tools.ietf.org/html/rfc7515): headers,
//! signer/verifier dispatch, and the compact and JSON serializations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;
use crate::jwa::sign::SignatureFamily;
use crate::jwa::SignatureAlgorithm;
use crate::jwk::JWK;

mod compact;
mod json;

pub use compact::{State, JWS};
pub use json::{JWSObjectJSON, Signature};

/// Registered JWS header parameters,
/// [RFC7515#4.1](https://tools.ietf.org/html/rfc7515#section-4.1) and
/// [RFC7797#3](https://tools.ietf.org/html/rfc7797#section-3).
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RegisteredHeader {
    /// Signature or MAC algorithm. Serialized to `alg`.
    #[serde(rename = "alg")]
    pub algorithm: SignatureAlgorithm,

    /// Whether the payload is Base64URL-encoded in the signing input and
    /// serialization (RFC 7797). Absent means `true`.
    #[serde(rename = "b64", skip_serializing_if = "Option::is_none", default)]
    pub base64url_encode_payload: Option<bool>,

    /// Names of extension parameters the recipient must understand.
    /// Serialized to `crit`.
    #[serde(rename = "crit", skip_serializing_if = "Option::is_none", default)]
    pub critical: Option<Vec<String>>,

    /// Media type of the complete object. Serialized to `typ`.
    #[serde(rename = "typ", skip_serializing_if = "Option::is_none", default)]
    pub media_type: Option<String>,

    /// Content type of the secured payload, typically indicating a nested
    /// JOSE object. Serialized to `cty`.
    #[serde(rename = "cty", skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,

    /// URL of a JWK set holding the signing key. Serialized to `jku`.
    #[serde(rename = "jku", skip_serializing_if = "Option::is_none", default)]
    pub web_key_url: Option<String>,

    /// The signing key itself, as a public JWK. Serialized to `jwk`.
    #[serde(rename = "jwk", skip_serializing_if = "Option::is_none", default)]
    pub web_key: Option<JWK>,

    /// ID of the signing key. Serialized to `kid`.
    #[serde(rename = "kid", skip_serializing_if = "Option::is_none", default)]
    pub key_id: Option<String>,

    /// X.509 certificate URL. Serialized to `x5u`.
    #[serde(rename = "x5u", skip_serializing_if = "Option::is_none", default)]
    pub x509_url: Option<String>,

    /// X.509 certificate chain. Serialized to `x5c`.
    #[serde(rename = "x5c", skip_serializing_if = "Option::is_none", default)]
    pub x509_chain: Option<Vec<String>>,

    /// SHA-1 thumbprint of the X.509 certificate. Serialized to `x5t`.
    #[serde(rename = "x5t", skip_serializing_if = "Option::is_none", default)]
    pub x509_sha1_fingerprint: Option<String>,

    /// SHA-256 thumbprint of the X.509 certificate. Serialized to
    /// `x5t#S256`.
    #[serde(rename = "x5t#S256", skip_serializing_if = "Option::is_none", default)]
    pub x509_sha256_fingerprint: Option<String>,
}

/// A JWS protected header: the registered parameters plus any custom ones,
/// preserved verbatim.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Registered header parameters
    #[serde(flatten)]
    pub registered: RegisteredHeader,
    /// Custom header parameters
    #[serde(flatten)]
    pub custom: BTreeMap<String, Value>,
}

impl Header {
    /// A header carrying only registered parameters.
    pub fn from_registered_header(registered: RegisteredHeader) -> Self {
        Header {
            registered,
            custom: BTreeMap::new(),
        }
    }

    /// Serialize and Base64URL-encode this header.
    pub fn to_base64url(&self) -> Result<String, Error> {
        Ok(crate::codec::base64url_encode(&serde_json::to_vec(self)?))
    }

    /// Whether the payload participates Base64URL-encoded (RFC 7797;
    /// absent `b64` means yes).
    pub fn is_base64url_encoded(&self) -> bool {
        self.registered.base64url_encode_payload.unwrap_or(true)
    }
}

impl From<RegisteredHeader> for Header {
    fn from(registered: RegisteredHeader) -> Self {
        Header::from_registered_header(registered)
    }
}

/// Computes signatures over JWS signing input.
///
/// One implementation covers the whole registry by dispatching on the
/// header's `alg`; the object model stays free of per-algorithm types.
pub trait Signer {
    /// Sign the signing input under the given protected header.
    fn sign(&self, header: &Header, signing_input: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Verifies signatures over JWS signing input.
pub trait Verifier {
    /// Verify `signature` over the signing input.
    fn verify(
        &self,
        header: &Header,
        signing_input: &[u8],
        signature: &[u8],
    ) -> Result<(), Error>;

    /// Critical header parameter names the caller processes itself.
    /// Verification fails on any `crit` entry not listed here.
    fn understood_critical_params(&self) -> &[&str] {
        &[]
    }
}

/// A [`Signer`] backed by a JWK, dispatching through the algorithm
/// registry.
#[derive(Debug, Clone)]
pub struct JwkSigner {
    key: JWK,
}

impl JwkSigner {
    pub fn new(key: JWK) -> Self {
        JwkSigner { key }
    }

    /// The signing key.
    pub fn key(&self) -> &JWK {
        &self.key
    }
}

impl Signer for JwkSigner {
    fn sign(&self, header: &Header, signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        header.registered.algorithm.sign(signing_input, &self.key)
    }
}

/// A [`Verifier`] backed by a JWK.
#[derive(Debug, Clone)]
pub struct JwkVerifier {
    key: JWK,
    deferred_critical: Vec<&'static str>,
}

impl JwkVerifier {
    pub fn new(key: JWK) -> Self {
        JwkVerifier {
            key,
            deferred_critical: Vec::new(),
        }
    }

    /// Defer the given critical header parameters to the caller instead of
    /// rejecting them.
    pub fn with_deferred_critical(mut self, names: Vec<&'static str>) -> Self {
        self.deferred_critical = names;
        self
    }

    /// The verification key.
    pub fn key(&self) -> &JWK {
        &self.key
    }
}

impl Verifier for JwkVerifier {
    fn verify(
        &self,
        header: &Header,
        signing_input: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        let alg = header.registered.algorithm;
        // an asymmetric private key must never be used for verification
        if alg.descriptor().family != SignatureFamily::Hmac
            && alg.descriptor().family != SignatureFamily::None
            && self.key.is_private()
        {
            let public = self
                .key
                .public_view()
                .ok_or_else(|| Error::InvalidKey("key has no public part".to_string()))?;
            return alg.verify(signature, signing_input, &public);
        }
        alg.verify(signature, signing_input, &self.key)
    }

    fn understood_critical_params(&self) -> &[&str] {
        &self.deferred_critical
    }
}
