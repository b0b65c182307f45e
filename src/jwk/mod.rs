//! JSON Web Keys
//!
//! Key representation per [RFC 7517](https://tools.ietf.org/html/rfc7517),
//! with the parameter sets of [RFC 7518#6](https://tools.ietf.org/html/rfc7518#section-6)
//! and [RFC 8037](https://tools.ietf.org/html/rfc8037).
//!
//! Parsing through [`JWK::parse`] / [`JWKSet::parse`] validates key shape:
//! EC public points must lie on their declared curve, RSA CRT members must
//! be mutually consistent, OKP coordinates must have the exact encoding
//! length of their curve.

use std::collections::BTreeMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::Error;
use crate::jwa::Algorithm;
use crate::Timestamp;

pub mod matcher;
pub mod source;
mod thumbprint;

pub use matcher::{JWKMatcher, JWKSelector};

/// Key type (`kty`) values.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum KeyType {
    /// Elliptic curve keys
    EC,
    /// RSA keys
    RSA,
    /// Octet key pairs (Edwards / Montgomery curves)
    #[serde(rename = "OKP")]
    OctetKeyPair,
    /// Symmetric octet sequences
    #[serde(rename = "oct")]
    Octet,
}

impl KeyType {
    /// The registered `kty` value.
    pub fn name(self) -> &'static str {
        match self {
            KeyType::EC => "EC",
            KeyType::RSA => "RSA",
            KeyType::OctetKeyPair => "OKP",
            KeyType::Octet => "oct",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Curves usable with `kty: EC`.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum EllipticCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "secp256k1")]
    Secp256k1,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl EllipticCurve {
    /// Field element size in bytes; `x`, `y` and `d` are zero-padded to
    /// this length.
    pub fn field_len(self) -> usize {
        match self {
            EllipticCurve::P256 | EllipticCurve::Secp256k1 => 32,
            EllipticCurve::P384 => 48,
            EllipticCurve::P521 => 66,
        }
    }

    /// The registered `crv` value.
    pub fn name(self) -> &'static str {
        match self {
            EllipticCurve::P256 => "P-256",
            EllipticCurve::Secp256k1 => "secp256k1",
            EllipticCurve::P384 => "P-384",
            EllipticCurve::P521 => "P-521",
        }
    }
}

/// Curves usable with `kty: OKP`.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum OkpCurve {
    Ed25519,
    Ed448,
    X25519,
    X448,
}

impl OkpCurve {
    /// Public coordinate encoding length in bytes.
    pub fn encoding_len(self) -> usize {
        match self {
            OkpCurve::Ed25519 | OkpCurve::X25519 => 32,
            OkpCurve::Ed448 => 57,
            OkpCurve::X448 => 56,
        }
    }

    /// The registered `crv` value.
    pub fn name(self) -> &'static str {
        match self {
            OkpCurve::Ed25519 => "Ed25519",
            OkpCurve::Ed448 => "Ed448",
            OkpCurve::X25519 => "X25519",
            OkpCurve::X448 => "X448",
        }
    }
}

/// The `use` parameter.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum PublicKeyUse {
    /// `sig`
    Signature,
    /// `enc`
    Encryption,
    /// Any other value, preserved verbatim
    Other(String),
}

impl Serialize for PublicKeyUse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = match self {
            PublicKeyUse::Signature => "sig",
            PublicKeyUse::Encryption => "enc",
            PublicKeyUse::Other(other) => other,
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for PublicKeyUse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = PublicKeyUse;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a key use string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(match v {
                    "sig" => PublicKeyUse::Signature,
                    "enc" => PublicKeyUse::Encryption,
                    other => PublicKeyUse::Other(other.to_string()),
                })
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

/// The `key_ops` values.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum KeyOperation {
    Sign,
    Verify,
    Encrypt,
    Decrypt,
    WrapKey,
    UnwrapKey,
    DeriveKey,
    DeriveBits,
    /// Any other value, preserved verbatim
    Other(String),
}

impl KeyOperation {
    fn as_str(&self) -> &str {
        match self {
            KeyOperation::Sign => "sign",
            KeyOperation::Verify => "verify",
            KeyOperation::Encrypt => "encrypt",
            KeyOperation::Decrypt => "decrypt",
            KeyOperation::WrapKey => "wrapKey",
            KeyOperation::UnwrapKey => "unwrapKey",
            KeyOperation::DeriveKey => "deriveKey",
            KeyOperation::DeriveBits => "deriveBits",
            KeyOperation::Other(other) => other,
        }
    }
}

impl Serialize for KeyOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyOperation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = KeyOperation;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a key operation string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(match v {
                    "sign" => KeyOperation::Sign,
                    "verify" => KeyOperation::Verify,
                    "encrypt" => KeyOperation::Encrypt,
                    "decrypt" => KeyOperation::Decrypt,
                    "wrapKey" => KeyOperation::WrapKey,
                    "unwrapKey" => KeyOperation::UnwrapKey,
                    "deriveKey" => KeyOperation::DeriveKey,
                    "deriveBits" => KeyOperation::DeriveBits,
                    other => KeyOperation::Other(other.to_string()),
                })
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

/// Parameters every key type shares, [RFC7517#4](https://tools.ietf.org/html/rfc7517#section-4).
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct CommonParameters {
    /// Intended use of the public key. Serialized to `use`.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none", default)]
    pub public_key_use: Option<PublicKeyUse>,

    /// Operations the key is meant for. Serialized to `key_ops`.
    #[serde(rename = "key_ops", skip_serializing_if = "Option::is_none", default)]
    pub key_operations: Option<Vec<KeyOperation>>,

    /// Algorithm the key is intended for. Serialized to `alg`.
    #[serde(rename = "alg", skip_serializing_if = "Option::is_none", default)]
    pub algorithm: Option<Algorithm>,

    /// Key ID, used to match a specific key during selection. Serialized to `kid`.
    #[serde(rename = "kid", skip_serializing_if = "Option::is_none", default)]
    pub key_id: Option<String>,

    /// X.509 certificate URL. Serialized to `x5u`.
    #[serde(rename = "x5u", skip_serializing_if = "Option::is_none", default)]
    pub x509_url: Option<String>,

    /// X.509 certificate chain, standard Base64 DER. Serialized to `x5c`.
    #[serde(rename = "x5c", skip_serializing_if = "Option::is_none", default)]
    pub x509_chain: Option<Vec<String>>,

    /// SHA-1 thumbprint of the X.509 certificate. Serialized to `x5t`.
    #[serde(rename = "x5t", skip_serializing_if = "Option::is_none", default)]
    pub x509_sha1_fingerprint: Option<String>,

    /// SHA-256 thumbprint of the X.509 certificate. Serialized to `x5t#S256`.
    #[serde(rename = "x5t#S256", skip_serializing_if = "Option::is_none", default)]
    pub x509_sha256_fingerprint: Option<String>,

    /// Expiration time of the key. Serialized to `exp`.
    #[serde(rename = "exp", skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<Timestamp>,

    /// Time before which the key must not be used. Serialized to `nbf`.
    #[serde(rename = "nbf", skip_serializing_if = "Option::is_none", default)]
    pub not_before: Option<Timestamp>,

    /// Issue time of the key. Serialized to `iat`.
    #[serde(rename = "iat", skip_serializing_if = "Option::is_none", default)]
    pub issued_at: Option<Timestamp>,
}

/// Parameters of an elliptic curve key,
/// [RFC7518#6.2](https://tools.ietf.org/html/rfc7518#section-6.2).
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct EllipticCurveKeyParameters {
    /// The curve, serialized to `crv`
    #[serde(rename = "crv")]
    pub curve: EllipticCurve,

    /// X coordinate, zero-padded to the field size
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub x: Vec<u8>,

    /// Y coordinate, zero-padded to the field size
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub y: Vec<u8>,

    /// Private scalar
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub d: Option<Vec<u8>>,
}

/// Additional prime info of a multi-prime RSA key,
/// [RFC7518#6.3.2.7](https://tools.ietf.org/html/rfc7518#section-6.3.2.7).
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct OtherPrimeInfo {
    /// Prime factor
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub r: Vec<u8>,
    /// Factor CRT exponent
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub d: Vec<u8>,
    /// Factor CRT coefficient
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub t: Vec<u8>,
}

/// Parameters of an RSA key,
/// [RFC7518#6.3](https://tools.ietf.org/html/rfc7518#section-6.3).
/// All integers are unsigned big-endian.
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct RSAKeyParameters {
    /// Modulus
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub n: Vec<u8>,

    /// Public exponent
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub e: Vec<u8>,

    /// Private exponent
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub d: Option<Vec<u8>>,

    /// First prime factor
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub p: Option<Vec<u8>>,

    /// Second prime factor
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub q: Option<Vec<u8>>,

    /// First factor CRT exponent
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub dp: Option<Vec<u8>>,

    /// Second factor CRT exponent
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub dq: Option<Vec<u8>>,

    /// First CRT coefficient
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub qi: Option<Vec<u8>>,

    /// Additional primes of a multi-prime key
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub oth: Option<Vec<OtherPrimeInfo>>,
}

/// Parameters of an octet key pair,
/// [RFC8037#2](https://tools.ietf.org/html/rfc8037#section-2).
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct OctetKeyPairParameters {
    /// The curve, serialized to `crv`
    #[serde(rename = "crv")]
    pub curve: OkpCurve,

    /// Public coordinate
    #[serde(with = "crate::serde_custom::byte_sequence")]
    pub x: Vec<u8>,

    /// Private key
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub d: Option<Vec<u8>>,
}

/// Parameters of a symmetric key,
/// [RFC7518#6.4](https://tools.ietf.org/html/rfc7518#section-6.4).
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct OctetKeyParameters {
    /// The key value
    #[serde(rename = "k", with = "crate::serde_custom::byte_sequence")]
    pub value: Vec<u8>,
}

/// Key-type specific parameters, tagged by `kty`.
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum AlgorithmParameters {
    /// Elliptic curve key
    EC(EllipticCurveKeyParameters),
    /// RSA key
    RSA(RSAKeyParameters),
    /// Octet key pair
    #[serde(rename = "OKP")]
    OctetKeyPair(OctetKeyPairParameters),
    /// Symmetric key
    #[serde(rename = "oct")]
    OctetKey(OctetKeyParameters),
}

impl AlgorithmParameters {
    /// The `kty` of these parameters.
    pub fn key_type(&self) -> KeyType {
        match self {
            AlgorithmParameters::EC(_) => KeyType::EC,
            AlgorithmParameters::RSA(_) => KeyType::RSA,
            AlgorithmParameters::OctetKeyPair(_) => KeyType::OctetKeyPair,
            AlgorithmParameters::OctetKey(_) => KeyType::Octet,
        }
    }
}

/// A JSON Web Key.
#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct JWK {
    /// Key-type specific parameters
    #[serde(flatten)]
    pub algorithm: AlgorithmParameters,

    /// Parameters common to all key types
    #[serde(flatten)]
    pub common: CommonParameters,

    /// Members this library does not understand, preserved on round-trip
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

impl JWK {
    /// Parse a JWK from its JSON text and validate its shape.
    pub fn parse(json: &str) -> Result<Self, Error> {
        let jwk: JWK = serde_json::from_str(json)?;
        jwk.validate()?;
        Ok(jwk)
    }

    /// Convenience constructor for a symmetric key.
    pub fn new_octet_key(value: &[u8]) -> Self {
        JWK {
            algorithm: AlgorithmParameters::OctetKey(OctetKeyParameters {
                value: value.to_vec(),
            }),
            common: CommonParameters::default(),
            additional: BTreeMap::new(),
        }
    }

    /// The `kty` of the key.
    pub fn key_type(&self) -> KeyType {
        self.algorithm.key_type()
    }

    /// Whether the key carries private material. Symmetric keys are always
    /// considered private.
    pub fn is_private(&self) -> bool {
        match &self.algorithm {
            AlgorithmParameters::EC(p) => p.d.is_some(),
            AlgorithmParameters::RSA(p) => p.d.is_some(),
            AlgorithmParameters::OctetKeyPair(p) => p.d.is_some(),
            AlgorithmParameters::OctetKey(_) => true,
        }
    }

    /// A copy with all private fields removed. `None` for symmetric keys,
    /// which have no public part.
    pub fn public_view(&self) -> Option<JWK> {
        let algorithm = match &self.algorithm {
            AlgorithmParameters::EC(p) => AlgorithmParameters::EC(EllipticCurveKeyParameters {
                d: None,
                ..p.clone()
            }),
            AlgorithmParameters::RSA(p) => AlgorithmParameters::RSA(RSAKeyParameters {
                n: p.n.clone(),
                e: p.e.clone(),
                ..Default::default()
            }),
            AlgorithmParameters::OctetKeyPair(p) => {
                AlgorithmParameters::OctetKeyPair(OctetKeyPairParameters {
                    d: None,
                    ..p.clone()
                })
            }
            AlgorithmParameters::OctetKey(_) => return None,
        };
        Some(JWK {
            algorithm,
            common: self.common.clone(),
            additional: self.additional.clone(),
        })
    }

    /// The symmetric key bytes, if this is an `oct` key.
    pub fn octet_key(&self) -> Result<&[u8], Error> {
        match &self.algorithm {
            AlgorithmParameters::OctetKey(p) => Ok(&p.value),
            other => Err(unexpected_key_type(KeyType::Octet, other.key_type())),
        }
    }

    /// The EC parameters, if this is an `EC` key.
    pub fn ec_params(&self) -> Result<&EllipticCurveKeyParameters, Error> {
        match &self.algorithm {
            AlgorithmParameters::EC(p) => Ok(p),
            other => Err(unexpected_key_type(KeyType::EC, other.key_type())),
        }
    }

    /// The RSA parameters, if this is an `RSA` key.
    pub fn rsa_params(&self) -> Result<&RSAKeyParameters, Error> {
        match &self.algorithm {
            AlgorithmParameters::RSA(p) => Ok(p),
            other => Err(unexpected_key_type(KeyType::RSA, other.key_type())),
        }
    }

    /// The OKP parameters, if this is an `OKP` key.
    pub fn okp_params(&self) -> Result<&OctetKeyPairParameters, Error> {
        match &self.algorithm {
            AlgorithmParameters::OctetKeyPair(p) => Ok(p),
            other => Err(unexpected_key_type(KeyType::OctetKeyPair, other.key_type())),
        }
    }

    /// Size of the key material in bits: modulus length for RSA, field size
    /// for EC, coordinate length for OKP, key length for `oct`.
    pub fn key_size_bits(&self) -> usize {
        match &self.algorithm {
            AlgorithmParameters::EC(p) => p.curve.field_len() * 8,
            AlgorithmParameters::RSA(p) => crate::codec::unsigned_be_trim(&p.n).len() * 8,
            AlgorithmParameters::OctetKeyPair(p) => p.curve.encoding_len() * 8,
            AlgorithmParameters::OctetKey(p) => p.value.len() * 8,
        }
    }

    /// Validate the key's shape: EC points on-curve, RSA CRT parameters
    /// consistent, OKP coordinate lengths exact.
    pub fn validate(&self) -> Result<(), Error> {
        match &self.algorithm {
            AlgorithmParameters::EC(p) => validate_ec(p),
            AlgorithmParameters::RSA(p) => validate_rsa(p),
            AlgorithmParameters::OctetKeyPair(p) => validate_okp(p),
            AlgorithmParameters::OctetKey(_) => Ok(()),
        }
    }

    /// RFC 7638 thumbprint: Base64URL of SHA-256 over the canonical public
    /// parameter subset.
    pub fn thumbprint(&self) -> String {
        thumbprint::compute(&self.algorithm)
    }
}

fn unexpected_key_type(expected: KeyType, actual: KeyType) -> Error {
    Error::InvalidKey(format!("expected a {expected} key, found {actual}"))
}

fn validate_ec(p: &EllipticCurveKeyParameters) -> Result<(), Error> {
    let len = p.curve.field_len();
    if p.x.len() != len || p.y.len() != len {
        return Err(Error::InvalidKey(format!(
            "EC coordinates for {} must be {len} bytes",
            p.curve.name()
        )));
    }
    if let Some(d) = &p.d {
        if d.len() != len {
            return Err(Error::InvalidKey(format!(
                "EC private scalar for {} must be {len} bytes",
                p.curve.name()
            )));
        }
    }

    let on_curve = match p.curve {
        EllipticCurve::P256 => point_on_curve::<p256::NistP256>(&p.x, &p.y),
        EllipticCurve::Secp256k1 => point_on_curve::<k256::Secp256k1>(&p.x, &p.y),
        EllipticCurve::P384 => point_on_curve::<p384::NistP384>(&p.x, &p.y),
        EllipticCurve::P521 => point_on_curve::<p521::NistP521>(&p.x, &p.y),
    };
    if !on_curve {
        return Err(Error::InvalidKey(format!(
            "EC public point is not on curve {}",
            p.curve.name()
        )));
    }
    Ok(())
}

fn point_on_curve<C>(x: &[u8], y: &[u8]) -> bool
where
    C: elliptic_curve::CurveArithmetic,
    elliptic_curve::FieldBytesSize<C>: elliptic_curve::sec1::ModulusSize,
    C::AffinePoint:
        elliptic_curve::sec1::FromEncodedPoint<C> + elliptic_curve::sec1::ToEncodedPoint<C>,
{
    use elliptic_curve::sec1::FromEncodedPoint;

    let point = elliptic_curve::sec1::EncodedPoint::<C>::from_affine_coordinates(
        elliptic_curve::FieldBytes::<C>::from_slice(x),
        elliptic_curve::FieldBytes::<C>::from_slice(y),
        false,
    );
    Option::<elliptic_curve::PublicKey<C>>::from(elliptic_curve::PublicKey::<C>::from_encoded_point(
        &point,
    ))
    .is_some()
}

fn validate_rsa(params: &RSAKeyParameters) -> Result<(), Error> {
    let crt = [&params.p, &params.q, &params.dp, &params.dq, &params.qi];
    let present = crt.iter().filter(|m| m.is_some()).count();
    if present == 0 {
        return Ok(());
    }
    if present != crt.len() {
        return Err(Error::InvalidKey(
            "RSA CRT parameters must either all be present or all be absent".to_string(),
        ));
    }
    let d = params.d.as_ref().ok_or_else(|| {
        Error::InvalidKey("RSA CRT parameters require the private exponent `d`".to_string())
    })?;

    let n = rsa::BigUint::from_bytes_be(&params.n);
    let e = rsa::BigUint::from_bytes_be(&params.e);
    let d = rsa::BigUint::from_bytes_be(d);
    let p = rsa::BigUint::from_bytes_be(params.p.as_ref().unwrap());
    let q = rsa::BigUint::from_bytes_be(params.q.as_ref().unwrap());

    // checks that n = p * q and that (e, d) invert each other mod λ(n)
    let key = rsa::RsaPrivateKey::from_components(n, e, d.clone(), vec![p.clone(), q.clone()])
        .map_err(|e| Error::InvalidKey(format!("RSA key is inconsistent: {e}")))?;
    key.validate()
        .map_err(|e| Error::InvalidKey(format!("RSA key is inconsistent: {e}")))?;

    // dp = d mod (p-1), dq = d mod (q-1)
    let one = rsa::BigUint::from(1u8);
    let dp = rsa::BigUint::from_bytes_be(params.dp.as_ref().unwrap());
    let dq = rsa::BigUint::from_bytes_be(params.dq.as_ref().unwrap());
    if dp != &d % (&p - &one) || dq != &d % (&q - &one) {
        return Err(Error::InvalidKey(
            "RSA CRT exponents do not match (n, d)".to_string(),
        ));
    }
    Ok(())
}

fn validate_okp(p: &OctetKeyPairParameters) -> Result<(), Error> {
    let len = p.curve.encoding_len();
    if p.x.len() != len {
        return Err(Error::InvalidKey(format!(
            "OKP public coordinate for {} must be {len} bytes",
            p.curve.name()
        )));
    }
    if let Some(d) = &p.d {
        if d.len() != len {
            return Err(Error::InvalidKey(format!(
                "OKP private key for {} must be {len} bytes",
                p.curve.name()
            )));
        }
    }
    Ok(())
}

/// An ordered set of JWKs, [RFC7517#5](https://tools.ietf.org/html/rfc7517#section-5).
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct JWKSet {
    /// The keys, in document order
    pub keys: Vec<JWK>,

    /// Members this library does not understand, preserved on round-trip
    #[serde(flatten)]
    pub additional: BTreeMap<String, Value>,
}

impl JWKSet {
    /// Parse a JWK set from its JSON text and validate every key.
    pub fn parse(json: &str) -> Result<Self, Error> {
        let set: JWKSet = serde_json::from_str(json)?;
        for key in &set.keys {
            key.validate()?;
        }
        Ok(set)
    }

    /// Find the first key with the given key ID. Linear scan; sets are
    /// small in practice.
    pub fn find(&self, key_id: &str) -> Option<&JWK> {
        self.keys
            .iter()
            .find(|key| key.common.key_id.as_deref() == Some(key_id))
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set contains no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7517 appendix A.1
    const RFC7517_EC: &str = r#"{"kty":"EC",
        "crv":"P-256",
        "x":"MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
        "y":"4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM",
        "use":"enc",
        "kid":"1"}"#;

    #[test]
    fn parse_rfc7517_ec_example() {
        let jwk = JWK::parse(RFC7517_EC).unwrap();
        assert_eq!(jwk.key_type(), KeyType::EC);
        assert_eq!(jwk.common.key_id.as_deref(), Some("1"));
        assert_eq!(
            jwk.common.public_key_use,
            Some(PublicKeyUse::Encryption)
        );
        assert!(!jwk.is_private());
        assert_eq!(jwk.key_size_bits(), 256);
    }

    #[test]
    fn off_curve_point_is_rejected() {
        let jwk: JWK = serde_json::from_str(RFC7517_EC).unwrap();
        let mut params = jwk.ec_params().unwrap().clone();
        params.y[0] ^= 1;
        let bad = JWK {
            algorithm: AlgorithmParameters::EC(params),
            ..jwk
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn octet_key_round_trip() {
        let jwk = JWK::new_octet_key(b"secret");
        let json = serde_json::to_string(&jwk).unwrap();
        assert_eq!(json, r#"{"kty":"oct","k":"c2VjcmV0"}"#);
        assert_eq!(JWK::parse(&json).unwrap(), jwk);
        assert!(jwk.is_private());
        assert!(jwk.public_view().is_none());
    }

    #[test]
    fn partial_crt_parameters_are_rejected() {
        let json = r#"{"kty":"RSA","n":"AQAB","e":"AQAB","d":"AQAB","p":"AQAB"}"#;
        let jwk: JWK = serde_json::from_str(json).unwrap();
        assert!(matches!(jwk.validate(), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn okp_coordinate_length_is_exact() {
        let json = r#"{"kty":"OKP","crv":"Ed25519","x":"AQAB"}"#;
        let jwk: JWK = serde_json::from_str(json).unwrap();
        assert!(matches!(jwk.validate(), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn jwk_set_preserves_unknown_members() {
        let json = r#"{"keys":[{"kty":"oct","k":"c2VjcmV0"}],"issuer":"https://example.com"}"#;
        let set = JWKSet::parse(json).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.additional.get("issuer"),
            Some(&Value::String("https://example.com".to_string()))
        );
        let round = serde_json::to_string(&set).unwrap();
        assert_eq!(JWKSet::parse(&round).unwrap(), set);
    }

    #[test]
    fn jwk_set_find_by_kid() {
        let a = JWK {
            common: CommonParameters {
                key_id: Some("a".to_string()),
                ..Default::default()
            },
            ..JWK::new_octet_key(b"ka")
        };
        let b = JWK {
            common: CommonParameters {
                key_id: Some("b".to_string()),
                ..Default::default()
            },
            ..JWK::new_octet_key(b"kb")
        };
        let set = JWKSet {
            keys: vec![a.clone(), b],
            additional: BTreeMap::new(),
        };
        assert_eq!(set.find("a"), Some(&a));
        assert!(set.find("missing").is_none());
    }

    #[test]
    fn public_view_strips_private_material() {
        let json = r#"{"kty":"OKP","crv":"X25519","kid":"x",
            "x":"hSDwCYkwp1R0i33ctD73Wg2_Og0mOBr066SpjqqbTmo",
            "d":"dwdtCnMYpX08FsFyUbJmRd9ML4frwJkqsXf7pR25LCo"}"#;
        let jwk = JWK::parse(json).unwrap();
        assert!(jwk.is_private());
        let public = jwk.public_view().unwrap();
        assert!(!public.is_private());
        assert_eq!(public.common.key_id.as_deref(), Some("x"));
        assert_eq!(public.thumbprint(), jwk.thumbprint());
    }
}
