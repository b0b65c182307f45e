//! [JSON Web Encryption](https://tools.ietf.org/html/rfc7516): headers,
//! encrypter/decrypter dispatch, and the compact and JSON serializations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::{Error, ParseError};
use crate::jwa::cea::{ContentEncryptionKind, EncryptionResult};
use crate::jwa::kma::{aes_gcm_kw, aes_kw, concat_kdf, ecdh, pbes2, rsa};
use crate::jwa::{ContentEncryptionAlgorithm, KeyManagementAlgorithm};
use crate::jwk::JWK;

mod compact;
mod json;

pub use compact::{State, JWE};
pub use json::{JWEObjectJSON, Recipient, RecipientKey};

/// PBKDF2 iteration count used on the encryption side unless overridden.
pub(crate) const DEFAULT_PBES2_ITERATIONS: u32 = 310_000;

/// Compression applied to the plaintext before encryption. Declared in the
/// header but not implemented; encrypt and decrypt refuse it.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum CompressionAlgorithm {
    /// DEFLATE, [RFC 1951](https://tools.ietf.org/html/rfc1951)
    Deflate,
    /// Any other value
    Other(String),
}

impl Serialize for CompressionAlgorithm {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let string = match self {
            CompressionAlgorithm::Deflate => "DEF",
            CompressionAlgorithm::Other(other) => other,
        };
        serializer.serialize_str(string)
    }
}

impl<'de> Deserialize<'de> for CompressionAlgorithm {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl<'de> de::Visitor<'de> for Visitor {
            type Value = CompressionAlgorithm;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a compression algorithm string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(match v {
                    "DEF" => CompressionAlgorithm::Deflate,
                    other => CompressionAlgorithm::Other(other.to_string()),
                })
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

/// Registered JWE header parameters,
/// [RFC7516#4.1](https://tools.ietf.org/html/rfc7516#section-4.1).
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RegisteredHeader {
    /// Key management algorithm. Serialized to `alg`.
    #[serde(rename = "alg")]
    pub cek_algorithm: KeyManagementAlgorithm,

    /// Content encryption algorithm. Serialized to `enc`.
    #[serde(rename = "enc")]
    pub enc_algorithm: ContentEncryptionAlgorithm,

    /// Plaintext compression. Serialized to `zip`; must only appear in the
    /// protected header.
    #[serde(rename = "zip", skip_serializing_if = "Option::is_none", default)]
    pub compression_algorithm: Option<CompressionAlgorithm>,

    /// Media type of the complete object. Serialized to `typ`.
    #[serde(rename = "typ", skip_serializing_if = "Option::is_none", default)]
    pub media_type: Option<String>,

    /// Content type of the secured payload. Serialized to `cty`.
    #[serde(rename = "cty", skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,

    /// URL of a JWK set holding the recipient key. Serialized to `jku`.
    #[serde(rename = "jku", skip_serializing_if = "Option::is_none", default)]
    pub web_key_url: Option<String>,

    /// The recipient key, as a public JWK. Serialized to `jwk`.
    #[serde(rename = "jwk", skip_serializing_if = "Option::is_none", default)]
    pub web_key: Option<JWK>,

    /// ID of the recipient key. Serialized to `kid`.
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

    /// Names of extension parameters the recipient must understand.
    /// Serialized to `crit`.
    #[serde(rename = "crit", skip_serializing_if = "Option::is_none", default)]
    pub critical: Option<Vec<String>>,
}

/// Header parameters owned by the key management algorithm. Filled in
/// during encryption and consumed during decryption; callers normally do
/// not set these, except `apu`/`apv` for the ECDH modes.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CekAlgorithmHeader {
    /// Ephemeral public key of the ECDH modes. Serialized to `epk`.
    #[serde(rename = "epk", skip_serializing_if = "Option::is_none", default)]
    pub ephemeral_key: Option<JWK>,

    /// Agreement PartyUInfo for the Concat KDF. Serialized to `apu`.
    #[serde(
        rename = "apu",
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub agreement_party_u_info: Option<Vec<u8>>,

    /// Agreement PartyVInfo for the Concat KDF. Serialized to `apv`.
    #[serde(
        rename = "apv",
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub agreement_party_v_info: Option<Vec<u8>>,

    /// Nonce of the AES GCM key wrap. Serialized to `iv`.
    #[serde(
        rename = "iv",
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub nonce: Option<Vec<u8>>,

    /// Tag of the AES GCM key wrap. Serialized to `tag`.
    #[serde(
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub tag: Option<Vec<u8>>,

    /// PBES2 salt input. Serialized to `p2s`.
    #[serde(
        rename = "p2s",
        with = "crate::serde_custom::option_byte_sequence",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub salt: Option<Vec<u8>>,

    /// PBES2 iteration count. Serialized to `p2c`.
    #[serde(rename = "p2c", skip_serializing_if = "Option::is_none", default)]
    pub count: Option<u32>,

    /// ID of the sender key for ECDH-1PU. Serialized to `skid`.
    #[serde(rename = "skid", skip_serializing_if = "Option::is_none", default)]
    pub sender_key_id: Option<String>,
}

/// A JWE protected header: registered parameters, key-management
/// parameters, and custom ones, preserved verbatim.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Registered header parameters
    #[serde(flatten)]
    pub registered: RegisteredHeader,
    /// Key management algorithm specific parameters
    #[serde(flatten)]
    pub kma: CekAlgorithmHeader,
    /// Custom header parameters
    #[serde(flatten)]
    pub custom: BTreeMap<String, Value>,
}

impl Header {
    /// A header carrying only registered parameters.
    pub fn from_registered_header(registered: RegisteredHeader) -> Self {
        Header {
            registered,
            ..Default::default()
        }
    }

    /// Serialize and Base64URL-encode this header.
    pub fn to_base64url(&self) -> Result<String, Error> {
        Ok(crate::codec::base64url_encode(&serde_json::to_vec(self)?))
    }
}

impl From<RegisteredHeader> for Header {
    fn from(registered: RegisteredHeader) -> Self {
        Header::from_registered_header(registered)
    }
}

/// Everything an encrypter produces: the (possibly mutated) header whose
/// encoding became the AAD, and the four binary parts.
#[derive(Debug, Clone)]
pub struct JWECryptoParts {
    /// The final protected header
    pub header: Header,
    /// The exact header encoding used as AAD
    pub header_b64: String,
    /// The encrypted CEK; empty for direct modes
    pub encrypted_key: Vec<u8>,
    /// Content encryption IV
    pub iv: Vec<u8>,
    /// Ciphertext
    pub ciphertext: Vec<u8>,
    /// Content authentication tag
    pub tag: Vec<u8>,
}

/// Performs the complete encryption leg: CEK determination, key
/// management, and content encryption.
///
/// Key management may mutate the header (`epk`, `iv`/`tag`, `p2s`/`p2c`);
/// the mutated header's encoding is the AAD, so the whole leg lives behind
/// one call.
pub trait Encrypter {
    fn encrypt(&self, header: Header, plaintext: &[u8]) -> Result<JWECryptoParts, Error>;
}

/// Recovers the CEK and decrypts the content.
pub trait Decrypter {
    fn decrypt(
        &self,
        header: &Header,
        encrypted_key: Option<&[u8]>,
        iv: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, Error>;

    /// Critical header parameter names the caller processes itself.
    fn understood_critical_params(&self) -> &[&str] {
        &[]
    }
}

/// An [`Encrypter`] backed by a JWK, dispatching through the algorithm
/// registry. The ECDH-1PU modes additionally need the sender's private
/// key.
#[derive(Debug, Clone)]
pub struct JwkEncrypter {
    key: JWK,
    sender_key: Option<JWK>,
    pbes2_iterations: u32,
}

impl JwkEncrypter {
    pub fn new(key: JWK) -> Self {
        JwkEncrypter {
            key,
            sender_key: None,
            pbes2_iterations: DEFAULT_PBES2_ITERATIONS,
        }
    }

    /// Provide the sender's private key for the ECDH-1PU modes.
    pub fn with_sender_key(mut self, sender_key: JWK) -> Self {
        self.sender_key = Some(sender_key);
        self
    }

    /// Override the PBES2 iteration count used on encryption.
    pub fn with_pbes2_iterations(mut self, iterations: u32) -> Self {
        self.pbes2_iterations = iterations;
        self
    }

    // ECDH-1PU recipients look the sender key up by `skid`
    fn advertise_sender_kid(&self, header: &mut Header) {
        if header.kma.sender_key_id.is_none() {
            if let Some(sender) = &self.sender_key {
                header.kma.sender_key_id = sender.common.key_id.clone();
            }
        }
    }
}

fn kdf_parties(header: &Header) -> (Vec<u8>, Vec<u8>) {
    (
        header
            .kma
            .agreement_party_u_info
            .clone()
            .unwrap_or_default(),
        header
            .kma
            .agreement_party_v_info
            .clone()
            .unwrap_or_default(),
    )
}

pub(crate) fn check_wrap_key_len(alg: KeyManagementAlgorithm, key: &[u8]) -> Result<(), Error> {
    let expected = alg.descriptor().wrap_bits.expect("wrapping algorithms have a KEK size");
    if key.len() * 8 != expected {
        return Err(Error::KeyLength(format!(
            "The key encryption key for {} must be {expected} bits",
            alg.name()
        )));
    }
    Ok(())
}

fn ensure_1pu_kw_enc(enc: ContentEncryptionAlgorithm) -> Result<(), Error> {
    if enc.descriptor().kind != ContentEncryptionKind::AesCbcHmacSha2 {
        return Err(Error::AlgorithmUnsupported(
            "ECDH-1PU key wrapping supports only the AES_CBC_HMAC_SHA2 encryption methods"
                .to_string(),
        ));
    }
    Ok(())
}

impl Encrypter for JwkEncrypter {
    fn encrypt(&self, mut header: Header, plaintext: &[u8]) -> Result<JWECryptoParts, Error> {
        use crate::jwa::kma::KeyManagementAlgorithmType::*;

        let alg = header.registered.cek_algorithm;
        let enc = header.registered.enc_algorithm;
        if header.registered.compression_algorithm.is_some() {
            return Err(Error::AlgorithmUnsupported(
                "plaintext compression is not supported".to_string(),
            ));
        }

        // RFC 7516 section 5.1, steps 1-8: determine the CEK, wrapping it
        // where the mode allows that before the header is fixed
        let mut deferred_agreement: Option<Vec<u8>> = None;
        let (cek, mut encrypted_key) = match alg.algorithm_type() {
            DirectEncryption => {
                let cek = self.key.octet_key()?.to_vec();
                (cek, Vec::new())
            }
            DirectKeyAgreement => {
                let z =
                    ecdh::agree_sender(alg, &self.key, self.sender_key.as_ref(), &mut header.kma)?;
                self.advertise_sender_kid(&mut header);
                let (apu, apv) = kdf_parties(&header);
                let cek = concat_kdf::derive(
                    &z,
                    enc.name(),
                    &apu,
                    &apv,
                    enc.descriptor().cek_bits,
                    None,
                );
                (cek, Vec::new())
            }
            KeyAgreementWithKeyWrapping => {
                let z =
                    ecdh::agree_sender(alg, &self.key, self.sender_key.as_ref(), &mut header.kma)?;
                self.advertise_sender_kid(&mut header);
                let cek = enc.generate_cek();
                if alg.is_ecdh_1pu() {
                    // the KEK derivation needs the content tag; wrap after
                    // content encryption
                    ensure_1pu_kw_enc(enc)?;
                    deferred_agreement = Some(z);
                    (cek, Vec::new())
                } else {
                    let (apu, apv) = kdf_parties(&header);
                    let kek = concat_kdf::derive(
                        &z,
                        alg.name(),
                        &apu,
                        &apv,
                        alg.descriptor().wrap_bits.expect("KW mode"),
                        None,
                    );
                    let encrypted_key = aes_kw::wrap(&kek, &cek)?;
                    (cek, encrypted_key)
                }
            }
            SymmetricKeyWrapping => {
                let cek = enc.generate_cek();
                let secret = self.key.octet_key()?;
                let encrypted_key = match alg {
                    KeyManagementAlgorithm::A128KW
                    | KeyManagementAlgorithm::A192KW
                    | KeyManagementAlgorithm::A256KW => {
                        check_wrap_key_len(alg, secret)?;
                        aes_kw::wrap(secret, &cek)?
                    }
                    KeyManagementAlgorithm::A128GCMKW
                    | KeyManagementAlgorithm::A192GCMKW
                    | KeyManagementAlgorithm::A256GCMKW => {
                        aes_gcm_kw::wrap(alg, secret, &cek, &mut header.kma)?
                    }
                    KeyManagementAlgorithm::PBES2_HS256_A128KW
                    | KeyManagementAlgorithm::PBES2_HS384_A192KW
                    | KeyManagementAlgorithm::PBES2_HS512_A256KW => pbes2::wrap(
                        alg,
                        secret,
                        &cek,
                        &mut header.kma,
                        self.pbes2_iterations,
                    )?,
                    _ => unreachable!("registry covers every wrapping algorithm"),
                };
                (cek, encrypted_key)
            }
            AsymmetricKeyEncryption => {
                let cek = enc.generate_cek();
                let encrypted_key = rsa::encrypt_cek(alg, &self.key, &cek)?;
                (cek, encrypted_key)
            }
        };

        // steps 9-15: the final header is the AAD
        let header_b64 = header.to_base64url()?;
        let iv = enc.generate_iv();
        let result = enc.encrypt(&cek, plaintext, iv, header_b64.clone().into_bytes())?;

        if let Some(z) = deferred_agreement {
            let (apu, apv) = kdf_parties(&header);
            let kek = concat_kdf::derive(
                &z,
                alg.name(),
                &apu,
                &apv,
                alg.descriptor().wrap_bits.expect("KW mode"),
                Some(&result.tag),
            );
            encrypted_key = aes_kw::wrap(&kek, &cek)?;
        }

        Ok(JWECryptoParts {
            header,
            header_b64,
            encrypted_key,
            iv: result.nonce,
            ciphertext: result.encrypted,
            tag: result.tag,
        })
    }
}

/// A [`Decrypter`] backed by a JWK. The ECDH-1PU modes additionally need
/// the sender's public key.
#[derive(Debug, Clone)]
pub struct JwkDecrypter {
    key: JWK,
    sender_key: Option<JWK>,
    pbes2_min_iterations: u32,
    deferred_critical: Vec<&'static str>,
}

impl JwkDecrypter {
    pub fn new(key: JWK) -> Self {
        JwkDecrypter {
            key,
            sender_key: None,
            pbes2_min_iterations: pbes2::DEFAULT_PBES2_MIN_ITERATIONS,
            deferred_critical: Vec::new(),
        }
    }

    /// Provide the sender's public key for the ECDH-1PU modes.
    pub fn with_sender_key(mut self, sender_key: JWK) -> Self {
        self.sender_key = Some(sender_key);
        self
    }

    /// Raise or lower the minimum accepted PBES2 iteration count.
    pub fn with_pbes2_min_iterations(mut self, min: u32) -> Self {
        self.pbes2_min_iterations = min;
        self
    }

    /// Defer the given critical header parameters to the caller instead of
    /// rejecting them.
    pub fn with_deferred_critical(mut self, names: Vec<&'static str>) -> Self {
        self.deferred_critical = names;
        self
    }

    fn unwrap_cek(
        &self,
        header: &Header,
        encrypted_key: Option<&[u8]>,
        content_tag: &[u8],
    ) -> Result<Vec<u8>, Error> {
        use crate::jwa::kma::KeyManagementAlgorithmType::*;

        let alg = header.registered.cek_algorithm;
        let enc = header.registered.enc_algorithm;
        let encrypted_key = encrypted_key.filter(|k| !k.is_empty());

        match alg.algorithm_type() {
            DirectEncryption => {
                if encrypted_key.is_some() {
                    return Err(Error::Parse(ParseError::UnexpectedSerialization(
                        "direct encryption carries no encrypted key",
                    )));
                }
                Ok(self.key.octet_key()?.to_vec())
            }
            DirectKeyAgreement => {
                if encrypted_key.is_some() {
                    return Err(Error::Parse(ParseError::UnexpectedSerialization(
                        "direct key agreement carries no encrypted key",
                    )));
                }
                let z =
                    ecdh::agree_recipient(alg, &self.key, self.sender_key.as_ref(), &header.kma)?;
                let (apu, apv) = kdf_parties(header);
                Ok(concat_kdf::derive(
                    &z,
                    enc.name(),
                    &apu,
                    &apv,
                    enc.descriptor().cek_bits,
                    None,
                ))
            }
            KeyAgreementWithKeyWrapping => {
                let encrypted_key =
                    encrypted_key.ok_or(Error::Parse(ParseError::MissingField("encrypted_key")))?;
                let z =
                    ecdh::agree_recipient(alg, &self.key, self.sender_key.as_ref(), &header.kma)?;
                let (apu, apv) = kdf_parties(header);
                let tag = if alg.is_ecdh_1pu() {
                    ensure_1pu_kw_enc(enc)?;
                    Some(content_tag)
                } else {
                    None
                };
                let kek = concat_kdf::derive(
                    &z,
                    alg.name(),
                    &apu,
                    &apv,
                    alg.descriptor().wrap_bits.expect("KW mode"),
                    tag,
                );
                aes_kw::unwrap(&kek, encrypted_key)
            }
            SymmetricKeyWrapping => {
                let encrypted_key =
                    encrypted_key.ok_or(Error::Parse(ParseError::MissingField("encrypted_key")))?;
                let secret = self.key.octet_key()?;
                match alg {
                    KeyManagementAlgorithm::A128KW
                    | KeyManagementAlgorithm::A192KW
                    | KeyManagementAlgorithm::A256KW => {
                        check_wrap_key_len(alg, secret)?;
                        aes_kw::unwrap(secret, encrypted_key)
                    }
                    KeyManagementAlgorithm::A128GCMKW
                    | KeyManagementAlgorithm::A192GCMKW
                    | KeyManagementAlgorithm::A256GCMKW => {
                        aes_gcm_kw::unwrap(alg, secret, encrypted_key, &header.kma)
                    }
                    KeyManagementAlgorithm::PBES2_HS256_A128KW
                    | KeyManagementAlgorithm::PBES2_HS384_A192KW
                    | KeyManagementAlgorithm::PBES2_HS512_A256KW => pbes2::unwrap(
                        alg,
                        secret,
                        encrypted_key,
                        &header.kma,
                        self.pbes2_min_iterations,
                    ),
                    _ => unreachable!("registry covers every wrapping algorithm"),
                }
            }
            AsymmetricKeyEncryption => {
                let encrypted_key =
                    encrypted_key.ok_or(Error::Parse(ParseError::MissingField("encrypted_key")))?;
                rsa::decrypt_cek(alg, &self.key, encrypted_key, enc.cek_len())
            }
        }
    }
}

impl Decrypter for JwkDecrypter {
    fn decrypt(
        &self,
        header: &Header,
        encrypted_key: Option<&[u8]>,
        iv: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, Error> {
        if header.registered.compression_algorithm.is_some() {
            return Err(Error::AlgorithmUnsupported(
                "plaintext compression is not supported".to_string(),
            ));
        }
        let cek = self.unwrap_cek(header, encrypted_key, tag)?;
        header.registered.enc_algorithm.decrypt(
            &cek,
            &EncryptionResult {
                nonce: iv.to_vec(),
                encrypted: ciphertext.to_vec(),
                tag: tag.to_vec(),
                additional_data: aad.to_vec(),
            },
        )
    }

    fn understood_critical_params(&self) -> &[&str] {
        &self.deferred_critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_with_kma_parameters() {
        let json = r#"{"alg":"A256GCMKW","enc":"A256GCM","iv":"qQLCc5t-ZkkCtfGM","tag":"R0cJVQ","kid":"k1"}"#;
        let header: Header = serde_json::from_str(json).unwrap();
        assert_eq!(
            header.registered.cek_algorithm,
            KeyManagementAlgorithm::A256GCMKW
        );
        assert!(header.kma.nonce.is_some());
        assert!(header.kma.tag.is_some());
        let round: Header =
            serde_json::from_str(&serde_json::to_string(&header).unwrap()).unwrap();
        assert_eq!(round, header);
    }

    #[test]
    fn compression_is_refused() {
        let header = Header {
            registered: RegisteredHeader {
                cek_algorithm: KeyManagementAlgorithm::DirectSymmetricKey,
                enc_algorithm: ContentEncryptionAlgorithm::A128GCM,
                compression_algorithm: Some(CompressionAlgorithm::Deflate),
                ..Default::default()
            },
            ..Default::default()
        };
        let encrypter = JwkEncrypter::new(crate::jwk::JWK::new_octet_key(&[0; 16]));
        assert!(matches!(
            encrypter.encrypt(header, b"data"),
            Err(Error::AlgorithmUnsupported(_))
        ));
    }
}
