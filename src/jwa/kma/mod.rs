//! Key management algorithms,
//! [RFC7518#4](https://tools.ietf.org/html/rfc7518#section-4) and
//! [draft-madden-jose-ecdh-1pu-04](https://datatracker.ietf.org/doc/html/draft-madden-jose-ecdh-1pu-04).
//!
//! The enum carries the registry facts; the submodules hold the actual
//! wrap/unwrap and agreement primitives. The JWE encrypter drives them in
//! the order RFC 7516 section 5.1 requires, because two of the modes
//! interleave with content encryption: ECDH ephemeral keys must land in the
//! header before it becomes the AAD, and ECDH-1PU key wrapping consumes the
//! content authentication tag.

use serde::{Deserialize, Serialize};

use crate::jwa::ShaHash;
use crate::jwk::KeyType;

pub(crate) mod aes_gcm_kw;
pub(crate) mod aes_kw;
pub(crate) mod concat_kdf;
pub(crate) mod ecdh;
pub(crate) mod pbes2;
pub(crate) mod rsa;

pub use pbes2::DEFAULT_PBES2_MIN_ITERATIONS;

/// Key management algorithms (`alg` values of JWE).
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum KeyManagementAlgorithm {
    /// RSAES-PKCS1-v1_5
    RSA1_5,
    /// RSAES OAEP with SHA-1 (deprecated)
    #[serde(rename = "RSA-OAEP")]
    RSA_OAEP,
    /// RSAES OAEP with SHA-256 and MGF1-SHA-256
    #[serde(rename = "RSA-OAEP-256")]
    RSA_OAEP_256,
    /// RSAES OAEP with SHA-384 and MGF1-SHA-384
    #[serde(rename = "RSA-OAEP-384")]
    RSA_OAEP_384,
    /// RSAES OAEP with SHA-512 and MGF1-SHA-512
    #[serde(rename = "RSA-OAEP-512")]
    RSA_OAEP_512,
    /// AES key wrap with a 128-bit KEK
    A128KW,
    /// AES key wrap with a 192-bit KEK
    A192KW,
    /// AES key wrap with a 256-bit KEK
    A256KW,
    /// Direct use of a shared symmetric key
    #[serde(rename = "dir")]
    DirectSymmetricKey,
    /// ECDH-ES with the CEK derived by the Concat KDF
    #[serde(rename = "ECDH-ES")]
    ECDH_ES,
    /// ECDH-ES deriving a 128-bit AES key-wrapping key
    #[serde(rename = "ECDH-ES+A128KW")]
    ECDH_ES_A128KW,
    /// ECDH-ES deriving a 192-bit AES key-wrapping key
    #[serde(rename = "ECDH-ES+A192KW")]
    ECDH_ES_A192KW,
    /// ECDH-ES deriving a 256-bit AES key-wrapping key
    #[serde(rename = "ECDH-ES+A256KW")]
    ECDH_ES_A256KW,
    /// ECDH One-Pass Unified Model with the CEK derived directly
    #[serde(rename = "ECDH-1PU")]
    ECDH_1PU,
    /// ECDH-1PU deriving a 128-bit AES key-wrapping key
    #[serde(rename = "ECDH-1PU+A128KW")]
    ECDH_1PU_A128KW,
    /// ECDH-1PU deriving a 192-bit AES key-wrapping key
    #[serde(rename = "ECDH-1PU+A192KW")]
    ECDH_1PU_A192KW,
    /// ECDH-1PU deriving a 256-bit AES key-wrapping key
    #[serde(rename = "ECDH-1PU+A256KW")]
    ECDH_1PU_A256KW,
    /// AES GCM key wrap with a 128-bit KEK
    A128GCMKW,
    /// AES GCM key wrap with a 192-bit KEK
    A192GCMKW,
    /// AES GCM key wrap with a 256-bit KEK
    A256GCMKW,
    /// PBES2 with HMAC SHA-256 and A128KW wrapping
    #[serde(rename = "PBES2-HS256+A128KW")]
    PBES2_HS256_A128KW,
    /// PBES2 with HMAC SHA-384 and A192KW wrapping
    #[serde(rename = "PBES2-HS384+A192KW")]
    PBES2_HS384_A192KW,
    /// PBES2 with HMAC SHA-512 and A256KW wrapping
    #[serde(rename = "PBES2-HS512+A256KW")]
    PBES2_HS512_A256KW,
}

/// How a key management algorithm produces the CEK.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum KeyManagementAlgorithmType {
    /// Wraps a randomly generated CEK with a symmetric algorithm
    SymmetricKeyWrapping,
    /// Encrypts a randomly generated CEK with an asymmetric algorithm
    AsymmetricKeyEncryption,
    /// Key agreement determines the CEK itself
    DirectKeyAgreement,
    /// Key agreement determines a KEK that wraps a fresh CEK
    KeyAgreementWithKeyWrapping,
    /// The caller's symmetric key is the CEK
    DirectEncryption,
}

/// Registry descriptor for a key management algorithm.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct KeyManagementDescriptor {
    pub kind: KeyManagementAlgorithmType,
    /// OAEP hash or PBES2 PRF
    pub hash: Option<ShaHash>,
    /// KEK size in bits for wrapping modes
    pub wrap_bits: Option<usize>,
}

impl KeyManagementAlgorithm {
    /// The registered `alg` name.
    pub fn name(self) -> &'static str {
        use KeyManagementAlgorithm::*;
        match self {
            RSA1_5 => "RSA1_5",
            RSA_OAEP => "RSA-OAEP",
            RSA_OAEP_256 => "RSA-OAEP-256",
            RSA_OAEP_384 => "RSA-OAEP-384",
            RSA_OAEP_512 => "RSA-OAEP-512",
            A128KW => "A128KW",
            A192KW => "A192KW",
            A256KW => "A256KW",
            DirectSymmetricKey => "dir",
            ECDH_ES => "ECDH-ES",
            ECDH_ES_A128KW => "ECDH-ES+A128KW",
            ECDH_ES_A192KW => "ECDH-ES+A192KW",
            ECDH_ES_A256KW => "ECDH-ES+A256KW",
            ECDH_1PU => "ECDH-1PU",
            ECDH_1PU_A128KW => "ECDH-1PU+A128KW",
            ECDH_1PU_A192KW => "ECDH-1PU+A192KW",
            ECDH_1PU_A256KW => "ECDH-1PU+A256KW",
            A128GCMKW => "A128GCMKW",
            A192GCMKW => "A192GCMKW",
            A256GCMKW => "A256GCMKW",
            PBES2_HS256_A128KW => "PBES2-HS256+A128KW",
            PBES2_HS384_A192KW => "PBES2-HS384+A192KW",
            PBES2_HS512_A256KW => "PBES2-HS512+A256KW",
        }
    }

    /// The registry descriptor for this algorithm.
    pub fn descriptor(self) -> KeyManagementDescriptor {
        use KeyManagementAlgorithm::*;
        use KeyManagementAlgorithmType as T;
        let (kind, hash, wrap_bits) = match self {
            RSA1_5 => (T::AsymmetricKeyEncryption, None, None),
            RSA_OAEP => (T::AsymmetricKeyEncryption, Some(ShaHash::Sha1), None),
            RSA_OAEP_256 => (T::AsymmetricKeyEncryption, Some(ShaHash::Sha256), None),
            RSA_OAEP_384 => (T::AsymmetricKeyEncryption, Some(ShaHash::Sha384), None),
            RSA_OAEP_512 => (T::AsymmetricKeyEncryption, Some(ShaHash::Sha512), None),
            A128KW => (T::SymmetricKeyWrapping, None, Some(128)),
            A192KW => (T::SymmetricKeyWrapping, None, Some(192)),
            A256KW => (T::SymmetricKeyWrapping, None, Some(256)),
            DirectSymmetricKey => (T::DirectEncryption, None, None),
            ECDH_ES => (T::DirectKeyAgreement, Some(ShaHash::Sha256), None),
            ECDH_ES_A128KW => (T::KeyAgreementWithKeyWrapping, Some(ShaHash::Sha256), Some(128)),
            ECDH_ES_A192KW => (T::KeyAgreementWithKeyWrapping, Some(ShaHash::Sha256), Some(192)),
            ECDH_ES_A256KW => (T::KeyAgreementWithKeyWrapping, Some(ShaHash::Sha256), Some(256)),
            ECDH_1PU => (T::DirectKeyAgreement, Some(ShaHash::Sha256), None),
            ECDH_1PU_A128KW => (T::KeyAgreementWithKeyWrapping, Some(ShaHash::Sha256), Some(128)),
            ECDH_1PU_A192KW => (T::KeyAgreementWithKeyWrapping, Some(ShaHash::Sha256), Some(192)),
            ECDH_1PU_A256KW => (T::KeyAgreementWithKeyWrapping, Some(ShaHash::Sha256), Some(256)),
            A128GCMKW => (T::SymmetricKeyWrapping, None, Some(128)),
            A192GCMKW => (T::SymmetricKeyWrapping, None, Some(192)),
            A256GCMKW => (T::SymmetricKeyWrapping, None, Some(256)),
            PBES2_HS256_A128KW => (T::SymmetricKeyWrapping, Some(ShaHash::Sha256), Some(128)),
            PBES2_HS384_A192KW => (T::SymmetricKeyWrapping, Some(ShaHash::Sha384), Some(192)),
            PBES2_HS512_A256KW => (T::SymmetricKeyWrapping, Some(ShaHash::Sha512), Some(256)),
        };
        KeyManagementDescriptor {
            kind,
            hash,
            wrap_bits,
        }
    }

    /// How this algorithm produces the CEK.
    pub fn algorithm_type(self) -> KeyManagementAlgorithmType {
        self.descriptor().kind
    }

    /// The registered implementation requirement level.
    pub fn requirement(self) -> crate::jwa::Requirement {
        use crate::jwa::Requirement::*;
        use KeyManagementAlgorithm::*;
        match self {
            RSA1_5 | RSA_OAEP | A128KW | A256KW | DirectSymmetricKey | ECDH_ES
            | ECDH_ES_A128KW | ECDH_ES_A256KW => Recommended,
            _ => Optional,
        }
    }

    /// Whether this is an ECDH-1PU variant, which additionally
    /// authenticates the sender.
    pub fn is_ecdh_1pu(self) -> bool {
        use KeyManagementAlgorithm::*;
        matches!(self, ECDH_1PU | ECDH_1PU_A128KW | ECDH_1PU_A192KW | ECDH_1PU_A256KW)
    }

    /// Whether this is any ECDH variant.
    pub fn is_ecdh(self) -> bool {
        use KeyManagementAlgorithm::*;
        matches!(
            self,
            ECDH_ES
                | ECDH_ES_A128KW
                | ECDH_ES_A192KW
                | ECDH_ES_A256KW
                | ECDH_1PU
                | ECDH_1PU_A128KW
                | ECDH_1PU_A192KW
                | ECDH_1PU_A256KW
        )
    }

    /// The `kty` of the key this algorithm consumes, where the algorithm
    /// pins one down. The ECDH modes accept both `EC` and `OKP` (X25519)
    /// keys, so they claim none.
    pub fn key_type(self) -> Option<KeyType> {
        use KeyManagementAlgorithmType::*;
        match self.algorithm_type() {
            AsymmetricKeyEncryption => Some(KeyType::RSA),
            DirectKeyAgreement | KeyAgreementWithKeyWrapping => None,
            SymmetricKeyWrapping | DirectEncryption => Some(KeyType::Octet),
        }
    }
}

impl std::fmt::Display for KeyManagementAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for KeyManagementAlgorithm {
    fn default() -> Self {
        KeyManagementAlgorithm::DirectSymmetricKey
    }
}
