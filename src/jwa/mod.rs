//! JSON Web Algorithms
//!
//! Algorithm identifiers from [RFC 7518](https://tools.ietf.org/html/rfc7518),
//! [RFC 8037](https://tools.ietf.org/html/rfc8037) and
//! [draft-madden-jose-ecdh-1pu-04](https://datatracker.ietf.org/doc/html/draft-madden-jose-ecdh-1pu-04),
//! plus the capability descriptors the rest of the library dispatches on.
//!
//! The descriptor tables are the single source of truth for key sizes, hash
//! functions, IV lengths and CEK lengths. The content encryption and key
//! management engines, the JWK selectors and the JOSE object model all
//! consult them; no algorithm facts live anywhere else.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod cea;
pub mod kma;
pub mod sign;

pub use cea::ContentEncryptionAlgorithm;
pub use kma::KeyManagementAlgorithm;
pub use sign::SignatureAlgorithm;

/// Any registered JOSE algorithm identifier. Serialized `untagged`: the
/// registered names of the three families are disjoint.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Algorithm {
    /// Digital signatures and MACs, [RFC7518#3](https://tools.ietf.org/html/rfc7518#section-3)
    Signature(SignatureAlgorithm),
    /// CEK encryption or agreement, [RFC7518#4](https://tools.ietf.org/html/rfc7518#section-4)
    KeyManagement(KeyManagementAlgorithm),
    /// Content encryption, [RFC7518#5](https://tools.ietf.org/html/rfc7518#section-5)
    ContentEncryption(ContentEncryptionAlgorithm),
}

impl Algorithm {
    /// The registered `alg`/`enc` name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Signature(a) => a.name(),
            Algorithm::KeyManagement(a) => a.name(),
            Algorithm::ContentEncryption(a) => a.name(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Implementation requirement level of a registered algorithm,
/// [RFC7518#7.1](https://tools.ietf.org/html/rfc7518#section-7.1).
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Requirement {
    /// Implementations must support it
    Required,
    /// Implementations are encouraged to support it
    Recommended,
    /// Support is optional
    Optional,
}

/// Hash functions the descriptors can point at.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ShaHash {
    /// SHA-1, only reachable through the deprecated `RSA-OAEP`.
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl ShaHash {
    /// Digest output length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            ShaHash::Sha1 => 20,
            ShaHash::Sha256 => 32,
            ShaHash::Sha384 => 48,
            ShaHash::Sha512 => 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umbrella_enum_deserializes_by_family() {
        let alg: Algorithm = serde_json::from_str(r#""HS256""#).unwrap();
        assert_eq!(alg, Algorithm::Signature(SignatureAlgorithm::HS256));

        let alg: Algorithm = serde_json::from_str(r#""RSA-OAEP-256""#).unwrap();
        assert_eq!(
            alg,
            Algorithm::KeyManagement(KeyManagementAlgorithm::RSA_OAEP_256)
        );

        let alg: Algorithm = serde_json::from_str(r#""A128CBC-HS256""#).unwrap();
        assert_eq!(
            alg,
            Algorithm::ContentEncryption(ContentEncryptionAlgorithm::A128CBC_HS256)
        );
    }

    #[test]
    fn umbrella_enum_serializes_to_registered_names() {
        assert_eq!(
            serde_json::to_string(&Algorithm::Signature(SignatureAlgorithm::ES256K)).unwrap(),
            r#""ES256K""#
        );
        assert_eq!(
            serde_json::to_string(&Algorithm::KeyManagement(
                KeyManagementAlgorithm::ECDH_1PU_A128KW
            ))
            .unwrap(),
            r#""ECDH-1PU+A128KW""#
        );
    }
}
