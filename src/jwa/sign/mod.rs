//! Digital signatures and MACs for JWS,
//! [RFC7518#3](https://tools.ietf.org/html/rfc7518#section-3).

use ring::hmac;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::jwa::ShaHash;
use crate::jwk::{EllipticCurve, KeyType, JWK};

mod ecdsa;
mod eddsa;
pub(crate) mod rsa;

/// The signature and MAC algorithms of
/// [RFC7518#3](https://tools.ietf.org/html/rfc7518#section-3), plus
/// `ES256K` ([RFC 8812](https://tools.ietf.org/html/rfc8812)) and `EdDSA`
/// ([RFC 8037](https://tools.ietf.org/html/rfc8037)).
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum SignatureAlgorithm {
    /// No signature. The signature part must be empty.
    #[serde(rename = "none")]
    None,
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using secp256k1 and SHA-256
    ES256K,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// ECDSA using P-521 and SHA-512
    ES512,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512
    PS512,
    /// Edwards-curve signatures (Ed25519)
    EdDSA,
}

/// Families a signature algorithm can belong to.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SignatureFamily {
    /// `none`
    None,
    /// HMAC with SHA-2
    Hmac,
    /// RSASSA-PKCS1-v1_5
    RsaPkcs1v15,
    /// RSASSA-PSS, salt length = digest length
    RsaPss,
    /// ECDSA with fixed-width `r || s` signatures
    Ecdsa,
    /// Edwards-curve signatures
    EdDsa,
}

/// Registry descriptor for a signature algorithm.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct SignatureDescriptor {
    pub family: SignatureFamily,
    /// Hash backing the signature; `None` for `none` and EdDSA
    pub hash: Option<ShaHash>,
    /// Minimum key size in bits
    pub min_key_bits: usize,
    /// ECDSA curve
    pub curve: Option<EllipticCurve>,
    /// Fixed signature length in bytes, where the algorithm has one
    pub signature_len: Option<usize>,
}

impl SignatureAlgorithm {
    /// The registered `alg` name.
    pub fn name(self) -> &'static str {
        use SignatureAlgorithm::*;
        match self {
            None => "none",
            HS256 => "HS256",
            HS384 => "HS384",
            HS512 => "HS512",
            RS256 => "RS256",
            RS384 => "RS384",
            RS512 => "RS512",
            ES256 => "ES256",
            ES256K => "ES256K",
            ES384 => "ES384",
            ES512 => "ES512",
            PS256 => "PS256",
            PS384 => "PS384",
            PS512 => "PS512",
            EdDSA => "EdDSA",
        }
    }

    /// The registry descriptor for this algorithm.
    pub fn descriptor(self) -> SignatureDescriptor {
        use SignatureAlgorithm::*;
        use SignatureFamily as F;
        use ShaHash::*;
        let (family, hash, min_key_bits, curve, signature_len) = match self {
            None => (F::None, Option::None, 0, Option::None, Some(0)),
            HS256 => (F::Hmac, Some(Sha256), 256, Option::None, Some(32)),
            HS384 => (F::Hmac, Some(Sha384), 384, Option::None, Some(48)),
            HS512 => (F::Hmac, Some(Sha512), 512, Option::None, Some(64)),
            RS256 => (F::RsaPkcs1v15, Some(Sha256), 2048, Option::None, Option::None),
            RS384 => (F::RsaPkcs1v15, Some(Sha384), 2048, Option::None, Option::None),
            RS512 => (F::RsaPkcs1v15, Some(Sha512), 2048, Option::None, Option::None),
            PS256 => (F::RsaPss, Some(Sha256), 2048, Option::None, Option::None),
            PS384 => (F::RsaPss, Some(Sha384), 2048, Option::None, Option::None),
            PS512 => (F::RsaPss, Some(Sha512), 2048, Option::None, Option::None),
            ES256 => (F::Ecdsa, Some(Sha256), 256, Some(EllipticCurve::P256), Some(64)),
            ES256K => (
                F::Ecdsa,
                Some(Sha256),
                256,
                Some(EllipticCurve::Secp256k1),
                Some(64),
            ),
            ES384 => (F::Ecdsa, Some(Sha384), 384, Some(EllipticCurve::P384), Some(96)),
            ES512 => (F::Ecdsa, Some(Sha512), 521, Some(EllipticCurve::P521), Some(132)),
            EdDSA => (F::EdDsa, Option::None, 256, Option::None, Some(64)),
        };
        SignatureDescriptor {
            family,
            hash,
            min_key_bits,
            curve,
            signature_len,
        }
    }

    /// The registered implementation requirement level.
    pub fn requirement(self) -> crate::jwa::Requirement {
        use crate::jwa::Requirement::*;
        use SignatureAlgorithm::*;
        match self {
            HS256 => Required,
            RS256 | ES256 => Recommended,
            _ => Optional,
        }
    }

    /// The `kty` a key for this algorithm must have, if any.
    pub fn key_type(self) -> Option<KeyType> {
        match self.descriptor().family {
            SignatureFamily::None => None,
            SignatureFamily::Hmac => Some(KeyType::Octet),
            SignatureFamily::RsaPkcs1v15 | SignatureFamily::RsaPss => Some(KeyType::RSA),
            SignatureFamily::Ecdsa => Some(KeyType::EC),
            SignatureFamily::EdDsa => Some(KeyType::OctetKeyPair),
        }
    }

    /// Sign `data` with `key` according to this algorithm.
    pub fn sign(self, data: &[u8], key: &JWK) -> Result<Vec<u8>, Error> {
        match self.descriptor().family {
            SignatureFamily::None => Ok(Vec::new()),
            SignatureFamily::Hmac => {
                let key = self.hmac_key(key)?;
                Ok(hmac::sign(&key, data).as_ref().to_vec())
            }
            SignatureFamily::RsaPkcs1v15 | SignatureFamily::RsaPss => rsa::sign(self, data, key),
            SignatureFamily::Ecdsa => ecdsa::sign(self, data, key),
            SignatureFamily::EdDsa => eddsa::sign(data, key),
        }
    }

    /// Verify `signature` over `data` with `key`.
    pub fn verify(self, signature: &[u8], data: &[u8], key: &JWK) -> Result<(), Error> {
        match self.descriptor().family {
            SignatureFamily::None => {
                if signature.is_empty() {
                    Ok(())
                } else {
                    Err(Error::SignatureInvalid)
                }
            }
            SignatureFamily::Hmac => {
                let expected = self.sign(data, key)?;
                if crate::codec::constant_time_eq(&expected, signature) {
                    Ok(())
                } else {
                    Err(Error::SignatureInvalid)
                }
            }
            SignatureFamily::RsaPkcs1v15 | SignatureFamily::RsaPss => {
                rsa::verify(self, signature, data, key)
            }
            SignatureFamily::Ecdsa => ecdsa::verify(self, signature, data, key),
            SignatureFamily::EdDsa => eddsa::verify(signature, data, key),
        }
    }

    fn hmac_key(self, key: &JWK) -> Result<hmac::Key, Error> {
        let secret = key.octet_key()?;
        let descriptor = self.descriptor();
        if secret.len() * 8 < descriptor.min_key_bits {
            return Err(Error::KeyLength(format!(
                "The secret length for {} must be at least {} bits",
                self.name(),
                descriptor.min_key_bits
            )));
        }
        let algorithm = match self {
            SignatureAlgorithm::HS256 => hmac::HMAC_SHA256,
            SignatureAlgorithm::HS384 => hmac::HMAC_SHA384,
            SignatureAlgorithm::HS512 => hmac::HMAC_SHA512,
            _ => unreachable!("checked by caller"),
        };
        Ok(hmac::Key::new(algorithm, secret))
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        SignatureAlgorithm::HS256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs256_key() -> JWK {
        JWK::new_octet_key(&[0xAB; 32])
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&SignatureAlgorithm::None).unwrap(),
            r#""none""#
        );
        assert_eq!(
            serde_json::from_str::<SignatureAlgorithm>(r#""ES256K""#).unwrap(),
            SignatureAlgorithm::ES256K
        );
    }

    #[test]
    fn none_round_trip() {
        let key = JWK::new_octet_key(b"");
        let sig = SignatureAlgorithm::None.sign(b"payload", &key).unwrap();
        assert!(sig.is_empty());
        SignatureAlgorithm::None.verify(&sig, b"payload", &key).unwrap();
        assert!(SignatureAlgorithm::None
            .verify(b"not empty", b"payload", &key)
            .is_err());
    }

    #[test]
    fn hs256_round_trip_and_tamper() {
        let key = hs256_key();
        let sig = SignatureAlgorithm::HS256.sign(b"payload", &key).unwrap();
        assert_eq!(sig.len(), 32);
        SignatureAlgorithm::HS256.verify(&sig, b"payload", &key).unwrap();

        let mut bad = sig;
        bad[0] ^= 1;
        assert!(matches!(
            SignatureAlgorithm::HS256.verify(&bad, b"payload", &key),
            Err(Error::SignatureInvalid)
        ));
    }

    #[test]
    fn hs256_rejects_short_keys() {
        let key = JWK::new_octet_key(&[0xAB; 16]);
        assert!(matches!(
            SignatureAlgorithm::HS256.sign(b"payload", &key),
            Err(Error::KeyLength(_))
        ));
    }

    // RFC 7515 appendix A.1
    #[test]
    fn rfc7515_a1_hs256_signature() {
        let key = JWK::parse(
            r#"{"kty":"oct",
            "k":"AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow"}"#,
        )
        .unwrap();
        let signing_input = concat!(
            "eyJ0eXAiOiJKV1QiLA0KICJhbGciOiJIUzI1NiJ9.",
            "eyJpc3MiOiJqb2UiLA0KICJleHAiOjEzMDA4MTkzODAsDQogImh0dHA6Ly9leGFt",
            "cGxlLmNvbS9pc19yb290Ijp0cnVlfQ"
        );
        let sig = SignatureAlgorithm::HS256
            .sign(signing_input.as_bytes(), &key)
            .unwrap();
        assert_eq!(
            crate::codec::base64url_encode(&sig),
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
        );
    }
}
