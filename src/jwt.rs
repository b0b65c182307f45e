//! [JSON Web Tokens](https://tools.ietf.org/html/rfc7519): a JWS or JWE
//! whose payload is a JSON claims set.
//!
//! Claims verification (expiry windows, audience matching) is a concern of
//! the caller; this layer models the claims and ties them to the JOSE
//! object lifecycle.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::jwe::{Decrypter, Encrypter, JWE};
use crate::jws::{Signer, Verifier, JWS};
use crate::plain::PlainObject;
use crate::{Payload, SingleOrMultiple, Timestamp};

/// Registered claims defined by
/// [RFC7519#4.1](https://tools.ietf.org/html/rfc7519#section-4.1).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
pub struct RegisteredClaims {
    /// Token issuer. Serialized to `iss`.
    #[serde(rename = "iss", skip_serializing_if = "Option::is_none", default)]
    pub issuer: Option<String>,

    /// Subject the JWT refers to. Serialized to `sub`.
    #[serde(rename = "sub", skip_serializing_if = "Option::is_none", default)]
    pub subject: Option<String>,

    /// Audience the JWT is intended for. Serialized to `aud`.
    #[serde(rename = "aud", skip_serializing_if = "Option::is_none", default)]
    pub audience: Option<SingleOrMultiple>,

    /// Expiration time. Serialized to `exp`.
    #[serde(rename = "exp", skip_serializing_if = "Option::is_none", default)]
    pub expiry: Option<Timestamp>,

    /// Time before which the token must be rejected. Serialized to `nbf`.
    #[serde(rename = "nbf", skip_serializing_if = "Option::is_none", default)]
    pub not_before: Option<Timestamp>,

    /// Issue time. Serialized to `iat`.
    #[serde(rename = "iat", skip_serializing_if = "Option::is_none", default)]
    pub issued_at: Option<Timestamp>,

    /// Token ID. Serialized to `jti`.
    #[serde(rename = "jti", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
}

/// A claims set: the registered claims plus application-private ones.
#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct ClaimsSet<T> {
    /// Registered claims defined by the RFC
    #[serde(flatten)]
    pub registered: RegisteredClaims,
    /// Application specific claims
    #[serde(flatten)]
    pub private: T,
}

/// A claims set with no typed private claims; everything beyond the
/// registered names lands in the map.
pub type JWTClaimsSet = ClaimsSet<serde_json::Map<String, serde_json::Value>>;

fn claims_payload<T: Serialize>(claims: &ClaimsSet<T>) -> Result<Payload, Error> {
    Ok(Payload::new(serde_json::to_vec(claims)?))
}

fn parse_claims<T: DeserializeOwned>(payload: &Payload) -> Result<ClaimsSet<T>, Error> {
    Ok(serde_json::from_slice(payload.as_bytes())?)
}

/// A JWT secured with a signature: a JWS whose payload is a claims set.
#[derive(Debug)]
pub struct SignedJWT {
    jws: JWS,
}

impl SignedJWT {
    /// Build an unsigned JWT from a header and claims.
    pub fn new<T: Serialize>(
        mut header: crate::jws::Header,
        claims: &ClaimsSet<T>,
    ) -> Result<Self, Error> {
        if header.registered.media_type.is_none() {
            header.registered.media_type = Some("JWT".to_string());
        }
        Ok(SignedJWT {
            jws: JWS::new(header, claims_payload(claims)?)?,
        })
    }

    /// Parse a compact JWS into a JWT, validating that the payload is a
    /// JSON object.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let jws = JWS::parse(input)?;
        let _: JWTClaimsSet = parse_claims(jws.payload())?;
        Ok(SignedJWT { jws })
    }

    /// The underlying JWS object.
    pub fn jws(&self) -> &JWS {
        &self.jws
    }

    /// The claims set, with typed private claims.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<ClaimsSet<T>, Error> {
        parse_claims(self.jws.payload())
    }

    /// Sign the token.
    pub fn sign(&self, signer: &dyn Signer) -> Result<(), Error> {
        self.jws.sign(signer)
    }

    /// Verify the token's signature.
    pub fn verify(&self, verifier: &dyn Verifier) -> Result<(), Error> {
        self.jws.verify(verifier)
    }

    /// The compact serialization.
    pub fn serialize(&self) -> Result<String, Error> {
        self.jws.serialize()
    }
}

/// A JWT secured with encryption: a JWE whose payload is a claims set (or
/// a nested signed JWT).
#[derive(Debug)]
pub struct EncryptedJWT {
    jwe: JWE,
}

impl EncryptedJWT {
    /// Build an unencrypted JWT from a header and claims.
    pub fn new<T: Serialize>(
        mut header: crate::jwe::Header,
        claims: &ClaimsSet<T>,
    ) -> Result<Self, Error> {
        if header.registered.media_type.is_none() {
            header.registered.media_type = Some("JWT".to_string());
        }
        Ok(EncryptedJWT {
            jwe: JWE::new(header, claims_payload(claims)?),
        })
    }

    /// Wrap an already-signed JWT for nested signing-then-encryption; the
    /// header's `cty` is set to `JWT` as RFC 7519 section 5.2 requires.
    pub fn new_nested(
        mut header: crate::jwe::Header,
        signed: &SignedJWT,
    ) -> Result<Self, Error> {
        header.registered.content_type = Some("JWT".to_string());
        Ok(EncryptedJWT {
            jwe: JWE::new(header, Payload::from(signed.serialize()?)),
        })
    }

    /// Parse a compact JWE into an encrypted JWT.
    pub fn parse(input: &str) -> Result<Self, Error> {
        Ok(EncryptedJWT {
            jwe: JWE::parse(input)?,
        })
    }

    /// The underlying JWE object.
    pub fn jwe(&self) -> &JWE {
        &self.jwe
    }

    /// Encrypt the token.
    pub fn encrypt(&self, encrypter: &dyn Encrypter) -> Result<(), Error> {
        self.jwe.encrypt(encrypter)
    }

    /// Decrypt the token and parse its claims.
    pub fn decrypt_claims<T: DeserializeOwned>(
        &self,
        decrypter: &dyn Decrypter,
    ) -> Result<ClaimsSet<T>, Error> {
        let payload = self.jwe.decrypt(decrypter)?;
        parse_claims(&payload)
    }

    /// Decrypt the token and parse the payload as a nested signed JWT.
    pub fn decrypt_nested(&self, decrypter: &dyn Decrypter) -> Result<SignedJWT, Error> {
        let payload = self.jwe.decrypt(decrypter)?;
        let token = payload
            .as_str()
            .ok_or(Error::Parse(crate::errors::ParseError::Utf8))?;
        SignedJWT::parse(token)
    }

    /// The compact serialization.
    pub fn serialize(&self) -> Result<String, Error> {
        self.jwe.serialize()
    }
}

/// An unsecured JWT (`alg: none`).
#[derive(Debug)]
pub struct PlainJWT {
    plain: PlainObject,
}

impl PlainJWT {
    /// Build an unsecured JWT from claims.
    pub fn new<T: Serialize>(claims: &ClaimsSet<T>) -> Result<Self, Error> {
        Ok(PlainJWT {
            plain: PlainObject::new(Default::default(), claims_payload(claims)?)?,
        })
    }

    /// Parse an unsecured JWT, validating that the payload is a JSON
    /// object.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let plain = PlainObject::parse(input)?;
        let _: JWTClaimsSet = parse_claims(plain.payload())?;
        Ok(PlainJWT { plain })
    }

    /// The underlying unsecured object.
    pub fn plain_object(&self) -> &PlainObject {
        &self.plain
    }

    /// The claims set, with typed private claims.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<ClaimsSet<T>, Error> {
        parse_claims(self.plain.payload())
    }

    /// The compact serialization with an empty signature segment.
    pub fn serialize(&self) -> String {
        self.plain.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwa::{ContentEncryptionAlgorithm, KeyManagementAlgorithm, SignatureAlgorithm};
    use crate::jwe::{JwkDecrypter, JwkEncrypter};
    use crate::jwk::JWK;
    use crate::jws::{JwkSigner, JwkVerifier};

    #[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
    struct PrivateClaims {
        company: String,
        department: String,
    }

    fn claims() -> ClaimsSet<PrivateClaims> {
        ClaimsSet {
            registered: RegisteredClaims {
                issuer: Some("https://www.acme.com/".to_string()),
                subject: Some("John Doe".to_string()),
                audience: Some("https://acme-customer.com/".into()),
                not_before: Some(1234.try_into().unwrap()),
                ..Default::default()
            },
            private: PrivateClaims {
                department: "Toilet Cleaning".to_string(),
                company: "ACME".to_string(),
            },
        }
    }

    fn signing_key() -> JWK {
        JWK::new_octet_key(b"secret-key-that-is-32-bytes-long")
    }

    #[test]
    fn signed_jwt_round_trip() {
        let header = crate::jws::Header::from_registered_header(crate::jws::RegisteredHeader {
            algorithm: SignatureAlgorithm::HS256,
            ..Default::default()
        });
        let jwt = SignedJWT::new(header, &claims()).unwrap();
        jwt.sign(&JwkSigner::new(signing_key())).unwrap();
        let token = jwt.serialize().unwrap();

        let parsed = SignedJWT::parse(&token).unwrap();
        parsed.verify(&JwkVerifier::new(signing_key())).unwrap();
        assert_eq!(parsed.claims::<PrivateClaims>().unwrap(), claims());
        assert_eq!(
            parsed.jws().header().registered.media_type.as_deref(),
            Some("JWT")
        );
    }

    #[test]
    fn signed_jwt_rejects_non_object_payloads() {
        let header = crate::jws::Header::from_registered_header(crate::jws::RegisteredHeader {
            algorithm: SignatureAlgorithm::HS256,
            ..Default::default()
        });
        let jws = JWS::new(header, Payload::from("not json")).unwrap();
        jws.sign(&JwkSigner::new(signing_key())).unwrap();
        let token = jws.serialize().unwrap();
        assert!(SignedJWT::parse(&token).is_err());
    }

    #[test]
    fn encrypted_jwt_round_trip() {
        let header = crate::jwe::Header::from_registered_header(crate::jwe::RegisteredHeader {
            cek_algorithm: KeyManagementAlgorithm::A256GCMKW,
            enc_algorithm: ContentEncryptionAlgorithm::A256GCM,
            ..Default::default()
        });
        let key = JWK::new_octet_key(&[9; 32]);
        let jwt = EncryptedJWT::new(header, &claims()).unwrap();
        jwt.encrypt(&JwkEncrypter::new(key.clone())).unwrap();
        let token = jwt.serialize().unwrap();

        let parsed = EncryptedJWT::parse(&token).unwrap();
        let decrypted: ClaimsSet<PrivateClaims> = parsed
            .decrypt_claims(&JwkDecrypter::new(key))
            .unwrap();
        assert_eq!(decrypted, claims());
    }

    #[test]
    fn nested_sign_then_encrypt_round_trip() {
        let jws_header =
            crate::jws::Header::from_registered_header(crate::jws::RegisteredHeader {
                algorithm: SignatureAlgorithm::HS256,
                ..Default::default()
            });
        let signed = SignedJWT::new(jws_header, &claims()).unwrap();
        signed.sign(&JwkSigner::new(signing_key())).unwrap();

        let jwe_header =
            crate::jwe::Header::from_registered_header(crate::jwe::RegisteredHeader {
                cek_algorithm: KeyManagementAlgorithm::DirectSymmetricKey,
                enc_algorithm: ContentEncryptionAlgorithm::A256GCM,
                ..Default::default()
            });
        let key = JWK::new_octet_key(&[7; 32]);
        let encrypted = EncryptedJWT::new_nested(jwe_header, &signed).unwrap();
        encrypted.encrypt(&JwkEncrypter::new(key.clone())).unwrap();
        let token = encrypted.serialize().unwrap();

        let parsed = EncryptedJWT::parse(&token).unwrap();
        assert_eq!(
            parsed.jwe().header().registered.content_type.as_deref(),
            Some("JWT")
        );
        let inner = parsed.decrypt_nested(&JwkDecrypter::new(key)).unwrap();
        inner.verify(&JwkVerifier::new(signing_key())).unwrap();
        assert_eq!(inner.claims::<PrivateClaims>().unwrap(), claims());
    }

    #[test]
    fn plain_jwt_round_trip() {
        let jwt = PlainJWT::new(&claims()).unwrap();
        let token = jwt.serialize();
        let parsed = PlainJWT::parse(&token).unwrap();
        assert_eq!(parsed.claims::<PrivateClaims>().unwrap(), claims());
    }
}
