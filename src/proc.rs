//! Header-driven key selection for verification and decryption.

use std::collections::BTreeSet;

use crate::errors::Error;
use crate::jwa::{Algorithm, ContentEncryptionAlgorithm, KeyManagementAlgorithm, SignatureAlgorithm};
use crate::jwk::matcher::Curve;
use crate::jwk::source::JWKSource;
use crate::jwk::{JWKMatcher, JWKSelector, KeyType, PublicKeyUse, JWK};
use crate::{jwe, jws};

/// Selects candidate verification keys for a JWS header.
///
/// The header's `alg` must be in the accepted set; the matcher is derived
/// from the algorithm (key type, curve) and the header's `kid`. Only
/// public keys and symmetric keys are returned.
pub struct JWSVerificationKeySelector<S> {
    accepted: BTreeSet<String>,
    source: S,
}

impl<S: JWKSource> JWSVerificationKeySelector<S> {
    pub fn new(accepted: impl IntoIterator<Item = SignatureAlgorithm>, source: S) -> Self {
        JWSVerificationKeySelector {
            accepted: accepted.into_iter().map(|a| a.name().to_string()).collect(),
            source,
        }
    }

    /// Candidate keys for the header, in source order.
    pub fn select(&self, header: &jws::Header) -> Result<Vec<JWK>, Error> {
        let alg = header.registered.algorithm;
        if !self.accepted.contains(alg.name()) {
            return Err(Error::AlgorithmUnsupported(format!(
                "JWS algorithm {} is not accepted by this selector",
                alg.name()
            )));
        }

        let mut matcher = JWKMatcher::new()
            .key_uses([Some(PublicKeyUse::Signature), None])
            .algorithm(Algorithm::Signature(alg));
        if let Some(kty) = alg.key_type() {
            matcher = matcher.key_type(kty);
        }
        if let Some(curve) = alg.descriptor().curve {
            matcher = matcher.curve(Curve::Ec(curve));
        }
        if let Some(kid) = &header.registered.key_id {
            matcher = matcher.key_id(kid.clone());
        }

        let keys = self.source.get(&JWKSelector::new(matcher))?;
        Ok(keys
            .into_iter()
            .filter(|key| key.key_type() == KeyType::Octet || !key.is_private())
            .collect())
    }
}

/// Selects candidate decryption keys for a JWE header.
///
/// The header's `alg` and `enc` must match the expected pair. Only private
/// keys and symmetric keys are returned.
pub struct JWEDecryptionKeySelector<S> {
    expected_alg: KeyManagementAlgorithm,
    expected_enc: ContentEncryptionAlgorithm,
    source: S,
}

impl<S: JWKSource> JWEDecryptionKeySelector<S> {
    pub fn new(
        expected_alg: KeyManagementAlgorithm,
        expected_enc: ContentEncryptionAlgorithm,
        source: S,
    ) -> Self {
        JWEDecryptionKeySelector {
            expected_alg,
            expected_enc,
            source,
        }
    }

    /// Candidate keys for the header, in source order.
    pub fn select(&self, header: &jwe::Header) -> Result<Vec<JWK>, Error> {
        if header.registered.cek_algorithm != self.expected_alg {
            return Err(Error::AlgorithmUnsupported(format!(
                "JWE algorithm {} is not accepted by this selector",
                header.registered.cek_algorithm.name()
            )));
        }
        if header.registered.enc_algorithm != self.expected_enc {
            return Err(Error::AlgorithmUnsupported(format!(
                "JWE encryption method {} is not accepted by this selector",
                header.registered.enc_algorithm.name()
            )));
        }

        let mut matcher = JWKMatcher::new()
            .key_uses([Some(PublicKeyUse::Encryption), None])
            .algorithm(Algorithm::KeyManagement(self.expected_alg));
        // the ECDH modes accept both EC and OKP keys, so they add no kty
        // constraint; the algorithm and kid constraints still apply
        if let Some(kty) = self.expected_alg.key_type() {
            matcher = matcher.key_type(kty);
        }
        if let Some(kid) = &header.registered.key_id {
            matcher = matcher.key_id(kid.clone());
        }

        let keys = self.source.get(&JWKSelector::new(matcher))?;
        Ok(keys.into_iter().filter(JWK::is_private).collect())
    }
}
