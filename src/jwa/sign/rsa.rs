//! RSASSA-PKCS1-v1_5 and RSASSA-PSS signatures.

use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};

use super::SignatureAlgorithm;
use crate::errors::Error;
use crate::jwk::{RSAKeyParameters, JWK};

pub(super) fn sign(
    alg: SignatureAlgorithm,
    data: &[u8],
    key: &JWK,
) -> Result<Vec<u8>, Error> {
    let params = key.rsa_params()?;
    let private = private_key(params)?;

    let descriptor = alg.descriptor();
    if private.n().bits() < descriptor.min_key_bits {
        return Err(Error::KeyLength(format!(
            "The RSA key size for {} must be at least {} bits",
            alg.name(),
            descriptor.min_key_bits
        )));
    }

    use SignatureAlgorithm::*;
    let signature = match alg {
        RS256 => rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private)
            .try_sign(data)
            .map(|s| s.to_vec()),
        RS384 => rsa::pkcs1v15::SigningKey::<sha2::Sha384>::new(private)
            .try_sign(data)
            .map(|s| s.to_vec()),
        RS512 => rsa::pkcs1v15::SigningKey::<sha2::Sha512>::new(private)
            .try_sign(data)
            .map(|s| s.to_vec()),
        PS256 => rsa::pss::SigningKey::<sha2::Sha256>::new(private)
            .try_sign_with_rng(&mut rand::thread_rng(), data)
            .map(|s| s.to_vec()),
        PS384 => rsa::pss::SigningKey::<sha2::Sha384>::new(private)
            .try_sign_with_rng(&mut rand::thread_rng(), data)
            .map(|s| s.to_vec()),
        PS512 => rsa::pss::SigningKey::<sha2::Sha512>::new(private)
            .try_sign_with_rng(&mut rand::thread_rng(), data)
            .map(|s| s.to_vec()),
        _ => unreachable!("checked by caller"),
    };
    signature.map_err(|e| Error::InvalidKey(format!("RSA signing failed: {e}")))
}

pub(super) fn verify(
    alg: SignatureAlgorithm,
    signature: &[u8],
    data: &[u8],
    key: &JWK,
) -> Result<(), Error> {
    let params = key.rsa_params()?;
    let public = public_key(params)?;

    use SignatureAlgorithm::*;
    let outcome = match alg {
        RS256 => rsa::pkcs1v15::Signature::try_from(signature).and_then(|sig| {
            rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(public).verify(data, &sig)
        }),
        RS384 => rsa::pkcs1v15::Signature::try_from(signature).and_then(|sig| {
            rsa::pkcs1v15::VerifyingKey::<sha2::Sha384>::new(public).verify(data, &sig)
        }),
        RS512 => rsa::pkcs1v15::Signature::try_from(signature).and_then(|sig| {
            rsa::pkcs1v15::VerifyingKey::<sha2::Sha512>::new(public).verify(data, &sig)
        }),
        PS256 => rsa::pss::Signature::try_from(signature).and_then(|sig| {
            rsa::pss::VerifyingKey::<sha2::Sha256>::new(public).verify(data, &sig)
        }),
        PS384 => rsa::pss::Signature::try_from(signature).and_then(|sig| {
            rsa::pss::VerifyingKey::<sha2::Sha384>::new(public).verify(data, &sig)
        }),
        PS512 => rsa::pss::Signature::try_from(signature).and_then(|sig| {
            rsa::pss::VerifyingKey::<sha2::Sha512>::new(public).verify(data, &sig)
        }),
        _ => unreachable!("checked by caller"),
    };
    outcome.map_err(|_| Error::SignatureInvalid)
}

pub(crate) fn public_key(params: &RSAKeyParameters) -> Result<RsaPublicKey, Error> {
    RsaPublicKey::new(
        BigUint::from_bytes_be(&params.n),
        BigUint::from_bytes_be(&params.e),
    )
    .map_err(|e| Error::InvalidKey(format!("invalid RSA public key: {e}")))
}

pub(crate) fn private_key(params: &RSAKeyParameters) -> Result<RsaPrivateKey, Error> {
    let d = params
        .d
        .as_ref()
        .ok_or_else(|| Error::InvalidKey("RSA private exponent `d` is required".to_string()))?;
    let primes = match (&params.p, &params.q) {
        (Some(p), Some(q)) => vec![BigUint::from_bytes_be(p), BigUint::from_bytes_be(q)],
        // from_components recovers the primes from (n, e, d)
        _ => Vec::new(),
    };
    RsaPrivateKey::from_components(
        BigUint::from_bytes_be(&params.n),
        BigUint::from_bytes_be(&params.e),
        BigUint::from_bytes_be(d),
        primes,
    )
    .map_err(|e| Error::InvalidKey(format!("invalid RSA private key: {e}")))
}
