//! Edwards-curve signatures, [RFC 8037](https://tools.ietf.org/html/rfc8037).
//!
//! Ed25519 only; Ed448 is modeled in the JWK layer but has no vetted
//! provider, so operations on it report the algorithm as unsupported.

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use signature::{Signer, Verifier};

use crate::errors::Error;
use crate::jwk::{OkpCurve, JWK};

pub(super) fn sign(data: &[u8], key: &JWK) -> Result<Vec<u8>, Error> {
    let params = key.okp_params()?;
    if params.curve != OkpCurve::Ed25519 {
        return Err(Error::AlgorithmUnsupported(format!(
            "EdDSA signing is not supported on curve {}",
            params.curve.name()
        )));
    }
    let d = params
        .d
        .as_ref()
        .ok_or_else(|| Error::InvalidKey("OKP private key `d` is required".to_string()))?;
    let seed: &[u8; 32] = d
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidKey("Ed25519 private key must be 32 bytes".to_string()))?;
    let signing_key = SigningKey::from_bytes(seed);
    Ok(signing_key.sign(data).to_bytes().to_vec())
}

pub(super) fn verify(signature: &[u8], data: &[u8], key: &JWK) -> Result<(), Error> {
    let params = key.okp_params()?;
    if params.curve != OkpCurve::Ed25519 {
        return Err(Error::AlgorithmUnsupported(format!(
            "EdDSA verification is not supported on curve {}",
            params.curve.name()
        )));
    }
    let x: &[u8; 32] = params
        .x
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidKey("Ed25519 public key must be 32 bytes".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(x)
        .map_err(|_| Error::InvalidKey("Ed25519 public key is invalid".to_string()))?;
    let signature = Signature::from_slice(signature).map_err(|_| Error::SignatureInvalid)?;
    verifying_key
        .verify(data, &signature)
        .map_err(|_| Error::SignatureInvalid)
}
