//! ECDSA over P-256, secp256k1, P-384 and P-521 with fixed-width `r || s`
//! signatures.

use super::SignatureAlgorithm;
use crate::errors::Error;
use crate::jwk::{EllipticCurve, EllipticCurveKeyParameters, JWK};

macro_rules! ecdsa_curve {
    ($sign:ident, $verify:ident, $curve:ident, $field_len:expr) => {
        fn $sign(d: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
            use signature::Signer;
            let key = $curve::ecdsa::SigningKey::from_slice(d)
                .map_err(|_| Error::InvalidKey("invalid ECDSA private scalar".to_string()))?;
            let signature: $curve::ecdsa::Signature = key
                .try_sign(data)
                .map_err(|_| Error::InvalidKey("ECDSA signing failed".to_string()))?;
            Ok(signature.to_bytes().to_vec())
        }

        fn $verify(
            params: &EllipticCurveKeyParameters,
            signature: &[u8],
            data: &[u8],
        ) -> Result<(), Error> {
            use signature::Verifier;
            // from_slice rejects zero and out-of-range scalars, which covers
            // the r = 0 / s = 0 forgery class
            let signature = $curve::ecdsa::Signature::from_slice(signature)
                .map_err(|_| Error::SignatureInvalid)?;
            if params.x.len() != $field_len || params.y.len() != $field_len {
                return Err(Error::InvalidKey(
                    "EC coordinates have the wrong length".to_string(),
                ));
            }
            let point = $curve::EncodedPoint::from_affine_coordinates(
                $curve::FieldBytes::from_slice(&params.x),
                $curve::FieldBytes::from_slice(&params.y),
                false,
            );
            let key = $curve::ecdsa::VerifyingKey::from_encoded_point(&point)
                .map_err(|_| Error::InvalidKey("EC public point is invalid".to_string()))?;
            key.verify(data, &signature)
                .map_err(|_| Error::SignatureInvalid)
        }
    };
}

ecdsa_curve!(sign_p256, verify_p256, p256, 32);
ecdsa_curve!(sign_k256, verify_k256, k256, 32);
ecdsa_curve!(sign_p384, verify_p384, p384, 48);
ecdsa_curve!(sign_p521, verify_p521, p521, 66);

fn expected_curve(alg: SignatureAlgorithm) -> EllipticCurve {
    alg.descriptor()
        .curve
        .expect("every ECDSA algorithm names its curve")
}

fn curve_checked<'a>(
    alg: SignatureAlgorithm,
    key: &'a JWK,
) -> Result<&'a EllipticCurveKeyParameters, Error> {
    let params = key.ec_params()?;
    let expected = expected_curve(alg);
    if params.curve != expected {
        return Err(Error::InvalidKey(format!(
            "{} requires a key on curve {}, found {}",
            alg.name(),
            expected.name(),
            params.curve.name()
        )));
    }
    Ok(params)
}

pub(super) fn sign(alg: SignatureAlgorithm, data: &[u8], key: &JWK) -> Result<Vec<u8>, Error> {
    let params = curve_checked(alg, key)?;
    let d = params
        .d
        .as_ref()
        .ok_or_else(|| Error::InvalidKey("EC private scalar `d` is required".to_string()))?;
    match params.curve {
        EllipticCurve::P256 => sign_p256(d, data),
        EllipticCurve::Secp256k1 => sign_k256(d, data),
        EllipticCurve::P384 => sign_p384(d, data),
        EllipticCurve::P521 => sign_p521(d, data),
    }
}

pub(super) fn verify(
    alg: SignatureAlgorithm,
    signature: &[u8],
    data: &[u8],
    key: &JWK,
) -> Result<(), Error> {
    let params = curve_checked(alg, key)?;
    match params.curve {
        EllipticCurve::P256 => verify_p256(params, signature, data),
        EllipticCurve::Secp256k1 => verify_k256(params, signature, data),
        EllipticCurve::P384 => verify_p384(params, signature, data),
        EllipticCurve::P521 => verify_p521(params, signature, data),
    }
}
