//! ECDH-ES and ECDH-1PU key agreement over the NIST curves, secp256k1 and
//! X25519.
//!
//! ECDH-ES derives `Z` from an ephemeral key and the recipient's static
//! key. ECDH-1PU additionally mixes in the sender's static key:
//! `Z = Ze || Zs`, authenticating the sender to the recipient.

use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};

use super::KeyManagementAlgorithm;
use crate::errors::{Error, ParseError};
use crate::jwe::CekAlgorithmHeader;
use crate::jwk::{
    AlgorithmParameters, EllipticCurve, EllipticCurveKeyParameters, OctetKeyPairParameters,
    OkpCurve, JWK,
};

macro_rules! ec_agreement {
    ($ephemeral:ident, $static_:ident, $curve:ident, $curve_ty:ty, $crv:expr) => {
        fn $ephemeral(
            recipient: &EllipticCurveKeyParameters,
        ) -> Result<(Vec<u8>, JWK), Error> {
            let their = ec_public::<$curve_ty>(recipient)?;
            let ephemeral = $curve::ecdh::EphemeralSecret::random(&mut rand::thread_rng());
            let point = ephemeral.public_key().to_encoded_point(false);
            let epk = JWK {
                algorithm: AlgorithmParameters::EC(EllipticCurveKeyParameters {
                    curve: $crv,
                    x: point.x().expect("uncompressed point").to_vec(),
                    y: point.y().expect("uncompressed point").to_vec(),
                    d: None,
                }),
                common: Default::default(),
                additional: Default::default(),
            };
            let z = ephemeral.diffie_hellman(&their);
            Ok((z.raw_secret_bytes().to_vec(), epk))
        }

        fn $static_(
            d: &[u8],
            peer: &EllipticCurveKeyParameters,
        ) -> Result<Vec<u8>, Error> {
            let secret = $curve::SecretKey::from_slice(d)
                .map_err(|_| Error::InvalidKey("invalid EC private scalar".to_string()))?;
            let their = ec_public::<$curve_ty>(peer)?;
            let z = elliptic_curve::ecdh::diffie_hellman(
                secret.to_nonzero_scalar(),
                their.as_affine(),
            );
            Ok(z.raw_secret_bytes().to_vec())
        }
    };
}

fn ec_public<C>(params: &EllipticCurveKeyParameters) -> Result<elliptic_curve::PublicKey<C>, Error>
where
    C: elliptic_curve::CurveArithmetic,
    elliptic_curve::FieldBytesSize<C>: elliptic_curve::sec1::ModulusSize,
    C::AffinePoint: FromEncodedPoint<C> + ToEncodedPoint<C>,
{
    if params.x.len() != params.curve.field_len() || params.y.len() != params.curve.field_len() {
        return Err(Error::InvalidKey(
            "EC coordinates have the wrong length".to_string(),
        ));
    }
    let point = elliptic_curve::sec1::EncodedPoint::<C>::from_affine_coordinates(
        elliptic_curve::FieldBytes::<C>::from_slice(&params.x),
        elliptic_curve::FieldBytes::<C>::from_slice(&params.y),
        false,
    );
    Option::from(elliptic_curve::PublicKey::<C>::from_encoded_point(&point))
        .ok_or_else(|| Error::InvalidKey("EC public point is not on the curve".to_string()))
}

ec_agreement!(ephemeral_p256, static_p256, p256, p256::NistP256, EllipticCurve::P256);
ec_agreement!(ephemeral_k256, static_k256, k256, k256::Secp256k1, EllipticCurve::Secp256k1);
ec_agreement!(ephemeral_p384, static_p384, p384, p384::NistP384, EllipticCurve::P384);
ec_agreement!(ephemeral_p521, static_p521, p521, p521::NistP521, EllipticCurve::P521);

fn x25519_public(params: &OctetKeyPairParameters) -> Result<x25519_dalek::PublicKey, Error> {
    let x: [u8; 32] = params
        .x
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidKey("X25519 public key must be 32 bytes".to_string()))?;
    Ok(x25519_dalek::PublicKey::from(x))
}

fn ephemeral_x25519(recipient: &OctetKeyPairParameters) -> Result<(Vec<u8>, JWK), Error> {
    let their = x25519_public(recipient)?;
    let ephemeral = x25519_dalek::StaticSecret::random_from_rng(rand::thread_rng());
    let epk = JWK {
        algorithm: AlgorithmParameters::OctetKeyPair(OctetKeyPairParameters {
            curve: OkpCurve::X25519,
            x: x25519_dalek::PublicKey::from(&ephemeral).as_bytes().to_vec(),
            d: None,
        }),
        common: Default::default(),
        additional: Default::default(),
    };
    Ok((ephemeral.diffie_hellman(&their).as_bytes().to_vec(), epk))
}

fn static_x25519(d: &[u8], peer: &OctetKeyPairParameters) -> Result<Vec<u8>, Error> {
    let d: [u8; 32] = d
        .try_into()
        .map_err(|_| Error::InvalidKey("X25519 private key must be 32 bytes".to_string()))?;
    let secret = x25519_dalek::StaticSecret::from(d);
    let their = x25519_public(peer)?;
    Ok(secret.diffie_hellman(&their).as_bytes().to_vec())
}

fn ephemeral_agreement(recipient: &JWK) -> Result<(Vec<u8>, JWK), Error> {
    match &recipient.algorithm {
        AlgorithmParameters::EC(p) => match p.curve {
            EllipticCurve::P256 => ephemeral_p256(p),
            EllipticCurve::Secp256k1 => ephemeral_k256(p),
            EllipticCurve::P384 => ephemeral_p384(p),
            EllipticCurve::P521 => ephemeral_p521(p),
        },
        AlgorithmParameters::OctetKeyPair(p) if p.curve == OkpCurve::X25519 => {
            ephemeral_x25519(p)
        }
        AlgorithmParameters::OctetKeyPair(p) => Err(Error::AlgorithmUnsupported(format!(
            "ECDH is not supported on curve {}",
            p.curve.name()
        ))),
        _ => Err(Error::InvalidKey(
            "ECDH requires an EC or OKP key".to_string(),
        )),
    }
}

fn static_agreement(private: &JWK, peer: &JWK) -> Result<Vec<u8>, Error> {
    match (&private.algorithm, &peer.algorithm) {
        (AlgorithmParameters::EC(me), AlgorithmParameters::EC(them)) => {
            if me.curve != them.curve {
                return Err(Error::InvalidKey(
                    "ECDH keys must be on the same curve".to_string(),
                ));
            }
            let d = me
                .d
                .as_ref()
                .ok_or_else(|| Error::InvalidKey("EC private scalar `d` is required".to_string()))?;
            match me.curve {
                EllipticCurve::P256 => static_p256(d, them),
                EllipticCurve::Secp256k1 => static_k256(d, them),
                EllipticCurve::P384 => static_p384(d, them),
                EllipticCurve::P521 => static_p521(d, them),
            }
        }
        (AlgorithmParameters::OctetKeyPair(me), AlgorithmParameters::OctetKeyPair(them))
            if me.curve == OkpCurve::X25519 && them.curve == OkpCurve::X25519 =>
        {
            let d = me
                .d
                .as_ref()
                .ok_or_else(|| Error::InvalidKey("OKP private key `d` is required".to_string()))?;
            static_x25519(d, them)
        }
        _ => Err(Error::InvalidKey(
            "ECDH keys must be on the same supported curve".to_string(),
        )),
    }
}

/// Sender side: generate an ephemeral key on the recipient's curve, record
/// it as `epk`, and return the shared secret `Z` (`Ze || Zs` for 1PU).
pub(crate) fn agree_sender(
    alg: KeyManagementAlgorithm,
    recipient: &JWK,
    sender: Option<&JWK>,
    header: &mut CekAlgorithmHeader,
) -> Result<Vec<u8>, Error> {
    let (ze, epk) = ephemeral_agreement(recipient)?;
    let z = if alg.is_ecdh_1pu() {
        let sender = sender.ok_or_else(|| {
            Error::InvalidKey("ECDH-1PU requires the sender's private key".to_string())
        })?;
        let zs = static_agreement(sender, recipient)?;
        crate::codec::concat(&[&ze, &zs])
    } else {
        ze
    };
    header.ephemeral_key = Some(epk);
    Ok(z)
}

/// Recipient side: recompute `Z` from the `epk` header parameter (and the
/// sender's public key for 1PU).
pub(crate) fn agree_recipient(
    alg: KeyManagementAlgorithm,
    recipient: &JWK,
    sender: Option<&JWK>,
    header: &CekAlgorithmHeader,
) -> Result<Vec<u8>, Error> {
    let epk = header
        .ephemeral_key
        .as_ref()
        .ok_or(Error::Parse(ParseError::MissingField("epk")))?;
    epk.validate()?;

    let ze = static_agreement(recipient, epk)?;
    if alg.is_ecdh_1pu() {
        let sender = sender.ok_or_else(|| {
            Error::InvalidKey("ECDH-1PU requires the sender's public key".to_string())
        })?;
        let zs = static_agreement(recipient, sender)?;
        Ok(crate::codec::concat(&[&ze, &zs]))
    } else {
        Ok(ze)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwa::kma::concat_kdf;

    fn p256_pair() -> JWK {
        JWK::parse(crate::test_keys::RFC7515_A3_EC).unwrap()
    }

    fn x25519_pair() -> JWK {
        // RFC 8037 appendix A.6 values
        JWK::parse(
            r#"{"kty":"OKP","crv":"X25519",
            "x":"hSDwCYkwp1R0i33ctD73Wg2_Og0mOBr066SpjqqbTmo",
            "d":"dwdtCnMYpX08FsFyUbJmRd9ML4frwJkqsXf7pR25LCo"}"#,
        )
        .unwrap()
    }

    #[test]
    fn es_sender_and_recipient_agree_p256() {
        let recipient = p256_pair();
        let mut header = CekAlgorithmHeader::default();
        let z_sender = agree_sender(
            KeyManagementAlgorithm::ECDH_ES,
            &recipient.public_view().unwrap(),
            None,
            &mut header,
        )
        .unwrap();
        assert!(header.ephemeral_key.is_some());

        let z_recipient = agree_recipient(
            KeyManagementAlgorithm::ECDH_ES,
            &recipient,
            None,
            &header,
        )
        .unwrap();
        assert_eq!(z_sender, z_recipient);
        assert_eq!(z_sender.len(), 32);
    }

    #[test]
    fn es_sender_and_recipient_agree_x25519() {
        let recipient = x25519_pair();
        let mut header = CekAlgorithmHeader::default();
        let z_sender = agree_sender(
            KeyManagementAlgorithm::ECDH_ES,
            &recipient.public_view().unwrap(),
            None,
            &mut header,
        )
        .unwrap();
        let z_recipient =
            agree_recipient(KeyManagementAlgorithm::ECDH_ES, &recipient, None, &header).unwrap();
        assert_eq!(z_sender, z_recipient);
    }

    #[test]
    fn one_pu_concatenates_both_secrets() {
        let recipient = p256_pair();
        // a second P-256 key for the sender
        let sender = JWK::parse(
            r#"{"kty":"EC","crv":"P-256",
            "x":"gI0GAILBdu7T53akrFmMyGcsF3n5dO7MmwNBHKW5SV0",
            "y":"SLW_xSffzlPWrHEVI30DHM_4egVwt3NQqeUD7nMFpps",
            "d":"0_NxaRPUMQoAJt50Gz8YiTr8gRTwyEaCumd-MToTmIo"}"#,
        )
        .unwrap();

        let mut header = CekAlgorithmHeader::default();
        let z_sender = agree_sender(
            KeyManagementAlgorithm::ECDH_1PU,
            &recipient.public_view().unwrap(),
            Some(&sender),
            &mut header,
        )
        .unwrap();
        // Ze || Zs for P-256 is 64 bytes
        assert_eq!(z_sender.len(), 64);

        let z_recipient = agree_recipient(
            KeyManagementAlgorithm::ECDH_1PU,
            &recipient,
            Some(&sender.public_view().unwrap()),
            &header,
        )
        .unwrap();
        assert_eq!(z_sender, z_recipient);

        let cek = concat_kdf::derive(&z_sender, "A256GCM", b"Alice", b"Bob", 256, None);
        assert_eq!(cek.len(), 32);
    }

    #[test]
    fn one_pu_without_sender_key_is_rejected() {
        let recipient = p256_pair();
        let mut header = CekAlgorithmHeader::default();
        assert!(matches!(
            agree_sender(
                KeyManagementAlgorithm::ECDH_1PU,
                &recipient.public_view().unwrap(),
                None,
                &mut header,
            ),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn curve_mismatch_is_rejected() {
        let recipient = p256_pair();
        let epk_x25519 = x25519_pair().public_view().unwrap();
        let header = CekAlgorithmHeader {
            ephemeral_key: Some(epk_x25519),
            ..Default::default()
        };
        assert!(agree_recipient(
            KeyManagementAlgorithm::ECDH_ES,
            &recipient,
            None,
            &header
        )
        .is_err());
    }

    #[test]
    fn ed25519_recipient_is_unsupported() {
        let recipient = JWK::parse(
            r#"{"kty":"OKP","crv":"Ed25519",
            "x":"11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}"#,
        )
        .unwrap();
        let mut header = CekAlgorithmHeader::default();
        assert!(matches!(
            agree_sender(KeyManagementAlgorithm::ECDH_ES, &recipient, None, &mut header),
            Err(Error::AlgorithmUnsupported(_))
        ));
    }
}
