//! RFC 7638 JWK thumbprints.
//!
//! The hash input is the JSON object holding `kty` plus the required public
//! parameters of that key type, keys sorted lexicographically, no
//! whitespace. Optional members never participate, so a key and its public
//! view produce the same thumbprint.

use sha2::{Digest, Sha256};

use super::AlgorithmParameters;
use crate::codec::base64url_encode;

pub(super) fn compute(params: &AlgorithmParameters) -> String {
    let canonical = match params {
        AlgorithmParameters::EC(p) => format!(
            r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
            p.curve.name(),
            base64url_encode(&p.x),
            base64url_encode(&p.y),
        ),
        AlgorithmParameters::RSA(p) => format!(
            r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#,
            base64url_encode(&p.e),
            base64url_encode(&p.n),
        ),
        AlgorithmParameters::OctetKeyPair(p) => format!(
            r#"{{"crv":"{}","kty":"OKP","x":"{}"}}"#,
            p.curve.name(),
            base64url_encode(&p.x),
        ),
        AlgorithmParameters::OctetKey(p) => {
            format!(r#"{{"k":"{}","kty":"oct"}}"#, base64url_encode(&p.value))
        }
    };
    base64url_encode(&Sha256::digest(canonical.as_bytes()))
}
