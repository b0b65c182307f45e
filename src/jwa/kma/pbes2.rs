//! PBES2 password-based key wrapping,
//! [RFC7518#4.8](https://tools.ietf.org/html/rfc7518#section-4.8).

use std::num::NonZeroU32;

use ring::pbkdf2;

use super::{aes_kw, KeyManagementAlgorithm};
use crate::errors::Error;
use crate::jwa::ShaHash;
use crate::jwe::CekAlgorithmHeader;

/// Iteration counts below this are rejected on unwrap unless the caller
/// raises the floor.
pub const DEFAULT_PBES2_MIN_ITERATIONS: u32 = 1_000;

/// Salt length generated on the encryption side.
const GENERATED_SALT_LEN: usize = 16;

/// RFC 7518 requires at least 8 octets of salt input.
const MIN_SALT_LEN: usize = 8;

fn prf_and_len(alg: KeyManagementAlgorithm) -> (pbkdf2::Algorithm, usize) {
    let descriptor = alg.descriptor();
    let prf = match descriptor.hash {
        Some(ShaHash::Sha256) => pbkdf2::PBKDF2_HMAC_SHA256,
        Some(ShaHash::Sha384) => pbkdf2::PBKDF2_HMAC_SHA384,
        Some(ShaHash::Sha512) => pbkdf2::PBKDF2_HMAC_SHA512,
        _ => unreachable!("every PBES2 algorithm names its PRF"),
    };
    (prf, descriptor.wrap_bits.expect("PBES2 wraps") / 8)
}

// The PBKDF2 salt is UTF8(alg) || 0x00 || p2s.
fn derive_kek(
    alg: KeyManagementAlgorithm,
    password: &[u8],
    p2s: &[u8],
    count: NonZeroU32,
) -> Vec<u8> {
    let (prf, len) = prf_and_len(alg);
    let mut salt = alg.name().as_bytes().to_vec();
    salt.push(0);
    salt.extend_from_slice(p2s);

    let mut kek = vec![0u8; len];
    pbkdf2::derive(prf, count, &salt, password, &mut kek);
    kek
}

/// Derive a KEK from the password and AES-wrap the CEK. The salt and count
/// land in the header as `p2s`/`p2c`.
pub(crate) fn wrap(
    alg: KeyManagementAlgorithm,
    password: &[u8],
    cek: &[u8],
    header: &mut CekAlgorithmHeader,
    iterations: u32,
) -> Result<Vec<u8>, Error> {
    let salt = match header.salt.take() {
        Some(salt) => salt,
        None => {
            let mut salt = vec![0u8; GENERATED_SALT_LEN];
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut salt);
            salt
        }
    };
    if salt.len() < MIN_SALT_LEN {
        return Err(Error::AlgorithmUnsupported(format!(
            "The PBES2 salt must be at least {MIN_SALT_LEN} bytes long"
        )));
    }
    let count = NonZeroU32::new(iterations).ok_or_else(|| {
        Error::AlgorithmUnsupported("The PBES2 iteration count must not be zero".to_string())
    })?;

    let kek = derive_kek(alg, password, &salt, count);
    let wrapped = aes_kw::wrap(&kek, cek)?;

    header.salt = Some(salt);
    header.count = Some(count.get());
    Ok(wrapped)
}

/// Re-derive the KEK from the header parameters and unwrap the CEK.
/// Iteration counts below `min_iterations` are refused before any key
/// derivation work happens.
pub(crate) fn unwrap(
    alg: KeyManagementAlgorithm,
    password: &[u8],
    encrypted_key: &[u8],
    header: &CekAlgorithmHeader,
    min_iterations: u32,
) -> Result<Vec<u8>, Error> {
    let salt = header
        .salt
        .clone()
        .ok_or(Error::Parse(crate::errors::ParseError::MissingField("p2s")))?;
    let count = header
        .count
        .ok_or(Error::Parse(crate::errors::ParseError::MissingField("p2c")))?;

    if salt.len() < MIN_SALT_LEN {
        return Err(Error::AlgorithmUnsupported(format!(
            "The PBES2 salt must be at least {MIN_SALT_LEN} bytes long"
        )));
    }
    if count < min_iterations {
        return Err(Error::AlgorithmUnsupported(format!(
            "The PBES2 iteration count must be at least {min_iterations}"
        )));
    }
    let count = NonZeroU32::new(count).ok_or_else(|| {
        Error::AlgorithmUnsupported("The PBES2 iteration count must not be zero".to_string())
    })?;

    let kek = derive_kek(alg, password, &salt, count);
    aes_kw::unwrap(&kek, encrypted_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    // https://www.rfc-editor.org/rfc/rfc7517.html#appendix-C
    #[test]
    fn rfc7517_appendix_c_wrap() {
        let cek = [
            111, 27, 25, 52, 66, 29, 20, 78, 92, 176, 56, 240, 65, 208, 82, 112, 161, 131, 36,
            55, 202, 236, 185, 172, 129, 23, 153, 194, 195, 48, 253, 182,
        ];
        let password = b"Thus from my lips, by yours, my sin is purged.";
        let salt = vec![
            217, 96, 147, 112, 150, 117, 70, 247, 127, 8, 155, 137, 174, 42, 80, 215,
        ];
        let mut header = CekAlgorithmHeader {
            salt: Some(salt.clone()),
            ..Default::default()
        };

        let wrapped = wrap(
            KeyManagementAlgorithm::PBES2_HS256_A128KW,
            password,
            &cek,
            &mut header,
            4096,
        )
        .unwrap();

        assert_eq!(
            wrapped,
            [
                78, 186, 151, 59, 11, 141, 81, 240, 213, 245, 83, 211, 53, 188, 134, 188, 66,
                125, 36, 200, 222, 124, 5, 103, 249, 52, 117, 184, 140, 81, 246, 158, 161, 177,
                20, 33, 245, 57, 59, 4
            ]
        );
        assert_eq!(header.salt, Some(salt));
        assert_eq!(header.count, Some(4096));

        let cek_back = unwrap(
            KeyManagementAlgorithm::PBES2_HS256_A128KW,
            password,
            &wrapped,
            &header,
            DEFAULT_PBES2_MIN_ITERATIONS,
        )
        .unwrap();
        assert_eq!(cek_back, cek);
    }

    #[test]
    fn iteration_count_below_minimum_is_refused() {
        let header = CekAlgorithmHeader {
            salt: Some(vec![1; 16]),
            count: Some(999),
            ..Default::default()
        };
        let err = unwrap(
            KeyManagementAlgorithm::PBES2_HS512_A256KW,
            b"password",
            &[0; 40],
            &header,
            DEFAULT_PBES2_MIN_ITERATIONS,
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlgorithmUnsupported(_)));
    }

    #[test]
    fn short_salt_is_refused() {
        let mut header = CekAlgorithmHeader {
            salt: Some(vec![1; 4]),
            ..Default::default()
        };
        assert!(matches!(
            wrap(
                KeyManagementAlgorithm::PBES2_HS256_A128KW,
                b"password",
                &[0; 32],
                &mut header,
                4096,
            ),
            Err(Error::AlgorithmUnsupported(_))
        ));
    }

    #[test]
    fn wrong_password_fails_generically() {
        let mut header = CekAlgorithmHeader::default();
        let wrapped = wrap(
            KeyManagementAlgorithm::PBES2_HS384_A192KW,
            b"correct horse",
            &[7; 32],
            &mut header,
            2048,
        )
        .unwrap();
        let err = unwrap(
            KeyManagementAlgorithm::PBES2_HS384_A192KW,
            b"battery staple",
            &wrapped,
            &header,
            DEFAULT_PBES2_MIN_ITERATIONS,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decryption));
    }
}
