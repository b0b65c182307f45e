//! AES GCM key wrapping,
//! [RFC7518#4.7](https://tools.ietf.org/html/rfc7518#section-4.7). The
//! 96-bit `iv` and 128-bit `tag` travel as header parameters.

use super::KeyManagementAlgorithm;
use crate::errors::Error;
use crate::jwa::cea::{EncryptionResult, A128GCM, A192GCM, A256GCM, CEA};
use crate::jwe::CekAlgorithmHeader;

fn check_kek(alg: KeyManagementAlgorithm, kek: &[u8]) -> Result<(), Error> {
    let expected = alg.descriptor().wrap_bits.expect("GCM key wrap has a KEK size");
    if kek.len() * 8 != expected {
        return Err(Error::KeyLength(format!(
            "The key encryption key for {} must be {expected} bits",
            alg.name()
        )));
    }
    Ok(())
}

/// Encrypt the CEK under the KEK; the nonce and tag land in the header.
pub(crate) fn wrap(
    alg: KeyManagementAlgorithm,
    kek: &[u8],
    cek: &[u8],
    header: &mut CekAlgorithmHeader,
) -> Result<Vec<u8>, Error> {
    check_kek(alg, kek)?;
    let iv = match header.nonce.take() {
        Some(iv) => iv,
        None => {
            let mut iv = vec![0u8; 12];
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut iv);
            iv
        }
    };

    let result = match alg {
        KeyManagementAlgorithm::A128GCMKW => A128GCM::encrypt(kek, cek, iv, Vec::new()),
        KeyManagementAlgorithm::A192GCMKW => A192GCM::encrypt(kek, cek, iv, Vec::new()),
        KeyManagementAlgorithm::A256GCMKW => A256GCM::encrypt(kek, cek, iv, Vec::new()),
        _ => unreachable!("checked by caller"),
    }?;

    header.nonce = Some(result.nonce);
    header.tag = Some(result.tag);
    Ok(result.encrypted)
}

/// Decrypt the CEK using the `iv` and `tag` header parameters.
pub(crate) fn unwrap(
    alg: KeyManagementAlgorithm,
    kek: &[u8],
    encrypted_key: &[u8],
    header: &CekAlgorithmHeader,
) -> Result<Vec<u8>, Error> {
    check_kek(alg, kek)?;
    let result = EncryptionResult {
        nonce: header
            .nonce
            .clone()
            .ok_or(Error::Parse(crate::errors::ParseError::MissingField("iv")))?,
        tag: header
            .tag
            .clone()
            .ok_or(Error::Parse(crate::errors::ParseError::MissingField("tag")))?,
        encrypted: encrypted_key.to_vec(),
        additional_data: Vec::new(),
    };
    match alg {
        KeyManagementAlgorithm::A128GCMKW => A128GCM::decrypt(kek, &result),
        KeyManagementAlgorithm::A192GCMKW => A192GCM::decrypt(kek, &result),
        KeyManagementAlgorithm::A256GCMKW => A256GCM::decrypt(kek, &result),
        _ => unreachable!("checked by caller"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_round_trip_populates_header() {
        let kek = vec![11u8; 32];
        let cek = vec![42u8; 32];
        let mut header = CekAlgorithmHeader::default();

        let wrapped = wrap(
            KeyManagementAlgorithm::A256GCMKW,
            &kek,
            &cek,
            &mut header,
        )
        .unwrap();
        assert_eq!(header.nonce.as_ref().map(Vec::len), Some(12));
        assert_eq!(header.tag.as_ref().map(Vec::len), Some(16));
        assert_ne!(wrapped, cek);

        let unwrapped = unwrap(
            KeyManagementAlgorithm::A256GCMKW,
            &kek,
            &wrapped,
            &header,
        )
        .unwrap();
        assert_eq!(unwrapped, cek);
    }

    #[test]
    fn tampered_tag_fails() {
        let kek = vec![1u8; 16];
        let cek = vec![2u8; 16];
        let mut header = CekAlgorithmHeader::default();
        let wrapped = wrap(KeyManagementAlgorithm::A128GCMKW, &kek, &cek, &mut header).unwrap();

        header.tag.as_mut().unwrap()[0] ^= 1;
        assert!(matches!(
            unwrap(KeyManagementAlgorithm::A128GCMKW, &kek, &wrapped, &header),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn kek_size_must_match_the_algorithm() {
        let mut header = CekAlgorithmHeader::default();
        assert!(matches!(
            wrap(KeyManagementAlgorithm::A128GCMKW, &[0; 32], &[0; 16], &mut header),
            Err(Error::KeyLength(_))
        ));
    }
}
