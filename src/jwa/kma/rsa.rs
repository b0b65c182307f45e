//! RSA key management: RSAES-PKCS1-v1_5 and the RSAES-OAEP family.

use rsa::traits::PublicKeyParts;
use rsa::{Oaep, Pkcs1v15Encrypt};

use super::KeyManagementAlgorithm;
use crate::errors::Error;
use crate::jwa::sign::rsa as rsa_keys;
use crate::jwa::ShaHash;
use crate::jwk::JWK;

fn hash_label(hash: ShaHash) -> &'static str {
    match hash {
        ShaHash::Sha1 => "SHA-1",
        ShaHash::Sha256 => "SHA-256",
        ShaHash::Sha384 => "SHA-384",
        ShaHash::Sha512 => "SHA-512",
    }
}

/// Encrypt a CEK under the recipient's RSA public key.
pub(crate) fn encrypt_cek(
    alg: KeyManagementAlgorithm,
    key: &JWK,
    cek: &[u8],
) -> Result<Vec<u8>, Error> {
    let public = rsa_keys::public_key(key.rsa_params()?)?;
    let modulus_len = (public.n().bits() + 7) / 8;

    let mut rng = rand::thread_rng();
    match alg {
        KeyManagementAlgorithm::RSA1_5 => {
            // PKCS#1 v1.5 needs 11 bytes of padding overhead
            if modulus_len < cek.len() + 11 || public.n().bits() < 2048 {
                return Err(Error::KeyLength(format!(
                    "The RSA key size for {} must be at least 2048 bits",
                    alg.name()
                )));
            }
            public
                .encrypt(&mut rng, Pkcs1v15Encrypt, cek)
                .map_err(|_| Error::Decryption)
        }
        KeyManagementAlgorithm::RSA_OAEP
        | KeyManagementAlgorithm::RSA_OAEP_256
        | KeyManagementAlgorithm::RSA_OAEP_384
        | KeyManagementAlgorithm::RSA_OAEP_512 => {
            let hash = alg.descriptor().hash.expect("OAEP names its hash");
            // OAEP can carry at most k - 2*hLen - 2 bytes
            if modulus_len < cek.len() + 2 * hash.output_len() + 2 {
                return Err(Error::AlgorithmUnsupported(format!(
                    "Key is too short for encryption using OAEPPadding with {} and MGF1{}",
                    hash_label(hash),
                    hash_label(hash)
                )));
            }
            let padding = oaep_padding(hash);
            public
                .encrypt(&mut rng, padding, cek)
                .map_err(|_| Error::Decryption)
        }
        _ => unreachable!("checked by caller"),
    }
}

/// Decrypt a CEK with the recipient's RSA private key.
///
/// For RSA1_5 a padding failure substitutes a random CEK of the expected
/// length instead of erroring, so downstream content authentication fails
/// without exposing a Bleichenbacher padding oracle.
pub(crate) fn decrypt_cek(
    alg: KeyManagementAlgorithm,
    key: &JWK,
    encrypted_key: &[u8],
    expected_cek_len: usize,
) -> Result<Vec<u8>, Error> {
    let private = rsa_keys::private_key(key.rsa_params()?)?;

    match alg {
        KeyManagementAlgorithm::RSA1_5 => {
            let decrypted = private.decrypt(Pkcs1v15Encrypt, encrypted_key);
            Ok(match decrypted {
                Ok(cek) if cek.len() == expected_cek_len => cek,
                _ => {
                    let mut substitute = vec![0u8; expected_cek_len];
                    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut substitute);
                    substitute
                }
            })
        }
        KeyManagementAlgorithm::RSA_OAEP
        | KeyManagementAlgorithm::RSA_OAEP_256
        | KeyManagementAlgorithm::RSA_OAEP_384
        | KeyManagementAlgorithm::RSA_OAEP_512 => {
            let hash = alg.descriptor().hash.expect("OAEP names its hash");
            private
                .decrypt(oaep_padding(hash), encrypted_key)
                .map_err(|_| Error::Decryption)
        }
        _ => unreachable!("checked by caller"),
    }
}

fn oaep_padding(hash: ShaHash) -> Oaep {
    match hash {
        ShaHash::Sha1 => Oaep::new::<sha1::Sha1>(),
        ShaHash::Sha256 => Oaep::new::<sha2::Sha256>(),
        ShaHash::Sha384 => Oaep::new::<sha2::Sha384>(),
        ShaHash::Sha512 => Oaep::new::<sha2::Sha512>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwk::{AlgorithmParameters, RSAKeyParameters, JWK};

    fn rsa_2048() -> JWK {
        JWK::parse(crate::test_keys::RFC7515_A2_RSA).unwrap()
    }

    fn rsa_1024() -> JWK {
        // a freshly generated 1024-bit key, too short for OAEP-512
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap();
        use rsa::traits::PrivateKeyParts;
        JWK {
            algorithm: AlgorithmParameters::RSA(RSAKeyParameters {
                n: private.n().to_bytes_be(),
                e: private.e().to_bytes_be(),
                d: Some(private.d().to_bytes_be()),
                ..Default::default()
            }),
            common: Default::default(),
            additional: Default::default(),
        }
    }

    #[test]
    fn oaep_256_round_trip() {
        let key = rsa_2048();
        let cek = vec![9u8; 32];
        let wrapped = encrypt_cek(KeyManagementAlgorithm::RSA_OAEP_256, &key, &cek).unwrap();
        let unwrapped =
            decrypt_cek(KeyManagementAlgorithm::RSA_OAEP_256, &key, &wrapped, 32).unwrap();
        assert_eq!(unwrapped, cek);
    }

    #[test]
    fn oaep_512_with_1024_bit_key_is_unsupported() {
        let key = rsa_1024();
        let err = encrypt_cek(KeyManagementAlgorithm::RSA_OAEP_512, &key, &[0; 32]).unwrap_err();
        match err {
            Error::AlgorithmUnsupported(msg) => assert_eq!(
                msg,
                "Key is too short for encryption using OAEPPadding with SHA-512 and MGF1SHA-512"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rsa1_5_round_trip() {
        let key = rsa_2048();
        let cek = vec![3u8; 32];
        let wrapped = encrypt_cek(KeyManagementAlgorithm::RSA1_5, &key, &cek).unwrap();
        let unwrapped = decrypt_cek(KeyManagementAlgorithm::RSA1_5, &key, &wrapped, 32).unwrap();
        assert_eq!(unwrapped, cek);
    }

    #[test]
    fn rsa1_5_bad_padding_returns_a_substitute_cek() {
        let key = rsa_2048();
        let garbage = vec![0x5A; 256];
        let first = decrypt_cek(KeyManagementAlgorithm::RSA1_5, &key, &garbage, 32).unwrap();
        let second = decrypt_cek(KeyManagementAlgorithm::RSA1_5, &key, &garbage, 32).unwrap();
        assert_eq!(first.len(), 32);
        // random substitution, not a deterministic value an oracle could learn
        assert_ne!(first, second);
    }

    #[test]
    fn oaep_tampered_ciphertext_fails() {
        let key = rsa_2048();
        let mut wrapped =
            encrypt_cek(KeyManagementAlgorithm::RSA_OAEP, &key, &[1u8; 16]).unwrap();
        wrapped[0] ^= 1;
        assert!(matches!(
            decrypt_cek(KeyManagementAlgorithm::RSA_OAEP, &key, &wrapped, 16),
            Err(Error::Decryption)
        ));
    }
}
