//! XChaCha20-Poly1305 content encryption
//! ([draft-amringer-jose-chacha](https://datatracker.ietf.org/doc/html/draft-amringer-jose-chacha-02)).

use aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};

use super::{ContentEncryptionAlgorithm, EncryptionResult, CEA};
use crate::errors::Error;

/// XChaCha20-Poly1305 with a 256-bit key, 192-bit nonce and 128-bit tag.
///
/// The extended nonce is large enough to be drawn at random for every
/// message without collision concerns.
pub struct XC20P;

impl CEA for XC20P {
    const ENC: ContentEncryptionAlgorithm = ContentEncryptionAlgorithm::XC20P;

    fn encrypt(
        cek: &[u8],
        payload: &[u8],
        iv: Vec<u8>,
        aad: Vec<u8>,
    ) -> Result<EncryptionResult, Error> {
        let cipher = XChaCha20Poly1305::new_from_slice(cek).map_err(|_| Error::Decryption)?;
        if iv.len() != 24 {
            return Err(Error::Decryption);
        }
        let nonce = XNonce::from_slice(&iv);
        let mut buffer = payload.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(nonce, &aad, &mut buffer)
            .map_err(|_| Error::Decryption)?
            .to_vec();
        Ok(EncryptionResult {
            nonce: iv,
            encrypted: buffer,
            tag,
            additional_data: aad,
        })
    }

    fn decrypt(cek: &[u8], res: &EncryptionResult) -> Result<Vec<u8>, Error> {
        let cipher = XChaCha20Poly1305::new_from_slice(cek).map_err(|_| Error::Decryption)?;
        if res.nonce.len() != 24 || res.tag.len() != 16 {
            return Err(Error::Decryption);
        }
        let nonce = XNonce::from_slice(&res.nonce);
        let tag = chacha20poly1305::Tag::from_slice(&res.tag);
        let mut buffer = res.encrypted.clone();
        cipher
            .decrypt_in_place_detached(nonce, &res.additional_data, &mut buffer, tag)
            .map_err(|_| Error::Decryption)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use crate::jwa::cea::ContentEncryptionAlgorithm;

    #[test]
    fn xc20p_round_trip() {
        let enc = ContentEncryptionAlgorithm::XC20P;
        let cek = enc.generate_cek();
        let iv = enc.generate_iv();
        assert_eq!(iv.len(), 24);

        let res = enc
            .encrypt(&cek, "ほんとうの暗号".as_bytes(), iv, b"protected".to_vec())
            .unwrap();
        assert_eq!(
            enc.decrypt(&cek, &res).unwrap(),
            "ほんとうの暗号".as_bytes()
        );
    }

    #[test]
    fn nonce_reuse_with_different_keys_still_decrypts_independently() {
        let enc = ContentEncryptionAlgorithm::XC20P;
        let iv = vec![7u8; 24];
        let cek_a = enc.generate_cek();
        let cek_b = enc.generate_cek();

        let res_a = enc.encrypt(&cek_a, b"a", iv.clone(), vec![]).unwrap();
        let res_b = enc.encrypt(&cek_b, b"b", iv, vec![]).unwrap();

        assert_eq!(enc.decrypt(&cek_a, &res_a).unwrap(), b"a");
        assert!(enc.decrypt(&cek_a, &res_b).is_err());
    }
}
