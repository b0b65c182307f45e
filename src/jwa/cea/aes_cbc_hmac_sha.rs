//! [Content Encryption with AES_CBC_HMAC_SHA2](https://datatracker.ietf.org/doc/html/rfc7518#section-5.2)

use std::marker::PhantomData;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cipher::block_padding::Pkcs7;
use hmac::{Hmac, Mac};

use super::{ContentEncryptionAlgorithm, EncryptionResult, CEA};
use crate::errors::Error;

/// Encrypt-then-MAC composition: the CEK splits into a MAC half and an
/// encryption half of equal length.
pub struct AesCbcHmacSha2<Aes, Sha> {
    _aes: PhantomData<Aes>,
    _sha: PhantomData<Sha>,
}

#[allow(non_camel_case_types)]
/// [AES_128_CBC_HMAC_SHA_256](https://datatracker.ietf.org/doc/html/rfc7518#section-5.2.3)
pub type A128CBC_HS256 = AesCbcHmacSha2<aes::Aes128, sha2::Sha256>;
#[allow(non_camel_case_types)]
/// [AES_192_CBC_HMAC_SHA_384](https://datatracker.ietf.org/doc/html/rfc7518#section-5.2.4)
pub type A192CBC_HS384 = AesCbcHmacSha2<aes::Aes192, sha2::Sha384>;
#[allow(non_camel_case_types)]
/// [AES_256_CBC_HMAC_SHA_512](https://datatracker.ietf.org/doc/html/rfc7518#section-5.2.5)
pub type A256CBC_HS512 = AesCbcHmacSha2<aes::Aes256, sha2::Sha512>;

macro_rules! aes_cbc {
    ($aes:ty, $sha:ty, $enc:ident, $key_len:expr) => {
        impl CEA for AesCbcHmacSha2<$aes, $sha> {
            const ENC: ContentEncryptionAlgorithm = ContentEncryptionAlgorithm::$enc;

            fn encrypt(
                cek: &[u8],
                payload: &[u8],
                iv: Vec<u8>,
                aad: Vec<u8>,
            ) -> Result<EncryptionResult, Error> {
                let (mac_key, enc_key) = cek.split_at($key_len);

                let encrypted = cbc::Encryptor::<$aes>::new_from_slices(enc_key, &iv)
                    .map_err(|_| Error::Decryption)?
                    .encrypt_padded_vec_mut::<Pkcs7>(payload);

                // AL is the bit length of the AAD as a 64-bit big-endian integer
                let tag = Hmac::<$sha>::new_from_slice(mac_key)
                    .map_err(|_| Error::Decryption)?
                    .chain_update(&aad)
                    .chain_update(&iv)
                    .chain_update(&encrypted)
                    .chain_update((aad.len() as u64 * 8).to_be_bytes())
                    .finalize()
                    .into_bytes()[..$key_len]
                    .to_vec();

                Ok(EncryptionResult {
                    nonce: iv,
                    encrypted,
                    tag,
                    additional_data: aad,
                })
            }

            fn decrypt(cek: &[u8], res: &EncryptionResult) -> Result<Vec<u8>, Error> {
                let EncryptionResult {
                    nonce,
                    encrypted,
                    tag,
                    additional_data: aad,
                } = res;

                if tag.len() != $key_len {
                    return Err(Error::Decryption);
                }
                let (mac_key, enc_key) = cek.split_at($key_len);

                // verify_truncated_left compares in constant time
                Hmac::<$sha>::new_from_slice(mac_key)
                    .map_err(|_| Error::Decryption)?
                    .chain_update(aad)
                    .chain_update(nonce)
                    .chain_update(encrypted)
                    .chain_update((aad.len() as u64 * 8).to_be_bytes())
                    .verify_truncated_left(tag)
                    .map_err(|_| Error::Decryption)?;

                cbc::Decryptor::<$aes>::new_from_slices(enc_key, nonce)
                    .map_err(|_| Error::Decryption)?
                    .decrypt_padded_vec_mut::<Pkcs7>(encrypted)
                    .map_err(|_| Error::Decryption)
            }
        }
    };
}

aes_cbc!(aes::Aes128, sha2::Sha256, A128CBC_HS256, 128 / 8);
aes_cbc!(aes::Aes192, sha2::Sha384, A192CBC_HS384, 192 / 8);
aes_cbc!(aes::Aes256, sha2::Sha512, A256CBC_HS512, 256 / 8);
