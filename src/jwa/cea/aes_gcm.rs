//! [Content Encryption with AES GCM](https://datatracker.ietf.org/doc/html/rfc7518#section-5.3)

use std::marker::PhantomData;

use aead::{AeadInPlace, KeyInit};

use super::{ContentEncryptionAlgorithm, EncryptionResult, CEA};
use crate::errors::Error;

/// AES in Galois/Counter mode with a 96-bit nonce and 128-bit tag.
///
/// The nonce MUST be unique for every encryption under the same CEK; a
/// repeated nonce forfeits both confidentiality and integrity.
pub struct AesGcm<Aes>(PhantomData<Aes>);

#[allow(non_camel_case_types)]
/// AES GCM using a 128-bit key
pub type A128GCM = AesGcm<aes::Aes128>;
#[allow(non_camel_case_types)]
/// AES GCM using a 192-bit key
pub type A192GCM = AesGcm<aes::Aes192>;
#[allow(non_camel_case_types)]
/// AES GCM using a 256-bit key
pub type A256GCM = AesGcm<aes::Aes256>;

macro_rules! aes_gcm {
    ($aes:ty, $enc:ident) => {
        impl CEA for AesGcm<$aes> {
            const ENC: ContentEncryptionAlgorithm = ContentEncryptionAlgorithm::$enc;

            fn encrypt(
                cek: &[u8],
                payload: &[u8],
                iv: Vec<u8>,
                aad: Vec<u8>,
            ) -> Result<EncryptionResult, Error> {
                let cipher =
                    ::aes_gcm::AesGcm::<$aes, aes::cipher::consts::U12>::new_from_slice(cek)
                        .map_err(|_| Error::Decryption)?;
                let nonce: &::aes_gcm::Nonce<_> = from_slice(&iv)?;
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
                let cipher =
                    ::aes_gcm::AesGcm::<$aes, aes::cipher::consts::U12>::new_from_slice(cek)
                        .map_err(|_| Error::Decryption)?;
                let nonce: &::aes_gcm::Nonce<_> = from_slice(&res.nonce)?;
                let tag: &::aes_gcm::Tag = from_slice(&res.tag)?;
                let mut buffer = res.encrypted.clone();
                cipher
                    .decrypt_in_place_detached(nonce, &res.additional_data, &mut buffer, tag)
                    .map_err(|_| Error::Decryption)?;
                Ok(buffer)
            }
        }
    };
}

aes_gcm!(aes::Aes128, A128GCM);
aes_gcm!(aes::Aes192, A192GCM);
aes_gcm!(aes::Aes256, A256GCM);

fn from_slice<Size: aead::generic_array::ArrayLength<u8>>(
    x: &[u8],
) -> Result<&aead::generic_array::GenericArray<u8, Size>, Error> {
    if x.len() != Size::to_usize() {
        Err(Error::Decryption)
    } else {
        Ok(aead::generic_array::GenericArray::from_slice(x))
    }
}
