//! AES key wrap, [RFC 3394](https://www.rfc-editor.org/rfc/rfc3394).

use aes::cipher::{Block, BlockDecryptMut, BlockEncryptMut, KeyInit};
use cipher::BlockSizeUser;

use crate::errors::Error;

const AES_KW_IV: u64 = 0xA6A6_A6A6_A6A6_A6A6_u64;

/// Wrap `payload` under `kek`. The KEK picks the AES variant by its length;
/// the payload must be a non-empty multiple of 8 bytes.
pub(crate) fn wrap(kek: &[u8], payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.is_empty() || payload.len() % 8 != 0 {
        return Err(Error::KeyLength(
            "AES key wrap requires the key data to be a multiple of 64 bits".to_string(),
        ));
    }
    let mut out = vec![0u8; payload.len() + 8];
    out[8..].copy_from_slice(payload);
    match kek.len() {
        16 => aes_key_wrap(aes::Aes128Enc::new_from_slice(kek).expect("length checked"), &mut out),
        24 => aes_key_wrap(aes::Aes192Enc::new_from_slice(kek).expect("length checked"), &mut out),
        32 => aes_key_wrap(aes::Aes256Enc::new_from_slice(kek).expect("length checked"), &mut out),
        other => {
            return Err(Error::KeyLength(format!(
                "AES key wrap requires a 128, 192 or 256 bit KEK, found {} bits",
                other * 8
            )))
        }
    }
    Ok(out)
}

/// Unwrap `wrapped` under `kek`. Fails generically when the integrity check
/// value does not match.
pub(crate) fn unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, Error> {
    if wrapped.len() < 24 || wrapped.len() % 8 != 0 {
        return Err(Error::Decryption);
    }
    let mut out = wrapped.to_vec();
    let outcome = match kek.len() {
        16 => aes_key_unwrap(aes::Aes128Dec::new_from_slice(kek).expect("length checked"), &mut out),
        24 => aes_key_unwrap(aes::Aes192Dec::new_from_slice(kek).expect("length checked"), &mut out),
        32 => aes_key_unwrap(aes::Aes256Dec::new_from_slice(kek).expect("length checked"), &mut out),
        other => {
            return Err(Error::KeyLength(format!(
                "AES key wrap requires a 128, 192 or 256 bit KEK, found {} bits",
                other * 8
            )))
        }
    };
    outcome?;
    out.drain(..8);
    Ok(out)
}

/// AES key wrap in-place ([RFC 3394 section 2.2.1](https://www.rfc-editor.org/rfc/rfc3394#section-2.2.1)).
///
/// Intended for AES128/AES192/AES256 block ciphers only.
fn aes_key_wrap<T: BlockSizeUser + BlockEncryptMut>(mut cipher: T, out: &mut [u8]) {
    let block_size = T::block_size();

    let n = out.len() / 8 - 1;

    let mut a = AES_KW_IV;
    for j in 0..6 {
        for i in 1..=n {
            let ri = &mut out[i * 8..i * 8 + 8];

            // A | R[i]
            let mut input = [0; 32];
            input[..8].copy_from_slice(&a.to_be_bytes());
            input[8..16].copy_from_slice(ri);

            let mut out2 = [0u64; 4];
            let out_block = bytemuck::cast_slice_mut(&mut out2);

            // B = AES(K, A | R[i])
            let in_block = Block::<T>::from_slice(&input[..block_size]);
            let out_block = Block::<T>::from_mut_slice(&mut out_block[..block_size]);
            cipher.encrypt_block_b2b_mut(in_block, out_block);

            // A = MSB(64, B) ^ t where t = (n*j)+i
            let t = n * j + i;
            a = out2[0].to_be() ^ t as u64;

            // R[i] = LSB(64, B)
            let lsb = block_size / 8;
            let lsb = lsb - 1..lsb;
            ri.copy_from_slice(bytemuck::cast_slice(&out2[lsb]));
        }
    }
    // Set C[0] = A
    out[..8].copy_from_slice(&a.to_be_bytes());
}

/// AES key unwrap in-place ([RFC 3394 section 2.2.2](https://www.rfc-editor.org/rfc/rfc3394#section-2.2.2)).
fn aes_key_unwrap<T: BlockSizeUser + BlockDecryptMut>(
    mut cipher: T,
    out: &mut [u8],
) -> Result<(), Error> {
    let block_size = T::block_size();

    let n = out.len() / 8 - 1;

    let mut a = u64::from_be_bytes(out[..8].try_into().expect("length checked"));
    for j in (0..6).rev() {
        for i in (1..=n).rev() {
            let ri = &mut out[i * 8..i * 8 + 8];

            // (A ^ t) | R[i] where t = (n*j)+i
            let mut input = [0; 32];
            let t = n * j + i;
            input[..8].copy_from_slice(&(a ^ t as u64).to_be_bytes());
            input[8..16].copy_from_slice(ri);

            let mut out2 = [0u64; 4];
            let out_block = bytemuck::cast_slice_mut(&mut out2);

            // B = AES-1(K, (A ^ t) | R[i])
            let in_block = Block::<T>::from_slice(&input[..block_size]);
            let out_block2 = Block::<T>::from_mut_slice(&mut out_block[..block_size]);
            cipher.decrypt_block_b2b_mut(in_block, out_block2);

            // A = MSB(64, B)
            a = out2[0].to_be();

            // R[i] = LSB(64, B)
            let lsb = block_size / 8;
            let lsb = lsb - 1..lsb;
            ri.copy_from_slice(bytemuck::cast_slice(&out2[lsb]));
        }
    }
    if a != AES_KW_IV {
        return Err(Error::Decryption);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // https://www.rfc-editor.org/rfc/rfc3394#section-4.1
    #[test]
    fn aes128_keywrapping_128() {
        let kek = hex!("000102030405060708090A0B0C0D0E0F");
        let data = hex!("00112233445566778899AABBCCDDEEFF");

        let wrapped = wrap(&kek, &data).unwrap();
        assert_eq!(
            wrapped,
            hex!("1FA68B0A8112B447 AEF34BD8FB5A7B82 9D3E862371D2CFE5")
        );
        assert_eq!(unwrap(&kek, &wrapped).unwrap(), data);
    }

    // https://www.rfc-editor.org/rfc/rfc3394#section-4.2
    #[test]
    fn aes192_keywrapping_128() {
        let kek = hex!("000102030405060708090A0B0C0D0E0F1011121314151617");
        let data = hex!("00112233445566778899AABBCCDDEEFF");

        let wrapped = wrap(&kek, &data).unwrap();
        assert_eq!(
            wrapped,
            hex!("96778B25AE6CA435 F92B5B97C050AED2 468AB8A17AD84E5D")
        );
        assert_eq!(unwrap(&kek, &wrapped).unwrap(), data);
    }

    // https://www.rfc-editor.org/rfc/rfc3394#section-4.3
    #[test]
    fn aes256_keywrapping_128() {
        let kek = hex!("000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F");
        let data = hex!("00112233445566778899AABBCCDDEEFF");

        let wrapped = wrap(&kek, &data).unwrap();
        assert_eq!(
            wrapped,
            hex!("64E8C3F9CE0F5BA2 63E9777905818A2A 93C8191E7D6E8AE7")
        );
        assert_eq!(unwrap(&kek, &wrapped).unwrap(), data);
    }

    // https://www.rfc-editor.org/rfc/rfc3394#section-4.6
    #[test]
    fn aes256_keywrapping_256() {
        let kek = hex!("000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F");
        let data = hex!("00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F");

        let wrapped = wrap(&kek, &data).unwrap();
        assert_eq!(
            wrapped,
            hex!(
                "28C9F404C4B810F4 CBCCB35CFB87F826 3F5786E2D80ED326
                 CBC7F0E71A99F43B FB988B9B7A02DD21"
            )
        );
        assert_eq!(unwrap(&kek, &wrapped).unwrap(), data);
    }

    #[test]
    fn corrupted_wrap_fails_generically() {
        let kek = hex!("000102030405060708090A0B0C0D0E0F");
        let data = hex!("00112233445566778899AABBCCDDEEFF");
        let mut wrapped = wrap(&kek, &data).unwrap();
        wrapped[0] ^= 1;
        assert!(matches!(unwrap(&kek, &wrapped), Err(Error::Decryption)));
    }

    #[test]
    fn odd_kek_sizes_are_rejected() {
        assert!(matches!(
            wrap(&[0u8; 20], &[0u8; 16]),
            Err(Error::KeyLength(_))
        ));
    }
}
