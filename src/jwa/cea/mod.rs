//! [Cryptographic Algorithms for Content Encryption](https://datatracker.ietf.org/doc/html/rfc7518#section-5),
//! plus `XC20P` from
//! [draft-amringer-jose-chacha](https://datatracker.ietf.org/doc/html/draft-amringer-jose-chacha-02).

use serde::{Deserialize, Serialize};

use crate::errors::Error;

pub(crate) mod aes_cbc_hmac_sha;
pub(crate) mod aes_gcm;
pub(crate) mod xchacha20_poly1305;

pub use aes_cbc_hmac_sha::{AesCbcHmacSha2, A128CBC_HS256, A192CBC_HS384, A256CBC_HS512};
pub use aes_gcm::{AesGcm, A128GCM, A192GCM, A256GCM};
pub use xchacha20_poly1305::XC20P;

/// The result of an authenticated encryption operation.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct EncryptionResult {
    /// The initialization vector (nonce) used
    pub nonce: Vec<u8>,
    /// The ciphertext
    pub encrypted: Vec<u8>,
    /// The authentication tag
    pub tag: Vec<u8>,
    /// Data that was authenticated but not encrypted
    pub additional_data: Vec<u8>,
}

/// Content encryption algorithms (`enc` values).
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ContentEncryptionAlgorithm {
    /// AES-128-CBC with HMAC-SHA-256 (truncated to 128 bits)
    #[serde(rename = "A128CBC-HS256")]
    A128CBC_HS256,
    /// AES-192-CBC with HMAC-SHA-384 (truncated to 192 bits)
    #[serde(rename = "A192CBC-HS384")]
    A192CBC_HS384,
    /// AES-256-CBC with HMAC-SHA-512 (truncated to 256 bits)
    #[serde(rename = "A256CBC-HS512")]
    A256CBC_HS512,
    /// AES GCM using a 128-bit key
    A128GCM,
    /// AES GCM using a 192-bit key
    A192GCM,
    /// AES GCM using a 256-bit key
    A256GCM,
    /// XChaCha20-Poly1305 with a 192-bit nonce
    XC20P,
}

/// Construction a content encryption algorithm uses.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ContentEncryptionKind {
    /// Encrypt-then-MAC composition of AES-CBC and HMAC-SHA-2
    AesCbcHmacSha2,
    /// AES in Galois/Counter mode
    AesGcm,
    /// XChaCha20 with Poly1305
    XChaCha20Poly1305,
}

/// Registry descriptor for a content encryption algorithm.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct ContentEncryptionDescriptor {
    pub kind: ContentEncryptionKind,
    /// Required CEK length in bits
    pub cek_bits: usize,
    /// IV length in bytes
    pub iv_len: usize,
    /// Tag length in bits
    pub tag_bits: usize,
}

impl ContentEncryptionAlgorithm {
    /// The registered `enc` name.
    pub fn name(self) -> &'static str {
        match self {
            Self::A128CBC_HS256 => "A128CBC-HS256",
            Self::A192CBC_HS384 => "A192CBC-HS384",
            Self::A256CBC_HS512 => "A256CBC-HS512",
            Self::A128GCM => "A128GCM",
            Self::A192GCM => "A192GCM",
            Self::A256GCM => "A256GCM",
            Self::XC20P => "XC20P",
        }
    }

    /// The registry descriptor for this algorithm.
    pub fn descriptor(self) -> ContentEncryptionDescriptor {
        use ContentEncryptionKind as K;
        let (kind, cek_bits, iv_len, tag_bits) = match self {
            Self::A128CBC_HS256 => (K::AesCbcHmacSha2, 256, 16, 128),
            Self::A192CBC_HS384 => (K::AesCbcHmacSha2, 384, 16, 192),
            Self::A256CBC_HS512 => (K::AesCbcHmacSha2, 512, 16, 256),
            Self::A128GCM => (K::AesGcm, 128, 12, 128),
            Self::A192GCM => (K::AesGcm, 192, 12, 128),
            Self::A256GCM => (K::AesGcm, 256, 12, 128),
            Self::XC20P => (K::XChaCha20Poly1305, 256, 24, 128),
        };
        ContentEncryptionDescriptor {
            kind,
            cek_bits,
            iv_len,
            tag_bits,
        }
    }

    /// Required CEK length in bytes.
    pub fn cek_len(self) -> usize {
        self.descriptor().cek_bits / 8
    }

    /// The registered implementation requirement level.
    pub fn requirement(self) -> crate::jwa::Requirement {
        use crate::jwa::Requirement::*;
        match self {
            Self::A128CBC_HS256 | Self::A256CBC_HS512 => Required,
            Self::A128GCM | Self::A256GCM => Recommended,
            Self::A192CBC_HS384 | Self::A192GCM | Self::XC20P => Optional,
        }
    }

    /// Generate a fresh random CEK of the required length.
    pub fn generate_cek(self) -> Vec<u8> {
        let mut cek = vec![0u8; self.cek_len()];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut cek);
        cek
    }

    /// Generate a fresh random IV of the required length.
    pub fn generate_iv(self) -> Vec<u8> {
        let mut iv = vec![0u8; self.descriptor().iv_len];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut iv);
        iv
    }

    /// Encrypt `payload`, authenticating `aad`.
    ///
    /// The CEK length must match the algorithm exactly and the IV must have
    /// the algorithm's nonce length.
    pub fn encrypt(
        self,
        cek: &[u8],
        payload: &[u8],
        iv: Vec<u8>,
        aad: Vec<u8>,
    ) -> Result<EncryptionResult, Error> {
        self.check_cek(cek)?;
        if iv.len() != self.descriptor().iv_len {
            return Err(Error::Decryption);
        }
        match self {
            Self::A128CBC_HS256 => A128CBC_HS256::encrypt(cek, payload, iv, aad),
            Self::A192CBC_HS384 => A192CBC_HS384::encrypt(cek, payload, iv, aad),
            Self::A256CBC_HS512 => A256CBC_HS512::encrypt(cek, payload, iv, aad),
            Self::A128GCM => A128GCM::encrypt(cek, payload, iv, aad),
            Self::A192GCM => A192GCM::encrypt(cek, payload, iv, aad),
            Self::A256GCM => A256GCM::encrypt(cek, payload, iv, aad),
            Self::XC20P => XC20P::encrypt(cek, payload, iv, aad),
        }
    }

    /// Verify the tag and decrypt. Tag and MAC comparisons are constant
    /// time; failures report no detail.
    pub fn decrypt(self, cek: &[u8], res: &EncryptionResult) -> Result<Vec<u8>, Error> {
        self.check_cek(cek)?;
        match self {
            Self::A128CBC_HS256 => A128CBC_HS256::decrypt(cek, res),
            Self::A192CBC_HS384 => A192CBC_HS384::decrypt(cek, res),
            Self::A256CBC_HS512 => A256CBC_HS512::decrypt(cek, res),
            Self::A128GCM => A128GCM::decrypt(cek, res),
            Self::A192GCM => A192GCM::decrypt(cek, res),
            Self::A256GCM => A256GCM::decrypt(cek, res),
            Self::XC20P => XC20P::decrypt(cek, res),
        }
    }

    fn check_cek(self, cek: &[u8]) -> Result<(), Error> {
        let expected = self.descriptor().cek_bits;
        if cek.len() * 8 != expected {
            return Err(Error::KeyLength(format!(
                "The Content Encryption Key (CEK) length for {} must be {expected} bits",
                self.name()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for ContentEncryptionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for ContentEncryptionAlgorithm {
    fn default() -> Self {
        ContentEncryptionAlgorithm::A128GCM
    }
}

/// Typed content encryption implementations, dispatched to by
/// [`ContentEncryptionAlgorithm`].
pub(crate) trait CEA {
    /// The `enc` identifier this implementation serves
    const ENC: ContentEncryptionAlgorithm;

    fn encrypt(
        cek: &[u8],
        payload: &[u8],
        iv: Vec<u8>,
        aad: Vec<u8>,
    ) -> Result<EncryptionResult, Error>;

    fn decrypt(cek: &[u8], res: &EncryptionResult) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cek_and_iv_lengths_come_from_the_registry() {
        assert_eq!(ContentEncryptionAlgorithm::A128CBC_HS256.cek_len(), 32);
        assert_eq!(ContentEncryptionAlgorithm::A256CBC_HS512.cek_len(), 64);
        assert_eq!(ContentEncryptionAlgorithm::A256GCM.cek_len(), 32);
        assert_eq!(ContentEncryptionAlgorithm::XC20P.cek_len(), 32);
        assert_eq!(
            ContentEncryptionAlgorithm::XC20P.descriptor().iv_len,
            24
        );
        assert_eq!(
            ContentEncryptionAlgorithm::A128GCM.generate_iv().len(),
            12
        );
    }

    #[test]
    fn wrong_cek_length_reports_the_required_bits() {
        let err = ContentEncryptionAlgorithm::A128CBC_HS256
            .encrypt(&[0; 16], b"data", vec![0; 16], vec![])
            .unwrap_err();
        match err {
            Error::KeyLength(msg) => assert_eq!(
                msg,
                "The Content Encryption Key (CEK) length for A128CBC-HS256 must be 256 bits"
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn every_enc_round_trips() {
        use ContentEncryptionAlgorithm::*;
        for enc in [
            A128CBC_HS256,
            A192CBC_HS384,
            A256CBC_HS512,
            A128GCM,
            A192GCM,
            A256GCM,
            XC20P,
        ] {
            let cek = enc.generate_cek();
            let iv = enc.generate_iv();
            let res = enc
                .encrypt(&cek, b"secret payload", iv, b"aad".to_vec())
                .unwrap();
            assert_eq!(enc.decrypt(&cek, &res).unwrap(), b"secret payload");

            let mut tampered = res.clone();
            tampered.encrypted[0] ^= 1;
            assert!(matches!(
                enc.decrypt(&cek, &tampered),
                Err(Error::Decryption)
            ));

            let mut tampered = res;
            tampered.tag[0] ^= 1;
            assert!(matches!(
                enc.decrypt(&cek, &tampered),
                Err(Error::Decryption)
            ));
        }
    }
}
