//! The compact JWE object and its state machine.

use std::sync::Mutex;

use super::{Decrypter, Encrypter, Header};
use crate::codec::{base64url_decode, base64url_encode};
use crate::errors::{Error, ParseError};
use crate::header::{self, ParseOptions};
use crate::Payload;

/// Lifecycle of a JWE object. Transitions are one-way:
/// `Unencrypted → Encrypted → Decrypted`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Created locally with a plaintext payload
    Unencrypted,
    /// Carries ciphertext
    Encrypted,
    /// The ciphertext has been decrypted and authenticated
    Decrypted,
}

#[derive(Debug)]
struct Inner {
    header: Header,
    header_b64: Option<String>,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
    payload: Option<Payload>,
    state: State,
}

/// A JWE in compact serialization:
/// `protected.encrypted_key.iv.ciphertext.tag`.
///
/// Unlike JWS, the header is not fixed at construction: key management
/// mutates it during encryption (`epk`, `iv`/`tag`, `p2s`/`p2c`), and the
/// mutated header's encoding becomes the AAD.
#[derive(Debug)]
pub struct JWE {
    inner: Mutex<Inner>,
}

impl JWE {
    /// A new unencrypted JWE holding a plaintext payload.
    pub fn new(header: Header, payload: Payload) -> Self {
        JWE {
            inner: Mutex::new(Inner {
                header,
                header_b64: None,
                encrypted_key: Vec::new(),
                iv: Vec::new(),
                ciphertext: Vec::new(),
                tag: Vec::new(),
                payload: Some(payload),
                state: State::Unencrypted,
            }),
        }
    }

    /// Parse a compact serialization into an `Encrypted` object, retaining
    /// the exact header encoding for the AAD.
    pub fn parse(input: &str) -> Result<Self, Error> {
        Self::parse_with_options(input, &ParseOptions::default())
    }

    /// Parse with explicit limits.
    pub fn parse_with_options(input: &str, options: &ParseOptions) -> Result<Self, Error> {
        let parts: Vec<&str> = input.split('.').collect();
        let [protected_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] = parts[..]
        else {
            return Err(Error::Parse(ParseError::PartsLength {
                expected: 5,
                actual: parts.len(),
            }));
        };

        let header_bytes = header::decode_protected(protected_b64, options)?;
        let header: Header = serde_json::from_slice(&header_bytes)?;

        Ok(JWE {
            inner: Mutex::new(Inner {
                header,
                header_b64: Some(protected_b64.to_owned()),
                encrypted_key: base64url_decode(encrypted_key_b64)?,
                iv: base64url_decode(iv_b64)?,
                ciphertext: base64url_decode(ciphertext_b64)?,
                tag: base64url_decode(tag_b64)?,
                payload: None,
                state: State::Encrypted,
            }),
        })
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        self.inner.lock().expect("lock poisoned").state
    }

    /// A copy of the protected header as it currently stands.
    pub fn header(&self) -> Header {
        self.inner.lock().expect("lock poisoned").header.clone()
    }

    /// The decrypted (or original) payload, when the object holds one.
    pub fn payload(&self) -> Option<Payload> {
        self.inner.lock().expect("lock poisoned").payload.clone()
    }

    /// Encrypt this object. Valid only in the `Unencrypted` state.
    pub fn encrypt(&self, encrypter: &dyn Encrypter) -> Result<(), Error> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.state != State::Unencrypted {
            return Err(Error::IllegalState("encrypt requires an unencrypted JWE"));
        }
        let payload = inner.payload.as_ref().expect("unencrypted objects hold a payload");

        let parts = encrypter.encrypt(inner.header.clone(), payload.as_bytes())?;
        inner.header = parts.header;
        inner.header_b64 = Some(parts.header_b64);
        inner.encrypted_key = parts.encrypted_key;
        inner.iv = parts.iv;
        inner.ciphertext = parts.ciphertext;
        inner.tag = parts.tag;
        inner.state = State::Encrypted;
        Ok(())
    }

    /// Decrypt this object. Valid in `Encrypted` and `Decrypted`; success
    /// stores the payload and moves to `Decrypted`, failure leaves the
    /// state unchanged.
    pub fn decrypt(&self, decrypter: &dyn Decrypter) -> Result<Payload, Error> {
        let (header, header_b64, encrypted_key, iv, ciphertext, tag) = {
            let inner = self.inner.lock().expect("lock poisoned");
            if inner.state == State::Unencrypted {
                return Err(Error::IllegalState("decrypt requires an encrypted JWE"));
            }
            (
                inner.header.clone(),
                inner
                    .header_b64
                    .clone()
                    .expect("encrypted objects retain their header encoding"),
                inner.encrypted_key.clone(),
                inner.iv.clone(),
                inner.ciphertext.clone(),
                inner.tag.clone(),
            )
        };

        header::ensure_critical_understood(
            header.registered.critical.as_ref(),
            decrypter.understood_critical_params(),
        )?;

        let plaintext = decrypter.decrypt(
            &header,
            Some(&encrypted_key),
            &iv,
            &ciphertext,
            &tag,
            header_b64.as_bytes(),
        )?;
        let payload = Payload::new(plaintext);

        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.payload = Some(payload.clone());
        inner.state = State::Decrypted;
        Ok(payload)
    }

    /// The compact serialization. Valid in `Encrypted` and `Decrypted`.
    pub fn serialize(&self) -> Result<String, Error> {
        let inner = self.inner.lock().expect("lock poisoned");
        if inner.state == State::Unencrypted {
            return Err(Error::IllegalState("serialize requires an encrypted JWE"));
        }
        Ok(format!(
            "{}.{}.{}.{}.{}",
            inner.header_b64.as_ref().expect("encrypted objects retain their header encoding"),
            base64url_encode(&inner.encrypted_key),
            base64url_encode(&inner.iv),
            base64url_encode(&inner.ciphertext),
            base64url_encode(&inner.tag),
        ))
    }
}
