//! The compact JWS object and its state machine.

use std::sync::Mutex;

use super::{Header, Signer, Verifier};
use crate::codec::{base64url_decode, base64url_encode};
use crate::errors::{Error, ParseError};
use crate::header::{self, ParseOptions};
use crate::Payload;

/// Lifecycle of a JWS object. Transitions are one-way:
/// `Unsigned → Signed → Verified`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Created locally, not yet signed
    Unsigned,
    /// Carries a signature that has not been checked
    Signed,
    /// A verifier accepted the signature
    Verified,
}

#[derive(Debug)]
struct Inner {
    state: State,
    signature: Vec<u8>,
}

/// A JWS in compact serialization.
///
/// Header and payload are immutable once constructed; the signature state
/// lives behind a lock so `sign` is exclusive while concurrent `verify`
/// calls only contend for the terminal state upgrade, which is idempotent.
#[derive(Debug)]
pub struct JWS {
    header: Header,
    protected_b64: String,
    payload: Payload,
    inner: Mutex<Inner>,
}

impl JWS {
    /// A new unsigned JWS. The header is serialized now and kept verbatim
    /// for the signing input.
    pub fn new(header: Header, payload: Payload) -> Result<Self, Error> {
        let protected_b64 = header.to_base64url()?;
        Ok(JWS {
            header,
            protected_b64,
            payload,
            inner: Mutex::new(Inner {
                state: State::Unsigned,
                signature: Vec::new(),
            }),
        })
    }

    /// Parse a compact serialization into a `Signed` object, retaining the
    /// exact header and payload encodings.
    pub fn parse(input: &str) -> Result<Self, Error> {
        Self::parse_with_options(input, &ParseOptions::default())
    }

    /// Parse with explicit limits.
    pub fn parse_with_options(input: &str, options: &ParseOptions) -> Result<Self, Error> {
        let parts: Vec<&str> = input.split('.').collect();
        let [protected_b64, payload_part, signature_b64] = parts[..] else {
            return Err(Error::Parse(ParseError::PartsLength {
                expected: 3,
                actual: parts.len(),
            }));
        };

        let header_bytes = header::decode_protected(protected_b64, options)?;
        let header: Header = serde_json::from_slice(&header_bytes)?;

        let payload = if header.is_base64url_encoded() {
            Payload::from_base64url(payload_part)?
        } else {
            Payload::from(payload_part)
        };
        let signature = base64url_decode(signature_b64)?;

        Ok(JWS {
            header,
            protected_b64: protected_b64.to_owned(),
            payload,
            inner: Mutex::new(Inner {
                state: State::Signed,
                signature,
            }),
        })
    }

    /// The protected header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        self.inner.lock().expect("lock poisoned").state
    }

    /// The signature, once the object is signed.
    pub fn signature(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("lock poisoned");
        match inner.state {
            State::Unsigned => None,
            _ => Some(inner.signature.clone()),
        }
    }

    /// The signing input: `BASE64URL(protected) || '.' || payload`, with
    /// the payload Base64URL-encoded unless the header sets `b64: false`.
    pub fn signing_input(&self) -> Vec<u8> {
        let mut input = self.protected_b64.as_bytes().to_vec();
        input.push(b'.');
        if self.header.is_base64url_encoded() {
            input.extend_from_slice(self.payload.to_base64url().as_bytes());
        } else {
            input.extend_from_slice(self.payload.as_bytes());
        }
        input
    }

    /// Sign this object. Valid only in the `Unsigned` state.
    pub fn sign(&self, signer: &dyn Signer) -> Result<(), Error> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.state != State::Unsigned {
            return Err(Error::IllegalState("sign requires an unsigned JWS"));
        }
        let signature = signer.sign(&self.header, &self.signing_input())?;
        inner.signature = signature;
        inner.state = State::Signed;
        Ok(())
    }

    /// Verify this object's signature. Valid in `Signed` and `Verified`;
    /// success moves the state to `Verified`, failure leaves it unchanged.
    pub fn verify(&self, verifier: &dyn Verifier) -> Result<(), Error> {
        let signature = {
            let inner = self.inner.lock().expect("lock poisoned");
            if inner.state == State::Unsigned {
                return Err(Error::IllegalState("verify requires a signed JWS"));
            }
            inner.signature.clone()
        };

        header::ensure_critical_understood(
            self.header.registered.critical.as_ref(),
            verifier.understood_critical_params(),
        )?;

        // crypto runs outside the lock so verifications proceed in parallel
        verifier.verify(&self.header, &self.signing_input(), &signature)?;

        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.state == State::Signed {
            inner.state = State::Verified;
        }
        Ok(())
    }

    /// The compact serialization. Valid in `Signed` and `Verified`.
    ///
    /// With `b64: false` the payload is carried raw and must not contain a
    /// `.`; use [`JWS::serialize_detached`] for arbitrary unencoded
    /// payloads.
    pub fn serialize(&self) -> Result<String, Error> {
        let signature = self
            .signature()
            .ok_or(Error::IllegalState("serialize requires a signed JWS"))?;

        let payload_part = if self.header.is_base64url_encoded() {
            self.payload.to_base64url().to_owned()
        } else {
            let text = self
                .payload
                .as_str()
                .ok_or(Error::Parse(ParseError::UnencodedPayloadChars))?;
            if text.contains('.') {
                return Err(Error::Parse(ParseError::UnencodedPayloadChars));
            }
            text.to_owned()
        };

        Ok(format!(
            "{}.{}.{}",
            self.protected_b64,
            payload_part,
            base64url_encode(&signature)
        ))
    }

    /// The compact serialization with the payload segment left empty
    /// (detached content, RFC 7515 appendix F).
    pub fn serialize_detached(&self) -> Result<String, Error> {
        let signature = self
            .signature()
            .ok_or(Error::IllegalState("serialize requires a signed JWS"))?;
        Ok(format!(
            "{}..{}",
            self.protected_b64,
            base64url_encode(&signature)
        ))
    }
}
