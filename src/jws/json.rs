//! JWS JSON serialization,
//! [RFC7515#7.2](https://tools.ietf.org/html/rfc7515#section-7.2): the
//! general (multi-signature) and flattened (single-signature) forms.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{Header, Signer, State, Verifier};
use crate::codec::{base64url_decode, base64url_encode};
use crate::errors::{Error, ParseError};
use crate::header::{self, ParseOptions, UnprotectedHeader};
use crate::Payload;

/// One signature of a JWS JSON object: its protected header, optional
/// unprotected header, signature bytes and lifecycle state.
#[derive(Debug)]
pub struct Signature {
    protected: Header,
    protected_b64: String,
    unprotected: Option<UnprotectedHeader>,
    signature: Vec<u8>,
    state: Mutex<State>,
}

impl Signature {
    /// The protected header.
    pub fn header(&self) -> &Header {
        &self.protected
    }

    /// The unprotected header, if any.
    pub fn unprotected(&self) -> Option<&UnprotectedHeader> {
        self.unprotected.as_ref()
    }

    /// The signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The lifecycle state of this signature.
    pub fn state(&self) -> State {
        *self.state.lock().expect("lock poisoned")
    }
}

/// A JWS carrying one payload and any number of signatures, for the JSON
/// serializations.
#[derive(Debug, Default)]
pub struct JWSObjectJSON {
    payload: Payload,
    signatures: Vec<Signature>,
}

#[derive(Serialize, Deserialize)]
struct SignatureJson {
    protected: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    header: Option<UnprotectedHeader>,
    signature: String,
}

#[derive(Serialize, Deserialize)]
struct GeneralJson {
    payload: String,
    signatures: Vec<SignatureJson>,
}

#[derive(Serialize, Deserialize)]
struct FlattenedJson {
    payload: String,
    protected: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    header: Option<UnprotectedHeader>,
    signature: String,
}

impl JWSObjectJSON {
    /// A new object with no signatures yet.
    pub fn new(payload: Payload) -> Self {
        JWSObjectJSON {
            payload,
            signatures: Vec::new(),
        }
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The signatures, in creation or document order.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn payload_segment(&self, header: &Header) -> String {
        if header.is_base64url_encoded() {
            self.payload.to_base64url().to_owned()
        } else {
            String::from_utf8_lossy(self.payload.as_bytes()).into_owned()
        }
    }

    fn signing_input(&self, protected_b64: &str, header: &Header) -> Vec<u8> {
        let mut input = protected_b64.as_bytes().to_vec();
        input.push(b'.');
        if header.is_base64url_encoded() {
            input.extend_from_slice(self.payload.to_base64url().as_bytes());
        } else {
            input.extend_from_slice(self.payload.as_bytes());
        }
        input
    }

    /// Append a signature computed under `header`. The protected and
    /// unprotected parameter names must be disjoint, and every signature
    /// must agree on the `b64` flag.
    pub fn sign(
        &mut self,
        header: Header,
        unprotected: Option<UnprotectedHeader>,
        signer: &dyn Signer,
    ) -> Result<(), Error> {
        if let Some(unprotected) = &unprotected {
            header::ensure_disjoint(&header, unprotected)?;
        }
        if let Some(first) = self.signatures.first() {
            if first.protected.is_base64url_encoded() != header.is_base64url_encoded() {
                return Err(Error::Parse(ParseError::UnexpectedSerialization(
                    "all signatures must agree on the b64 header parameter",
                )));
            }
        }

        let protected_b64 = header.to_base64url()?;
        let signature = signer.sign(&header, &self.signing_input(&protected_b64, &header))?;
        self.signatures.push(Signature {
            protected: header,
            protected_b64,
            unprotected,
            signature,
            state: Mutex::new(State::Signed),
        });
        Ok(())
    }

    /// Verify the signature at `index`; success moves that signature to
    /// `Verified`.
    pub fn verify(&self, index: usize, verifier: &dyn Verifier) -> Result<(), Error> {
        let signature = self
            .signatures
            .get(index)
            .ok_or(Error::IllegalState("no signature at this index"))?;

        header::ensure_critical_understood(
            signature.protected.registered.critical.as_ref(),
            verifier.understood_critical_params(),
        )?;
        verifier.verify(
            &signature.protected,
            &self.signing_input(&signature.protected_b64, &signature.protected),
            &signature.signature,
        )?;

        let mut state = signature.state.lock().expect("lock poisoned");
        if *state == State::Signed {
            *state = State::Verified;
        }
        Ok(())
    }

    /// The general JSON serialization. Requires at least one signature.
    pub fn serialize_general(&self) -> Result<String, Error> {
        let first = self
            .signatures
            .first()
            .ok_or(Error::IllegalState("serialize requires at least one signature"))?;
        let general = GeneralJson {
            payload: self.payload_segment(&first.protected),
            signatures: self
                .signatures
                .iter()
                .map(|s| SignatureJson {
                    protected: s.protected_b64.clone(),
                    header: s.unprotected.clone(),
                    signature: base64url_encode(&s.signature),
                })
                .collect(),
        };
        Ok(serde_json::to_string(&general)?)
    }

    /// The flattened JSON serialization.
    ///
    /// # Panics
    ///
    /// Panics unless the object holds exactly one signature; asking for
    /// the flattened form otherwise is a programming error.
    pub fn serialize_flattened(&self) -> Result<String, Error> {
        assert!(
            self.signatures.len() == 1,
            "the flattened serialization requires exactly one signature, found {}",
            self.signatures.len()
        );
        let s = &self.signatures[0];
        let flattened = FlattenedJson {
            payload: self.payload_segment(&s.protected),
            protected: s.protected_b64.clone(),
            header: s.unprotected.clone(),
            signature: base64url_encode(&s.signature),
        };
        Ok(serde_json::to_string(&flattened)?)
    }

    /// Parse the general JSON serialization.
    pub fn parse_general(input: &str) -> Result<Self, Error> {
        Self::parse_general_with_options(input, &ParseOptions::default())
    }

    /// Parse the general JSON serialization with explicit limits.
    pub fn parse_general_with_options(
        input: &str,
        options: &ParseOptions,
    ) -> Result<Self, Error> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        if value.get("signature").is_some() {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "general serialization must not carry a top-level `signature`",
            )));
        }
        let general: GeneralJson = serde_json::from_value(value)?;
        if general.signatures.is_empty() {
            return Err(Error::Parse(ParseError::MissingField("signatures")));
        }
        Self::assemble(general.payload, general.signatures, options)
    }

    /// Parse the flattened JSON serialization. The presence of a
    /// `signatures` array is rejected.
    pub fn parse_flattened(input: &str) -> Result<Self, Error> {
        Self::parse_flattened_with_options(input, &ParseOptions::default())
    }

    /// Parse the flattened JSON serialization with explicit limits.
    pub fn parse_flattened_with_options(
        input: &str,
        options: &ParseOptions,
    ) -> Result<Self, Error> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        if value.get("signatures").is_some() {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "flattened serialization must not carry a `signatures` array",
            )));
        }
        let flattened: FlattenedJson = serde_json::from_value(value)?;
        Self::assemble(
            flattened.payload,
            vec![SignatureJson {
                protected: flattened.protected,
                header: flattened.header,
                signature: flattened.signature,
            }],
            options,
        )
    }

    fn assemble(
        payload: String,
        signatures: Vec<SignatureJson>,
        options: &ParseOptions,
    ) -> Result<Self, Error> {
        let mut parsed = Vec::with_capacity(signatures.len());
        for signature in signatures {
            let header_bytes = header::decode_protected(&signature.protected, options)?;
            let protected: Header = serde_json::from_slice(&header_bytes)?;
            if let Some(unprotected) = &signature.header {
                header::ensure_disjoint(&protected, unprotected)?;
            }
            parsed.push(Signature {
                protected_b64: signature.protected,
                protected,
                unprotected: signature.header,
                signature: base64url_decode(&signature.signature)?,
                state: Mutex::new(State::Signed),
            });
        }

        // the payload member is Base64URL unless b64=false (RFC 7797)
        let all_b64 = parsed.iter().all(|s| s.protected.is_base64url_encoded());
        let none_b64 = parsed.iter().all(|s| !s.protected.is_base64url_encoded());
        if !all_b64 && !none_b64 {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "all signatures must agree on the b64 header parameter",
            )));
        }
        let payload = if all_b64 {
            Payload::from_base64url(&payload)?
        } else {
            Payload::from(payload)
        };

        Ok(JWSObjectJSON {
            payload,
            signatures: parsed,
        })
    }
}
