//! JWE JSON serialization,
//! [RFC7516#7.2](https://tools.ietf.org/html/rfc7516#section-7.2): the
//! general (multi-recipient) and flattened (single-recipient) forms.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CekAlgorithmHeader, Decrypter, Header, State};
use crate::codec::{base64url_decode, base64url_encode};
use crate::errors::{Error, ParseError};
use crate::header::{self, ParseOptions, UnprotectedHeader};
use crate::jwa::kma::KeyManagementAlgorithmType;
use crate::jwa::kma::{aes_gcm_kw, aes_kw, pbes2, rsa};
use crate::jwa::KeyManagementAlgorithm;
use crate::jwk::JWK;
use crate::Payload;

/// One recipient of a JWE JSON object.
#[derive(Debug, Clone)]
pub struct Recipient {
    header: Option<UnprotectedHeader>,
    encrypted_key: Vec<u8>,
}

impl Recipient {
    /// The per-recipient unprotected header, if any.
    pub fn header(&self) -> Option<&UnprotectedHeader> {
        self.header.as_ref()
    }

    /// The encrypted key for this recipient; empty for direct modes.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }
}

/// A key a JWE JSON object is encrypted to, with an optional per-recipient
/// unprotected header (typically carrying `kid`).
#[derive(Debug, Clone)]
pub struct RecipientKey {
    /// The recipient's key
    pub key: JWK,
    /// Extra per-recipient header parameters
    pub header: Option<UnprotectedHeader>,
}

impl From<JWK> for RecipientKey {
    fn from(key: JWK) -> Self {
        RecipientKey { key, header: None }
    }
}

#[derive(Debug)]
struct Dynamic {
    state: State,
    payload: Option<Payload>,
}

/// A JWE addressed to one or more recipients, for the JSON serializations.
///
/// Encryption supports the key-wrapping and direct-encryption modes; every
/// recipient shares one CEK, so the key agreement modes (whose header
/// mutation is per-recipient) stay on the compact path.
#[derive(Debug)]
pub struct JWEObjectJSON {
    protected: Header,
    protected_b64: Option<String>,
    unprotected: Option<UnprotectedHeader>,
    recipients: Vec<Recipient>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
    aad: Option<Vec<u8>>,
    dynamic: Mutex<Dynamic>,
}

#[derive(Serialize, Deserialize)]
struct RecipientJson {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    header: Option<UnprotectedHeader>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    encrypted_key: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct GeneralJson {
    protected: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    unprotected: Option<UnprotectedHeader>,
    recipients: Vec<RecipientJson>,
    iv: String,
    ciphertext: String,
    tag: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    aad: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct FlattenedJson {
    protected: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    unprotected: Option<UnprotectedHeader>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    header: Option<UnprotectedHeader>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    encrypted_key: Option<String>,
    iv: String,
    ciphertext: String,
    tag: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    aad: Option<String>,
}

impl JWEObjectJSON {
    /// A new unencrypted object. `alg` and `enc` come from the protected
    /// header and apply to every recipient.
    pub fn new(protected: Header, payload: Payload) -> Self {
        JWEObjectJSON {
            protected,
            protected_b64: None,
            unprotected: None,
            recipients: Vec::new(),
            iv: Vec::new(),
            ciphertext: Vec::new(),
            tag: Vec::new(),
            aad: None,
            dynamic: Mutex::new(Dynamic {
                state: State::Unencrypted,
                payload: Some(payload),
            }),
        }
    }

    /// Attach a shared unprotected header.
    pub fn with_unprotected(mut self, unprotected: UnprotectedHeader) -> Self {
        self.unprotected = Some(unprotected);
        self
    }

    /// Attach additional authenticated data (the `aad` member).
    pub fn with_aad(mut self, aad: Vec<u8>) -> Self {
        self.aad = Some(aad);
        self
    }

    /// The protected header.
    pub fn protected_header(&self) -> &Header {
        &self.protected
    }

    /// The recipients, in creation or document order.
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        self.dynamic.lock().expect("lock poisoned").state
    }

    /// The decrypted (or original) payload, when the object holds one.
    pub fn payload(&self) -> Option<Payload> {
        self.dynamic.lock().expect("lock poisoned").payload.clone()
    }

    fn full_aad(protected_b64: &str, aad: Option<&Vec<u8>>) -> Vec<u8> {
        match aad {
            None => protected_b64.as_bytes().to_vec(),
            Some(aad) => {
                let mut full = protected_b64.as_bytes().to_vec();
                full.push(b'.');
                full.extend_from_slice(base64url_encode(aad).as_bytes());
                full
            }
        }
    }

    /// Encrypt to every key in `recipients`. One CEK is generated and
    /// wrapped per recipient; per-recipient key management parameters
    /// (`iv`/`tag`, `p2s`/`p2c`) land in the per-recipient headers.
    pub fn encrypt(&mut self, recipients: &[RecipientKey]) -> Result<(), Error> {
        use KeyManagementAlgorithmType::*;

        let mut dynamic = self.dynamic.lock().expect("lock poisoned");
        if dynamic.state != State::Unencrypted {
            return Err(Error::IllegalState("encrypt requires an unencrypted JWE"));
        }
        if recipients.is_empty() {
            return Err(Error::IllegalState("encrypt requires at least one recipient"));
        }

        let alg = self.protected.registered.cek_algorithm;
        let enc = self.protected.registered.enc_algorithm;
        if self.protected.registered.compression_algorithm.is_some() {
            return Err(Error::AlgorithmUnsupported(
                "plaintext compression is not supported".to_string(),
            ));
        }
        match alg.algorithm_type() {
            SymmetricKeyWrapping | AsymmetricKeyEncryption => {}
            DirectEncryption if recipients.len() == 1 => {}
            DirectEncryption => {
                return Err(Error::IllegalState(
                    "direct encryption admits exactly one recipient",
                ))
            }
            DirectKeyAgreement | KeyAgreementWithKeyWrapping => {
                return Err(Error::AlgorithmUnsupported(
                    "the JSON serialization encrypts with key wrapping or direct modes"
                        .to_string(),
                ))
            }
        }

        if let Some(unprotected) = &self.unprotected {
            header::ensure_disjoint(&self.protected, unprotected)?;
        }

        let cek = match alg.algorithm_type() {
            DirectEncryption => recipients[0].key.octet_key()?.to_vec(),
            _ => enc.generate_cek(),
        };

        let protected_b64 = self.protected.to_base64url()?;
        let aad = Self::full_aad(&protected_b64, self.aad.as_ref());
        let iv = enc.generate_iv();
        let payload = dynamic.payload.as_ref().expect("unencrypted objects hold a payload");
        let result = enc.encrypt(&cek, payload.as_bytes(), iv, aad)?;

        let mut encrypted = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let mut kma = CekAlgorithmHeader::default();
            let encrypted_key = match alg {
                KeyManagementAlgorithm::DirectSymmetricKey => Vec::new(),
                KeyManagementAlgorithm::A128KW
                | KeyManagementAlgorithm::A192KW
                | KeyManagementAlgorithm::A256KW => {
                    let secret = recipient.key.octet_key()?;
                    super::check_wrap_key_len(alg, secret)?;
                    aes_kw::wrap(secret, &cek)?
                }
                KeyManagementAlgorithm::A128GCMKW
                | KeyManagementAlgorithm::A192GCMKW
                | KeyManagementAlgorithm::A256GCMKW => {
                    aes_gcm_kw::wrap(alg, recipient.key.octet_key()?, &cek, &mut kma)?
                }
                KeyManagementAlgorithm::PBES2_HS256_A128KW
                | KeyManagementAlgorithm::PBES2_HS384_A192KW
                | KeyManagementAlgorithm::PBES2_HS512_A256KW => pbes2::wrap(
                    alg,
                    recipient.key.octet_key()?,
                    &cek,
                    &mut kma,
                    super::DEFAULT_PBES2_ITERATIONS,
                )?,
                _ => rsa::encrypt_cek(alg, &recipient.key, &cek)?,
            };

            let header = merge_recipient_header(&kma, recipient.header.as_ref())?;
            if let Some(header) = &header {
                header::ensure_disjoint(&self.protected, header)?;
            }
            encrypted.push(Recipient {
                header,
                encrypted_key,
            });
        }

        self.protected_b64 = Some(protected_b64);
        self.recipients = encrypted;
        self.iv = result.nonce;
        self.ciphertext = result.encrypted;
        self.tag = result.tag;
        dynamic.state = State::Encrypted;
        Ok(())
    }

    /// Decrypt by trying each recipient against the decrypter's key until
    /// one authenticates. Success stores the payload and moves to
    /// `Decrypted`; failure leaves the state unchanged.
    pub fn decrypt(&self, decrypter: &dyn Decrypter) -> Result<Payload, Error> {
        {
            let dynamic = self.dynamic.lock().expect("lock poisoned");
            if dynamic.state == State::Unencrypted {
                return Err(Error::IllegalState("decrypt requires an encrypted JWE"));
            }
        }
        let protected_b64 = self
            .protected_b64
            .clone()
            .expect("encrypted objects retain their header encoding");
        let aad = Self::full_aad(&protected_b64, self.aad.as_ref());

        header::ensure_critical_understood(
            self.protected.registered.critical.as_ref(),
            decrypter.understood_critical_params(),
        )?;

        let mut last_error = Error::Decryption;
        for recipient in &self.recipients {
            let merged = self.merged_header(recipient)?;
            match decrypter.decrypt(
                &merged,
                Some(&recipient.encrypted_key),
                &self.iv,
                &self.ciphertext,
                &self.tag,
                &aad,
            ) {
                Ok(plaintext) => {
                    let payload = Payload::new(plaintext);
                    let mut dynamic = self.dynamic.lock().expect("lock poisoned");
                    dynamic.payload = Some(payload.clone());
                    dynamic.state = State::Decrypted;
                    return Ok(payload);
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// The complete header for one recipient: protected, shared
    /// unprotected and per-recipient parameters, which must be disjoint.
    fn merged_header(&self, recipient: &Recipient) -> Result<Header, Error> {
        let mut merged = match serde_json::to_value(&self.protected)? {
            Value::Object(map) => map,
            _ => unreachable!("headers serialize to objects"),
        };
        for source in [&self.unprotected, &recipient.header] {
            let Some(source) = source else { continue };
            for (name, value) in &source.0 {
                if merged.insert(name.clone(), value.clone()).is_some() {
                    return Err(Error::Parse(ParseError::HeaderCollision(name.clone())));
                }
            }
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// The general JSON serialization. Valid in `Encrypted` and
    /// `Decrypted`.
    pub fn serialize_general(&self) -> Result<String, Error> {
        self.require_encrypted()?;
        let general = GeneralJson {
            protected: self.protected_b64.clone().expect("encrypted"),
            unprotected: self.unprotected.clone(),
            recipients: self
                .recipients
                .iter()
                .map(|r| RecipientJson {
                    header: r.header.clone(),
                    encrypted_key: if r.encrypted_key.is_empty() {
                        None
                    } else {
                        Some(base64url_encode(&r.encrypted_key))
                    },
                })
                .collect(),
            iv: base64url_encode(&self.iv),
            ciphertext: base64url_encode(&self.ciphertext),
            tag: base64url_encode(&self.tag),
            aad: self.aad.as_ref().map(|aad| base64url_encode(aad)),
        };
        Ok(serde_json::to_string(&general)?)
    }

    /// The flattened JSON serialization.
    ///
    /// # Panics
    ///
    /// Panics unless the object holds exactly one recipient; asking for
    /// the flattened form otherwise is a programming error.
    pub fn serialize_flattened(&self) -> Result<String, Error> {
        self.require_encrypted()?;
        assert!(
            self.recipients.len() == 1,
            "the flattened serialization requires exactly one recipient, found {}",
            self.recipients.len()
        );
        let recipient = &self.recipients[0];
        let flattened = FlattenedJson {
            protected: self.protected_b64.clone().expect("encrypted"),
            unprotected: self.unprotected.clone(),
            header: recipient.header.clone(),
            encrypted_key: if recipient.encrypted_key.is_empty() {
                None
            } else {
                Some(base64url_encode(&recipient.encrypted_key))
            },
            iv: base64url_encode(&self.iv),
            ciphertext: base64url_encode(&self.ciphertext),
            tag: base64url_encode(&self.tag),
            aad: self.aad.as_ref().map(|aad| base64url_encode(aad)),
        };
        Ok(serde_json::to_string(&flattened)?)
    }

    fn require_encrypted(&self) -> Result<(), Error> {
        if self.state() == State::Unencrypted {
            return Err(Error::IllegalState("serialize requires an encrypted JWE"));
        }
        Ok(())
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
        let value: Value = serde_json::from_str(input)?;
        if value.get("encrypted_key").is_some() || value.get("header").is_some() {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "general serialization must not carry flattened members",
            )));
        }
        let general: GeneralJson = serde_json::from_value(value)?;
        if general.recipients.is_empty() {
            return Err(Error::Parse(ParseError::MissingField("recipients")));
        }
        Self::assemble(
            general.protected,
            general.unprotected,
            general.recipients,
            general.iv,
            general.ciphertext,
            general.tag,
            general.aad,
            options,
        )
    }

    /// Parse the flattened JSON serialization. The presence of a
    /// `recipients` array is rejected.
    pub fn parse_flattened(input: &str) -> Result<Self, Error> {
        Self::parse_flattened_with_options(input, &ParseOptions::default())
    }

    /// Parse the flattened JSON serialization with explicit limits.
    pub fn parse_flattened_with_options(
        input: &str,
        options: &ParseOptions,
    ) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(input)?;
        if value.get("recipients").is_some() {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "flattened serialization must not carry a `recipients` array",
            )));
        }
        let flattened: FlattenedJson = serde_json::from_value(value)?;
        Self::assemble(
            flattened.protected,
            flattened.unprotected,
            vec![RecipientJson {
                header: flattened.header,
                encrypted_key: flattened.encrypted_key,
            }],
            flattened.iv,
            flattened.ciphertext,
            flattened.tag,
            flattened.aad,
            options,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        protected_b64: String,
        unprotected: Option<UnprotectedHeader>,
        recipients: Vec<RecipientJson>,
        iv: String,
        ciphertext: String,
        tag: String,
        aad: Option<String>,
        options: &ParseOptions,
    ) -> Result<Self, Error> {
        let header_bytes = header::decode_protected(&protected_b64, options)?;
        let protected: Header = serde_json::from_slice(&header_bytes)?;
        if let Some(unprotected) = &unprotected {
            header::ensure_disjoint(&protected, unprotected)?;
        }

        let recipients = recipients
            .into_iter()
            .map(|r| {
                if let Some(header) = &r.header {
                    header::ensure_disjoint(&protected, header)?;
                }
                Ok(Recipient {
                    header: r.header,
                    encrypted_key: match r.encrypted_key {
                        Some(encoded) => base64url_decode(&encoded)?,
                        None => Vec::new(),
                    },
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(JWEObjectJSON {
            protected,
            protected_b64: Some(protected_b64),
            unprotected,
            recipients,
            iv: base64url_decode(&iv)?,
            ciphertext: base64url_decode(&ciphertext)?,
            tag: base64url_decode(&tag)?,
            aad: aad.map(|aad| base64url_decode(&aad)).transpose()?,
            dynamic: Mutex::new(Dynamic {
                state: State::Encrypted,
                payload: None,
            }),
        })
    }
}

/// Per-recipient key management parameters rendered into the per-recipient
/// unprotected header, merged with any caller-provided parameters.
fn merge_recipient_header(
    kma: &CekAlgorithmHeader,
    extra: Option<&UnprotectedHeader>,
) -> Result<Option<UnprotectedHeader>, Error> {
    let mut map = match serde_json::to_value(kma)? {
        Value::Object(map) => map
            .into_iter()
            .collect::<std::collections::BTreeMap<String, Value>>(),
        _ => unreachable!("headers serialize to objects"),
    };
    if let Some(extra) = extra {
        for (name, value) in &extra.0 {
            if map.insert(name.clone(), value.clone()).is_some() {
                return Err(Error::Parse(ParseError::HeaderCollision(name.clone())));
            }
        }
    }
    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(UnprotectedHeader(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwa::{ContentEncryptionAlgorithm, KeyManagementAlgorithm};
    use crate::jwe::{JwkDecrypter, RegisteredHeader};

    fn kid_header(kid: &str) -> UnprotectedHeader {
        let mut header = UnprotectedHeader::default();
        header
            .0
            .insert("kid".to_string(), Value::String(kid.to_string()));
        header
    }

    fn protected(
        alg: KeyManagementAlgorithm,
        enc: ContentEncryptionAlgorithm,
    ) -> Header {
        Header::from_registered_header(RegisteredHeader {
            cek_algorithm: alg,
            enc_algorithm: enc,
            ..Default::default()
        })
    }

    #[test]
    fn general_round_trip_with_two_recipients() {
        let key_a = JWK::new_octet_key(&[0xA1; 16]);
        let key_b = JWK::new_octet_key(&[0xB2; 16]);

        let mut jwe = JWEObjectJSON::new(
            protected(
                KeyManagementAlgorithm::A128KW,
                ContentEncryptionAlgorithm::A128CBC_HS256,
            ),
            Payload::from("to whom it may concern"),
        );
        jwe.encrypt(&[
            RecipientKey {
                key: key_a.clone(),
                header: Some(kid_header("a")),
            },
            RecipientKey {
                key: key_b.clone(),
                header: Some(kid_header("b")),
            },
        ])
        .unwrap();

        let json = jwe.serialize_general().unwrap();
        let parsed = JWEObjectJSON::parse_general(&json).unwrap();
        assert_eq!(parsed.recipients().len(), 2);

        // each recipient key decrypts the same payload
        let payload = parsed.decrypt(&JwkDecrypter::new(key_b)).unwrap();
        assert_eq!(payload.as_str(), Some("to whom it may concern"));
        assert_eq!(parsed.state(), State::Decrypted);

        let parsed = JWEObjectJSON::parse_general(&json).unwrap();
        let payload = parsed.decrypt(&JwkDecrypter::new(key_a)).unwrap();
        assert_eq!(payload.as_str(), Some("to whom it may concern"));

        // a stranger's key does not
        let parsed = JWEObjectJSON::parse_general(&json).unwrap();
        assert!(parsed
            .decrypt(&JwkDecrypter::new(JWK::new_octet_key(&[0xC3; 16])))
            .is_err());
        assert_eq!(parsed.state(), State::Encrypted);
    }

    #[test]
    fn gcm_kw_parameters_live_in_per_recipient_headers() {
        let key = JWK::new_octet_key(&[0x11; 32]);
        let mut jwe = JWEObjectJSON::new(
            protected(
                KeyManagementAlgorithm::A256GCMKW,
                ContentEncryptionAlgorithm::A128GCM,
            ),
            Payload::from("payload"),
        );
        jwe.encrypt(&[RecipientKey::from(key.clone())]).unwrap();

        let recipient = &jwe.recipients()[0];
        let header = recipient.header().unwrap();
        assert!(header.get("iv").is_some());
        assert!(header.get("tag").is_some());

        let json = jwe.serialize_flattened().unwrap();
        let parsed = JWEObjectJSON::parse_flattened(&json).unwrap();
        let payload = parsed.decrypt(&JwkDecrypter::new(key)).unwrap();
        assert_eq!(payload.as_str(), Some("payload"));
    }

    #[test]
    fn aad_member_is_authenticated() {
        let key = JWK::new_octet_key(&[0x11; 16]);
        let mut jwe = JWEObjectJSON::new(
            protected(
                KeyManagementAlgorithm::A128KW,
                ContentEncryptionAlgorithm::A128GCM,
            ),
            Payload::from("payload"),
        )
        .with_aad(b"transaction-1234".to_vec());
        jwe.encrypt(&[RecipientKey::from(key.clone())]).unwrap();

        let json = jwe.serialize_flattened().unwrap();
        let parsed = JWEObjectJSON::parse_flattened(&json).unwrap();
        parsed.decrypt(&JwkDecrypter::new(key.clone())).unwrap();

        // tampering with the aad member must break authentication
        let mut value: Value = serde_json::from_str(&json).unwrap();
        value["aad"] = Value::String(base64url_encode(b"transaction-9999"));
        let tampered = serde_json::to_string(&value).unwrap();
        let parsed = JWEObjectJSON::parse_flattened(&tampered).unwrap();
        assert!(parsed.decrypt(&JwkDecrypter::new(key)).is_err());
    }

    #[test]
    #[should_panic(expected = "exactly one recipient")]
    fn flattened_with_two_recipients_panics() {
        let key = JWK::new_octet_key(&[0xA1; 16]);
        let mut jwe = JWEObjectJSON::new(
            protected(
                KeyManagementAlgorithm::A128KW,
                ContentEncryptionAlgorithm::A128GCM,
            ),
            Payload::from("payload"),
        );
        jwe.encrypt(&[
            RecipientKey::from(key.clone()),
            RecipientKey::from(key),
        ])
        .unwrap();
        let _ = jwe.serialize_flattened();
    }

    #[test]
    fn flattened_parse_rejects_recipients_array() {
        let key = JWK::new_octet_key(&[0xA1; 16]);
        let mut jwe = JWEObjectJSON::new(
            protected(
                KeyManagementAlgorithm::A128KW,
                ContentEncryptionAlgorithm::A128GCM,
            ),
            Payload::from("payload"),
        );
        jwe.encrypt(&[RecipientKey::from(key)]).unwrap();
        let json = jwe.serialize_general().unwrap();
        assert!(matches!(
            JWEObjectJSON::parse_flattened(&json),
            Err(Error::Parse(ParseError::UnexpectedSerialization(_)))
        ));
    }

    #[test]
    fn agreement_modes_are_not_encrypted_through_json() {
        let key = JWK::parse(crate::test_keys::RFC7515_A3_EC).unwrap();
        let mut jwe = JWEObjectJSON::new(
            protected(
                KeyManagementAlgorithm::ECDH_ES,
                ContentEncryptionAlgorithm::A128GCM,
            ),
            Payload::from("payload"),
        );
        assert!(matches!(
            jwe.encrypt(&[RecipientKey::from(key)]),
            Err(Error::AlgorithmUnsupported(_))
        ));
    }
}
