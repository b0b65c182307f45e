//! Unsecured JOSE objects (`alg: none`),
//! [RFC7515#A.5](https://tools.ietf.org/html/rfc7515#appendix-A.5).

use crate::errors::{Error, ParseError};
use crate::header::{self, ParseOptions};
use crate::jwa::SignatureAlgorithm;
use crate::jws::Header;
use crate::Payload;

/// A JOSE object with no integrity protection: two Base64URL segments and
/// an empty signature part.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainObject {
    header: Header,
    protected_b64: String,
    payload: Payload,
}

impl PlainObject {
    /// A new unsecured object. The header's `alg` is forced to `none`.
    pub fn new(mut header: Header, payload: Payload) -> Result<Self, Error> {
        header.registered.algorithm = SignatureAlgorithm::None;
        let protected_b64 = header.to_base64url()?;
        Ok(PlainObject {
            header,
            protected_b64,
            payload,
        })
    }

    /// Parse `header..` / `header.payload.` compact form. The signature
    /// segment must be empty and `alg` must be `none`.
    pub fn parse(input: &str) -> Result<Self, Error> {
        Self::parse_with_options(input, &ParseOptions::default())
    }

    /// Parse with explicit limits.
    pub fn parse_with_options(input: &str, options: &ParseOptions) -> Result<Self, Error> {
        let parts: Vec<&str> = input.split('.').collect();
        let [protected_b64, payload_b64, signature] = parts[..] else {
            return Err(Error::Parse(ParseError::PartsLength {
                expected: 3,
                actual: parts.len(),
            }));
        };
        if !signature.is_empty() {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "an unsecured object carries no signature",
            )));
        }

        let header_bytes = header::decode_protected(protected_b64, options)?;
        let header: Header = serde_json::from_slice(&header_bytes)?;
        if header.registered.algorithm != SignatureAlgorithm::None {
            return Err(Error::Parse(ParseError::UnexpectedSerialization(
                "an unsecured object requires alg `none`",
            )));
        }

        Ok(PlainObject {
            header,
            protected_b64: protected_b64.to_owned(),
            payload: Payload::from_base64url(payload_b64)?,
        })
    }

    /// The header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The compact serialization, with an empty signature segment.
    pub fn serialize(&self) -> String {
        format!("{}.{}.", self.protected_b64, self.payload.to_base64url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let plain = PlainObject::new(
            Header::from_registered_header(Default::default()),
            Payload::from("in the open"),
        )
        .unwrap();
        let token = plain.serialize();
        assert!(token.ends_with('.'));

        let parsed = PlainObject::parse(&token).unwrap();
        assert_eq!(parsed.payload().as_str(), Some("in the open"));
        assert_eq!(
            parsed.header().registered.algorithm,
            SignatureAlgorithm::None
        );
    }

    #[test]
    fn alg_is_forced_to_none() {
        let header = Header::from_registered_header(crate::jws::RegisteredHeader {
            algorithm: SignatureAlgorithm::HS256,
            ..Default::default()
        });
        let plain = PlainObject::new(header, Payload::from("x")).unwrap();
        assert_eq!(
            plain.header().registered.algorithm,
            SignatureAlgorithm::None
        );
    }

    #[test]
    fn signature_segment_must_be_empty() {
        let plain = PlainObject::new(
            Header::from_registered_header(Default::default()),
            Payload::from("x"),
        )
        .unwrap();
        let token = format!("{}sig", plain.serialize());
        assert!(matches!(
            PlainObject::parse(&token),
            Err(Error::Parse(ParseError::UnexpectedSerialization(_)))
        ));
    }

    #[test]
    fn signed_alg_is_rejected() {
        // a JWS compact form is not an unsecured object
        let token = "eyJhbGciOiJIUzI1NiJ9.eA.";
        assert!(PlainObject::parse(token).is_err());
    }
}
