//! Serialize and deserialize byte fields into the unpadded Base64URL form
//! JOSE uses on the wire.

/// `Vec<u8>` as a Base64URL string.
pub mod byte_sequence {
    use std::fmt;

    use base64ct::Encoding;
    use serde::de;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&crate::B64::encode_string(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BytesVisitor;

        impl<'de> de::Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a Base64URL string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                crate::B64::decode_vec(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(BytesVisitor)
    }
}

/// `Option<Vec<u8>>` as an optional Base64URL string. Pair with
/// `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod option_byte_sequence {
    use base64ct::Encoding;
    use serde::de;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&crate::B64::encode_string(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => crate::B64::decode_vec(&s).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
    struct TestStruct {
        #[serde(with = "super::byte_sequence")]
        bytes: Vec<u8>,
        #[serde(
            with = "super::option_byte_sequence",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        maybe: Option<Vec<u8>>,
    }

    #[test]
    fn serialization_round_trip() {
        let value = TestStruct {
            bytes: vec![3, 236, 255, 224, 193],
            maybe: Some(vec![0, 1]),
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"bytes":"A-z_4ME","maybe":"AAE"}"#);
        assert_eq!(serde_json::from_str::<TestStruct>(&json).unwrap(), value);
    }

    #[test]
    fn absent_option_round_trip() {
        let value = TestStruct {
            bytes: vec![],
            maybe: None,
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"bytes":""}"#);
        assert_eq!(serde_json::from_str::<TestStruct>(&json).unwrap(), value);
    }
}
