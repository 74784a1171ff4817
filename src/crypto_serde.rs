//! Serde helpers encoding group elements, scalars and digests as lowercase hex
//! of their canonical byte form. Decoding accepts an optional `0x` prefix.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::shuffling::group::{
    decode_point, decode_scalar, encode_points, encode_scalar, GroupElement, Scalar,
};

fn decode_hex_bytes(value: &str) -> Result<Vec<u8>, String> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(trimmed).map_err(|err| format!("invalid hex: {err}"))
}

/// Serde helpers for a single group element.
pub mod curve {
    use super::*;

    pub fn serialize<S>(value: &GroupElement, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = encode_points(std::slice::from_ref(value));
        serializer.serialize_str(&hex::encode(&encoded[0]))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<GroupElement, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex_bytes(&s).map_err(DeError::custom)?;
        decode_point(&bytes).map_err(DeError::custom)
    }
}

/// Serde helpers for ordered lists of group elements.
pub mod curve_vec {
    use super::*;

    pub fn serialize<S>(value: &[GroupElement], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: Vec<String> = encode_points(value).iter().map(hex::encode).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<GroupElement>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| {
                let bytes = decode_hex_bytes(s).map_err(DeError::custom)?;
                decode_point(&bytes).map_err(DeError::custom)
            })
            .collect()
    }
}

/// Serde helpers for a non-zero scalar.
pub mod scalar {
    use super::*;

    pub fn serialize<S>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(encode_scalar(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex_bytes(&s).map_err(DeError::custom)?;
        decode_scalar(&bytes).map_err(DeError::custom)
    }
}

/// Serde helpers for fixed 32-byte values such as digests.
pub mod bytes32 {
    use super::*;

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_hex_bytes(&s).map_err(DeError::custom)?;
        bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| DeError::custom(format!("expected 32 bytes, got {}", bytes.len())))
    }
}
