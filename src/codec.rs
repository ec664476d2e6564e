//! Payload serialization.
//!
//! Every call payload crossing the connection is MessagePack, encoded with
//! `rmp-serde`. The codec is a marker struct with static methods rather than
//! a trait object, so there is nothing to thread through the call path.
//!
//! # Example
//!
//! ```
//! use wirecall::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&("add", 2, 3)).unwrap();
//! let decoded: (String, i32, i32) = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, ("add".to_string(), 2, 3));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// MessagePack codec for call payloads.
///
/// Uses the compact (positional) encoding; both ends of the connection speak
/// this crate, so field names are not carried on the wire.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(value)?)
    }

    /// Decode a value from MsgPack bytes.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Payload {
        id: u32,
        label: String,
    }

    #[test]
    fn test_roundtrip_struct() {
        let value = Payload {
            id: 7,
            label: "seven".to_string(),
        };

        let bytes = MsgPackCodec::encode(&value).unwrap();
        let back: Payload = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_roundtrip_primitives() {
        let bytes = MsgPackCodec::encode(&42i64).unwrap();
        let n: i64 = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(n, 42);

        let bytes = MsgPackCodec::encode("hello").unwrap();
        let s: String = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(s, "hello");
    }

    #[test]
    fn test_decode_type_mismatch_fails() {
        let bytes = MsgPackCodec::encode(&"not a number").unwrap();
        let result: Result<u64> = MsgPackCodec::decode(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_truncated_fails() {
        let mut bytes = MsgPackCodec::encode(&Payload {
            id: 1,
            label: "x".to_string(),
        })
        .unwrap();
        bytes.truncate(bytes.len() - 1);

        let result: Result<Payload> = MsgPackCodec::decode(&bytes);
        assert!(result.is_err());
    }
}
