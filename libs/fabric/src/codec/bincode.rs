use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::transport::MAX_FRAME_SIZE;

/// Bincode codec for binary serialization
///
/// Integers are fixed-width big-endian, strings and sequences carry a
/// `u64` length prefix. Decoding rejects trailing bytes and refuses to
/// allocate more than a frame can hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_big_endian()
            .with_limit(MAX_FRAME_SIZE as u64)
            .reject_trailing_bytes()
    }
}

impl Codec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Self::options()
            .serialize(value)
            .map_err(|e| Error::Codec(e.to_string()))
    }

    fn encode_into<T: Serialize>(&self, value: &T, buf: &mut Vec<u8>) -> Result<()> {
        Self::options()
            .serialize_into(buf, value)
            .map_err(|e| Error::Codec(e.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T> {
        Self::options()
            .deserialize(bytes)
            .map_err(|e| Error::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: i64,
        name: String,
        items: Vec<i32>,
    }

    #[test]
    fn integers_are_big_endian_fixed_width() {
        let bytes = BincodeCodec.encode(&0x0102_0304_i32).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn strings_are_length_prefixed() {
        let bytes = BincodeCodec.encode(&"ab".to_string()).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn encode_into_appends() {
        let mut buf = vec![0xFF];
        BincodeCodec.encode_into(&7u16, &mut buf).unwrap();
        assert_eq!(buf, vec![0xFF, 0, 7]);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = BincodeCodec
            .encode(&Sample {
                id: 1,
                name: "x".into(),
                items: vec![],
            })
            .unwrap();
        bytes.push(0);
        let result: Result<Sample> = BincodeCodec.decode(&bytes);
        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = BincodeCodec
            .encode(&Sample {
                id: 1,
                name: "hello".into(),
                items: vec![1, 2, 3],
            })
            .unwrap();
        let result: Result<Sample> = BincodeCodec.decode(&bytes[..bytes.len() - 1]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absurd_length_prefix() {
        // String claiming u64::MAX bytes
        let bytes = vec![0xFF; 8];
        let result: Result<String> = BincodeCodec.decode(&bytes);
        assert!(result.is_err());
    }
}
