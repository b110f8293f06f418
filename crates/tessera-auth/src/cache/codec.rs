//! Serialization strategies for cached values.
//!
//! [`MessagePack`] is the compact binary encoding used for structured values
//! such as permission documents. [`Json`] is human-inspectable and used for
//! flat shapes. Both satisfy `decode(encode(v)) == v`.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors raised while encoding or decoding a cached value.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("{codec} encode failed: {message}")]
    Encode {
        /// Codec name.
        codec: &'static str,
        /// Underlying serializer message.
        message: String,
    },

    /// The stored bytes could not be deserialized into the requested type.
    #[error("{codec} decode failed: {message}")]
    Decode {
        /// Codec name.
        codec: &'static str,
        /// Underlying deserializer message.
        message: String,
    },
}

/// A serialization strategy for cache values.
pub trait Codec: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Encodes `value` to bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decodes bytes produced by [`encode`](Self::encode).
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// MessagePack encoding with named fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagePack;

impl Codec for MessagePack {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        // Named fields keep `skip_serializing_if` and defaulted fields decodable.
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::Encode {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            message: e.to_string(),
        })
    }
}

/// JSON encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Json;

impl Codec for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode {
            codec: self.name(),
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            message: e.to_string(),
        })
    }
}
