//! Message encoding.
//!
//! Payloads travel between the two ends of a call as encoded bytes. The
//! [`Encoding`] chosen when the call is opened decides whether they are
//! protobuf or JSON; both directions of one call use the same encoding.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{MessageLimits, Status};

/// Bound satisfied by every request and response type.
///
/// Messages are plain `prost` structs that also derive the serde traits, so
/// the same type can be carried with either [`Encoding`].
pub trait Message: prost::Message + Serialize + DeserializeOwned + Default + Send + 'static {}

impl<T> Message for T where T: prost::Message + Serialize + DeserializeOwned + Default + Send + 'static
{}

/// Payload encoding negotiated for a call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Proto,
    Json,
}

impl Encoding {
    /// Short name used in logs and span fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Proto => "proto",
            Encoding::Json => "json",
        }
    }

    pub fn is_proto(&self) -> bool {
        matches!(self, Encoding::Proto)
    }

    /// Encode a message.
    ///
    /// Serialization failures are reported as [`Code::Internal`](crate::Code::Internal).
    pub fn encode<T: Message>(&self, msg: &T) -> Result<Bytes, Status> {
        match self {
            Encoding::Proto => Ok(Bytes::from(msg.encode_to_vec())),
            Encoding::Json => serde_json::to_vec(msg)
                .map(Bytes::from)
                .map_err(|e| Status::internal(format!("JSON encoding failed: {}", e))),
        }
    }

    /// Decode a message.
    ///
    /// Malformed payloads are reported as [`Code::InvalidArgument`](crate::Code::InvalidArgument).
    pub fn decode<T: Message>(&self, payload: &[u8]) -> Result<T, Status> {
        match self {
            Encoding::Proto => T::decode(payload)
                .map_err(|e| Status::invalid_argument(format!("protobuf decoding failed: {}", e))),
            Encoding::Json => serde_json::from_slice(payload)
                .map_err(|e| Status::invalid_argument(format!("JSON decoding failed: {}", e))),
        }
    }

    /// Encode a message and enforce the size limit on the result.
    pub fn encode_limited<T: Message>(
        &self,
        msg: &T,
        limits: &MessageLimits,
    ) -> Result<Bytes, Status> {
        let bytes = self.encode(msg)?;
        limits.check_size(bytes.len())?;
        Ok(bytes)
    }

    /// Enforce the size limit and decode.
    pub fn decode_limited<T: Message>(
        &self,
        payload: &[u8],
        limits: &MessageLimits,
    ) -> Result<T, Status> {
        limits.check_size(payload.len())?;
        self.decode(payload)
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
