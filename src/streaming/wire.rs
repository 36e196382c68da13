//! Wire format serialization abstraction
//!
//! All TCP traffic and every UDP datagram use the same length-prefixed
//! framing:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ JSON or Postcard binary  │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! JSON is the default format: scan clients are typically viewers written in
//! other languages and debuggability matters more than size. Postcard is
//! available for bandwidth-sensitive deployments; it stores each coordinate
//! in a fixed 8 bytes, so a 50-point batch of full-precision coordinates is
//! ~1.2KB against ~3KB in JSON.
//!
//! Oversized frames (>1MB) close the connection; a payload that fails to
//! deserialize is logged and discarded with the connection left open.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maximum accepted frame payload size (1MB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WireFormat {
    /// Binary format using postcard - fast and compact
    Postcard,
    /// JSON format - human-readable for debugging
    #[default]
    Json,
}

/// Serializer that can handle both formats
#[derive(Clone)]
pub struct Serializer {
    format: WireFormat,
}

impl Serializer {
    /// Create a new serializer for the given format
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    /// Serialize a message to bytes
    pub fn serialize<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>> {
        match self.format {
            WireFormat::Postcard => {
                postcard::to_allocvec(msg).map_err(|e| Error::Serialization(e.to_string()))
            }
            WireFormat::Json => {
                serde_json::to_vec(msg).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }

    /// Deserialize bytes to a message
    pub fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self.format {
            WireFormat::Postcard => {
                postcard::from_bytes(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            WireFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }

    /// Serialize a message and build a length-prefixed frame into `buffer`
    ///
    /// Clears and reuses the buffer; no allocation when capacity suffices.
    pub fn frame_into<T: Serialize>(&self, msg: &T, buffer: &mut Vec<u8>) -> Result<()> {
        let payload = self.serialize(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(Error::Serialization(format!(
                "frame payload too large: {} bytes",
                payload.len()
            )));
        }
        buffer.clear();
        buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&payload);
        Ok(())
    }
}
