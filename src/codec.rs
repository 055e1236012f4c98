//! Field codec
//!
//! Encodes a single field value to bytes and back.
//!
//! ## Format
//! Every field entry is the `serde_json` text of the field's value:
//! ```text
//! ID         -> "3f0c9a4e-..."
//! HandlerPort -> 8080
//! Owner      -> {"ID":"...","Email":"..."}
//! ```
//! Entries are self-describing, so one field is decoded without looking at
//! any other, and an entry that was never written is simply absent.

use serde_json::Value;

use crate::error::{Result, StoreError};

/// Encode one field value for storage
pub fn encode_field(field: &str, value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Encode {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Decode one stored field entry
pub fn decode_field(field: &str, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
