//! JSON wire codec for relay/device payloads
//!
//! Commands and responses cross the transport seam as single JSON documents.
//! The transport collaborator handles envelope signing and any outer framing;
//! this codec only maps between protocol types and raw bytes.

use bytes::Bytes;
use thiserror::Error;

use crate::{CommandEnvelope, DeviceResponse};

/// Maximum payload size (256 KB) to prevent memory exhaustion from a
/// misbehaving device.
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Payload too large: {0} bytes (max: {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an outbound command envelope into a raw payload.
pub fn encode_command(envelope: &CommandEnvelope) -> Result<Bytes, CodecError> {
    let encoded = serde_json::to_vec(envelope)?;
    if encoded.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(encoded.len()));
    }
    Ok(Bytes::from(encoded))
}

/// Decode an inbound device response from a raw payload.
pub fn decode_response(payload: &Bytes) -> Result<DeviceResponse, CodecError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    Ok(serde_json::from_slice(payload)?)
}

/// Encode a device response, used by device-side tooling and tests.
pub fn encode_response(response: &DeviceResponse) -> Result<Bytes, CodecError> {
    let encoded = serde_json::to_vec(response)?;
    if encoded.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(encoded.len()));
    }
    Ok(Bytes::from(encoded))
}

/// Decode an outbound command, used by device-side tooling and tests.
pub fn decode_command(payload: &Bytes) -> Result<CommandEnvelope, CodecError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    Ok(serde_json::from_slice(payload)?)
}
