use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::viz::Viz;

/// The discriminant key of the only message the data source sends.
pub const VIZ_UPDATE_KEY: &str = "VizUpdate";

/// Messages sent by the data source, externally tagged on the wire:
/// `{"VizUpdate": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WsMessage {
    VizUpdate(Viz),
}

impl WsMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no `VizUpdate` key")]
    MissingEnvelope,
    #[error("`VizUpdate` payload is not a record: {0}")]
    InvalidRecord(serde_json::Error),
}

/// One discrete message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn decode(&self) -> Result<Viz, DecodeError> {
        match self {
            Frame::Text(text) => decode_text(text),
            Frame::Binary(bytes) => decode_text(std::str::from_utf8(bytes)?),
        }
    }
}

/// Decode a text frame into the record carried by its `VizUpdate` envelope.
///
/// Only the envelope key is checked; other top-level keys are ignored and the
/// record itself is decoded leniently (see [`Widget`](crate::Widget)).
pub fn decode_text(text: &str) -> Result<Viz, DecodeError> {
    let mut value: Value = serde_json::from_str(text)?;
    let payload = value
        .as_object_mut()
        .and_then(|obj| obj.remove(VIZ_UPDATE_KEY))
        .ok_or(DecodeError::MissingEnvelope)?;
    serde_json::from_value(payload).map_err(DecodeError::InvalidRecord)
}
