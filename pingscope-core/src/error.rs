use std::fmt;

use serde::Serialize;

/// A geometry string that does not decode to a single valid point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    #[error("not a POINT geometry: {input:?}")]
    NotAPoint { input: String },

    #[error("expected 2 coordinates, found {found}")]
    WrongArity { found: usize },

    #[error("invalid coordinate token {token:?}")]
    InvalidNumber { token: String },

    #[error("coordinate out of range: lat={latitude} lon={longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}

/// The inference service sent something this side does not understand.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("unrecognized cell type {value:?}")]
    UnknownCellType { value: String },

    #[error("malformed confidence value {value}")]
    MalformedConfidence { value: String },

    #[error("unknown model id {id}")]
    UnknownModel { id: u64 },

    #[error("undecodable response body: {reason}")]
    Body { reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkFailure {
    #[error("request failed: {reason}")]
    Transport { reason: String },

    #[error("{url} answered with status {status}")]
    Status { status: u16, url: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Network(#[from] NetworkFailure),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("no inference available for the requested window")]
    NoInference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    SubscriberId,
    ModelId,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::SubscriberId => f.write_str("subscriber"),
            Field::ModelId => f.write_str("model"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}
