//! Serializer and deserializer errors

use schema_registry_client::SchemaRegistryError;
use thiserror::Error;

/// Errors that can occur while framing, encoding or decoding a message
#[derive(Debug, Error)]
pub enum SerdeError {
    /// The registry call behind a serializer or deserializer failed
    #[error(transparent)]
    Registry(#[from] SchemaRegistryError),

    /// The bytes are not a Schema Registry framed message
    #[error("Invalid wire format: {0}")]
    Framing(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A value or schema of the wrong kind was handed to a serializer
    #[error("Type error: {0}")]
    Type(String),

    #[error("Schema parse error: {0}")]
    SchemaParse(String),
}

impl From<serde_json::Error> for SerdeError {
    fn from(err: serde_json::Error) -> Self {
        SerdeError::Encode(err.to_string())
    }
}

impl From<apache_avro::Error> for SerdeError {
    fn from(err: apache_avro::Error) -> Self {
        SerdeError::Encode(err.to_string())
    }
}

impl From<prost::DecodeError> for SerdeError {
    fn from(err: prost::DecodeError) -> Self {
        SerdeError::Decode(err.to_string())
    }
}

/// Result type for serializer operations
pub type SerdeResult<T> = Result<T, SerdeError>;
