//! Schema Registry client errors

use thiserror::Error;

/// Confluent-compatible error codes reported in `{"error_code": ..}` bodies
pub mod error_codes {
    // Subject/schema not found
    pub const SUBJECT_NOT_FOUND: i32 = 40401;
    pub const VERSION_NOT_FOUND: i32 = 40402;
    pub const SCHEMA_NOT_FOUND: i32 = 40403;
    pub const SUBJECT_NOT_SOFT_DELETED: i32 = 40405;
    pub const SUBJECT_COMPATIBILITY_NOT_CONFIGURED: i32 = 40408;

    // Invalid schema/compatibility
    pub const INVALID_SCHEMA: i32 = 42201;
    pub const INVALID_VERSION: i32 = 42202;
    pub const INVALID_COMPATIBILITY_LEVEL: i32 = 42203;
    pub const INCOMPATIBLE_SCHEMA: i32 = 409;

    /// Used when the registry response body could not be parsed
    pub const UNKNOWN: i32 = -1;
}

/// Errors surfaced by [`SchemaRegistryClient`](crate::SchemaRegistryClient)
#[derive(Debug, Error)]
pub enum SchemaRegistryError {
    /// The registry answered with a non-2xx status (or a malformed body)
    #[error("Schema Registry error (HTTP {status}, code {error_code}): {message}")]
    Registry {
        status: u16,
        error_code: i32,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl SchemaRegistryError {
    /// Build a registry error for a response body the client could not interpret
    pub fn unknown(status: u16, body: impl std::fmt::Display) -> Self {
        SchemaRegistryError::Registry {
            status,
            error_code: error_codes::UNKNOWN,
            message: format!("Unknown Schema Registry Error: {}", body),
        }
    }

    /// HTTP status code, if this error came from the registry
    pub fn status(&self) -> Option<u16> {
        match self {
            SchemaRegistryError::Registry { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Registry error code, if this error came from the registry
    pub fn error_code(&self) -> Option<i32> {
        match self {
            SchemaRegistryError::Registry { error_code, .. } => Some(*error_code),
            _ => None,
        }
    }

    /// True for 404-class registry answers (unknown subject, version or schema)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.error_code(),
            Some(error_codes::SUBJECT_NOT_FOUND)
                | Some(error_codes::VERSION_NOT_FOUND)
                | Some(error_codes::SCHEMA_NOT_FOUND)
        ) || self.status() == Some(404)
    }

    /// True when the registry rejected a schema against the subject's compatibility policy
    pub fn is_incompatible(&self) -> bool {
        self.error_code() == Some(error_codes::INCOMPATIBLE_SCHEMA) || self.status() == Some(409)
    }
}

impl From<reqwest::Error> for SchemaRegistryError {
    fn from(err: reqwest::Error) -> Self {
        SchemaRegistryError::Transport(err.to_string())
    }
}

/// Result type for registry operations
pub type SchemaRegistryResult<T> = Result<T, SchemaRegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_error_code() {
        let err = SchemaRegistryError::unknown(500, "<html>oops</html>");
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.error_code(), Some(-1));
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn test_not_found_classification() {
        let err = SchemaRegistryError::Registry {
            status: 404,
            error_code: error_codes::SCHEMA_NOT_FOUND,
            message: "Schema not found".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_incompatible());

        let err = SchemaRegistryError::Transport("connection refused".into());
        assert!(!err.is_not_found());
        assert_eq!(err.status(), None);
    }
}
