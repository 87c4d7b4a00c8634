//! Unified error handling for the registry.
//!
//! Validation failures are not errors: the request handler reports them as
//! 400 responses directly. Everything that reaches this type is converted
//! into a 500 response at the handler boundary.

use std::fmt;

#[derive(Debug)]
pub enum RegistryError {
    /// Key-value store client failures
    Store(String),

    /// JSON parse/encode failures
    Serialization(serde_json::Error),

    /// Malformed event descriptors (missing path parameter or body)
    Request(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Store(msg) => write!(f, "Store error: {msg}"),
            RegistryError::Serialization(err) => write!(f, "Serialization error: {err}"),
            RegistryError::Request(msg) => write!(f, "Invalid request: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<etcd_client::Error> for RegistryError {
    fn from(err: etcd_client::Error) -> Self {
        RegistryError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err)
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
