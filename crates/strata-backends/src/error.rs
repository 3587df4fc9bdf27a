//! Error types for backend selection

use crate::types::BackendType;

/// Result type for selection and policy operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised while choosing where an operation runs
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Invalid policy or selector configuration value
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An explicitly requested backend has no device on this host
    #[error("device not found: no {backend} device available")]
    DeviceNotFound { backend: BackendType },

    /// Operand or operation incompatible with the backend
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DispatchError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Errors tied to a specific backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Two operands of a binary operation live on different backends
    #[error("backend mismatch: {lhs} vs {rhs}")]
    Mismatch { lhs: BackendType, rhs: BackendType },

    /// The backend cannot run this operation
    #[error("unsupported operation: {operation} on {backend}")]
    Unsupported { operation: String, backend: BackendType },
}

impl BackendError {
    /// Create an unsupported operation error
    pub fn unsupported(operation: impl Into<String>, backend: BackendType) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            backend,
        }
    }
}
