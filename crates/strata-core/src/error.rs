//! Error types for strata-core operations

use strata_backends::{BackendError, DispatchError};
use strata_profiler::ProfilerError;

/// Result type for strata-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching, profiling or exporting
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backend selection or policy failure
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Report rendering, export or baseline loading failure
    #[error(transparent)]
    Profiler(#[from] ProfilerError),

    /// The kernel layer rejected or failed the operation
    #[error("kernel error: {0}")]
    Kernel(String),

    /// Tensor shapes do not fit the operation
    #[error("invalid tensor shape: {0}")]
    InvalidShape(String),
}

impl Error {
    pub fn kernel(msg: impl Into<String>) -> Self {
        Self::Kernel(msg.into())
    }

    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Self::Dispatch(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_backends::BackendType;

    #[test]
    fn backend_errors_keep_their_message() {
        let err: Error = BackendError::Mismatch {
            lhs: BackendType::Gpu,
            rhs: BackendType::Cpu,
        }
        .into();
        assert_eq!(err.to_string(), "backend mismatch: GPU vs CPU");
        assert!(matches!(err, Error::Dispatch(DispatchError::Backend(_))));
    }

    #[test]
    fn profiler_errors_convert() {
        let err: Error = ProfilerError::configuration("bad format").into();
        assert_eq!(err.to_string(), "configuration error: bad format");
    }
}
