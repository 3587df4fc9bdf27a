//! Error types for profiling and export

use std::path::PathBuf;

/// Result type for profiler operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Errors raised by report export and baseline loading
#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    /// Unknown format name or a format that needs a disabled feature
    #[error("configuration error: {0}")]
    Configuration(String),

    /// File could not be written or read
    #[error("I/O error on {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProfilerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
