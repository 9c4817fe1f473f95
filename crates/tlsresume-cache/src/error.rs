//! Error types for session cache operations.

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller passed an argument the cache contract rejects
    /// (missing session id, non-positive capacity, negative timeout).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error from a persistence backend.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;
