//! Error types for pool operations

/// Errors from pool construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid proxy endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
