//! Error types for transport operations

/// Errors from session construction and request execution.
///
/// `Network` means the request never produced an HTTP response — connection
/// refused, DNS failure, broken stream. It is deliberately distinct from any
/// status code: status mapping belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    #[error("challenge still present after {attempts} solve attempts")]
    ChallengeUnsolved { attempts: usize },
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
