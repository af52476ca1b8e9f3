/// Error types for checkout configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// JSON serialization/deserialization errors.
    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// The configuration parsed but describes nothing to sell.
    #[error("Paywall configuration has no locks")]
    NoLocks,
}

/// A specialized `Result` type for checkout core operations.
pub type Result<T> = std::result::Result<T, Error>;
