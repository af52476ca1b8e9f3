/// Error types for running checkout machines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The actor's event loop has stopped, so no event can be delivered.
    #[error("Actor stopped")]
    ActorStopped,

    /// A state name that no checkout state carries.
    #[error("Unknown checkout state: {0}")]
    UnknownState(String),

    /// The registry has no view for a state.
    #[error("No renderer registered for state {0}")]
    NoRenderer(String),

    #[error("Configuration error: {0}")]
    Core(#[from] checkout_core::errors::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

/// A specialized `Result` type for checkout machine operations.
pub type Result<T> = std::result::Result<T, Error>;
