use thiserror::Error;

/// Shared error type for the protocol codec and the small set of concerns
/// every fabric component touches (config loading, message framing).
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message too large: {0} bytes exceeds the {1}-byte datagram limit")]
    TooLarge(usize, usize),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

/// Result type alias used throughout the fabric crates.
pub type Result<T> = std::result::Result<T, FabricError>;
