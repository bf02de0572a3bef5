use thiserror::Error;

/// Errors reported by [`RealtimeClient`](super::RealtimeClient) operations.
///
/// Failures inside the background worker are not returned here; they tear
/// the session down and show up as `is_connected() == false`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// `connect` called while a session is live
    #[error("already connected")]
    AlreadyConnected,

    /// `send` called without a live session
    #[error("realtime API is not connected")]
    NotConnected,

    /// Event payload was not a JSON object
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// No bearer credential configured
    #[error("missing API key: set {0}")]
    MissingCredential(&'static str),

    /// Request build or WebSocket handshake failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Event could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for realtime client operations.
pub type ClientResult<T> = Result<T, ClientError>;
