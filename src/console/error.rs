use thiserror::Error;

use crate::realtime::ClientError;

/// Failures surfaced to the person driving the console
///
/// These are rendered as plain messages; none of them affect the session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Please enter a message before sending.")]
    EmptyInput,

    #[error("Invalid JSON input. Please check your message format. ({0})")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Event must be a JSON object with a string \"type\" field")]
    MissingType,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Audio error: {0:#}")]
    Audio(#[from] anyhow::Error),
}
