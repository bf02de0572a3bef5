use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a console, polled by the front-ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleStatus {
    /// Whether the realtime session is live
    pub connected: bool,

    /// Whether the microphone is being captured
    pub recording: bool,

    /// Model used when `connect` is not given one
    pub model: String,

    /// When the console was created
    pub started_at: DateTime<Utc>,

    /// Seconds since `started_at`
    pub uptime_secs: f64,

    /// Number of events in the event log
    pub log_entries: usize,

    /// Length of the assistant transcript in characters
    pub transcript_chars: usize,

    /// Decoded samples waiting for the output device
    pub playback_samples: usize,

    /// Captured chunks not yet sent
    pub pending_chunks: usize,
}
