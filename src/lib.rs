pub mod audio;
pub mod config;
pub mod console;
pub mod http;
pub mod realtime;

pub use audio::{
    AudioChunk, CaptureBackend, CaptureBackendConfig, CaptureBackendFactory, CaptureQueue,
    DisabledBackend, PlaybackBuffer, StreamingRecorder,
};
pub use config::Config;
pub use console::{Console, ConsoleError, ConsoleStatus};
pub use http::{create_router, AppState};
pub use realtime::{ClientError, Direction, Event, LogEntry, RealtimeClient, RealtimeConfig};
