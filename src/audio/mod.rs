pub mod backend;
pub mod capture;
pub mod playback;

#[cfg(feature = "device-audio")]
pub mod device;

pub use backend::{
    AudioChunk, CaptureBackend, CaptureBackendConfig, CaptureBackendFactory, DisabledBackend,
};
pub use capture::{CaptureQueue, StreamingRecorder};
pub use playback::PlaybackBuffer;

#[cfg(feature = "device-audio")]
pub use device::{CpalCaptureBackend, PlaybackStream};
