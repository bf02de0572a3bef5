use anyhow::Result;
use base64::Engine;

use super::capture::CaptureQueue;
use crate::config::{AudioSettings, BLOCK_SIZE, CHANNELS, SAMPLE_RATE};

/// One block of captured audio (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Raw audio samples
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples,
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
        }
    }

    /// Little-endian byte layout expected by `input_audio_buffer.append`
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    /// Base64 of [`to_pcm_bytes`](Self::to_pcm_bytes)
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_pcm_bytes())
    }

    pub fn duration_ms(&self) -> u64 {
        let frames = self.samples.len() as u64 / self.channels.max(1) as u64;
        frames * 1000 / self.sample_rate.max(1) as u64
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureBackendConfig {
    /// Sample rate requested from the device
    pub sample_rate: u32,
    /// Channel count requested from the device
    pub channels: u16,
    /// Samples per delivered block
    pub block_size: usize,
}

impl Default for CaptureBackendConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE, // realtime API PCM16 rate
            channels: CHANNELS,
            block_size: BLOCK_SIZE,
        }
    }
}

impl From<&AudioSettings> for CaptureBackendConfig {
    fn from(settings: &AudioSettings) -> Self {
        Self {
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            block_size: settings.block_size,
        }
    }
}

/// Audio input backend
///
/// Implementations copy every block the device delivers onto the queue
/// handed to `start`. They run on a device-driven thread and must never
/// wait on the realtime client.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start delivering blocks into `queue`
    async fn start(&mut self, queue: CaptureQueue) -> Result<()>;

    /// Stop and release the input stream
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create the default microphone backend for this build
    pub fn create(config: CaptureBackendConfig) -> Result<Box<dyn CaptureBackend>> {
        #[cfg(feature = "device-audio")]
        {
            Ok(Box::new(super::device::CpalCaptureBackend::new(config)))
        }

        #[cfg(not(feature = "device-audio"))]
        {
            let _ = config;
            Ok(Box::new(DisabledBackend::new(
                "microphone capture requires the `device-audio` feature",
            )))
        }
    }
}

/// Stand-in for builds or hosts without an input device
///
/// Every `start` fails with the configured reason.
pub struct DisabledBackend {
    reason: String,
}

impl DisabledBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for DisabledBackend {
    async fn start(&mut self, _queue: CaptureQueue) -> Result<()> {
        anyhow::bail!("{}", self.reason)
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
