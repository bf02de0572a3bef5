//! Audio devices via cpal.
//!
//! cpal streams are not `Send` on every platform, so each stream is built and
//! kept alive on its own thread until a stop signal arrives. The device
//! callbacks only touch the capture queue or the playback buffer.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{error, info};

use super::backend::{AudioChunk, CaptureBackend, CaptureBackendConfig};
use super::capture::CaptureQueue;
use super::playback::PlaybackBuffer;

/// Symmetric i16 max for float conversion.
const I16_MAX_F32: f32 = i16::MAX as f32;

/// A device stream parked on a dedicated thread
struct StreamThread {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl StreamThread {
    /// Build a stream on a new thread and wait until it is playing
    fn spawn<F>(name: &str, build: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Stream> + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let stream = match build().and_then(|s| {
                    s.play().context("Failed to start stream")?;
                    Ok(s)
                }) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Disconnect counts as stop
                let _ = stop_rx.recv();
                drop(stream);
            })
            .context("Failed to spawn audio thread")?;

        ready_rx
            .recv()
            .map_err(|_| anyhow!("Audio thread exited before the stream started"))??;

        Ok(Self { stop_tx, handle })
    }

    fn stop(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            error!("Audio thread panicked");
        }
    }
}

fn stream_config(sample_rate: u32, channels: u16, block_size: usize) -> StreamConfig {
    StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Fixed(block_size as u32),
    }
}

/// Input formats the capture callback can convert to PCM16
fn input_sample_format(format: SampleFormat) -> Result<SampleFormat> {
    match format {
        SampleFormat::F32 | SampleFormat::I16 => Ok(format),
        other => bail!("Unsupported input sample format: {:?}", other),
    }
}

/// Default-microphone capture backend
pub struct CpalCaptureBackend {
    config: CaptureBackendConfig,
    stream: Option<StreamThread>,
}

impl CpalCaptureBackend {
    pub fn new(config: CaptureBackendConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }
}

fn build_input_stream(config: CaptureBackendConfig, queue: CaptureQueue) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No default input device available"))?;

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
    info!(device = %dev_name, "Selected input device");

    let format = input_sample_format(
        device
            .default_input_config()
            .context("Failed to get default input config")?
            .sample_format(),
    )?;
    let cpal_config = stream_config(config.sample_rate, config.channels, config.block_size);
    let sample_rate = config.sample_rate;
    let channels = config.channels;

    let on_error = |err: cpal::StreamError| error!("Audio input stream error: {}", err);

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &cpal_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = data
                    .iter()
                    .map(|s| (s * I16_MAX_F32).clamp(i16::MIN as f32, I16_MAX_F32) as i16)
                    .collect();
                queue.push(AudioChunk {
                    samples,
                    sample_rate,
                    channels,
                });
            },
            on_error,
            None,
        ),
        // Only I16 is left after input_sample_format
        _ => device.build_input_stream(
            &cpal_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                queue.push(AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                });
            },
            on_error,
            None,
        ),
    }
    .context("Failed to build input stream")?;

    Ok(stream)
}

#[async_trait::async_trait]
impl CaptureBackend for CpalCaptureBackend {
    async fn start(&mut self, queue: CaptureQueue) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let stream = tokio::task::spawn_blocking(move || {
            StreamThread::spawn("audio-input", move || build_input_stream(config, queue))
        })
        .await
        .context("Audio input task panicked")??;

        self.stream = Some(stream);
        info!("Audio capture started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            tokio::task::spawn_blocking(move || stream.stop())
                .await
                .context("Audio input task panicked")?;
            info!("Audio capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    fn name(&self) -> &str {
        "cpal-input"
    }
}

/// Output stream that plays whatever lands in a [`PlaybackBuffer`]
///
/// Every device callback pulls one block; underruns play silence.
pub struct PlaybackStream {
    stream: Option<StreamThread>,
}

impl PlaybackStream {
    pub fn start(buffer: PlaybackBuffer, config: CaptureBackendConfig) -> Result<Self> {
        let stream = StreamThread::spawn("audio-output", move || {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| anyhow!("No default output device available"))?;

            let dev_name = device.name().unwrap_or_else(|_| "unknown".into());
            info!(device = %dev_name, "Selected output device");

            let cpal_config =
                stream_config(config.sample_rate, config.channels, config.block_size);

            device
                .build_output_stream(
                    &cpal_config,
                    move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        buffer.fill_frame(out);
                    },
                    |err: cpal::StreamError| error!("Audio output stream error: {}", err),
                    None,
                )
                .context("Failed to build output stream")
        })?;

        info!("Audio playback started");
        Ok(Self {
            stream: Some(stream),
        })
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            info!("Audio playback stopped");
        }
    }
}

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_sample_formats() {
        assert_eq!(input_sample_format(SampleFormat::F32).unwrap(), SampleFormat::F32);
        assert_eq!(input_sample_format(SampleFormat::I16).unwrap(), SampleFormat::I16);

        let err = input_sample_format(SampleFormat::U16).unwrap_err();
        assert!(err.to_string().contains("U16"));
        assert!(input_sample_format(SampleFormat::I32).is_err());
    }

    #[test]
    fn test_stream_config_uses_fixed_block() {
        let config = stream_config(24_000, 1, 2_000);

        assert_eq!(config.channels, 1);
        assert_eq!(config.sample_rate, cpal::SampleRate(24_000));
        assert_eq!(config.buffer_size, cpal::BufferSize::Fixed(2_000));
    }
}
