use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use super::backend::{AudioChunk, CaptureBackend};

/// Thread-safe FIFO of captured chunks
///
/// The device thread pushes, the console drain pops. Cloning yields another
/// handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct CaptureQueue {
    chunks: Arc<Mutex<VecDeque<AudioChunk>>>,
}

impl CaptureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, chunk: AudioChunk) {
        self.lock().push_back(chunk);
    }

    /// Non-blocking pop of the oldest chunk
    pub fn try_pop(&self) -> Option<AudioChunk> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AudioChunk>> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Microphone recorder feeding a [`CaptureQueue`]
pub struct StreamingRecorder {
    backend: Box<dyn CaptureBackend>,
    queue: CaptureQueue,
    is_recording: bool,
}

impl StreamingRecorder {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            queue: CaptureQueue::new(),
            is_recording: false,
        }
    }

    /// Start the input stream; blocks land on the capture queue
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.is_recording {
            warn!("Recording already started");
            return Ok(());
        }

        info!("Starting recording with {}", self.backend.name());

        self.is_recording = true;

        if let Err(e) = self.backend.start(self.queue.clone()).await {
            self.is_recording = false;
            return Err(e).context("Failed to start audio capture");
        }

        Ok(())
    }

    /// Stop and release the input stream, no-op when not recording
    pub async fn stop_recording(&mut self) -> Result<()> {
        if !self.is_recording {
            return Ok(());
        }

        self.is_recording = false;

        self.backend
            .stop()
            .await
            .context("Failed to stop audio capture")?;

        info!("Recording stopped ({} chunks pending)", self.queue.len());

        Ok(())
    }

    /// Pop one captured chunk without blocking
    pub fn get_audio_chunk(&self) -> Option<AudioChunk> {
        self.queue.try_pop()
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn queue(&self) -> &CaptureQueue {
        &self.queue
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}
