use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::ConsoleError;
use super::status::ConsoleStatus;
use crate::audio::{PlaybackBuffer, StreamingRecorder};
use crate::realtime::event::types;
use crate::realtime::RealtimeClient;

/// The console's view of one realtime client
///
/// Wires the client's audio callback into a playback buffer, owns the
/// microphone recorder and implements the user actions: connect, send a raw
/// event, toggle recording, and the periodic capture drain.
pub struct Console {
    client: Arc<RealtimeClient>,
    playback: PlaybackBuffer,
    recorder: Mutex<StreamingRecorder>,
    model: String,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl Console {
    pub fn new(client: RealtimeClient, recorder: StreamingRecorder, model: impl Into<String>) -> Self {
        let playback = PlaybackBuffer::new();

        let sink = playback.clone();
        client.set_audio_callback(move |samples| sink.append(&samples));

        Self {
            client: Arc::new(client),
            playback,
            recorder: Mutex::new(recorder),
            model: model.into(),
            started_at: Utc::now(),
        }
    }

    /// Connect to `model`, or the console's default model
    pub async fn connect(&self, model: Option<&str>) -> Result<(), ConsoleError> {
        let model = model.unwrap_or(&self.model);
        self.client.connect(model).await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), ConsoleError> {
        self.client.disconnect().await?;
        Ok(())
    }

    /// Send an event typed by the user as JSON text
    ///
    /// The text must be an object with a string `type`; the remaining fields
    /// become the event payload. Returns the event type that was sent.
    pub fn send_user_json(&self, text: &str) -> Result<String, ConsoleError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConsoleError::EmptyInput);
        }

        let mut event = match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => map,
            _ => return Err(ConsoleError::MissingType),
        };

        let event_type = match event.remove("type") {
            Some(Value::String(t)) => t,
            _ => return Err(ConsoleError::MissingType),
        };

        self.client.send(&event_type, Some(Value::Object(event)))?;

        Ok(event_type)
    }

    /// Start or stop the microphone; returns whether it is now recording
    ///
    /// Stopping sends every chunk still queued, then
    /// `input_audio_buffer.commit`, then `response.create`.
    pub async fn toggle_recording(&self) -> Result<bool, ConsoleError> {
        let mut recorder = self.recorder.lock().await;

        if !recorder.is_recording() {
            recorder.start_recording().await?;
            info!("Recording started");
            return Ok(true);
        }

        recorder.stop_recording().await?;

        let sent = self.send_queued(&recorder)?;
        self.client.send(types::INPUT_AUDIO_COMMIT, None)?;
        self.client.send(types::RESPONSE_CREATE, None)?;

        info!("Recording stopped, {} trailing chunks committed", sent);

        Ok(false)
    }

    /// Send every captured chunk as `input_audio_buffer.append`
    ///
    /// Called on each tick; does nothing unless recording. Chunks stay
    /// queued while the session is down.
    pub async fn drain_capture(&self) -> Result<usize, ConsoleError> {
        let recorder = self.recorder.lock().await;

        if !recorder.is_recording() {
            return Ok(0);
        }

        self.send_queued(&recorder)
    }

    fn send_queued(&self, recorder: &StreamingRecorder) -> Result<usize, ConsoleError> {
        if !self.client.is_connected() && !recorder.queue().is_empty() {
            warn!(
                "Not connected, holding {} captured chunks",
                recorder.queue().len()
            );
            return Err(crate::realtime::ClientError::NotConnected.into());
        }

        let mut sent = 0;
        while let Some(chunk) = recorder.get_audio_chunk() {
            self.client.send(
                types::INPUT_AUDIO_APPEND,
                Some(json!({ "audio": chunk.to_base64() })),
            )?;
            sent += 1;
        }

        Ok(sent)
    }

    /// Rendered event log: one summary line per event, or pretty JSON
    pub fn log_lines(&self, full: bool) -> Vec<String> {
        self.client
            .logs()
            .iter()
            .map(|entry| {
                if full {
                    serde_json::from_str::<Value>(&entry.event)
                        .and_then(|v| serde_json::to_string_pretty(&v))
                        .unwrap_or_else(|_| entry.event.clone())
                } else {
                    entry.summary()
                }
            })
            .collect()
    }

    pub fn transcript(&self) -> String {
        self.client.transcript()
    }

    pub async fn status(&self) -> ConsoleStatus {
        let (recording, pending_chunks) = {
            let recorder = self.recorder.lock().await;
            (recorder.is_recording(), recorder.queue().len())
        };
        let duration = Utc::now().signed_duration_since(self.started_at);

        ConsoleStatus {
            connected: self.client.is_connected(),
            recording,
            model: self.model.clone(),
            started_at: self.started_at,
            uptime_secs: duration.num_milliseconds() as f64 / 1000.0,
            log_entries: self.client.event_log().len(),
            transcript_chars: self.client.transcript().chars().count(),
            playback_samples: self.playback.len(),
            pending_chunks,
        }
    }

    pub fn client(&self) -> &Arc<RealtimeClient> {
        &self.client
    }

    /// Buffer the output device should pull from
    pub fn playback(&self) -> &PlaybackBuffer {
        &self.playback
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}
