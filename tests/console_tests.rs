// Console behaviour against a local realtime server

mod common;

use anyhow::Result;
use common::{wait_until, MockServer};
use realtime_console::{
    AudioChunk, CaptureBackend, CaptureQueue, Console, ConsoleError, RealtimeClient,
    StreamingRecorder,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend whose queue handle stays reachable from the test
#[derive(Clone, Default)]
struct ScriptedBackend {
    queue: Arc<Mutex<Option<CaptureQueue>>>,
    capturing: bool,
}

impl ScriptedBackend {
    fn push(&self, samples: Vec<i16>) {
        let queue = self.queue.lock().unwrap();
        queue
            .as_ref()
            .expect("backend not started")
            .push(AudioChunk::new(samples));
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn start(&mut self, queue: CaptureQueue) -> Result<()> {
        *self.queue.lock().unwrap() = Some(queue);
        self.capturing = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn console_for(server: &MockServer) -> (Console, ScriptedBackend) {
    let backend = ScriptedBackend::default();
    let console = Console::new(
        RealtimeClient::new(server.config()),
        StreamingRecorder::new(Box::new(backend.clone())),
        "test-model",
    );
    (console, backend)
}

#[tokio::test]
async fn test_connect_uses_default_model() {
    let server = MockServer::start().await;
    let (console, _backend) = console_for(&server);

    console.connect(None).await.unwrap();

    assert_eq!(server.handshakes()[0].uri, "/v1/realtime?model=test-model");
    assert!(console.status().await.connected);

    console.disconnect().await.unwrap();
    assert!(!console.status().await.connected);
}

#[tokio::test]
async fn test_connect_with_model_override() {
    let server = MockServer::start().await;
    let (console, _backend) = console_for(&server);

    console.connect(Some("other-model")).await.unwrap();

    assert_eq!(server.handshakes()[0].uri, "/v1/realtime?model=other-model");

    console.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_send_user_json_strips_type() {
    let mut server = MockServer::start().await;
    let (console, _backend) = console_for(&server);
    console.connect(None).await.unwrap();

    let sent = console
        .send_user_json(r#"  {"type": "conversation.item.create", "item": {"role": "user"}}  "#)
        .unwrap();

    assert_eq!(sent, "conversation.item.create");
    assert_eq!(
        server.next_event().await,
        json!({"type": "conversation.item.create", "item": {"role": "user"}})
    );

    console.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_invalid_input_sends_nothing() {
    let mut server = MockServer::start().await;
    let (console, _backend) = console_for(&server);
    console.connect(None).await.unwrap();

    assert!(matches!(console.send_user_json(""), Err(ConsoleError::EmptyInput)));
    assert!(matches!(
        console.send_user_json("not json"),
        Err(ConsoleError::InvalidJson(_))
    ));
    assert!(matches!(
        console.send_user_json(r#"{"type": 7}"#),
        Err(ConsoleError::MissingType)
    ));

    server.assert_quiet(Duration::from_millis(100)).await;
    assert!(console.log_lines(false).is_empty());

    console.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_stop_recording_sends_trailing_chunks_then_commit() {
    let mut server = MockServer::start().await;
    let (console, backend) = console_for(&server);
    console.connect(None).await.unwrap();

    assert!(console.toggle_recording().await.unwrap());
    backend.push(vec![1, 2]);
    backend.push(vec![3, 4]);
    backend.push(vec![5, 6]);

    assert!(!console.toggle_recording().await.unwrap());

    for expected in ["AQACAA==", "AwAEAA==", "BQAGAA=="] {
        let event = server.next_event().await;
        assert_eq!(event["type"], "input_audio_buffer.append");
        assert_eq!(event["audio"], expected);
    }
    assert_eq!(server.next_type().await, "input_audio_buffer.commit");
    assert_eq!(server.next_type().await, "response.create");

    let status = console.status().await;
    assert!(!status.recording);
    assert_eq!(status.pending_chunks, 0);

    console.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_drain_capture_streams_while_recording() {
    let mut server = MockServer::start().await;
    let (console, backend) = console_for(&server);
    console.connect(None).await.unwrap();

    assert_eq!(console.drain_capture().await.unwrap(), 0);

    console.toggle_recording().await.unwrap();
    backend.push(vec![1, 2]);
    backend.push(vec![1, 2]);

    assert_eq!(console.drain_capture().await.unwrap(), 2);
    assert_eq!(console.drain_capture().await.unwrap(), 0);

    for _ in 0..2 {
        let event = server.next_event().await;
        assert_eq!(event["type"], "input_audio_buffer.append");
        assert_eq!(event["audio"], "AQACAA==");
    }

    console.toggle_recording().await.unwrap();
    assert_eq!(server.next_type().await, "input_audio_buffer.commit");
    assert_eq!(server.next_type().await, "response.create");

    console.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_drain_holds_chunks_while_disconnected() {
    let server = MockServer::start().await;
    let (console, backend) = console_for(&server);

    console.toggle_recording().await.unwrap();
    backend.push(vec![1, 2]);

    let err = console.drain_capture().await.unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Client(realtime_console::ClientError::NotConnected)
    ));
    assert_eq!(console.status().await.pending_chunks, 1);
}

#[tokio::test]
async fn test_server_audio_reaches_playback() {
    let server = MockServer::start().await;
    let (console, _backend) = console_for(&server);
    console.connect(None).await.unwrap();

    server.send_event(json!({"type": "response.audio.delta", "delta": "AQACAA=="}));
    server.send_event(json!({"type": "response.audio_transcript.delta", "delta": "Hi"}));

    wait_until(|| console.playback().len() == 2).await;
    wait_until(|| console.transcript() == "Hi").await;

    // Underrun yields silence and keeps the buffered samples
    assert_eq!(console.playback().pull_frame(4), vec![0; 4]);
    assert_eq!(console.playback().pull_frame(2), vec![1, 2]);

    let lines = console.log_lines(false);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("↓ server response.audio.delta"));

    let full = console.log_lines(true);
    assert!(full[1].contains("\"delta\": \"Hi\""));

    console.disconnect().await.unwrap();
}
