use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{ClientError, ClientResult};
use super::event::{self, types, Event};
use super::log::{Direction, EventLog, LogEntry};
use crate::config::{RealtimeSettings, API_KEY_ENV, DEFAULT_BETA_HEADER, DEFAULT_REALTIME_URL};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives decoded PCM16 samples from `response.audio.delta` events
pub type AudioCallback = Arc<dyn Fn(Vec<i16>) + Send + Sync>;

/// Connection settings for a [`RealtimeClient`]
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint, without query string
    pub url: String,
    /// `OpenAI-Beta` header value
    pub beta_header: String,
    /// Bearer credential; falls back to `OPENAI_API_KEY` when unset
    pub api_key: Option<String>,
    /// How long one receive attempt waits before re-checking for cancellation
    pub poll_interval: Duration,
    /// Whether sent and received events are kept in the event log
    pub record_events: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            beta_header: DEFAULT_BETA_HEADER.to_string(),
            api_key: None,
            poll_interval: Duration::from_millis(50),
            record_events: true,
        }
    }
}

impl From<&RealtimeSettings> for RealtimeConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            url: settings.url.clone(),
            beta_header: settings.beta_header.clone(),
            api_key: None,
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            record_events: settings.record_events,
        }
    }
}

/// State shared between the client handle and its socket worker
struct Shared {
    /// Queue into the worker; `None` when no session is live
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    logs: EventLog,
    transcript: RwLock<String>,
    audio_callback: RwLock<Option<AudioCallback>>,
    record_events: bool,
}

impl Shared {
    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_connected(&self) -> bool {
        self.outbound().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn record(&self, direction: Direction, text: &str) {
        if self.record_events {
            self.logs.push(LogEntry::new(direction, text.to_string()));
        }
    }

    /// Entry point for every inbound text frame
    fn receive_text(&self, text: &str) {
        match serde_json::from_str::<Event>(text) {
            Ok(event) => self.receive(&event, text),
            Err(e) => warn!("Dropping malformed server event: {} - {}", e, text),
        }
    }

    fn receive(&self, event: &Event, raw: &str) {
        self.record(Direction::Server, raw);

        let is_audio = event::event_type(event)
            .is_some_and(|t| t.contains(types::RESPONSE_AUDIO_PREFIX));
        if is_audio {
            self.handle_audio(event);
        }
    }

    fn handle_audio(&self, event: &Event) {
        let delta = event.get("delta").and_then(Value::as_str);

        match event::event_type(event) {
            Some(types::RESPONSE_AUDIO_TRANSCRIPT_DELTA) => match delta {
                Some(text) => self
                    .transcript
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_str(text),
                None => warn!("Transcript delta without text"),
            },
            Some(types::RESPONSE_AUDIO_DELTA) => {
                let callback = self
                    .audio_callback
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                let (Some(callback), Some(b64)) = (callback, delta) else {
                    return;
                };

                match event::decode_pcm16(b64) {
                    Ok(samples) => callback(samples),
                    Err(e) => warn!("Failed to decode audio delta: {}", e),
                }
            }
            _ => {}
        }
    }
}

/// Handle on the background socket worker
struct Worker {
    session_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("Realtime worker panicked: {}", e);
        }
        info!(session_id = %self.session_id, "Realtime session closed");
    }
}

/// Client for one realtime session at a time
///
/// Owns the WebSocket, the event log and the running transcript. All socket
/// I/O happens on a single worker task: `send` only enqueues, so events go
/// out in call order and the worker is the only reader of inbound frames.
pub struct RealtimeClient {
    config: RealtimeConfig,
    shared: Arc<Shared>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        let shared = Arc::new(Shared {
            outbound: Mutex::new(None),
            logs: EventLog::new(),
            transcript: RwLock::new(String::new()),
            audio_callback: RwLock::new(None),
            record_events: config.record_events,
        });

        Self {
            config,
            shared,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Install the sink for decoded assistant audio
    pub fn set_audio_callback<F>(&self, callback: F)
    where
        F: Fn(Vec<i16>) + Send + Sync + 'static,
    {
        *self
            .shared
            .audio_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Open a session for `model` and start the socket worker
    pub async fn connect(&self, model: &str) -> ClientResult<()> {
        let mut worker = self.worker.lock().await;

        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }

        // A worker that ended on its own still needs joining
        if let Some(stale) = worker.take() {
            stale.shutdown().await;
        }

        let api_key = self
            .config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.is_empty())
            .ok_or(ClientError::MissingCredential(API_KEY_ENV))?;

        let request = self.build_request(model, &api_key)?;

        info!("Connecting to realtime API at {} (model={})", self.config.url, model);

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.outbound() = Some(tx);

        let session_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            socket,
            rx,
            cancel.clone(),
            Arc::clone(&self.shared),
            self.config.poll_interval,
            session_id,
        ));

        *worker = Some(Worker {
            session_id,
            cancel,
            handle,
        });

        info!(session_id = %session_id, "Connected to realtime API");

        Ok(())
    }

    /// True while a socket is open and its worker is running
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Close the session and wait for the worker to finish
    ///
    /// Events already queued by `send` are flushed before the close frame.
    /// Safe to call when not connected.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let mut worker = self.worker.lock().await;

        // Stop accepting sends before the worker drains its queue
        drop(self.shared.outbound().take());

        if let Some(worker) = worker.take() {
            worker.shutdown().await;
        }

        Ok(())
    }

    /// Queue an event of type `event_name` for transmission
    ///
    /// `data`, when given, must be a JSON object; its fields are merged after
    /// `type`, and a `type` key inside `data` is ignored. The event is logged
    /// before it is queued. Does not wait for the network.
    pub fn send(&self, event_name: &str, data: Option<Value>) -> ClientResult<()> {
        let outbound = self.shared.outbound();
        let tx = match outbound.as_ref() {
            Some(tx) if !tx.is_closed() => tx,
            _ => return Err(ClientError::NotConnected),
        };

        let event = event::build_event(event_name, data)?;
        let text = serde_json::to_string(&event)?;

        self.shared.record(Direction::Client, &text);

        tx.send(text).map_err(|_| ClientError::NotConnected)
    }

    /// Dispatch a server event as if it had arrived on the socket
    pub fn receive(&self, event: Event) -> ClientResult<()> {
        let text = serde_json::to_string(&event)?;
        self.shared.receive(&event, &text);
        Ok(())
    }

    /// Apply a `response.audio*` event to the transcript or the audio callback
    pub fn handle_audio(&self, event: &Event) {
        self.shared.handle_audio(event);
    }

    /// Snapshot of the event log
    pub fn logs(&self) -> Vec<LogEntry> {
        self.shared.logs.snapshot()
    }

    /// Shared handle on the event log, for incremental readers
    pub fn event_log(&self) -> EventLog {
        self.shared.logs.clone()
    }

    /// Assistant transcript accumulated so far
    pub fn transcript(&self) -> String {
        self.shared
            .transcript
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn build_request(
        &self,
        model: &str,
        api_key: &str,
    ) -> ClientResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let url = format!("{}?model={}", self.config.url, model);

        let mut request = url
            .into_client_request()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| ClientError::Connection(format!("invalid API key: {}", e)))?,
        );
        headers.insert(
            HeaderName::from_static("openai-beta"),
            HeaderValue::from_str(&self.config.beta_header)
                .map_err(|e| ClientError::Connection(format!("invalid beta header: {}", e)))?,
        );

        Ok(request)
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().as_ref() {
            worker.cancel.cancel();
        }
    }
}

/// Socket worker: writes queued events and polls for inbound frames
///
/// Each receive attempt is bounded by `poll_interval` so cancellation is
/// noticed promptly. Closing the socket from either side ends the loop;
/// any other socket error is logged and ends the session.
async fn run_worker(
    socket: Socket,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    poll_interval: Duration,
    session_id: Uuid,
) {
    let (mut sink, mut stream) = socket.split();

    debug!(session_id = %session_id, "Realtime worker started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                while let Ok(text) = outbound_rx.try_recv() {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!("Failed to flush queued event: {}", e);
                        break;
                    }
                }
                if let Err(e) = sink.close().await {
                    debug!("Socket close failed: {}", e);
                }
                break;
            }

            Some(text) = outbound_rx.recv() => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    error!("Failed to send event: {}", e);
                    break;
                }
            }

            polled = tokio::time::timeout(poll_interval, stream.next()) => match polled {
                // Idle poll
                Err(_) => continue,
                Ok(Some(Ok(Message::Text(text)))) => shared.receive_text(&text),
                Ok(Some(Ok(Message::Close(frame)))) => {
                    info!(session_id = %session_id, "Server closed the connection: {:?}", frame);
                    break;
                }
                // Pings are answered by tungstenite itself
                Ok(Some(Ok(_))) => {}
                Ok(None) | Ok(Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed))) => {
                    info!(session_id = %session_id, "Connection closed");
                    break;
                }
                Ok(Some(Err(e))) => {
                    error!(session_id = %session_id, "Realtime receive error: {}", e);
                    break;
                }
            },
        }
    }

    // Ends the session for `is_connected` and `send`
    drop(shared.outbound().take());

    debug!(session_id = %session_id, "Realtime worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> Event {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_send_requires_connection() {
        let client = RealtimeClient::new(RealtimeConfig::default());

        let err = client.send("response.create", None).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert!(client.logs().is_empty());
    }

    #[test]
    fn test_not_connected_wins_over_invalid_payload() {
        let client = RealtimeClient::new(RealtimeConfig::default());

        let err = client.send("x", Some(json!([1]))).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[test]
    fn test_transcript_deltas_accumulate() {
        let client = RealtimeClient::new(RealtimeConfig::default());
        let delta = json!({"type": "response.audio_transcript.delta", "delta": "abc"});

        client.receive(event(delta.clone())).unwrap();
        client.receive(event(delta)).unwrap();

        assert_eq!(client.transcript(), "abcabc");
        assert_eq!(client.logs().len(), 2);
        assert!(client.logs().iter().all(|e| e.direction == Direction::Server));
    }

    #[test]
    fn test_audio_delta_reaches_callback() {
        let client = RealtimeClient::new(RealtimeConfig::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        client.set_audio_callback(move |samples| sink.lock().unwrap().push(samples));

        client
            .receive(event(json!({"type": "response.audio.delta", "delta": "AQACAA=="})))
            .unwrap();

        assert_eq!(*received.lock().unwrap(), vec![vec![1i16, 2]]);
        assert!(client.transcript().is_empty());
    }

    #[test]
    fn test_non_audio_events_are_only_logged() {
        let client = RealtimeClient::new(RealtimeConfig::default());
        client.set_audio_callback(|_| panic!("unexpected audio"));

        client
            .receive(event(json!({"type": "response.text.delta", "delta": "hi"})))
            .unwrap();
        client
            .receive(event(json!({"type": "response.audio.done"})))
            .unwrap();

        assert!(client.transcript().is_empty());
        assert_eq!(client.logs().len(), 2);
    }

    #[test]
    fn test_malformed_server_frame_is_dropped() {
        let client = RealtimeClient::new(RealtimeConfig::default());

        client.shared.receive_text("{not json");
        client.shared.receive_text("[1, 2]");

        assert!(client.logs().is_empty());
    }

    #[test]
    fn test_record_events_disabled() {
        let client = RealtimeClient::new(RealtimeConfig {
            record_events: false,
            ..RealtimeConfig::default()
        });

        client
            .receive(event(json!({"type": "response.audio_transcript.delta", "delta": "x"})))
            .unwrap();

        assert!(client.logs().is_empty());
        assert_eq!(client.transcript(), "x");
    }

    #[test]
    fn test_request_headers() {
        let client = RealtimeClient::new(RealtimeConfig::default());
        let request = client.build_request("gpt-4o-realtime-preview", "sk-test").unwrap();

        assert_eq!(
            request.uri().to_string(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
        assert_eq!(request.headers()["authorization"], "Bearer sk-test");
        assert_eq!(request.headers()["openai-beta"], "realtime=v1");
    }

    #[tokio::test]
    async fn test_disconnect_without_connect() {
        let client = RealtimeClient::new(RealtimeConfig::default());

        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }
}
