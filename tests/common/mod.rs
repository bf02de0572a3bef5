// Local stand-in for the realtime endpoint
//
// Accepts WebSocket connections one after another, records the handshake
// headers, forwards every client event to the test, and sends whatever the
// test queues.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use realtime_console::RealtimeConfig;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

pub const TEST_API_KEY: &str = "sk-test";

#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
    pub beta: Option<String>,
}

enum ServerCommand {
    Text(String),
    Close,
    Drop,
}

pub struct MockServer {
    pub url: String,
    received: mpsc::UnboundedReceiver<Value>,
    commands: mpsc::UnboundedSender<ServerCommand>,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (received_tx, received) = mpsc::unbounded_channel();
        let (commands, mut command_rx) = mpsc::unbounded_channel::<ServerCommand>();
        let handshakes = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&handshakes);

        tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    break;
                };

                let recorded = Arc::clone(&recorded);
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let header = |name: &str| {
                        req.headers()
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string)
                    };
                    recorded.lock().unwrap().push(Handshake {
                        uri: req.uri().to_string(),
                        authorization: header("authorization"),
                        beta: header("openai-beta"),
                    });
                    Ok(resp)
                };

                let Ok(ws) = tokio_tungstenite::accept_hdr_async(tcp, callback).await else {
                    continue;
                };
                let (mut sink, mut stream) = ws.split();

                loop {
                    tokio::select! {
                        command = command_rx.recv() => match command {
                            Some(ServerCommand::Text(text)) => {
                                let _ = sink.send(Message::Text(text)).await;
                            }
                            Some(ServerCommand::Close) => {
                                let _ = sink.close().await;
                                break;
                            }
                            // Leaving the loop drops both halves of the socket
                            Some(ServerCommand::Drop) => break,
                            None => return,
                        },
                        message = stream.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                let event: Value = serde_json::from_str(&text).unwrap();
                                let _ = received_tx.send(event);
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                    }
                }
            }
        });

        Self {
            url: format!("ws://{}/v1/realtime", addr),
            received,
            commands,
            handshakes,
        }
    }

    /// Client config pointing at this server
    pub fn config(&self) -> RealtimeConfig {
        RealtimeConfig {
            url: self.url.clone(),
            api_key: Some(TEST_API_KEY.to_string()),
            poll_interval: Duration::from_millis(20),
            ..RealtimeConfig::default()
        }
    }

    pub fn send_event(&self, event: Value) {
        self.send_raw(&event.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.commands.send(ServerCommand::Text(text.to_string()));
    }

    /// Close the current connection from the server side
    pub fn close(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    /// Drop the current TCP connection without a close handshake
    pub fn drop_connection(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    /// Next event the client sent
    pub async fn next_event(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("mock server stopped")
    }

    /// `type` of the next client event
    pub async fn next_type(&mut self) -> String {
        self.next_event().await["type"].as_str().unwrap().to_string()
    }

    /// Assert no further client event arrives within `wait`
    pub async fn assert_quiet(&mut self, wait: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(wait, self.received.recv()).await {
            panic!("unexpected client event: {}", event);
        }
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.lock().unwrap().clone()
    }
}

/// Poll `condition` until it holds, failing after five seconds
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Async variant of [`wait_until`]
pub async fn wait_until_async<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
