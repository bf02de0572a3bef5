use super::state::AppState;
use crate::console::ConsoleError;
use crate::realtime::ClientError;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ConnectRequest {
    /// Model to connect to (console default when omitted)
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendEventResponse {
    pub status: String,
    pub event_type: String,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub recording: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Full event payloads instead of one-line summaries
    #[serde(default)]
    pub full: bool,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub count: usize,
    pub lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: ConsoleError) -> Response {
    let status = match &err {
        ConsoleError::EmptyInput | ConsoleError::InvalidJson(_) | ConsoleError::MissingType => {
            StatusCode::BAD_REQUEST
        }
        ConsoleError::Client(ClientError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
        ConsoleError::Client(ClientError::AlreadyConnected) => StatusCode::CONFLICT,
        ConsoleError::Client(ClientError::NotConnected) => StatusCode::CONFLICT,
        ConsoleError::Client(ClientError::Connection(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Console request failed: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /connect
/// Open the realtime session; an empty body uses the console's default model
pub async fn connect(State(state): State<AppState>, body: Bytes) -> Response {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        ConnectRequest::default()
    } else {
        match serde_json::from_slice::<ConnectRequest>(&body) {
            Ok(req) => req,
            Err(e) => return error_response(ConsoleError::InvalidJson(e)),
        }
    };

    match state.console.connect(req.model.as_deref()).await {
        Ok(()) => {
            info!("Connected via HTTP console");
            (
                StatusCode::OK,
                Json(ActionResponse {
                    status: "connected".to_string(),
                    message: "Connected to realtime API".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /disconnect
/// Close the realtime session (no-op when not connected)
pub async fn disconnect(State(state): State<AppState>) -> Response {
    match state.console.disconnect().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ActionResponse {
                status: "disconnected".to_string(),
                message: "Disconnected".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /events
/// Send a raw event; the body is the event JSON including `type`
pub async fn send_event(State(state): State<AppState>, body: String) -> Response {
    match state.console.send_user_json(&body) {
        Ok(event_type) => (
            StatusCode::OK,
            Json(SendEventResponse {
                status: "sent".to_string(),
                event_type,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /recording/toggle
/// Start or stop microphone capture
pub async fn toggle_recording(State(state): State<AppState>) -> Response {
    match state.console.toggle_recording().await {
        Ok(recording) => (StatusCode::OK, Json(RecordingResponse { recording })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.console.status().await))
}

/// GET /logs?full=bool
pub async fn get_logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> impl IntoResponse {
    let lines = state.console.log_lines(query.full);

    (
        StatusCode::OK,
        Json(LogsResponse {
            count: lines.len(),
            lines,
        }),
    )
}

/// GET /transcript
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(TranscriptResponse {
            transcript: state.console.transcript(),
        }),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
