//! HTTP console for driving a realtime session
//!
//! This module provides a small REST API over a single `Console`:
//! - POST /connect, POST /disconnect - Session control
//! - POST /events - Send a raw event (JSON body with `type`)
//! - POST /recording/toggle - Start/stop microphone capture
//! - GET /status, GET /logs?full=bool, GET /transcript - Polled views
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
