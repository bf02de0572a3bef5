//! Realtime API session client
//!
//! This module provides the `RealtimeClient` that manages:
//! - The WebSocket connection and its single I/O worker
//! - JSON event construction and dispatch
//! - The append-only event log and the assistant transcript
//! - Forwarding decoded audio deltas to an injected callback

mod client;
mod error;
pub mod event;
mod log;

pub use client::{AudioCallback, RealtimeClient, RealtimeConfig};
pub use error::{ClientError, ClientResult};
pub use event::{build_event, Event};
pub use log::{Direction, EventLog, LogEntry};
