//! Console front-end core
//!
//! This module provides the `Console` abstraction shared by the HTTP and
//! terminal front-ends:
//! - Connect / disconnect and raw event sending from user JSON
//! - Microphone recording with the append → commit → response ordering
//! - Rendering of the event log and transcript
//! - Status snapshots for polling

mod console;
mod error;
mod status;

pub use console::Console;
pub use error::ConsoleError;
pub use status::ConsoleStatus;
