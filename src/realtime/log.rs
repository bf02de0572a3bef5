use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::event::event_type_of;

/// Which side produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Client,
    Server,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Client => f.write_str("client"),
            Direction::Server => f.write_str("server"),
        }
    }
}

/// One recorded protocol event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local wall-clock time, `HH:MM:SS`
    pub timestamp: String,
    pub direction: Direction,
    /// The event exactly as serialized
    pub event: String,
}

impl LogEntry {
    pub fn new(direction: Direction, event: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            direction,
            event,
        }
    }

    /// `type` of the logged event, re-parsed from the stored text
    pub fn event_type(&self) -> Option<String> {
        event_type_of(&self.event)
    }

    /// One-line rendering: `12:00:01  ↓ server response.done`
    pub fn summary(&self) -> String {
        let arrow = match self.direction {
            Direction::Client => "↑",
            Direction::Server => "↓",
        };
        let event_type = self.event_type().unwrap_or_else(|| "<untyped>".to_string());

        format!("{}\t{} {} {}", self.timestamp, arrow, self.direction, event_type)
    }
}

/// Append-only log of every event sent or received
///
/// Clones share the same entries. Readers get snapshot copies and may miss
/// entries appended after the snapshot was taken.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: LogEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Copy of every entry recorded so far
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.since(0)
    }

    /// Entries recorded at or after position `offset`
    pub fn since(&self, offset: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(offset..).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
