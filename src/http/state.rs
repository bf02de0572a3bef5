use crate::console::Console;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single console this server fronts
    pub console: Arc<Console>,
}

impl AppState {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}
