use anyhow::Result;
use serde::Deserialize;

/// Realtime API WebSocket endpoint.
pub const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model requested when the caller does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Value of the `OpenAI-Beta` protocol marker header.
pub const DEFAULT_BETA_HEADER: &str = "realtime=v1";

/// Environment variable holding the bearer credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Audio format used in both directions (PCM16 mono).
pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;
pub const BLOCK_SIZE: usize = 2_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub realtime: RealtimeSettings,
    pub audio: AudioSettings,
    pub console: ConsoleSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub url: String,
    pub model: String,
    pub beta_header: String,
    pub poll_interval_ms: u64,
    pub record_events: bool,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            beta_header: DEFAULT_BETA_HEADER.to_string(),
            poll_interval_ms: 50,
            record_events: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            block_size: BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub http: HttpConfig,
    /// Refresh / capture-drain cadence of the front-ends
    pub tick_ms: u64,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            tick_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl Config {
    /// Load settings from an optional file at `path` (any extension the
    /// `config` crate understands), overridden by `REALTIME_CONSOLE__*`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("REALTIME_CONSOLE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
