// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley chat relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos in `parley.toml`
//! are reported at startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log filter settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Event hub tuning.
    #[serde(default)]
    pub hub: HubConfig,

    /// Agent console credentials and identity.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Automated responder used while no agent is online.
    #[serde(default)]
    pub responder: ResponderConfig,

    /// Conversation history limits.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests from any origin (the chat widget is
    /// usually embedded on another site).
    #[serde(default = "default_true")]
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_permissive: true,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

/// Logging configuration. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level for parley crates (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

/// Event hub tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Seconds of silence before a stream emits a heartbeat.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Reconnect hint (milliseconds) sent as the first frame of every stream.
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,

    /// Events buffered per subscriber before the oldest is dropped.
    #[serde(default = "default_queue_capacity")]
    pub subscriber_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            retry_ms: default_retry_ms(),
            subscriber_queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_keepalive_secs() -> u64 {
    15
}

fn default_retry_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    256
}

/// Agent console configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_username")]
    pub username: String,

    /// Login password. `None` disables agent login entirely.
    #[serde(default)]
    pub password: Option<String>,

    /// Name shown to visitors in presence updates.
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Lifetime of an agent session in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: None,
            display_name: default_display_name(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_display_name() -> String {
    "Admin".to_string()
}

fn default_session_ttl_secs() -> u64 {
    12 * 60 * 60
}

/// Automated responder configuration (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResponderConfig {
    /// API key. `None` disables the responder.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Upper bound on one reply generation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_system_prompt() -> String {
    "You are the website's support assistant. The human agent is away. \
     Answer in clear, concise English, keep paragraphs short, and never invent \
     private data. Suggest that the visitor leaves details for a follow-up when \
     a question needs a human."
        .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Conversation history limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryConfig {
    /// Messages returned when the client does not ask for a limit.
    #[serde(default = "default_history_limit")]
    pub default_limit: usize,

    /// Hard cap on a requested limit.
    #[serde(default = "default_history_max")]
    pub max_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_history_limit(),
            max_limit: default_history_max(),
        }
    }
}

fn default_history_limit() -> usize {
    50
}

fn default_history_max() -> usize {
    500
}
