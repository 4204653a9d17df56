//! Configuration loading.
//!
//! `viva.toml` is optional; a missing file yields defaults, and CLI flags
//! override file values. Provider API keys are read from the environment at
//! bootstrap, never from the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "viva.toml";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    /// Avatar provider API root.
    #[serde(default = "default_streaming_base_url")]
    pub base_url: String,
    #[serde(default = "default_token_timeout")]
    pub token_timeout_seconds: u64,
    /// Timeout for session create/start/stop.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_seconds: u64,
    #[serde(default = "default_speak_timeout")]
    pub speak_timeout_seconds: u64,
    /// When set, provider failures degrade to mock results instead of
    /// surfacing as errors.
    #[serde(default = "default_mask_failures")]
    pub mask_failures: bool,
    /// Artificial latency of a masked speak, emulating the provider.
    #[serde(default = "default_mock_speak_delay_ms")]
    pub mock_speak_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Agent-completions service root.
    #[serde(default = "default_conversation_base_url")]
    pub base_url: String,
    #[serde(default = "default_conversation_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Session record directory, relative to the config file unless
    /// absolute.
    #[serde(default = "default_sessions_path")]
    pub path: PathBuf,
    /// Active sessions older than this are swept and cancelled. Zero
    /// disables the reaper.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

// ============================================================================
// Defaults
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    256
}

fn default_streaming_base_url() -> String {
    "https://api.heygen.com".to_string()
}

fn default_token_timeout() -> u64 {
    10
}

fn default_session_timeout() -> u64 {
    15
}

fn default_speak_timeout() -> u64 {
    5
}

fn default_mask_failures() -> bool {
    true
}

fn default_mock_speak_delay_ms() -> u64 {
    150
}

fn default_conversation_base_url() -> String {
    "http://127.0.0.1:8100".to_string()
}

fn default_conversation_timeout() -> u64 {
    30
}

fn default_sessions_path() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_max_age_hours() -> u64 {
    2
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            base_url: default_streaming_base_url(),
            token_timeout_seconds: default_token_timeout(),
            session_timeout_seconds: default_session_timeout(),
            speak_timeout_seconds: default_speak_timeout(),
            mask_failures: default_mask_failures(),
            mock_speak_delay_ms: default_mock_speak_delay_ms(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            base_url: default_conversation_base_url(),
            timeout_seconds: default_conversation_timeout(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            path: default_sessions_path(),
            max_age_hours: default_max_age_hours(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from a file, falling back to defaults when the
    /// file does not exist.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve a possibly-relative path against the config file location.
    pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_path
                .parent()
                .map(|parent| parent.join(path))
                .unwrap_or_else(|| path.to_path_buf())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
