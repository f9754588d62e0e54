//! Configuration management for the voxflow gateway
//!
//! Configuration is read once at startup from a TOML file, with environment
//! variable overrides for secrets. There is no hot reload.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Voxflow gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-flow API connection
    pub flow: FlowConfig,

    /// Voice capture/recognition/synthesis settings
    pub voice: VoiceConfig,

    /// Blob store settings
    pub store: StoreConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Path to the data directory (temp audio file, default store path)
    pub data_dir: Option<PathBuf>,

    /// API keys, loaded from the environment only
    #[serde(skip)]
    pub api_keys: ApiKeys,
}

/// Chat-flow API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Base URL of the flow service
    pub base_url: String,

    /// Flow namespace (the `lf/{namespace}` path segment)
    pub namespace: String,

    /// Flow identifier (the run endpoint)
    pub flow_id: String,

    /// Bearer token for the flow API (`VOXFLOW_APPLICATION_TOKEN` env
    /// override); requests are sent unauthenticated when absent
    pub application_token: Option<String>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.langflow.astra.datastax.com".to_string(),
            namespace: String::new(),
            flow_id: String::new(),
            application_token: None,
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Enable voice input (disable for headless serving-only deployments)
    pub enabled: bool,

    /// Transcript that ends the session (matched case-insensitively)
    pub stop_phrase: String,

    /// Ambient noise calibration window in milliseconds
    pub calibration_ms: u64,

    /// Maximum utterance length in seconds before capture is cut off
    pub max_utterance_secs: u64,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stop_phrase: "stop the chat".to_string(),
            calibration_ms: 700,
            max_utterance_secs: 15,
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// Blob store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file (defaults to `<data_dir>/voxflow.db`)
    pub db_path: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Public base URL used to build the published audio URL
    pub public_base_url: String,

    /// Path to the static web UI directory
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            public_base_url: "http://127.0.0.1:5000".to_string(),
            static_dir: None,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<String>,
}

/// Fixed logical name of the published reply audio
pub const AUDIO_LOGICAL_NAME: &str = "audio.mp3";

/// Fixed name of the local temp file the TTS step writes
const TEMP_AUDIO_FILE: &str = "response_audio.mp3";

/// Return the default config file path (`~/.config/voxflow/config.toml`)
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "voxflow", "voxflow").map_or_else(
        || PathBuf::from("config.toml"),
        |d| d.config_dir().join("config.toml"),
    )
}

/// Return the default data directory, creating it if needed
#[must_use]
pub fn default_data_dir() -> PathBuf {
    let dir = directories::ProjectDirs::from("dev", "voxflow", "voxflow").map_or_else(
        || PathBuf::from(".voxflow"),
        |d| d.data_dir().to_path_buf(),
    );

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(path = %dir.display(), error = %e, "failed to create data directory");
    }

    dir
}

impl Config {
    /// Load configuration from a TOML file plus environment overrides
    ///
    /// A missing file falls back to defaults; invalid TOML is a hard error.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            config
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        // Environment overrides for secrets
        if let Ok(token) = std::env::var("VOXFLOW_APPLICATION_TOKEN") {
            config.flow.application_token = Some(token);
        }
        config.api_keys.openai = std::env::var("OPENAI_API_KEY").ok();

        Ok(config)
    }

    /// Resolved data directory
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Resolved blob store database path
    #[must_use]
    pub fn store_db_path(&self) -> PathBuf {
        self.store
            .db_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("voxflow.db"))
    }

    /// Fixed path of the per-turn temp audio file
    #[must_use]
    pub fn temp_audio_path(&self) -> PathBuf {
        self.data_dir().join(TEMP_AUDIO_FILE)
    }
}
