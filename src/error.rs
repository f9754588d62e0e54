//! Error types for the voxflow gateway

use thiserror::Error;

/// Result type alias for voxflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voxflow gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device/capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text service error (unreachable or returned a failure)
    #[error("STT error: {0}")]
    Stt(String),

    /// No interpretable speech in the captured audio
    #[error("speech not recognized")]
    UnrecognizedSpeech,

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Chat-flow API error
    #[error("flow error: {0}")]
    Flow(String),

    /// Flow reply missing the expected text path
    #[error("response format error: missing reply text in flow output")]
    ResponseFormat,

    /// Blob store error
    #[error("store error: {0}")]
    Store(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
