//! Error types for the trivia video pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriviaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TTS error: {0}")]
    TtsError(String),

    #[error("Media error: {0}")]
    MediaError(String),

    #[error("No usable trivia category found after {attempts} attempts")]
    ProbeExhausted { attempts: u32 },

    #[error("Failed to fetch trivia")]
    NoTrivia,

    #[error("Required asset not found: {}", .0.display())]
    MissingAsset(PathBuf),
}
