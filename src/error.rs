//! Error types for the animatron driver

use thiserror::Error;

/// Result type alias for animatron operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the toy
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Personality not found or malformed
    #[error("personality error: {0}")]
    Personality(String),

    /// Audio device or buffer error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text failure (empty or failed transcription)
    #[error("transcription error: {0}")]
    Transcription(String),

    /// LLM response generation failure
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech or composition failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Output device open/write/close failure or stall
    #[error("device error: {0}")]
    Device(String),

    /// Wake word detection error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Per-chunk synthesis failure, inspected by the pipeline orchestrator.
///
/// Chunk failures are data, not control flow: the generation loop looks at
/// the tag, counts consecutive failures, and moves on to the next sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// TTS returned nothing usable for this sentence
    Tts(String),
    /// The channel compositor failed to produce device output
    Compose(String),
}

impl std::fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tts(msg) => write!(f, "tts failed: {msg}"),
            Self::Compose(msg) => write!(f, "compose failed: {msg}"),
        }
    }
}
