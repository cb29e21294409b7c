//! Error types for the Kotoba gateway

use thiserror::Error;

/// Result type alias for Kotoba operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Kotoba gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Chat backend error
    #[error("chat error: {0}")]
    Chat(String),

    /// Speech synthesis error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Speech recognizer error
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// Event channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Upstream API failure carrying the status to mirror back to clients
    #[error("upstream error {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build an upstream error without detail
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
            detail: None,
        }
    }

    /// Build an upstream error carrying the raw upstream body as detail
    pub fn upstream_with_detail(
        status: u16,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}
