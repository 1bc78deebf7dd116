use thiserror::Error;

use crate::utils::retry::RetryableError;

/// Main error type for dailyphrase operations
#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Empty input: nothing to parse")]
    EmptyInput,

    #[error("Invalid JSON: {reason}\nPreview: {preview}")]
    MalformedPayload { reason: String, preview: String },

    #[error("Missing required fields: {}. Got keys: {}", missing.join(", "), present.join(", "))]
    MissingFields {
        missing: Vec<String>,
        present: Vec<String>,
    },

    #[error("Incomplete response from generation service: {0}")]
    IncompleteResponse(String),

    #[error("Generation service returned no text content")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Generation service error (status {status}): {message}")]
    GenerationError { status: u16, message: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("No phrases available yet, please try again later")]
    NoPhrasesAvailable,

    #[error("Phrase generation failed after {attempts} attempt(s): {message}")]
    GenerationFailed { attempts: u32, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl PhraseError {
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn malformed<S: Into<String>, P: Into<String>>(reason: S, preview: P) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
            preview: preview.into(),
        }
    }

    pub fn incomplete<S: Into<String>>(msg: S) -> Self {
        Self::IncompleteResponse(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn generation<S: Into<String>>(status: u16, msg: S) -> Self {
        Self::GenerationError {
            status,
            message: msg.into(),
        }
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn unknown<S: Into<String>>(msg: S) -> Self {
        Self::Unknown(msg.into())
    }
}

/// Transport failures are the ones raised before any response was read.
impl RetryableError for PhraseError {
    fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::Timeout(_) | Self::HttpError(_)
        )
    }
}

/// Result type alias for dailyphrase operations
pub type Result<T> = std::result::Result<T, PhraseError>;
