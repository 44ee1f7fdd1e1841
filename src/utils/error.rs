//! Error types and handling
//!
//! Session-level errors. Ring operations never fail with an error: overflow
//! and underrun are reported through return values and counters instead.

use crate::encoder::EncoderError;
use thiserror::Error;

/// Errors surfaced by the recording session
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Session is already recording")]
    AlreadyOpen,

    #[error("Session is not recording")]
    NotOpen,

    #[error("Session is closed")]
    Closed,
}

impl RecorderError {
    /// Stable code for logs and event consumers
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
            RecorderError::InvalidConfig(_) => "INVALID_CONFIG",
            RecorderError::Encoder(_) => "ENCODER_ERROR",
            RecorderError::AlreadyOpen => "ALREADY_OPEN",
            RecorderError::NotOpen => "NOT_OPEN",
            RecorderError::Closed => "CLOSED",
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_messages() {
        let err = RecorderError::InvalidConfig("sample_rate must be positive".into());
        assert_eq!(err.code(), "INVALID_CONFIG");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: sample_rate must be positive"
        );

        let err: RecorderError = EncoderError::NotOpen.into();
        assert_eq!(err.code(), "ENCODER_ERROR");
        assert_eq!(err.to_string(), "Encoder error: Encoder is not open");
    }
}
