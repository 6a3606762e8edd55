//! Error handling for Warpfx
//!
//! Only the outer surfaces (file I/O, configuration, CLI) can fail. The
//! real-time DSP core clamps every input and never returns an error.

use thiserror::Error;

/// Result type alias for Warpfx operations
pub type Result<T> = std::result::Result<T, FxError>;

/// Main error type for Warpfx operations
#[derive(Error, Debug)]
pub enum FxError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FxError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::FileNotFound { .. } => "FILE_NOT_FOUND",
            FxError::InvalidAudio { .. } => "INVALID_AUDIO",
            FxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            FxError::InvalidConfig { .. } => "INVALID_CONFIG",
            FxError::Io(_) => "IO_ERROR",
            FxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            FxError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            FxError::InvalidAudio { .. } => vec![
                "Try converting the file to WAV format first",
                "The file may be corrupted - try re-exporting from source",
            ],
            FxError::UnsupportedFormat { .. } => vec![
                "Only mono and stereo WAV files are supported",
                "Mix the file down to stereo and try again",
            ],
            FxError::InvalidConfig { .. } => vec![
                "Run 'warpfx-cli default-config' to see a valid configuration",
                "block_size must be at least 1 and max_delay_seconds must not be negative",
            ],
            FxError::Serialization(_) => vec![
                "Check the configuration file is valid JSON",
                "Parameter names are snake_case, e.g. \"delay_mix\"",
            ],
            FxError::Io(_) => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = FxError::FileNotFound {
            path: "test.wav".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");

        let err = FxError::InvalidConfig {
            reason: "block_size is zero".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert_eq!(err.to_string(), "Invalid configuration: block_size is zero");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = FxError::UnsupportedFormat {
            format: "6-channel audio".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());

        let err = FxError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(err.recovery_suggestions().is_empty());
    }
}
