use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Validation error on '{field}': {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("unknown message type: {tag}")]
    UnknownMessage { tag: String },

    #[error("malformed payload for {tag}: {message}")]
    MalformedPayload { tag: String, message: String },

    #[error("Coordinator rejected {tag}: {message}")]
    Rejected { tag: String, message: String },

    #[error("Invalid transition: cannot {action} from {step}")]
    InvalidTransition { action: String, step: String },
}

/// Coarse grouping used when deciding how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected locally before a command is sent.
    Validation,
    /// Logged and absorbed; in-memory state stays authoritative.
    Persistence,
    /// Answered with an explicit error response.
    Protocol,
    Configuration,
}

impl BlockerError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        BlockerError::ValidationError {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        BlockerError::StorageError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BlockerError::IoError(_)
            | BlockerError::SerializationError(_)
            | BlockerError::StorageError { .. } => ErrorCategory::Persistence,
            BlockerError::TomlError(_) | BlockerError::ConfigError { .. } => {
                ErrorCategory::Configuration
            }
            BlockerError::ValidationError { .. } | BlockerError::InvalidTransition { .. } => {
                ErrorCategory::Validation
            }
            BlockerError::UnknownMessage { .. }
            | BlockerError::MalformedPayload { .. }
            | BlockerError::Rejected { .. } => ErrorCategory::Protocol,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlockerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            BlockerError::validation("domain", "empty").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            BlockerError::storage("disk full").category(),
            ErrorCategory::Persistence
        );
        assert_eq!(
            BlockerError::UnknownMessage {
                tag: "PING".to_string()
            }
            .category(),
            ErrorCategory::Protocol
        );
    }

    #[test]
    fn test_unknown_message_display() {
        let err = BlockerError::UnknownMessage {
            tag: "PING".to_string(),
        };
        assert_eq!(err.to_string(), "unknown message type: PING");
    }
}
