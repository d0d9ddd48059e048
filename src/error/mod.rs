//! Error types for Switchboard.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all Switchboard operations.
///
/// Tool-call malformation and agent handoff are not errors; they are typed
/// outcomes of the agent loop. What reaches this enum is either a broken
/// collaborator (completion service, session store) or bad configuration.
#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Profile format error: {0}")]
    ProfileFormat(#[from] toml::de::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Session store error: {0}")]
    Session(String),
}

impl SwitchboardError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::ProfileFormat(_) | Self::UnknownAgent(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::Io(_) | Self::Session(_) => ErrorCategory::Storage,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Storage => RecoverySuggestion::CheckSessionStore,
            ErrorCategory::Api | ErrorCategory::Serialization => {
                RecoverySuggestion::ContactSupport
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_suggest_retry() {
        let err = SwitchboardError::RateLimited {
            retry_after_ms: Some(1000),
        };
        assert!(err.is_retryable());
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::RetryWithBackoff);
        assert_eq!(
            SwitchboardError::api(503, "busy").recovery_suggestion(),
            RecoverySuggestion::RetryWithBackoff
        );
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let auth = SwitchboardError::api(401, "bad key");
        assert!(!auth.is_retryable());
        assert_eq!(auth.recovery_suggestion(), RecoverySuggestion::CheckCredentials);

        let session = SwitchboardError::Session("disk full".into());
        assert_eq!(session.category(), ErrorCategory::Storage);
        assert!(session.recovery_suggestion().hint().contains("session directory"));
    }
}
