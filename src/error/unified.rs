//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    ToolExecution,
    Storage,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    CheckToolImplementation,
    CheckSessionStore,
    ContactSupport,
}

impl RecoverySuggestion {
    /// One-line hint for an operator.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::RetryWithBackoff => "the completion service is busy or unreachable; try again shortly",
            Self::CheckCredentials => "check AZURE_OPENAI_API_KEY or OPENAI_API_KEY",
            Self::CheckConfiguration => "check the config file, agent profiles and environment",
            Self::IncreaseTimeout => "raise request_timeout_secs in the config file",
            Self::CheckToolImplementation => "check the registered tool implementations",
            Self::CheckSessionStore => "check that the session directory is readable and writable",
            Self::ContactSupport => "inspect the service response in the logs (RUST_LOG=switchboard=debug)",
        }
    }
}
