//! Layered configuration: built-in defaults, then an optional TOML file,
//! then environment variables (with `.env` loaded first).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SwitchboardError;
use crate::history::HistoryPolicy;

/// Which completion service to talk to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Azure,
    OpenAi,
}

/// Connection settings for the completion service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Azure resource endpoint, or an OpenAI-compatible base URL.
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: Option<String>,
}

/// Per-turn bounds on the agent tool loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopLimits {
    /// Completion calls allowed for one user question.
    pub max_run_per_question: u32,
    /// Failed tool invocations tolerated before resetting to the question.
    pub max_error_run: u32,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_run_per_question: 10,
            max_error_run: 3,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    #[builder(default)]
    pub provider: ProviderSettings,
    /// Default chat deployment used by agents without their own `model`.
    #[builder(into, default = "gpt-4o".to_string())]
    pub chat_model: String,
    /// Deployment used for intent classification; falls back to `chat_model`.
    #[builder(into)]
    pub evaluator_model: Option<String>,
    /// Agent assigned to new sessions.
    #[builder(into, default = "generic_agent".to_string())]
    pub entry_agent: String,
    #[builder(default)]
    pub limits: LoopLimits,
    #[builder(default)]
    pub history: HistoryPolicy,
    /// Reclassification attempts before falling back to the default agent.
    #[builder(default = 2)]
    pub classifier_retry_budget: u32,
    /// Minimum confidence (percent) for a "sufficient context" verdict.
    #[builder(default = 80.0)]
    pub sufficient_context_threshold: f64,
    #[builder(default = 0.2)]
    pub temperature: f64,
    /// Attempts per completion call for retryable transport errors.
    #[builder(default = 3)]
    pub completion_attempts: u32,
    /// Upper bound on a single completion call, in seconds.
    #[builder(default = 120)]
    pub request_timeout_secs: u64,
    #[builder(into, default = PathBuf::from("profiles"))]
    pub profiles_dir: PathBuf,
    #[builder(into, default = default_session_dir())]
    pub session_dir: PathBuf,
    /// Values substituted into `{placeholder}` tokens of agent personas.
    #[builder(default)]
    pub customer: BTreeMap<String, String>,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SwitchboardConfig {
    /// Resolve the full configuration: defaults, `path` if given, then env.
    pub fn load(path: Option<&Path>) -> Result<Self, SwitchboardError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, SwitchboardError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SwitchboardError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SwitchboardError> {
        toml::from_str(raw)
            .map_err(|e| SwitchboardError::Configuration(format!("invalid config file: {e}")))
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SwitchboardError> {
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.provider.kind = ProviderKind::Azure;
            self.provider.endpoint = Some(endpoint);
        } else if lookup("OPENAI_API_KEY").is_some() {
            self.provider.kind = ProviderKind::OpenAi;
        }

        match self.provider.kind {
            ProviderKind::Azure => {
                if let Some(key) = lookup("AZURE_OPENAI_API_KEY") {
                    self.provider.api_key = Some(key);
                }
                if let Some(version) = lookup("AZURE_OPENAI_API_VERSION") {
                    self.provider.api_version = Some(version);
                }
            }
            ProviderKind::OpenAi => {
                if let Some(key) = lookup("OPENAI_API_KEY") {
                    self.provider.api_key = Some(key);
                }
                if let Some(url) = lookup("OPENAI_BASE_URL") {
                    self.provider.endpoint = Some(url);
                }
            }
        }

        if let Some(model) = lookup("AZURE_OPENAI_CHAT_DEPLOYMENT") {
            self.chat_model = model;
        }
        if let Some(model) = lookup("AZURE_OPENAI_EVALUATOR_DEPLOYMENT") {
            self.evaluator_model = Some(model);
        }
        if let Some(raw) = lookup("SUFFICIENT_CONTEXT_SCORE_THRESHOLD") {
            self.sufficient_context_threshold = raw.trim().parse().map_err(|_| {
                SwitchboardError::Configuration(format!(
                    "SUFFICIENT_CONTEXT_SCORE_THRESHOLD is not a number: {raw}"
                ))
            })?;
        }
        if let Some(dir) = lookup("SWITCHBOARD_PROFILES_DIR") {
            self.profiles_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SWITCHBOARD_SESSION_DIR") {
            self.session_dir = PathBuf::from(dir);
        }
        if let Some(agent) = lookup("SWITCHBOARD_ENTRY_AGENT") {
            self.entry_agent = agent;
        }
        Ok(())
    }

    pub fn evaluator_model(&self) -> &str {
        self.evaluator_model.as_deref().unwrap_or(&self.chat_model)
    }
}

fn default_session_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "switchboard")
        .map(|dirs| dirs.data_dir().join("sessions"))
        .unwrap_or_else(|| PathBuf::from(".switchboard/sessions"))
}
