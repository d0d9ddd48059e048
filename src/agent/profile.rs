//! Declarative agent profiles.
//!
//! A profiles directory holds one `<agent>_profile.toml` per agent and an
//! optional `common_agent_profile.toml` whose tools every agent receives.
//!
//! ```toml
//! name = "Maya"
//! persona = "You are Maya, helping {customer_name} book flights."
//! initial_message = "Hi, I'm Maya. Where would you like to fly?"
//! domain_description = "a specialist support agent in Flight booking"
//! follow_up_instructions = ["Before answering, reply True or False ..."]
//!
//! [[tools]]
//! name = "query_flights"
//! description = "Find flights"
//! parameters = { type = "object", properties = { from = { type = "string" } } }
//! required = ["from"]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SwitchboardError;
use crate::tools::ToolSpec;
use crate::types::{Conversation, ModelMessage};

const PROFILE_SUFFIX: &str = "_profile.toml";
const COMMON_PROFILE: &str = "common_agent_profile.toml";
const MAX_FOLLOW_UPS: usize = 3;

/// Static configuration of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    /// System prompt template; `{placeholder}` tokens are filled from the
    /// customer map.
    pub persona: String,
    /// Completion deployment; `None` uses the configured chat model.
    #[serde(default)]
    pub model: Option<String>,
    pub initial_message: String,
    /// Shown to the intent classifier.
    pub domain_description: String,
    #[serde(default)]
    pub default_agent: bool,
    /// `[review, proceed, insufficient]`: the first is appended to the
    /// persona, the other two are injected after a self-review verdict.
    #[serde(default)]
    pub follow_up_instructions: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct CommonProfile {
    #[serde(default)]
    tools: Vec<ToolSpec>,
}

impl AgentProfile {
    pub fn from_toml_str(raw: &str) -> Result<Self, SwitchboardError> {
        let profile: Self = toml::from_str(raw)?;
        if profile.follow_up_instructions.len() > MAX_FOLLOW_UPS {
            return Err(SwitchboardError::Configuration(format!(
                "agent '{}' declares {} follow-up instructions, at most {MAX_FOLLOW_UPS} are used",
                profile.name,
                profile.follow_up_instructions.len()
            )));
        }
        Ok(profile)
    }

    /// Follow-up instruction by position, ignoring blank entries.
    pub fn follow_up(&self, index: usize) -> Option<&str> {
        self.follow_up_instructions
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Persona text resolved for a particular customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// The templated persona alone; used while composing a reviewed answer.
    pub base: String,
    /// `base` plus the review instruction; the resting system prompt.
    pub default: String,
}

impl Persona {
    pub fn resolve(profile: &AgentProfile, customer: &BTreeMap<String, String>) -> Self {
        let base = render_template(&profile.persona, customer);
        let default = match profile.follow_up(0) {
            Some(review) => format!("{base}\n{review}"),
            None => base.clone(),
        };
        Self { base, default }
    }
}

/// Conversation seeded for an agent that has not spoken yet.
pub fn initial_history(persona: &Persona, profile: &AgentProfile) -> Conversation {
    Conversation::from_messages(vec![
        ModelMessage::system(persona.default.clone()),
        ModelMessage::assistant(profile.initial_message.clone()),
    ])
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Substitute `{key}` tokens from `values`; unknown keys stay verbatim.
pub fn render_template(template: &str, values: &BTreeMap<String, String>) -> String {
    let Some(pattern) = placeholder_pattern() else {
        return template.to_string();
    };
    pattern
        .replace_all(template, |caps: &regex::Captures<'_>| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Load every agent profile in `dir`, appending the common tools.
///
/// Profiles are returned sorted by agent name.
pub fn load_profiles(dir: &Path) -> Result<Vec<AgentProfile>, SwitchboardError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        SwitchboardError::Configuration(format!(
            "cannot read profiles directory {}: {e}",
            dir.display()
        ))
    })?;

    let common = match std::fs::read_to_string(dir.join(COMMON_PROFILE)) {
        Ok(raw) => toml::from_str::<CommonProfile>(&raw)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => CommonProfile::default(),
        Err(err) => return Err(err.into()),
    };

    let mut profiles = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !file_name.ends_with(PROFILE_SUFFIX) || file_name == COMMON_PROFILE {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut profile = AgentProfile::from_toml_str(&raw).map_err(|e| match e {
            SwitchboardError::ProfileFormat(inner) => SwitchboardError::Configuration(format!(
                "{}: {inner}",
                path.display()
            )),
            other => other,
        })?;
        profile.tools.extend(common.tools.iter().cloned());
        debug!(agent = %profile.name, tools = profile.tools.len(), "loaded agent profile");
        profiles.push(profile);
    }

    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    info!(count = profiles.len(), dir = %dir.display(), "agent profiles loaded");
    Ok(profiles)
}

/// Startup checks: unique names, exactly one default agent, and the entry
/// agent present. Returns the default agent's name.
pub fn validate_profiles(
    profiles: &[AgentProfile],
    entry_agent: &str,
) -> Result<String, SwitchboardError> {
    let mut seen = HashSet::new();
    for profile in profiles {
        if !seen.insert(profile.name.as_str()) {
            return Err(SwitchboardError::Configuration(format!(
                "duplicate agent name '{}'",
                profile.name
            )));
        }
    }

    let defaults: Vec<&str> = profiles
        .iter()
        .filter(|p| p.default_agent)
        .map(|p| p.name.as_str())
        .collect();
    let default_agent = match defaults.as_slice() {
        [single] => single.to_string(),
        [] => {
            return Err(SwitchboardError::Configuration(
                "no agent is flagged default_agent".into(),
            ))
        }
        many => {
            return Err(SwitchboardError::Configuration(format!(
                "multiple default agents: {}",
                many.join(", ")
            )))
        }
    };

    if !seen.contains(entry_agent) {
        return Err(SwitchboardError::UnknownAgent(entry_agent.to_string()));
    }
    Ok(default_agent)
}
