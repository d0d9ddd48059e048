//! Single-agent tool loop.
//!
//! One call to [`Agent::run`] handles one user turn:
//!
//! ```text
//! AwaitingModel ──tool calls──▶ ToolDispatch ──▶ AwaitingModel ── ... ──▶ Done
//!       │                            │
//!       ├──True/False──▶ SelfReview ─┘ (once per turn)
//!       ├──run budget spent──▶ MaxRunsExceeded
//!       └──get_help──────────▶ NeedsHelp
//! ```
//!
//! Malformed or failing tool calls roll the round back and count toward
//! the error budget; once that budget is spent the conversation is reset to
//! the pending question.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::profile::{initial_history, AgentProfile, Persona};
use super::review::SufficiencyVerdict;
use crate::config::{LoopLimits, SwitchboardConfig};
use crate::error::SwitchboardError;
use crate::history::{reset_to_last_question, HistoryPolicy};
use crate::provider::{CompletionRequest, CompletionResponse, ModelProvider};
use crate::tools::{ToolCallFault, ToolCatalog, ToolExecutionContext, ToolRegistry};
use crate::types::*;
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

/// Reply used when a turn spends its whole completion budget.
pub const APOLOGY: &str =
    "I am unable to answer this question at the moment, please ask another question.";

/// Loop tuning shared by all agents.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub limits: LoopLimits,
    pub history: HistoryPolicy,
    pub temperature: f64,
    pub sufficient_context_threshold: f64,
    /// Deployment for profiles that do not name one.
    pub default_model: String,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl AgentSettings {
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        Self {
            limits: config.limits,
            history: config.history,
            temperature: config.temperature,
            sufficient_context_threshold: config.sufficient_context_threshold,
            default_model: config.chat_model.clone(),
            retry: RetryPolicy::with_max_attempts(config.completion_attempts),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&SwitchboardConfig::default())
    }
}

/// Identifies the turn for tools and logs.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub session_id: String,
}

impl TurnContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEnd {
    /// The model produced a final answer (or the greeting was returned).
    Done { text: String },
    /// The completion budget ran out; `text` is the apology.
    MaxRunsExceeded { text: String },
    /// The agent called `get_help`; `reason` is the tool's payload.
    NeedsHelp { reason: String },
}

/// Result of [`Agent::run`]. The conversation is handed back by value.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub end: TurnEnd,
    pub conversation: Conversation,
    pub usage: Usage,
    /// Completion calls issued during the turn.
    pub completion_calls: u32,
}

impl AgentOutcome {
    /// Reply text, or the help payload for [`TurnEnd::NeedsHelp`].
    pub fn text(&self) -> &str {
        match &self.end {
            TurnEnd::Done { text } | TurnEnd::MaxRunsExceeded { text } => text,
            TurnEnd::NeedsHelp { reason } => reason,
        }
    }

    pub fn help_reason(&self) -> Option<&str> {
        match &self.end {
            TurnEnd::NeedsHelp { reason } => Some(reason),
            _ => None,
        }
    }
}

enum RoundOutcome {
    Continue,
    Fault(ToolCallFault),
    Help(String),
}

/// An agent persona bound to its tools and a completion service.
pub struct Agent {
    profile: AgentProfile,
    persona: Persona,
    registry: ToolRegistry,
    provider: Arc<dyn ModelProvider>,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(
        profile: AgentProfile,
        persona: Persona,
        registry: ToolRegistry,
        provider: Arc<dyn ModelProvider>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            profile,
            persona,
            registry,
            provider,
            settings,
        }
    }

    /// Resolve the persona for `customer` and bind the profile's tools.
    pub fn from_profile(
        profile: AgentProfile,
        customer: &BTreeMap<String, String>,
        catalog: &ToolCatalog,
        provider: Arc<dyn ModelProvider>,
        settings: AgentSettings,
    ) -> Self {
        let persona = Persona::resolve(&profile, customer);
        let registry = ToolRegistry::bind(&profile.name, &profile.tools, catalog);
        Self::new(profile, persona, registry, provider, settings)
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn is_default(&self) -> bool {
        self.profile.default_agent
    }

    pub fn initial_message(&self) -> &str {
        &self.profile.initial_message
    }

    pub fn domain_description(&self) -> &str {
        &self.profile.domain_description
    }

    pub fn model(&self) -> &str {
        self.profile
            .model
            .as_deref()
            .unwrap_or(&self.settings.default_model)
    }

    pub fn initial_history(&self) -> Conversation {
        initial_history(&self.persona, &self.profile)
    }

    /// Rewrite the system prompt to this agent's persona and append its
    /// greeting, as done when the agent takes over a conversation.
    pub fn take_over(&self, conversation: &mut Conversation) {
        conversation.adopt_persona(&self.persona.default, Some(self.initial_message()));
    }

    fn reviews_context(&self) -> bool {
        !self.registry.is_empty() && self.profile.follow_up(0).is_some()
    }

    /// Run one user turn.
    ///
    /// With no input (or blank input) the greeting is returned without
    /// calling the model. An empty `conversation` starts from the initial
    /// history. Only completion-service failures surface as errors.
    pub async fn run(
        &self,
        user_input: Option<&str>,
        conversation: Conversation,
        ctx: &TurnContext,
    ) -> Result<AgentOutcome, SwitchboardError> {
        let mut conversation = if conversation.is_empty() {
            self.initial_history()
        } else {
            conversation
        };

        let Some(input) = user_input.filter(|s| !s.trim().is_empty()) else {
            debug!(agent = self.name(), "no input, returning greeting");
            return Ok(AgentOutcome {
                end: TurnEnd::Done {
                    text: self.profile.initial_message.clone(),
                },
                conversation,
                usage: Usage::default(),
                completion_calls: 0,
            });
        };

        conversation.push(ModelMessage::user(input));
        self.settings.history.apply(&mut conversation);

        let limits = self.settings.limits;
        let mut run_count = 0u32;
        let mut error_count = 0u32;
        let mut reviewed = false;
        let mut usage = Usage::default();

        loop {
            if run_count >= limits.max_run_per_question {
                warn!(
                    agent = self.name(),
                    session = %ctx.session_id,
                    run_count,
                    "run budget exhausted"
                );
                conversation.push(ModelMessage::assistant(APOLOGY));
                self.settle_persona(&mut conversation);
                return Ok(AgentOutcome {
                    end: TurnEnd::MaxRunsExceeded {
                        text: APOLOGY.to_string(),
                    },
                    conversation,
                    usage,
                    completion_calls: run_count,
                });
            }

            if error_count >= limits.max_error_run {
                let removed = reset_to_last_question(&mut conversation);
                info!(
                    agent = self.name(),
                    error_count, removed, "tool errors reached limit, reset to last question"
                );
                error_count = 0;
            }

            run_count += 1;
            debug!(agent = self.name(), run_count, "awaiting model");
            let response = self.complete(&conversation).await?;
            usage.merge(&response.usage);

            if response.tool_calls.is_empty() {
                if self.reviews_context() && !reviewed {
                    let threshold = self.settings.sufficient_context_threshold;
                    if let Some(verdict) = SufficiencyVerdict::from_response(&response, threshold) {
                        reviewed = true;
                        self.apply_verdict(&mut conversation, verdict);
                        continue;
                    }
                }

                let text = response.content.unwrap_or_default();
                conversation.push(ModelMessage::assistant(text.clone()));
                self.settle_persona(&mut conversation);
                debug!(agent = self.name(), run_count, "turn done");
                return Ok(AgentOutcome {
                    end: TurnEnd::Done { text },
                    conversation,
                    usage,
                    completion_calls: run_count,
                });
            }

            let round_start = conversation.len();
            let calls = response.tool_calls;
            conversation.push(ModelMessage::assistant_with_tool_calls(
                response.content.unwrap_or_default(),
                calls.clone(),
            ));

            match self.dispatch_round(&mut conversation, &calls, ctx).await {
                RoundOutcome::Continue => {}
                RoundOutcome::Fault(fault) => {
                    error_count += 1;
                    warn!(
                        agent = self.name(),
                        error_count,
                        fault = %fault,
                        "tool call rejected, rolling back round"
                    );
                    conversation.truncate(round_start);
                }
                RoundOutcome::Help(reason) => {
                    conversation.truncate(round_start);
                    self.strip_review_prompts(&mut conversation);
                    info!(agent = self.name(), reason = %reason, "agent requested help");
                    return Ok(AgentOutcome {
                        end: TurnEnd::NeedsHelp { reason },
                        conversation: handoff_conversation(&conversation),
                        usage,
                        completion_calls: run_count,
                    });
                }
            }
        }
    }

    async fn complete(
        &self,
        conversation: &Conversation,
    ) -> Result<CompletionResponse, SwitchboardError> {
        let tools = (!self.registry.is_empty()).then(|| self.registry.definitions());
        let request = CompletionRequest {
            model: self.model().to_string(),
            messages: conversation.messages().to_vec(),
            settings: GenerationSettings {
                temperature: Some(self.settings.temperature),
                logprobs: self.reviews_context().then_some(true),
                tool_choice: tools.as_ref().map(|_| ToolChoice::Auto),
                ..Default::default()
            },
            tools,
        };

        self.settings
            .retry
            .execute(|| with_timeout(self.settings.request_timeout, self.provider.complete(&request)))
            .await
    }

    /// Execute the round's tool calls in order, appending their results.
    async fn dispatch_round(
        &self,
        conversation: &mut Conversation,
        calls: &[ToolCall],
        ctx: &TurnContext,
    ) -> RoundOutcome {
        for call in calls {
            let tool = match self.registry.resolve(&call.name) {
                Ok(tool) => tool,
                Err(fault) => return RoundOutcome::Fault(fault),
            };
            let args = match self.registry.prepare_arguments(tool.as_ref(), &call.arguments) {
                Ok(args) => args,
                Err(fault) => return RoundOutcome::Fault(fault),
            };

            debug!(agent = self.name(), tool = %call.name, call_id = %call.id, "dispatching tool");
            let exec_ctx = ToolExecutionContext {
                session_id: Some(ctx.session_id.clone()),
                agent_name: Some(self.name().to_string()),
                tool_call_id: Some(call.id.clone()),
            };
            let output = match tool.execute(&args, &exec_ctx).await {
                Ok(output) => output,
                Err(err) => {
                    return RoundOutcome::Fault(ToolCallFault::ExecutionFailed {
                        name: call.name.clone(),
                        message: err.to_string(),
                    })
                }
            };

            if ToolRegistry::is_help_request(&call.name) {
                return RoundOutcome::Help(output.to_text());
            }
            conversation.push(ModelMessage::tool_result(
                call.id.clone(),
                call.name.clone(),
                output.into_parts(),
            ));
        }
        RoundOutcome::Continue
    }

    fn apply_verdict(&self, conversation: &mut Conversation, verdict: SufficiencyVerdict) {
        info!(agent = self.name(), ?verdict, "self-review verdict");
        match verdict {
            SufficiencyVerdict::Sufficient { .. } => {
                conversation.set_system_prompt(self.persona.base.clone());
                if let Some(proceed) = self.profile.follow_up(1) {
                    conversation.push(ModelMessage::user(proceed));
                }
            }
            SufficiencyVerdict::Insufficient { .. } => {
                if let Some(fallback) = self.profile.follow_up(2) {
                    conversation.push(ModelMessage::user(fallback));
                }
            }
        }
    }

    /// Restore the resting persona and drop injected review prompts.
    fn settle_persona(&self, conversation: &mut Conversation) {
        conversation.set_system_prompt(self.persona.default.clone());
        self.strip_review_prompts(conversation);
    }

    fn strip_review_prompts(&self, conversation: &mut Conversation) {
        let prompts: Vec<&str> = [self.profile.follow_up(1), self.profile.follow_up(2)]
            .into_iter()
            .flatten()
            .collect();
        if prompts.is_empty() {
            return;
        }
        conversation.retain(|m| !(m.is_role(Role::User) && prompts.contains(&m.text().as_str())));
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.profile.name)
            .field("model", &self.model())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Conversation handed to the next agent: dialogue text only, ending before
/// the pending question (the runner resubmits it).
pub fn handoff_conversation(conversation: &Conversation) -> Conversation {
    let cutoff = conversation
        .last_user_index()
        .unwrap_or(conversation.len());
    conversation.messages()[..cutoff]
        .iter()
        .filter_map(|m| {
            let text = m.text();
            if text.is_empty() {
                return None;
            }
            match m.role {
                Role::User => Some(ModelMessage::user(text)),
                Role::Assistant => Some(ModelMessage::assistant(text)),
                Role::System | Role::Tool => None,
            }
        })
        .collect::<Vec<_>>()
        .into()
}
