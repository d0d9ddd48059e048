//! Multi-agent router.
//!
//! Per request: resolve session, run the active agent, and on a help request
//! classify, reassign and run the new agent. A second help request forces
//! the default agent, whose output is accepted unconditionally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use super::agent::{Agent, AgentOutcome, AgentSettings, TurnContext};
use super::classifier::{AgentDescriptor, IntentClassifier, LlmIntentClassifier};
use super::profile::{load_profiles, validate_profiles};
use super::session::{Session, SessionStore};
use crate::config::SwitchboardConfig;
use crate::error::SwitchboardError;
use crate::provider::ModelProvider;
use crate::tools::ToolCatalog;
use crate::types::{Conversation, ModelMessage};

/// Routing policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Agent that owns new sessions.
    pub entry_agent: String,
    /// Reclassifications allowed after the first attempt.
    pub classifier_retry_budget: u32,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            entry_agent: "generic_agent".into(),
            classifier_retry_budget: 2,
        }
    }
}

type SessionLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Routes turns to agents and persists sessions.
pub struct AgentRunner {
    agents: HashMap<String, Arc<Agent>>,
    catalog: Vec<AgentDescriptor>,
    entry_agent: String,
    default_agent: String,
    classifier: Arc<dyn IntentClassifier>,
    store: Arc<dyn SessionStore>,
    retry_budget: u32,
    session_locks: SessionLocks,
}

impl AgentRunner {
    /// Fails unless names are unique, exactly one agent is the default, and
    /// the entry agent exists.
    pub fn new(
        agents: Vec<Agent>,
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<dyn SessionStore>,
        settings: RunnerSettings,
    ) -> Result<Self, SwitchboardError> {
        let mut by_name = HashMap::new();
        let mut catalog = Vec::with_capacity(agents.len());
        let mut defaults = Vec::new();
        for agent in agents {
            let name = agent.name().to_string();
            if agent.is_default() {
                defaults.push(name.clone());
            }
            catalog.push(AgentDescriptor::new(&name, agent.domain_description()));
            if by_name.insert(name.clone(), Arc::new(agent)).is_some() {
                return Err(SwitchboardError::Configuration(format!(
                    "duplicate agent name '{name}'"
                )));
            }
        }

        let default_agent = match defaults.as_slice() {
            [single] => single.clone(),
            _ => {
                return Err(SwitchboardError::Configuration(format!(
                    "expected exactly one default agent, found {}",
                    defaults.len()
                )))
            }
        };
        if !by_name.contains_key(&settings.entry_agent) {
            return Err(SwitchboardError::UnknownAgent(settings.entry_agent));
        }

        Ok(Self {
            agents: by_name,
            catalog,
            entry_agent: settings.entry_agent,
            default_agent,
            classifier,
            store,
            retry_budget: settings.classifier_retry_budget,
            session_locks: StdMutex::new(HashMap::new()),
        })
    }

    /// Compose a runner from configuration: load and validate profiles, bind
    /// tools from `catalog`, and classify with the evaluator model.
    pub fn from_config(
        config: &SwitchboardConfig,
        provider: Arc<dyn ModelProvider>,
        catalog: &ToolCatalog,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, SwitchboardError> {
        let profiles = load_profiles(&config.profiles_dir)?;
        validate_profiles(&profiles, &config.entry_agent)?;

        let settings = AgentSettings::from_config(config);
        let agents = profiles
            .into_iter()
            .map(|profile| {
                Agent::from_profile(
                    profile,
                    &config.customer,
                    catalog,
                    Arc::clone(&provider),
                    settings.clone(),
                )
            })
            .collect();
        let classifier = Arc::new(
            LlmIntentClassifier::new(provider, config.evaluator_model())
                .with_policy(settings.retry.clone(), settings.request_timeout),
        );

        Self::new(
            agents,
            classifier,
            store,
            RunnerSettings {
                entry_agent: config.entry_agent.clone(),
                classifier_retry_budget: config.classifier_retry_budget,
            },
        )
    }

    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    pub fn entry_agent(&self) -> &str {
        &self.entry_agent
    }

    pub fn agent(&self, name: &str) -> Result<Arc<Agent>, SwitchboardError> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| SwitchboardError::UnknownAgent(name.to_string()))
    }

    /// Handle one turn and return the reply text.
    ///
    /// `None` input returns the active agent's greeting. Turns for the same
    /// session are serialized; different sessions run concurrently.
    pub async fn run(
        &self,
        user_input: Option<&str>,
        session_id: &str,
    ) -> Result<String, SwitchboardError> {
        let _lease = self.lease_session(session_id).await;

        let (active, conversation) = self.resolve_session(session_id).await?;
        let ctx = TurnContext::new(session_id);

        let outcome = active.run(user_input, conversation, &ctx).await?;
        let (agent, outcome) = match outcome.help_reason().map(str::to_string) {
            Some(reason) => {
                self.hand_off(active, reason, outcome.conversation, user_input, &ctx)
                    .await?
            }
            None => (active, outcome),
        };

        let reply = outcome.text().to_string();
        let session = Session::new(session_id, agent.name(), outcome.conversation);
        self.store.set(&session).await?;
        info!(
            session = session_id,
            agent = agent.name(),
            messages = session.conversation.len(),
            "session persisted"
        );
        Ok(reply)
    }

    async fn resolve_session(
        &self,
        session_id: &str,
    ) -> Result<(Arc<Agent>, Conversation), SwitchboardError> {
        let Some(session) = self.store.get(session_id).await? else {
            let agent = self.agent(&self.entry_agent)?;
            info!(session = session_id, agent = agent.name(), "new session");
            let history = agent.initial_history();
            return Ok((agent, history));
        };

        if let Err(fault) = session.conversation.validate() {
            warn!(session = session_id, %fault, "stored conversation is inconsistent");
        }

        match self.agents.get(&session.active_agent_name) {
            Some(agent) => Ok((Arc::clone(agent), session.conversation)),
            None => {
                warn!(
                    session = session_id,
                    agent = %session.active_agent_name,
                    "stored agent no longer configured, using entry agent"
                );
                let agent = self.agent(&self.entry_agent)?;
                let mut conversation = session.conversation;
                agent.take_over(&mut conversation);
                Ok((agent, conversation))
            }
        }
    }

    async fn hand_off(
        &self,
        requester: Arc<Agent>,
        reason: String,
        conversation: Conversation,
        user_input: Option<&str>,
        ctx: &TurnContext,
    ) -> Result<(Arc<Agent>, AgentOutcome), SwitchboardError> {
        let target = self.reassign(&reason, requester.name()).await?;
        info!(
            session = %ctx.session_id,
            from = requester.name(),
            to = target.name(),
            "reassigning"
        );
        let mut conversation = conversation;
        target.take_over(&mut conversation);
        let outcome = target.run(user_input, conversation, ctx).await?;

        let Some(second) = outcome.help_reason().map(str::to_string) else {
            return Ok((target, outcome));
        };

        let fallback = self.agent(&self.default_agent)?;
        warn!(
            session = %ctx.session_id,
            from = target.name(),
            to = fallback.name(),
            reason = %second,
            "reassigned agent also needs help, forcing default agent"
        );
        let mut conversation = outcome.conversation;
        fallback.take_over(&mut conversation);
        let mut last = fallback.run(user_input, conversation, ctx).await?;

        if let Some(reply) = last.help_reason().map(str::to_string) {
            warn!(session = %ctx.session_id, "default agent asked for help, accepting its payload");
            let conversation = &mut last.conversation;
            conversation.set_system_prompt(fallback.persona().default.clone());
            if let Some(input) = user_input {
                conversation.push(ModelMessage::user(input));
            }
            conversation.push(ModelMessage::assistant(reply));
        }
        Ok((fallback, last))
    }

    /// Classify until an acceptable agent comes back or the budget runs out.
    ///
    /// A name is acceptable if it is configured and is not the requester.
    /// Classifier errors count as failed attempts.
    async fn reassign(
        &self,
        reason: &str,
        requester: &str,
    ) -> Result<Arc<Agent>, SwitchboardError> {
        let attempts = self.retry_budget + 1;
        for attempt in 1..=attempts {
            match self.classifier.classify(reason, &self.catalog).await {
                Ok(name) if name != requester && self.agents.contains_key(&name) => {
                    info!(attempt, agent = %name, "intent classified");
                    return self.agent(&name);
                }
                Ok(name) => {
                    warn!(attempt, returned = %name, requester, "classifier returned unusable agent");
                }
                Err(err) => {
                    warn!(attempt, error = %err, "intent classification failed");
                }
            }
        }
        warn!(
            requester,
            fallback = %self.default_agent,
            "classifier did not converge, using default agent"
        );
        self.agent(&self.default_agent)
    }

    /// Wait for exclusive use of `session_id`.
    async fn lease_session(&self, session_id: &str) -> SessionLease<'_> {
        let lock = {
            let mut locks = lock_map(&self.session_locks);
            Arc::clone(
                locks
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let mut lease = SessionLease {
            locks: &self.session_locks,
            session_id: session_id.to_string(),
            lock,
            guard: None,
        };
        lease.guard = Some(Arc::clone(&lease.lock).lock_owned().await);
        lease
    }
}

fn lock_map(locks: &SessionLocks) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Holds a session's turn lock. On drop the lock is released and its map
/// entry removed unless another turn is waiting on it.
struct SessionLease<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_map(self.locks);
        // The map and this lease are the only holders when nobody waits.
        let idle = locks
            .get(&self.session_id)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2);
        if idle {
            locks.remove(&self.session_id);
        }
    }
}

impl std::fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("AgentRunner")
            .field("agents", &names)
            .field("entry_agent", &self.entry_agent)
            .field("default_agent", &self.default_agent)
            .field("retry_budget", &self.retry_budget)
            .finish()
    }
}
