//! Agents, intent classification, sessions and the multi-agent runner.

pub mod agent;
pub mod classifier;
pub mod profile;
pub mod review;
pub mod runner;
pub mod session;

pub use agent::{Agent, AgentOutcome, AgentSettings, TurnContext, TurnEnd, APOLOGY};
pub use classifier::{AgentDescriptor, IntentClassifier, LlmIntentClassifier};
pub use profile::{load_profiles, validate_profiles, AgentProfile, Persona};
pub use review::SufficiencyVerdict;
pub use runner::{AgentRunner, RunnerSettings};
pub use session::{FileSessionStore, InMemorySessionStore, Session, SessionStore};
