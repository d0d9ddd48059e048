//! Shared test helpers: scripted completion service, scripted classifier,
//! and agent fixtures.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use switchboard::agent::{
    Agent, AgentDescriptor, AgentProfile, AgentSettings, IntentClassifier,
};
use switchboard::error::SwitchboardError;
use switchboard::provider::{CompletionRequest, CompletionResponse, ModelProvider, TokenLogprob};
use switchboard::tools::builtin::get_help_tool;
use switchboard::tools::{AgentTool, AgentToolParameters, Tool, ToolCatalog, ToolSpec};
use switchboard::types::{ToolCall, Usage};
use switchboard::util::retry::RetryPolicy;

pub const SLOGAN: &str = "Hack it the way you like it.";

/// Completion service that replays queued responses and records requests.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<CompletionResponse, SwitchboardError>>>,
    fallback: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response returned whenever the queue is empty.
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    pub fn then(self, response: CompletionResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then(CompletionResponse::text(text))
    }

    pub fn then_tool(self, id: &str, name: &str, arguments: &str) -> Self {
        self.then(CompletionResponse::tool_calls(vec![ToolCall::new(
            id, name, arguments,
        )]))
    }

    pub fn then_verdict(self, content: &str, logprob: f64) -> Self {
        self.then(CompletionResponse::text(content).with_logprobs(vec![TokenLogprob {
            token: content.to_string(),
            logprob,
        }]))
    }

    pub fn then_error(self, error: SwitchboardError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, item: Result<CompletionResponse, SwitchboardError>) {
        self.script.lock().unwrap().push_back(item);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SwitchboardError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback
            .clone()
            .ok_or_else(|| SwitchboardError::Configuration("script exhausted".into()))
    }
}

/// Classifier that returns queued names, then keeps returning the last one.
pub struct ScriptedClassifier {
    names: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            last: Mutex::new(String::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        request: &str,
        _catalog: &[AgentDescriptor],
    ) -> Result<String, SwitchboardError> {
        self.requests.lock().unwrap().push(request.to_string());
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.names.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

/// Tool answering product questions from a fixed fact.
pub fn lookup_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "lookup",
        "Look up product facts",
        AgentToolParameters::object()
            .string("question", "What to look up", true)
            .build(),
        |args, _ctx| async move {
            let question = args.get_str("question")?;
            if question.contains("NESCAFE") {
                Ok(format!("The slogan of NESCAFE is: {SLOGAN}").into())
            } else {
                Ok("no result".into())
            }
        },
    ))
}

/// Tool that always fails.
pub fn broken_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "broken",
        "Always fails",
        AgentToolParameters::empty(),
        |_args, _ctx| async move { Err(SwitchboardError::tool("broken", "backend down")) },
    ))
}

pub fn catalog() -> ToolCatalog {
    ToolCatalog::new()
        .with(get_help_tool())
        .with(lookup_tool())
        .with(broken_tool())
}

pub fn spec(name: &str) -> ToolSpec {
    let tool = catalog().get(name).expect("tool registered in fixture catalog");
    ToolSpec {
        name: name.to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters().schema.clone(),
        required: vec![],
    }
}

pub fn profile(name: &str, tools: &[&str]) -> AgentProfile {
    AgentProfile {
        name: name.to_string(),
        persona: format!("You are {name}, helping {{customer_name}}."),
        model: None,
        initial_message: format!("Hi, I'm {name}. How can I help?"),
        domain_description: format!("{name} domain"),
        default_agent: false,
        follow_up_instructions: vec![],
        tools: tools.iter().map(|t| spec(t)).collect(),
    }
}

pub fn reviewing_profile(name: &str, tools: &[&str]) -> AgentProfile {
    AgentProfile {
        follow_up_instructions: vec![
            "Reply True or False: is the context sufficient?".into(),
            "Answer using the context.".into(),
            "Tell the user you could not find it.".into(),
        ],
        ..profile(name, tools)
    }
}

pub fn customer() -> BTreeMap<String, String> {
    BTreeMap::from([("customer_name".to_string(), "Acme".to_string())])
}

pub fn fast_settings() -> AgentSettings {
    AgentSettings {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            multiplier: 1.0,
        },
        ..AgentSettings::default()
    }
}

pub fn agent(profile: AgentProfile, provider: Arc<ScriptedProvider>) -> Agent {
    Agent::from_profile(profile, &customer(), &catalog(), provider, fast_settings())
}

pub fn usage(input: u32, output: u32) -> Usage {
    Usage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
    }
}
