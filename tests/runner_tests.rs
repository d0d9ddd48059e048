//! Multi-agent routing, handoff and session persistence.

mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use switchboard::agent::{
    AgentProfile, AgentRunner, InMemorySessionStore, RunnerSettings, Session, SessionStore,
};
use switchboard::config::SwitchboardConfig;
use switchboard::error::SwitchboardError;
use switchboard::types::{Conversation, ModelMessage, Role};

struct Fixture {
    runner: AgentRunner,
    provider: Arc<ScriptedProvider>,
    classifier: Arc<ScriptedClassifier>,
    store: Arc<InMemorySessionStore>,
}

fn generic_profile() -> AgentProfile {
    AgentProfile {
        default_agent: true,
        ..profile("generic_agent", &["get_help", "lookup"])
    }
}

fn fixture(provider: ScriptedProvider, classified: &[&str]) -> Fixture {
    let provider = Arc::new(provider);
    let classifier = Arc::new(ScriptedClassifier::new(classified));
    let store = Arc::new(InMemorySessionStore::new());
    let agents = vec![
        agent(generic_profile(), provider.clone()),
        agent(profile("Maya", &["get_help"]), provider.clone()),
        agent(profile("Nestle", &["lookup"]), provider.clone()),
    ];
    let runner = AgentRunner::new(
        agents,
        classifier.clone(),
        store.clone(),
        RunnerSettings::default(),
    )
    .unwrap();
    Fixture {
        runner,
        provider,
        classifier,
        store,
    }
}

async fn stored(store: &InMemorySessionStore, id: &str) -> Session {
    store.get(id).await.unwrap().expect("session persisted")
}

#[tokio::test]
async fn answers_through_entry_agent() {
    let fx = fixture(
        ScriptedProvider::new()
            .then_tool("c1", "lookup", r#"{"question": "slogan of NESCAFE"}"#)
            .then_text(SLOGAN),
        &[],
    );

    let reply = fx
        .runner
        .run(Some("What is the slogan of NESCAFE?"), "s1")
        .await
        .unwrap();

    assert_eq!(reply, SLOGAN);
    let session = stored(&fx.store, "s1").await;
    assert_eq!(session.active_agent_name, "generic_agent");
    assert_eq!(session.conversation.last().unwrap().text(), SLOGAN);
    assert_eq!(fx.classifier.calls(), 0);
}

#[tokio::test]
async fn greeting_for_new_session_is_persisted() {
    let fx = fixture(ScriptedProvider::new(), &[]);

    let reply = fx.runner.run(None, "fresh").await.unwrap();

    assert_eq!(reply, "Hi, I'm generic_agent. How can I help?");
    assert_eq!(fx.provider.calls(), 0);
    let session = stored(&fx.store, "fresh").await;
    assert_eq!(session.conversation.len(), 2);
}

#[tokio::test]
async fn help_request_reassigns_to_classified_agent() {
    let fx = fixture(
        ScriptedProvider::new()
            .then_tool("h1", "get_help", r#"{"user_request": "flight booking"}"#)
            .then_text("Where would you like to fly?"),
        &["Maya"],
    );

    let reply = fx
        .runner
        .run(Some("I want to book a flight"), "s2")
        .await
        .unwrap();

    assert_eq!(reply, "Where would you like to fly?");
    assert_eq!(fx.classifier.requests(), vec!["flight booking".to_string()]);

    let maya_request = &fx.provider.requests()[1];
    assert_eq!(maya_request.messages[0].text(), "You are Maya, helping Acme.");
    assert!(maya_request
        .messages
        .iter()
        .any(|m| m.text() == "Hi, I'm Maya. How can I help?"));
    let last = maya_request.messages.last().unwrap();
    assert!(last.is_role(Role::User));
    assert_eq!(last.text(), "I want to book a flight");
    // The pending question is submitted once, by the new agent.
    let asked = maya_request
        .messages
        .iter()
        .filter(|m| m.text() == "I want to book a flight")
        .count();
    assert_eq!(asked, 1);

    assert_eq!(stored(&fx.store, "s2").await.active_agent_name, "Maya");
}

#[tokio::test]
async fn unusable_classifications_fall_back_to_default_agent() {
    let fx = fixture(
        ScriptedProvider::new()
            .then_tool("h1", "get_help", r#"{"user_request": "something odd"}"#)
            .then_text("Let me help with that myself."),
        &["generic_agent", "nobody"],
    );

    let reply = fx.runner.run(Some("odd question"), "s3").await.unwrap();

    assert_eq!(reply, "Let me help with that myself.");
    assert_eq!(fx.classifier.calls(), 3);
    assert_eq!(stored(&fx.store, "s3").await.active_agent_name, "generic_agent");
}

#[tokio::test]
async fn second_help_request_forces_default_agent() {
    let fx = fixture(
        ScriptedProvider::new()
            .then_tool("h1", "get_help", r#"{"user_request": "chocolate"}"#)
            .then_tool("h2", "get_help", r#"{"user_request": "not my area"}"#)
            .then_text("Here is a general answer."),
        &["Maya"],
    );

    let reply = fx.runner.run(Some("Tell me about KITKAT"), "s4").await.unwrap();

    assert_eq!(reply, "Here is a general answer.");
    assert_eq!(fx.classifier.calls(), 1);
    assert_eq!(fx.provider.calls(), 3);
    assert_eq!(stored(&fx.store, "s4").await.active_agent_name, "generic_agent");
}

#[tokio::test]
async fn default_agent_help_payload_becomes_reply() {
    let fx = fixture(
        ScriptedProvider::new()
            .then_tool("h1", "get_help", r#"{"user_request": "chocolate"}"#)
            .then_tool("h2", "get_help", r#"{"user_request": "not my area"}"#)
            .then_tool("h3", "get_help", r#"{"user_request": "Please contact support."}"#),
        &["Maya"],
    );

    let reply = fx.runner.run(Some("Tell me about KITKAT"), "s5").await.unwrap();

    assert_eq!(reply, "Please contact support.");
    let session = stored(&fx.store, "s5").await;
    assert_eq!(session.active_agent_name, "generic_agent");
    assert_eq!(
        session.conversation.system_prompt().as_deref(),
        Some("You are generic_agent, helping Acme.")
    );
    let tail: Vec<(Role, String)> = session.conversation.messages()
        [session.conversation.len() - 2..]
        .iter()
        .map(|m| (m.role, m.text()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (Role::User, "Tell me about KITKAT".to_string()),
            (Role::Assistant, "Please contact support.".to_string()),
        ]
    );
}

#[tokio::test]
async fn session_continues_across_turns() {
    let fx = fixture(
        ScriptedProvider::new().then_text("a1").then_text("a2"),
        &[],
    );

    fx.runner.run(Some("q1"), "s6").await.unwrap();
    let reply = fx.runner.run(Some("q2"), "s6").await.unwrap();

    assert_eq!(reply, "a2");
    let second: Vec<String> = fx.provider.requests()[1]
        .messages
        .iter()
        .map(ModelMessage::text)
        .collect();
    assert!(second.contains(&"q1".to_string()));
    assert!(second.contains(&"a1".to_string()));
    assert_eq!(stored(&fx.store, "s6").await.conversation.user_turns(), 2);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let fx = fixture(
        ScriptedProvider::new().then_text("for a").then_text("for b"),
        &[],
    );

    fx.runner.run(Some("from a"), "a").await.unwrap();
    fx.runner.run(Some("from b"), "b").await.unwrap();

    let b_texts: Vec<String> = fx.provider.requests()[1]
        .messages
        .iter()
        .map(ModelMessage::text)
        .collect();
    assert!(!b_texts.contains(&"from a".to_string()));
    assert_eq!(fx.store.session_ids().await, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn stale_agent_name_is_taken_over_by_entry_agent() {
    let fx = fixture(ScriptedProvider::new().then_text("welcome back"), &[]);
    fx.store
        .set(&Session::new(
            "s7",
            "retired_agent",
            Conversation::from_messages(vec![
                ModelMessage::system("You are retired."),
                ModelMessage::assistant("Old greeting"),
            ]),
        ))
        .await
        .unwrap();

    let reply = fx.runner.run(Some("hello again"), "s7").await.unwrap();

    assert_eq!(reply, "welcome back");
    let request = fx.provider.last_request();
    assert_eq!(request.messages[0].text(), "You are generic_agent, helping Acme.");
    assert!(request
        .messages
        .iter()
        .any(|m| m.text() == "Hi, I'm generic_agent. How can I help?"));
    assert_eq!(stored(&fx.store, "s7").await.active_agent_name, "generic_agent");
}

#[tokio::test]
async fn rejects_ambiguous_default_agent() {
    let provider = Arc::new(ScriptedProvider::new());
    let agents = vec![
        agent(generic_profile(), provider.clone()),
        agent(
            AgentProfile {
                default_agent: true,
                ..profile("Maya", &[])
            },
            provider,
        ),
    ];

    let err = AgentRunner::new(
        agents,
        Arc::new(ScriptedClassifier::new(&[])),
        Arc::new(InMemorySessionStore::new()),
        RunnerSettings::default(),
    )
    .unwrap_err();

    assert!(matches!(err, SwitchboardError::Configuration(_)));
}

#[tokio::test]
async fn rejects_missing_entry_agent() {
    let provider = Arc::new(ScriptedProvider::new());

    let err = AgentRunner::new(
        vec![agent(generic_profile(), provider)],
        Arc::new(ScriptedClassifier::new(&[])),
        Arc::new(InMemorySessionStore::new()),
        RunnerSettings {
            entry_agent: "Maya".into(),
            ..RunnerSettings::default()
        },
    )
    .unwrap_err();

    assert!(matches!(err, SwitchboardError::UnknownAgent(name) if name == "Maya"));
}

const GENERIC_PROFILE: &str = r#"
name = "generic_agent"
persona = "You are a support agent for {customer_name}."
initial_message = "Hello! How can I help?"
domain_description = "a general customer support agent"
default_agent = true
"#;

const MAYA_PROFILE: &str = r#"
name = "Maya"
persona = "You are Maya, booking flights for {customer_name}."
initial_message = "Hi, I'm Maya. Where would you like to fly?"
domain_description = "a specialist support agent in Flight booking"
"#;

const COMMON_PROFILE: &str = r#"
[[tools]]
name = "get_help"
description = "Hand the request to another agent"
required = ["user_request"]

[tools.parameters]
type = "object"

[tools.parameters.properties.user_request]
type = "string"
"#;

#[tokio::test]
async fn from_config_routes_with_llm_classifier() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("generic_agent_profile.toml"), GENERIC_PROFILE).unwrap();
    std::fs::write(dir.path().join("maya_profile.toml"), MAYA_PROFILE).unwrap();
    std::fs::write(dir.path().join("common_agent_profile.toml"), COMMON_PROFILE).unwrap();

    let mut config = SwitchboardConfig {
        profiles_dir: dir.path().to_path_buf(),
        evaluator_model: Some("gpt-35-turbo".into()),
        ..SwitchboardConfig::default()
    };
    config
        .customer
        .insert("customer_name".into(), "Nestle".into());

    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tool("h1", "get_help", r#"{"user_request": "book a flight"}"#)
            .then_text(" Maya \n")
            .then_text("Where to?"),
    );
    let store = Arc::new(InMemorySessionStore::new());
    let runner =
        AgentRunner::from_config(&config, provider.clone(), &catalog(), store.clone()).unwrap();

    assert_eq!(runner.default_agent(), "generic_agent");
    assert_eq!(runner.entry_agent(), "generic_agent");
    let maya = runner.agent("Maya").unwrap();
    assert_eq!(maya.profile().tools.len(), 1);

    let reply = runner.run(Some("I need a flight"), "cfg").await.unwrap();

    assert_eq!(reply, "Where to?");
    let requests = provider.requests();
    assert_eq!(requests[0].messages[0].text(), "You are a support agent for Nestle.");
    let classify = &requests[1];
    assert_eq!(classify.model, "gpt-35-turbo");
    assert_eq!(classify.settings.max_tokens, Some(20));
    assert!(classify.tools.is_none());
    assert!(classify.messages[1].text().contains("[book a flight]"));
    assert_eq!(stored(&store, "cfg").await.active_agent_name, "Maya");
}
