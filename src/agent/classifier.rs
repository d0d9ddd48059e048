//! Intent classification: pick the agent best suited to a help request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SwitchboardError;
use crate::provider::{CompletionRequest, ModelProvider};
use crate::types::{GenerationSettings, ModelMessage};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_timeout;

const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a helpful AI assistant to match requests with agents. \
Here are agents with the description of their responsibilities:\n\n";

/// One catalog entry shown to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: String,
    pub domain_description: String,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, domain_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain_description: domain_description.into(),
        }
    }
}

/// Maps a help request to an agent name.
///
/// Implementations return the raw name they chose; the runner decides
/// whether it is acceptable.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        request: &str,
        catalog: &[AgentDescriptor],
    ) -> Result<String, SwitchboardError>;
}

/// Classifier backed by a short completion against the evaluator model.
pub struct LlmIntentClassifier {
    provider: Arc<dyn ModelProvider>,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl LlmIntentClassifier {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 20,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Retry transient failures with `retry` and bound each attempt by
    /// `request_timeout`.
    pub fn with_policy(mut self, retry: RetryPolicy, request_timeout: Duration) -> Self {
        self.retry = retry;
        self.request_timeout = request_timeout;
        self
    }

    fn messages(request: &str, catalog: &[AgentDescriptor]) -> Vec<ModelMessage> {
        let descriptions: String = catalog
            .iter()
            .map(|a| format!("{}: {}\n\n", a.name, a.domain_description))
            .collect();
        let names = catalog
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        vec![
            ModelMessage::system(format!("{CLASSIFIER_SYSTEM_PROMPT}{descriptions}")),
            ModelMessage::user(format!(
                "Given the request [{request}], pick a name from [{names}]. \
                 Just output the name of the agent, no need to add any other text."
            )),
        ]
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(
        &self,
        request: &str,
        catalog: &[AgentDescriptor],
    ) -> Result<String, SwitchboardError> {
        let completion = CompletionRequest {
            model: self.model.clone(),
            messages: Self::messages(request, catalog),
            tools: None,
            settings: GenerationSettings::builder().max_tokens(self.max_tokens).build(),
        };
        let response = self
            .retry
            .execute(|| with_timeout(self.request_timeout, self.provider.complete(&completion)))
            .await?;
        let name = response.content_or_empty().trim().to_string();
        debug!(model = %self.model, classified = %name, "intent classified");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CompletionResponse;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a 503 `failures` times, then names Maya. `stall` makes
    /// every call hang instead.
    struct Evaluator {
        failures: u32,
        stall: bool,
        calls: AtomicU32,
    }

    impl Evaluator {
        fn new(failures: u32, stall: bool) -> Arc<Self> {
            Arc::new(Self {
                failures,
                stall,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for Evaluator {
        fn provider_name(&self) -> &str {
            "evaluator"
        }

        async fn complete(
            &self,
            _request: &CompletionRequest,
        ) -> Result<CompletionResponse, SwitchboardError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if call < self.failures {
                return Err(SwitchboardError::api(503, "overloaded"));
            }
            Ok(CompletionResponse::text(" Maya\n"))
        }
    }

    fn catalog() -> Vec<AgentDescriptor> {
        vec![AgentDescriptor::new("Maya", "flights")]
    }

    #[tokio::test(start_paused = true)]
    async fn transient_evaluator_errors_are_retried() {
        let evaluator = Evaluator::new(1, false);
        let classifier = LlmIntentClassifier::new(evaluator.clone(), "gpt-35-turbo")
            .with_policy(RetryPolicy::with_max_attempts(3), Duration::from_secs(5));

        let name = classifier.classify("book a flight", &catalog()).await.unwrap();

        assert_eq!(name, "Maya");
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_evaluator_times_out() {
        let evaluator = Evaluator::new(0, true);
        let classifier = LlmIntentClassifier::new(evaluator.clone(), "gpt-35-turbo")
            .with_policy(RetryPolicy::with_max_attempts(2), Duration::from_secs(5));

        let err = classifier
            .classify("book a flight", &catalog())
            .await
            .unwrap_err();

        assert!(matches!(err, SwitchboardError::Timeout(5000)));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn prompt_lists_catalog_and_names() {
        let catalog = vec![
            AgentDescriptor::new("generic_agent", "a general customer support agent"),
            AgentDescriptor::new("Maya", "a specialist support agent in Flight booking"),
        ];

        let messages = LlmIntentClassifier::messages("change my flight", &catalog);

        assert!(messages[0]
            .text()
            .ends_with("generic_agent: a general customer support agent\n\nMaya: a specialist support agent in Flight booking\n\n"));
        assert_eq!(
            messages[1].text(),
            "Given the request [change my flight], pick a name from [generic_agent, Maya]. \
             Just output the name of the agent, no need to add any other text."
        );
    }
}
