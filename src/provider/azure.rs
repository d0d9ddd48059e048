//! Azure OpenAI provider.
//!
//! The request's `model` names the deployment, so one provider serves both
//! the chat and the evaluator deployments.

use async_trait::async_trait;
use tracing::debug;

use crate::error::SwitchboardError;

use super::http::api_key_headers;
use super::openai::{build_request_body, post_chat};
use super::{CompletionRequest, CompletionResponse, ModelProvider};

pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI Service provider.
pub struct AzureOpenAiProvider {
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    /// `endpoint`: e.g., "https://myresource.openai.azure.com"
    pub fn new(endpoint: String, api_key: String, api_version: Option<String>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        }
    }

    pub fn deployment_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        )
    }
}

#[async_trait]
impl ModelProvider for AzureOpenAiProvider {
    fn provider_name(&self) -> &str {
        "azure"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SwitchboardError> {
        let body = build_request_body(request, false);
        debug!(deployment = %request.model, "Azure OpenAI complete");
        post_chat(
            &self.deployment_url(&request.model),
            api_key_headers(&self.api_key),
            &body,
        )
        .await
    }
}
