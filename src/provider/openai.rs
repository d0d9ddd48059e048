//! OpenAI Chat Completions API provider.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::SwitchboardError;
use crate::types::*;

use super::http::{bearer_headers, shared_client, status_to_error};
use super::{CompletionRequest, CompletionResponse, ModelProvider, TokenLogprob};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SwitchboardError> {
        let body = build_request_body(request, true);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, messages = request.messages.len(), "OpenAI complete");

        post_chat(&url, bearer_headers(&self.api_key), &body).await
    }
}

/// POST a chat-completions body and decode the first choice.
pub(crate) async fn post_chat(
    url: &str,
    headers: HeaderMap,
    body: &serde_json::Value,
) -> Result<CompletionResponse, SwitchboardError> {
    let resp = shared_client()
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }

    let data: OpenAiChatResponse = resp.json().await?;
    parse_chat_response(data)
}

/// Build the JSON body. Azure addresses the deployment in the URL, so it
/// omits `model`.
pub(crate) fn build_request_body(
    request: &CompletionRequest,
    include_model: bool,
) -> serde_json::Value {
    let messages = request
        .messages
        .iter()
        .map(message_to_openai)
        .collect::<Vec<_>>();

    let mut obj = serde_json::Map::new();
    if include_model {
        obj.insert("model".into(), request.model.clone().into());
    }
    obj.insert("messages".into(), messages.into());

    let settings = &request.settings;
    if let Some(max) = settings.max_tokens {
        obj.insert("max_tokens".into(), max.into());
    }
    if let Some(temp) = settings.temperature {
        obj.insert("temperature".into(), temp.into());
    }
    if let Some(logprobs) = settings.logprobs {
        obj.insert("logprobs".into(), logprobs.into());
    }
    if let Some(ref user) = settings.user {
        obj.insert("user".into(), user.clone().into());
    }

    if let Some(ref tools) = request.tools {
        if !tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
            if let Some(choice) = settings.tool_choice {
                obj.insert("tool_choice".into(), choice.to_string().into());
            }
        }
    }

    serde_json::Value::Object(obj)
}

fn parse_chat_response(data: OpenAiChatResponse) -> Result<CompletionResponse, SwitchboardError> {
    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SwitchboardError::api(200, "No choices in chat completion response"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
        .collect();

    let logprobs = choice.logprobs.and_then(|lp| lp.content).map(|tokens| {
        tokens
            .into_iter()
            .map(|t| TokenLogprob {
                token: t.token,
                logprob: t.logprob,
            })
            .collect()
    });

    Ok(CompletionResponse {
        content: choice.message.content,
        tool_calls,
        logprobs,
        usage: data
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default(),
        finish_reason: choice.finish_reason.as_deref().and_then(|s| s.parse().ok()),
    })
}

fn content_part_to_openai(part: &ContentPart) -> Option<serde_json::Value> {
    match part {
        ContentPart::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
        ContentPart::Image(img) => Some(serde_json::json!({
            "type": "image_url",
            "image_url": { "url": img.data_url() }
        })),
        ContentPart::ToolCall(_) => None,
    }
}

fn message_to_openai(msg: &ModelMessage) -> serde_json::Value {
    let role = msg.role.to_string();

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<serde_json::Value> = tool_calls
            .iter()
            .map(|tc| {
                serde_json::json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments }
                })
            })
            .collect();
        let text = msg.text();
        return serde_json::json!({
            "role": role,
            "content": if text.is_empty() { serde_json::Value::Null } else { text.into() },
            "tool_calls": tc_json,
        });
    }

    let content = match msg.content.as_slice() {
        [ContentPart::Text { text }] => serde_json::Value::String(text.clone()),
        [] => serde_json::Value::String(String::new()),
        parts => parts
            .iter()
            .filter_map(content_part_to_openai)
            .collect::<Vec<_>>()
            .into(),
    };

    let mut obj = serde_json::Map::new();
    obj.insert("role".into(), role.into());
    obj.insert("content".into(), content);
    if let Some(ref id) = msg.tool_call_id {
        obj.insert("tool_call_id".into(), id.clone().into());
    }
    if let Some(ref name) = msg.name {
        obj.insert("name".into(), name.clone().into());
    }
    serde_json::Value::Object(obj)
}

// Chat Completions response types (internal)

#[derive(Deserialize)]
pub(crate) struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
    #[serde(default)]
    logprobs: Option<OpenAiLogprobs>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiLogprobs {
    content: Option<Vec<OpenAiTokenLogprob>>,
}

#[derive(Deserialize)]
struct OpenAiTokenLogprob {
    token: String,
    logprob: f64,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
