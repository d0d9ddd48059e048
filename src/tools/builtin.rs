//! Built-in tools shared by agent profiles.
//!
//! - `get_help`: the handoff signal. Its argument becomes the reason passed to
//!   intent classification.
//! - `search_knowledge_base`: top-k lookup against an injected
//!   [`KnowledgeSearch`] collaborator.
//! - `send_rich_format_message`: acknowledges a formatted message.

use std::sync::Arc;

use async_trait::async_trait;

use super::registry::GET_HELP;
use crate::error::SwitchboardError;
use crate::tools::tool::{AgentTool, Tool, ToolOutput};
use crate::tools::types::AgentToolParameters;
use crate::types::{ContentPart, ImageContent};

const DEFAULT_TOP_K: usize = 3;

/// One knowledge-base hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    /// Related text shown as a hint next to an image hit.
    pub related_content: Option<String>,
    pub image: Option<SearchImage>,
}

/// Image attached to a hit (e.g. a page screenshot).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchImage {
    pub path: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Vector search over the ingested knowledge base.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, SwitchboardError>;
}

/// `get_help(user_request)`: echoes the request back as the handoff reason.
pub fn get_help_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        GET_HELP,
        "Hand the request to a better suited agent when it is outside your domain",
        AgentToolParameters::object()
            .string("user_request", "Summary of what the user needs", true)
            .build(),
        |args, _ctx| async move { Ok(args.get_str("user_request")?.into()) },
    ))
}

/// `send_rich_format_message(message)`.
pub fn send_rich_format_message_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "send_rich_format_message",
        "Send a message rendered with rich formatting",
        AgentToolParameters::object()
            .string("message", "Formatted message body", true)
            .build(),
        |args, _ctx| async move {
            let message = args.get_str("message")?;
            Ok(format!("Sending rich format message: {message}").into())
        },
    ))
}

/// `search_knowledge_base(question, topk = 3)`.
pub fn search_knowledge_base_tool(search: Arc<dyn KnowledgeSearch>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "search_knowledge_base",
        "Search the knowledge base and return the most relevant passages",
        AgentToolParameters::object()
            .string("question", "What to search for", true)
            .integer("topk", "Number of results", false)
            .build(),
        move |args, _ctx| {
            let search = Arc::clone(&search);
            async move {
                let question = args.get_str("question")?.to_string();
                let top_k = args
                    .get_u64_opt("topk")
                    .map(|k| k as usize)
                    .unwrap_or(DEFAULT_TOP_K);
                let hits = search.search(&question, top_k).await?;
                Ok(render_hits(hits))
            }
        },
    ))
}

/// Text-only hits become `id\ncontent` blocks; any image hit switches the
/// whole result to multi-part content.
pub fn render_hits(hits: Vec<SearchHit>) -> ToolOutput {
    if hits.iter().all(|h| h.image.is_none()) {
        let text = hits
            .iter()
            .map(|h| format!("{}\n{}", h.id, h.content))
            .collect::<Vec<_>>()
            .join("\n");
        return ToolOutput::Text(text);
    }

    let mut parts = Vec::new();
    for hit in hits {
        match hit.image {
            Some(image) => {
                parts.push(ContentPart::text(format!("file_name: {}", image.path)));
                parts.push(ContentPart::Image(ImageContent::from_bytes(
                    &image.bytes,
                    image.mime_type,
                )));
                let related = hit.related_content.unwrap_or(hit.content);
                parts.push(ContentPart::text(format!(
                    "HINT: The following kind of content might be related to this topic\n: {related}"
                )));
            }
            None => parts.push(ContentPart::text(format!("{}\n{}", hit.id, hit.content))),
        }
    }
    ToolOutput::Parts(parts)
}
