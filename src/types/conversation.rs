//! Ordered conversation state exchanged with the completion service.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::message::{ModelMessage, Role};

/// An owned, insertion-ordered sequence of messages.
///
/// Within a turn only the active agent holds `&mut` access; at a handoff the
/// conversation is moved to the next agent rather than shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

/// Structural problems detected by [`Conversation::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationFault {
    /// A tool message has no `tool_call_id`.
    MissingToolCallId { index: usize },
    /// A tool message answers a call id no earlier assistant message issued.
    UnknownToolCallId { index: usize, tool_call_id: String },
}

impl std::fmt::Display for ConversationFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingToolCallId { index } => {
                write!(f, "tool message at {index} has no tool_call_id")
            }
            Self::UnknownToolCallId {
                index,
                tool_call_id,
            } => write!(
                f,
                "tool message at {index} references unknown call '{tool_call_id}'"
            ),
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ModelMessage>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: ModelMessage) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ModelMessage>) {
        self.messages.extend(messages);
    }

    pub fn pop(&mut self) -> Option<ModelMessage> {
        self.messages.pop()
    }

    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    pub fn remove(&mut self, index: usize) -> ModelMessage {
        self.messages.remove(index)
    }

    pub fn retain(&mut self, f: impl FnMut(&ModelMessage) -> bool) {
        self.messages.retain(f);
    }

    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ModelMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<ModelMessage> {
        self.messages
    }

    /// Text of the leading system message, if any.
    pub fn system_prompt(&self) -> Option<String> {
        self.messages
            .first()
            .filter(|m| m.is_role(Role::System))
            .map(ModelMessage::text)
    }

    /// Rewrite the leading system message, inserting one if absent.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let message = ModelMessage::system(prompt);
        match self.messages.first() {
            Some(first) if first.is_role(Role::System) => self.messages[0] = message,
            _ => self.messages.insert(0, message),
        }
    }

    /// Anchor a new persona: rewrite the system prompt and append the
    /// persona's greeting as an assistant message.
    pub fn adopt_persona(&mut self, system_prompt: &str, greeting: Option<&str>) {
        self.set_system_prompt(system_prompt);
        if let Some(greeting) = greeting {
            self.messages.push(ModelMessage::assistant(greeting));
        }
    }

    /// Index of the most recent `user` message.
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.is_role(Role::User))
    }

    /// Number of `user` messages.
    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.is_role(Role::User)).count()
    }

    /// Check that every tool message answers a tool call issued earlier.
    pub fn validate(&self) -> Result<(), ConversationFault> {
        let mut issued: HashSet<&str> = HashSet::new();
        for (index, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::Assistant => {
                    issued.extend(message.tool_calls().into_iter().map(|tc| tc.id.as_str()));
                }
                Role::Tool => {
                    let Some(id) = message.tool_call_id.as_deref() else {
                        return Err(ConversationFault::MissingToolCallId { index });
                    };
                    if !issued.contains(id) {
                        return Err(ConversationFault::UnknownToolCallId {
                            index,
                            tool_call_id: id.to_string(),
                        });
                    }
                }
                Role::System | Role::User => {}
            }
        }
        Ok(())
    }
}

impl From<Vec<ModelMessage>> for Conversation {
    fn from(messages: Vec<ModelMessage>) -> Self {
        Self::from_messages(messages)
    }
}
