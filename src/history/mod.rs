//! Conversation retention: pruning old turns and recovering from bad rounds.
//!
//! Turns are delimited by `user` messages counted from the tail. With the
//! most recent user message counted as 1, messages whose count reaches
//! `max_question_to_keep` are dropped outright, while messages whose count is
//! within `[max_question_with_detail_hist, max_question_to_keep)` only lose
//! empty non-dialogue scaffolding (tool results with no content). A leading
//! system message is never touched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Conversation, Role};

/// Retention rules applied at the start of every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryPolicy {
    pub max_question_to_keep: usize,
    pub max_question_with_detail_hist: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_question_to_keep: 3,
            max_question_with_detail_hist: 1,
        }
    }
}

impl HistoryPolicy {
    /// Apply [`prune`] with this policy.
    pub fn apply(&self, conversation: &mut Conversation) -> usize {
        prune(
            conversation,
            self.max_question_with_detail_hist,
            self.max_question_to_keep,
        )
    }
}

/// Drop messages from old turns in place. Returns the number removed.
///
/// Running it twice with the same parameters removes nothing the second time.
pub fn prune(
    conversation: &mut Conversation,
    max_detail_turns: usize,
    max_turns_to_keep: usize,
) -> usize {
    let floor = match conversation.messages().first() {
        Some(first) if first.is_role(Role::System) => 1,
        _ => 0,
    };

    let mut question_count = 0usize;
    let mut removal: Vec<usize> = Vec::new();

    for idx in (floor..conversation.len()).rev() {
        let message = &conversation.messages()[idx];
        if message.is_role(Role::User) {
            question_count += 1;
        }

        if question_count >= max_turns_to_keep {
            removal.push(idx);
        } else if question_count >= max_detail_turns
            && !message.is_role(Role::User)
            && !message.is_role(Role::Assistant)
            && message.has_empty_content()
        {
            removal.push(idx);
        }
    }

    // Indices were collected tail-first, so removing in order keeps the
    // remaining ones valid.
    for idx in &removal {
        conversation.remove(*idx);
    }

    if !removal.is_empty() {
        debug!(removed = removal.len(), remaining = conversation.len(), "pruned history");
    }
    removal.len()
}

/// Pop messages from the tail until the most recent `user` message is last.
///
/// A conversation without any user message is left untouched.
pub fn reset_to_last_question(conversation: &mut Conversation) -> usize {
    let Some(last_user) = conversation.last_user_index() else {
        return 0;
    };
    let removed = conversation.len() - (last_user + 1);
    conversation.truncate(last_user + 1);
    removed
}
