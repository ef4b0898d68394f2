//! Conversation message shapes exchanged with the LLM (spec.md §3 "Message",
//! §4.3 context assembly).

use crate::{MessageRole, ToolCallId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One block within a message's content. A message can mix text, a tool
/// invocation request, and a tool result in a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse {
        id: ToolCallId,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: ToolCallId,
        content: String,
        is_error: bool,
    },
    /// Base64 image payload, capped by `max_image_data_chars` (spec.md §6).
    Image { media_type: String, data: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(id: ToolCallId, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            id,
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: ToolCallId, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            tool_use_id,
            content: content.into(),
            is_error,
        }
    }

    /// Approximate character length for token-budget accounting.
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text { text } => text.len(),
            Self::ToolUse { input, .. } => input.to_string().len(),
            Self::ToolResult { content, .. } => content.len(),
            Self::Image { data, .. } => data.len(),
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    pub fn tool_use_id(&self) -> Option<ToolCallId> {
        match self {
            Self::ToolUse { id, .. } => Some(*id),
            Self::ToolResult { tool_use_id, .. } => Some(*tool_use_id),
            _ => None,
        }
    }
}

/// A single turn in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    /// Total character footprint of every content block, used by the context
    /// manager's 4-chars-per-token estimator (spec.md §4.3).
    pub fn char_len(&self) -> usize {
        self.content.iter().map(ContentBlock::char_len).sum()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_use)
    }

    pub fn tool_use_ids(&self) -> Vec<ToolCallId> {
        self.content
            .iter()
            .filter(|b| b.is_tool_use())
            .filter_map(ContentBlock::tool_use_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;

    #[test]
    fn user_message_is_a_single_text_block() {
        let msg = ConversationMessage::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content.len(), 1);
        assert_eq!(msg.char_len(), 5);
    }

    #[test]
    fn tool_use_ids_collects_only_tool_use_blocks() {
        let id = ToolCallId::now_v7();
        let msg = ConversationMessage::assistant(vec![
            ContentBlock::text("thinking"),
            ContentBlock::tool_use(id, "read_file", serde_json::json!({"path": "a.rs"})),
        ]);
        assert!(msg.has_tool_use());
        assert_eq!(msg.tool_use_ids(), vec![id]);
    }
}
