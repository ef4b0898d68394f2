//! PAI Context - the Context Manager & Summarizer (spec.md §2 row J, §4.3).
//!
//! Enforces token budgets on conversation history via safe truncation and
//! LLM-based summarization, preserving the invariant that `tool_use`/
//! `tool_result` pairs are never split (spec.md §5 "Ordering guarantees").

use pai_core::{
    estimate_tokens, ChatRequest, ContentBlock, ContextConfig, ContextError, ConversationMessage,
    LlmClient, MessageRole, ModelTier, PaiError, PaiResult, SummarizationProvider, SummarizeConfig,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Token-budgeted compactor over a conversation's message history.
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Approximate token count of the whole history using the spec's
    /// 4-chars-per-token rule (spec.md §4.3).
    pub fn estimate_tokens(&self, history: &[ConversationMessage]) -> i32 {
        history.iter().map(|m| estimate_tokens(&flatten_text(m))).sum()
    }

    /// True once either the message-count or token-estimate trigger fires.
    pub fn needs_compaction(&self, history: &[ConversationMessage]) -> bool {
        history.len() > self.config.summarize_trigger_messages
            || self.estimate_tokens(history) > self.config.summarize_trigger_tokens
    }

    /// Find the latest index `<= preferred` such that truncating to
    /// `history[i..]` never splits a `tool_use`/`tool_result` pair: every
    /// `tool_result` kept in `history[i..]` must have its matching
    /// `tool_use` also in `history[i..]`.
    pub fn safe_truncation_point(&self, history: &[ConversationMessage], preferred: usize) -> PaiResult<usize> {
        let preferred = preferred.min(history.len());
        for candidate in (0..=preferred).rev() {
            if Self::is_safe_boundary(history, candidate) {
                return Ok(candidate);
            }
        }
        Err(PaiError::Context(ContextError::NoSafeTruncationPoint { len: history.len() }))
    }

    /// `boundary` is safe when no `tool_result` kept at or after it refers to
    /// a `tool_use` that would be dropped before it.
    fn is_safe_boundary(history: &[ConversationMessage], boundary: usize) -> bool {
        let tool_uses_before: HashSet<_> = history[..boundary].iter().flat_map(|m| m.tool_use_ids()).collect();

        !history[boundary..].iter().any(|m| {
            m.content.iter().any(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => tool_uses_before.contains(tool_use_id),
                _ => false,
            })
        })
    }

    /// Compact history in place: summarize everything but the retained tail
    /// via `summarizer`, falling back to an extractive summary if the LLM
    /// call fails. Then enforce the hard message cap.
    pub async fn compact(
        &self,
        history: Vec<ConversationMessage>,
        summarizer: &dyn SummarizationProvider,
    ) -> PaiResult<Vec<ConversationMessage>> {
        if !self.needs_compaction(&history) {
            return self.enforce_hard_cap(history);
        }

        let preferred_cut = history.len().saturating_sub(self.config.retained_recent_messages);
        let cut = self.safe_truncation_point(&history, preferred_cut)?;
        let (older, recent) = history.split_at(cut);
        if older.is_empty() {
            return self.enforce_hard_cap(history);
        }

        let summary_config = SummarizeConfig::default();
        let summary_text = match summarizer.summarize(&render_for_summary(older), &summary_config).await {
            Ok(text) => text,
            Err(_) => self.extractive_summary(older),
        };

        let mut compacted = Vec::with_capacity(recent.len() + 1);
        compacted.push(ConversationMessage {
            role: MessageRole::User,
            content: vec![ContentBlock::text(format!("[Conversation summary]\n{summary_text}"))],
        });
        compacted.extend_from_slice(recent);

        self.enforce_hard_cap(compacted)
    }

    /// Drop oldest messages (at a safe boundary) until the hard cap holds,
    /// regardless of whether summarization already ran.
    pub fn enforce_hard_cap(&self, mut history: Vec<ConversationMessage>) -> PaiResult<Vec<ConversationMessage>> {
        if history.len() <= self.config.hard_history_cap_messages {
            return Ok(history);
        }
        let preferred_cut = history.len() - self.config.hard_history_cap_messages;
        let cut = self.safe_truncation_point(&history, preferred_cut)?;
        history.drain(..cut);
        Ok(history)
    }

    /// Deterministic fallback summary when the LLM summarizer is unavailable
    /// (spec.md §4.3 extractive fallback): enumerate user requests and tool
    /// names rather than fabricating prose.
    pub fn extractive_summary(&self, messages: &[ConversationMessage]) -> String {
        let mut requests = Vec::new();
        let mut tools = std::collections::BTreeSet::new();

        for message in messages {
            if message.role == MessageRole::User {
                for block in &message.content {
                    if let ContentBlock::Text { text } = block {
                        requests.push(text.clone());
                    }
                }
            }
            for block in &message.content {
                if let ContentBlock::ToolUse { name, .. } = block {
                    tools.insert(name.clone());
                }
            }
        }

        let mut out = String::new();
        if !requests.is_empty() {
            out.push_str("User requests: ");
            out.push_str(&requests.join("; "));
        }
        if !tools.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Tools used: ");
            out.push_str(&tools.into_iter().collect::<Vec<_>>().join(", "));
        }
        if out.is_empty() {
            out.push_str("No notable user requests or tool calls in this span.");
        }
        out
    }

    /// Truncate an oversized tool-result string, returning whether it was
    /// truncated (spec.md §6 `max_tool_result_chars`).
    pub fn truncate_tool_result(&self, content: &str) -> (String, bool) {
        truncate_with_marker(content, self.config.max_tool_result_chars)
    }

    /// Truncate an oversized base64 image payload (spec.md §6 `max_image_data_chars`).
    pub fn truncate_image_data(&self, data: &str) -> (String, bool) {
        truncate_with_marker(data, self.config.max_image_data_chars)
    }
}

fn truncate_with_marker(content: &str, max_chars: usize) -> (String, bool) {
    if content.len() <= max_chars {
        return (content.to_string(), false);
    }
    let boundary = content
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_chars)
        .last()
        .unwrap_or(0);
    let mut truncated = content[..boundary].to_string();
    truncated.push_str(&format!("\n...[truncated, {} total chars]", content.len()));
    (truncated, true)
}

fn flatten_text(message: &ConversationMessage) -> String {
    message
        .content
        .iter()
        .map(|b| match b {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::ToolUse { name, input, .. } => format!("{name}({input})"),
            ContentBlock::ToolResult { content, .. } => content.clone(),
            ContentBlock::Image { .. } => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_for_summary(messages: &[ConversationMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{:?}: {}", m.role, flatten_text(m)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarizer used where the tests need a real `SummarizationProvider` but
/// aren't exercising a specific vendor's summarization behavior.
pub struct EchoSummarizer;

#[async_trait::async_trait]
impl SummarizationProvider for EchoSummarizer {
    async fn summarize(&self, content: &str, _config: &SummarizeConfig) -> PaiResult<String> {
        Ok(format!("Summary of {} chars of history.", content.len()))
    }
}

/// Production summarizer (spec.md §4.3 "LLM-based summarization"): asks the
/// injected `LlmClient` for a summary at `ModelTier::Fast`, the cheapest tier
/// since compaction runs on every oversized turn rather than on demand.
pub struct LlmBackedSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmBackedSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait::async_trait]
impl SummarizationProvider for LlmBackedSummarizer {
    async fn summarize(&self, content: &str, config: &SummarizeConfig) -> PaiResult<String> {
        let prompt = format!(
            "Summarize the following conversation history in {}-{} words, {:?} style. Preserve decisions, open questions, and file paths mentioned. Conversation:\n\n{content}",
            config.min_words, config.max_words, config.style,
        );
        let response = self
            .llm
            .create_message(ChatRequest {
                model_tier: ModelTier::Fast,
                messages: vec![ConversationMessage::user(prompt)],
                tools: None,
                system: None,
                max_tokens: None,
            })
            .await?;
        Ok(flatten_text(&response.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_core::{EntityIdType, ToolCallId};

    fn manager() -> ContextManager {
        ContextManager::new(ContextConfig::default())
    }

    fn tool_pair(id: ToolCallId) -> (ConversationMessage, ConversationMessage) {
        let use_msg = ConversationMessage::assistant(vec![ContentBlock::tool_use(
            id,
            "read_file",
            serde_json::json!({"path": "a.rs"}),
        )]);
        let result_msg = ConversationMessage {
            role: MessageRole::User,
            content: vec![ContentBlock::tool_result(id, "contents", false)],
        };
        (use_msg, result_msg)
    }

    #[test]
    fn safe_truncation_point_never_splits_a_tool_pair() {
        let manager = manager();
        let id = ToolCallId::now_v7();
        let (use_msg, result_msg) = tool_pair(id);
        let history =
            vec![ConversationMessage::user("go"), use_msg, result_msg, ConversationMessage::user("thanks")];

        // Preferring to cut right between the tool_use and tool_result must
        // back off to a safe boundary instead.
        let cut = manager.safe_truncation_point(&history, 2).unwrap();
        assert!(cut <= 1);
    }

    #[test]
    fn safe_boundary_at_zero_or_len_is_always_safe() {
        let manager = manager();
        let history = vec![ConversationMessage::user("hi")];
        assert_eq!(manager.safe_truncation_point(&history, 0).unwrap(), 0);
        assert_eq!(manager.safe_truncation_point(&history, 1).unwrap(), 1);
    }

    #[test]
    fn needs_compaction_triggers_on_message_count() {
        let manager = manager();
        let history: Vec<_> = (0..25).map(|i| ConversationMessage::user(format!("msg {i}"))).collect();
        assert!(manager.needs_compaction(&history));
    }

    #[tokio::test]
    async fn compact_summarizes_older_messages_and_keeps_tail() {
        let manager = manager();
        let history: Vec<_> = (0..30).map(|i| ConversationMessage::user(format!("msg {i}"))).collect();
        let compacted = manager.compact(history, &EchoSummarizer).await.unwrap();
        assert!(compacted.len() <= manager.config().hard_history_cap_messages);
        assert!(matches!(&compacted[0].content[0], ContentBlock::Text { text } if text.contains("Summary")));
    }

    #[tokio::test]
    async fn compact_preserves_tool_pairs_across_the_cut() {
        let manager = manager();
        let id = ToolCallId::now_v7();
        let (use_msg, result_msg) = tool_pair(id);
        let mut history: Vec<_> = (0..26).map(|i| ConversationMessage::user(format!("msg {i}"))).collect();
        history.push(use_msg);
        history.push(result_msg);

        let compacted = manager.compact(history, &EchoSummarizer).await.unwrap();
        let tool_uses: HashSet<_> = compacted.iter().flat_map(|m| m.tool_use_ids()).collect();
        let orphaned = compacted.iter().any(|m| {
            m.content.iter().any(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => !tool_uses.contains(tool_use_id),
                _ => false,
            })
        });
        assert!(!orphaned);
    }

    #[test]
    fn extractive_summary_lists_requests_and_tools() {
        let manager = manager();
        let id = ToolCallId::now_v7();
        let (use_msg, _) = tool_pair(id);
        let history = vec![ConversationMessage::user("fix the bug"), use_msg];
        let summary = manager.extractive_summary(&history);
        assert!(summary.contains("fix the bug"));
        assert!(summary.contains("read_file"));
    }

    #[test]
    fn truncate_tool_result_marks_truncation() {
        let manager = manager();
        let huge = "x".repeat(manager.config().max_tool_result_chars + 100);
        let (truncated, was_truncated) = manager.truncate_tool_result(&huge);
        assert!(was_truncated);
        assert!(truncated.len() < huge.len());
    }

    #[test]
    fn truncate_tool_result_is_noop_under_budget() {
        let manager = manager();
        let (out, was_truncated) = manager.truncate_tool_result("short");
        assert!(!was_truncated);
        assert_eq!(out, "short");
    }
}
