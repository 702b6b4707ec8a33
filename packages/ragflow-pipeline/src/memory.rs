//! History loading and `query_with_history` composition (spec.md §4.9 steps
//! 1-2), grounded in `aperag/pipeline/knowledge_pipeline.py::run`'s history
//! extraction: the last `memory_limit_count` human messages, newline-joined
//! and prepended to the current query, used only to widen retrieval recall
//! — the raw query is what reaches the completion prompt template.

use ragflow_core::{ConversationMessage, MessageRole, Result};
use ragflow_engine::HistoryHandle;

use crate::config::BotConfig;

/// The conversation history loaded for one turn, already capped per
/// `bot_config`.
#[derive(Debug, Clone, Default)]
pub struct LoadedHistory {
    pub messages: Vec<ConversationMessage>,
}

impl LoadedHistory {
    /// Count of `(human, ai)` turns retained, for the `stop` frame's
    /// `memoryCount` field.
    pub fn turn_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == MessageRole::Human).count()
    }
}

/// Load a conversation's history, applying the count cap
/// (`memory_limit_count`) and the character cap (`memory_limit_length`) from
/// most-recent backwards, then restoring chronological order. AI messages
/// are dropped entirely when `use_ai_memory` is false.
pub async fn load_history(handle: &dyn HistoryHandle, cfg: &BotConfig) -> Result<LoadedHistory> {
    let mut all = handle.messages().await?;
    if !cfg.use_ai_memory {
        all.retain(|m| m.role == MessageRole::Human);
    }

    let mut kept = Vec::new();
    let mut total_len = 0usize;
    for message in all.into_iter().rev() {
        if kept.len() >= cfg.memory_limit_count {
            break;
        }
        let len = message.query.len() + message.response.as_deref().map(str::len).unwrap_or(0);
        if cfg.memory_limit_length > 0 && total_len + len > cfg.memory_limit_length && !kept.is_empty() {
            break;
        }
        total_len += len;
        kept.push(message);
    }
    kept.reverse();
    Ok(LoadedHistory { messages: kept })
}

/// Compose the text actually used for retrieval: the last
/// `memory_limit_count` human messages, newline-separated, with the current
/// turn's `query` appended last (`aperag`'s `query_with_history`). The
/// current turn's raw `query` is returned unchanged for completion prompting
/// and rerank scoring.
pub fn query_with_history(history: &LoadedHistory, query: &str) -> String {
    let mut parts: Vec<&str> = history
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Human)
        .map(|m| m.query.as_str())
        .collect();
    parts.push(query);
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragflow_core::FlowError;
    use std::sync::Mutex;

    struct FixedHistory(Mutex<Vec<ConversationMessage>>);

    #[async_trait]
    impl HistoryHandle for FixedHistory {
        async fn append(&self, message: ConversationMessage) -> std::result::Result<(), FlowError> {
            self.0.lock().unwrap().push(message);
            Ok(())
        }
        async fn messages(&self) -> std::result::Result<Vec<ConversationMessage>, FlowError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    fn human(query: &str) -> ConversationMessage {
        ConversationMessage::human(format!("id-{query}"), query)
    }

    #[tokio::test]
    async fn count_cap_keeps_most_recent() {
        let handle = FixedHistory(Mutex::new(vec![human("a"), human("b"), human("c")]));
        let mut cfg = BotConfig::default();
        cfg.memory_limit_count = 2;
        let loaded = load_history(&handle, &cfg).await.unwrap();
        let queries: Vec<&str> = loaded.messages.iter().map(|m| m.query.as_str()).collect();
        assert_eq!(queries, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn ai_messages_excluded_when_use_ai_memory_false() {
        let ai = ConversationMessage::ai("id-ai", "q", "r", vec![], vec![], ragflow_core::Provenance {
            collection_id: "c".into(),
            embedding_model: "m".into(),
            embedding_dim: 1,
            score_threshold: 0.5,
            top_k: 3,
            completion_model: "m".into(),
            prompt_template: "t".into(),
            context_window: 100,
        });
        let handle = FixedHistory(Mutex::new(vec![human("a"), ai]));
        let mut cfg = BotConfig::default();
        cfg.use_ai_memory = false;
        let loaded = load_history(&handle, &cfg).await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].role, MessageRole::Human);
    }

    #[tokio::test]
    async fn character_cap_is_never_exceeded() {
        let handle = FixedHistory(Mutex::new(vec![human("aaaaaaaaaa"), human("bbbbbbbbbb")]));
        let mut cfg = BotConfig::default();
        cfg.memory_limit_count = 10;
        cfg.memory_limit_length = 12;
        let loaded = load_history(&handle, &cfg).await.unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].query, "bbbbbbbbbb");
    }

    #[test]
    fn query_with_history_appends_current_query_last() {
        let history = LoadedHistory {
            messages: vec![human("what is rust"), human("is it fast")],
        };
        let composed = query_with_history(&history, "show me an example");
        assert_eq!(composed, "what is rust\nis it fast\nshow me an example");
    }
}
