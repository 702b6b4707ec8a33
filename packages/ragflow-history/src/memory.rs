//! An in-process `HistoryHandle` implementation, backed by a mutex-guarded
//! map of conversation id to message list. Used by tests and by any
//! deployment that doesn't need conversation history to outlive the
//! process.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use ragflow_core::{ConversationMessage, Result};
use ragflow_engine::HistoryHandle;

/// Owns every conversation's message list for the life of the process.
/// Call `handle` to get the `HistoryHandle` capability for one
/// conversation, the value that is threaded into `SystemInput`.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    conversations: Mutex<HashMap<String, Vec<ConversationMessage>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(self: &std::sync::Arc<Self>, conversation_id: impl Into<String>) -> InMemoryHistoryHandle {
        InMemoryHistoryHandle {
            store: self.clone(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// One conversation's view onto an `InMemoryHistoryStore`.
#[derive(Clone)]
pub struct InMemoryHistoryHandle {
    store: std::sync::Arc<InMemoryHistoryStore>,
    conversation_id: String,
}

#[async_trait]
impl HistoryHandle for InMemoryHistoryHandle {
    async fn append(&self, message: ConversationMessage) -> Result<()> {
        let mut conversations = self.store.conversations.lock().unwrap();
        conversations.entry(self.conversation_id.clone()).or_default().push(message);
        Ok(())
    }

    async fn messages(&self) -> Result<Vec<ConversationMessage>> {
        let conversations = self.store.conversations.lock().unwrap();
        Ok(conversations.get(&self.conversation_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_core::ConversationMessage;
    use std::sync::Arc;

    #[tokio::test]
    async fn append_then_read_back_in_order() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let handle = store.handle("conv-1");
        handle.append(ConversationMessage::human("m1", "hi")).await.unwrap();
        handle.append(ConversationMessage::human("m2", "again")).await.unwrap();
        let messages = handle.messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].query, "hi");
        assert_eq!(messages[1].query, "again");
    }

    #[tokio::test]
    async fn conversations_are_isolated_by_id() {
        let store = Arc::new(InMemoryHistoryStore::new());
        store.handle("a").append(ConversationMessage::human("m1", "a-msg")).await.unwrap();
        store.handle("b").append(ConversationMessage::human("m2", "b-msg")).await.unwrap();
        assert_eq!(store.handle("a").messages().await.unwrap().len(), 1);
        assert_eq!(store.handle("b").messages().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_conversation_reads_as_empty() {
        let store = Arc::new(InMemoryHistoryStore::new());
        assert!(store.handle("never-written").messages().await.unwrap().is_empty());
    }
}
