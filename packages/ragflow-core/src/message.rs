//! Conversation message and retrieval provenance, persisted by the
//! Streaming Query Pipeline after each turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentWithScore;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Human,
    Ai,
}

/// The exact retrieval/generation configuration in effect when a turn's
/// answer was produced, persisted alongside the message so a past answer
/// can be explained or reproduced later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub collection_id: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub score_threshold: f64,
    pub top_k: usize,
    pub completion_model: String,
    pub prompt_template: String,
    pub context_window: usize,
}

/// One turn of a conversation: a human message, and (once generation
/// completes) the AI's response plus the supporting context it was given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub role: MessageRole,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub references: Vec<DocumentWithScore>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub provenance: Option<Provenance>,
}

impl ConversationMessage {
    pub fn human(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::Human,
            query: query.into(),
            timestamp: Utc::now(),
            response: None,
            references: Vec::new(),
            urls: Vec::new(),
            provenance: None,
        }
    }

    pub fn ai(
        id: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
        references: Vec<DocumentWithScore>,
        urls: Vec<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: id.into(),
            role: MessageRole::Ai,
            query: query.into(),
            timestamp: Utc::now(),
            response: Some(response.into()),
            references,
            urls,
            provenance: Some(provenance),
        }
    }
}
