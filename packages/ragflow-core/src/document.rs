//! Retrieved-document representation shared by every retrieval node runner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which recall path produced a `DocumentWithScore`. Stored under the
/// `recall_type` metadata key as its serialized string, so callers can
/// match exhaustively instead of comparing free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallType {
    Vector,
    Keyword,
    Fulltext,
    Summary,
    Graph,
}

impl RecallType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecallType::Vector => "vector_search",
            RecallType::Keyword => "keyword_search",
            RecallType::Fulltext => "fulltext_search",
            RecallType::Summary => "summary_search",
            RecallType::Graph => "graph_search",
        }
    }
}

/// A scored document (or document chunk) as produced by a retrieval node.
///
/// `text` is optional because the engine never treats an empty-text
/// document as invalid on its own — downstream packing simply contributes
/// nothing for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentWithScore {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentWithScore {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: Some(text.into()),
            score,
            metadata: Map::new(),
        }
    }

    pub fn tagged(mut self, recall_type: RecallType) -> Self {
        self.metadata
            .insert("recall_type".to_string(), Value::String(recall_type.as_str().to_string()));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.metadata.get("url").and_then(Value::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_sets_recall_type_metadata() {
        let doc = DocumentWithScore::new("hello", 0.9).tagged(RecallType::Vector);
        assert_eq!(
            doc.metadata.get("recall_type").and_then(Value::as_str),
            Some("vector_search")
        );
    }

    #[test]
    fn url_and_source_read_from_metadata() {
        let doc = DocumentWithScore::new("hello", 0.5)
            .with_metadata("url", Value::String("https://example.com".into()))
            .with_metadata("source", Value::String("doc.md".into()));
        assert_eq!(doc.url(), Some("https://example.com"));
        assert_eq!(doc.source(), Some("doc.md"));
    }
}
