//! Bot configuration (Design Notes: "deep optional configuration blobs" →
//! explicit configuration records with every field enumerated). Every
//! field here corresponds to a key the source reads out of a free-form
//! JSON blob (`bot_config`, `llm_config`, `welcome`); here they are typed
//! and always present, with defaults matching the source's observed
//! fallbacks (`aperag/pipeline/base_pipeline.py`, `knowledge_pipeline.py`).

use serde::{Deserialize, Serialize};

/// How a turn retrieves supporting context (spec.md §4.9 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieveMode {
    Classic,
    Graph,
    Mix,
}

/// Completion model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: usize,
    pub prompt_template: String,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
}

/// Cross-encoder rerank model configuration. `None` skips the rerank node
/// entirely and uses the merged candidate list as-is (spec.md §4.9 only
/// calls rerank out for `classic` mode when candidates warrant it; the
/// source's reranker is itself optionally configured per bot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub provider: String,
    pub model: String,
}

/// One frequently-asked question surfaced in the `welcome` frame and, when
/// retrieval is empty, as a related-question suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// The bot's initial greeting and degradation copy (spec.md §4.9
/// "Degradation", §4.10 `welcome` server frame).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WelcomeConfig {
    #[serde(default)]
    pub hello: String,
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
    /// Shown verbatim as the response, skipping completion entirely, when
    /// retrieval returns no candidates.
    #[serde(default)]
    pub oops: String,
}

/// A bot's complete, explicit configuration: every field the source reads
/// from a deep optional JSON blob, enumerated (Design Notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub retrieve_mode: RetrieveMode,
    pub topk: usize,
    pub score_threshold: f64,
    pub enable_keyword_recall: bool,
    pub use_ai_memory: bool,
    pub memory_limit_count: usize,
    pub memory_limit_length: usize,
    pub context_window: usize,
    pub completion: CompletionConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rerank: Option<RerankConfig>,
    pub welcome: WelcomeConfig,
    pub enable_knowledge_graph: bool,
    /// Resolves the Open Question on related-question ownership (Design
    /// Notes / SPEC_FULL.md §9): an explicit, mode-independent flag rather
    /// than one coupled to `retrieve_mode`.
    #[serde(default)]
    pub use_related_question: bool,
    /// The independently-configured model used for related-question
    /// generation (`generate_related_question`'s own model, distinct from
    /// `completion`). Required when `use_related_question` is set.
    #[serde(default)]
    pub related_completion: Option<CompletionConfig>,
    /// Per-user daily usage ceiling (spec.md §4.10); `None` disables the
    /// check entirely.
    #[serde(default)]
    pub daily_quota: Option<u32>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            retrieve_mode: RetrieveMode::Classic,
            topk: 3,
            score_threshold: 0.5,
            enable_keyword_recall: false,
            use_ai_memory: true,
            memory_limit_count: 10,
            memory_limit_length: 0,
            context_window: 4096,
            completion: CompletionConfig {
                provider: String::new(),
                model: String::new(),
                temperature: 0.7,
                max_tokens: 1024,
                prompt_template: "{context}\n\n{query}".to_string(),
            },
            embedding: EmbeddingConfig {
                provider: String::new(),
                model: String::new(),
            },
            rerank: None,
            welcome: WelcomeConfig::default(),
            enable_knowledge_graph: false,
            use_related_question: false,
            related_completion: None,
            daily_quota: None,
        }
    }
}
