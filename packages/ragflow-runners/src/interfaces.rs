//! External interfaces (§6): the seams this crate depends on but never
//! implements concretely. Each is a thin `async_trait`; production drivers
//! (a real vector database client, a real full-text engine, a real
//! embedding/completion/rerank SDK) live outside this workspace and are
//! plugged in by whoever assembles a `Collection`.

use async_trait::async_trait;
use ragflow_core::{DocumentWithScore, Result};
use ragflow_engine::TokenStream;

/// Embeds text into vectors for a specific, fixed-dimension model.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts, preserving order: `result[i]` corresponds
    /// to `texts[i]`.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The model's output dimension, used to validate/cache per-collection
    /// embedding configuration (§5's per-provider dimension cache).
    fn dimension(&self) -> usize;

    /// Upper bound on how many texts may be embedded in one underlying
    /// call; the fan-out primitive splits larger batches at this size.
    fn max_batch_size(&self) -> usize {
        16
    }
}

/// A nearest-neighbor vector index over one or more named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Search `collection` for the `top_k` nearest neighbors of `vector`
    /// scoring at or above `score_threshold`. When `indexer_filter` is
    /// `Some`, only chunks whose `indexer` metadata field matches one of
    /// the given values, OR whose `indexer` field is absent entirely
    /// (the backward-compatibility disjunction of §6), are returned.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: f64,
        indexer_filter: Option<&[String]>,
    ) -> Result<Vec<DocumentWithScore>>;
}

/// A full-text/keyword index over one or more named indices.
#[async_trait]
pub trait FullTextIndex: Send + Sync {
    /// True once `index` has been created; used to no-op gracefully
    /// rather than error when a collection has no full-text index yet.
    async fn exists(&self, index: &str) -> Result<bool>;

    /// Tokenize `text` using the index's configured analyzer, filtering
    /// out stop words, and deduplicating tokens.
    async fn analyze(&self, index: &str, text: &str) -> Result<Vec<String>>;

    /// Best-fields boolean match over `keywords` with `minimum_should_match`
    /// around 80%, sorted by score descending, capped at `top_k`.
    async fn search(&self, index: &str, keywords: &[String], top_k: usize) -> Result<Vec<DocumentWithScore>>;
}

/// A hybrid knowledge-graph/vector backend, queried for a single
/// already-assembled context block rather than a ranked document list.
#[async_trait]
pub trait KnowledgeGraphStore: Send + Sync {
    async fn query(&self, query: &str, top_k: usize) -> Result<Option<String>>;
}

/// A cross-encoder reranking service.
#[async_trait]
pub trait RerankService: Send + Sync {
    /// Returns a permutation of `0..documents.len()`: the new order the
    /// documents should be placed in, most relevant first. Indices outside
    /// `0..documents.len()` may be present in a faulty response; callers
    /// must not assume the response is well-formed.
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<usize>>;
}

/// A chat-completion backend capable of streaming tokens.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// `history` is a list of (role, content) turns already trimmed to the
    /// caller's memory budget. `max_tokens` bounds the generated
    /// completion length.
    async fn stream(
        &self,
        history: Vec<(String, String)>,
        prompt: String,
        max_tokens: usize,
    ) -> Result<TokenStream>;
}
