//! Local reference drivers for the external interfaces of spec.md §6.
//!
//! spec.md §1 puts concrete vector-store / full-text / model-provider SDKs
//! deliberately out of scope for the core; this module is what lets
//! `ragflow-cli` still be a runnable binary without pulling one in. It is
//! a fixture, not a production backend: embeddings are a deterministic hash
//! rather than a real model, search is a brute-force in-process scan, and
//! completion echoes its prompt back token by token. A real deployment
//! swaps every type in this file for one backed by an actual vector
//! database, search engine, and model provider, without touching
//! `ragflow-core`, `ragflow-engine`, `ragflow-runners`, or `ragflow-pipeline`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ragflow_core::{DocumentWithScore, FlowError, Result};
use ragflow_engine::TokenStream;
use ragflow_runners::{Collection, CollectionResolver, CompletionService, EmbeddingService, FullTextIndex, LlmCompletionResolver, RerankService, VectorStore};
use serde::Deserialize;
use serde_json::Map;

/// Hashes `text` into a deterministic unit vector of `dimension` floats.
/// Stands in for a real embedding model: same input always yields the same
/// vector, and unrelated inputs are (with overwhelming likelihood) not
/// parallel, which is all the retrieval primitives built on top require.
fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut v = vec![0f32; dimension.max(1)];
    for (i, token) in text.split_whitespace().enumerate() {
        let mut hash: u64 = 1469598103934665603; // FNV offset basis
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        let bucket = (hash as usize).wrapping_add(i) % v.len();
        let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot as f64
}

/// A deterministic stand-in `EmbeddingService`; see module docs.
pub struct FixtureEmbeddingService {
    dimension: usize,
}

impl FixtureEmbeddingService {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingService for FixtureEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(FlowError::EmptyInput("embed_documents".to_string()));
        }
        Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

struct IndexedVector {
    vector: Vec<f32>,
    doc: DocumentWithScore,
}

/// A brute-force, in-process `VectorStore`: every `search` is a full scan
/// over whichever collection's vectors were loaded at startup.
#[derive(Default)]
pub struct FixtureVectorStore {
    collections: DashMap<String, Vec<IndexedVector>>,
}

impl FixtureVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, collection: &str, vector: Vec<f32>, doc: DocumentWithScore) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(IndexedVector { vector, doc });
    }
}

#[async_trait]
impl VectorStore for FixtureVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        score_threshold: f64,
        indexer_filter: Option<&[String]>,
    ) -> Result<Vec<DocumentWithScore>> {
        let Some(entries) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<DocumentWithScore> = entries
            .iter()
            .filter(|entry| match indexer_filter {
                None => true,
                Some(allowed) => match entry.doc.metadata.get("indexer").and_then(|v| v.as_str()) {
                    Some(indexer) => allowed.iter().any(|a| a == indexer),
                    None => true,
                },
            })
            .map(|entry| {
                let mut doc = entry.doc.clone();
                doc.score = cosine(vector, &entry.vector);
                doc
            })
            .filter(|doc| doc.score >= score_threshold)
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

const STOP_WORDS: &[&str] = &["a", "an", "the", "is", "are", "of", "to", "and", "in", "on", "for", "what", "how"];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

struct IndexedText {
    tokens: Vec<String>,
    doc: DocumentWithScore,
}

/// A naive in-process `FullTextIndex`: tokenizes by splitting on
/// non-alphanumeric characters and scores by token-overlap count.
#[derive(Default)]
pub struct FixtureFullTextIndex {
    indices: DashMap<String, Vec<IndexedText>>,
}

impl FixtureFullTextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, index: &str, doc: DocumentWithScore) {
        let tokens = tokenize(doc.text_or_empty());
        self.indices.entry(index.to_string()).or_default().push(IndexedText { tokens, doc });
    }
}

#[async_trait]
impl FullTextIndex for FixtureFullTextIndex {
    async fn exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.contains_key(index))
    }

    async fn analyze(&self, _index: &str, text: &str) -> Result<Vec<String>> {
        let mut tokens = tokenize(text);
        tokens.sort();
        tokens.dedup();
        Ok(tokens)
    }

    async fn search(&self, index: &str, keywords: &[String], top_k: usize) -> Result<Vec<DocumentWithScore>> {
        let Some(entries) = self.indices.get(index) else {
            return Ok(Vec::new());
        };
        let needed = ((keywords.len() as f64) * 0.8).ceil().max(1.0) as usize;
        let mut scored: Vec<DocumentWithScore> = entries
            .iter()
            .filter_map(|entry| {
                let hits = keywords.iter().filter(|k| entry.tokens.contains(k)).count();
                (hits >= needed.min(keywords.len().max(1))).then(|| {
                    let mut doc = entry.doc.clone();
                    doc.score = hits as f64 / keywords.len().max(1) as f64;
                    doc
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Returns candidates in their existing score order, unchanged; stands in
/// for a real cross-encoder rerank service.
pub struct FixtureRerankService;

#[async_trait]
impl RerankService for FixtureRerankService {
    async fn rerank(&self, _query: &str, documents: &[String]) -> Result<Vec<usize>> {
        Ok((0..documents.len()).collect())
    }
}

/// Echoes its prompt back, one whitespace-delimited token at a time; stands
/// in for a real streaming completion provider.
pub struct FixtureCompletionService;

#[async_trait]
impl CompletionService for FixtureCompletionService {
    async fn stream(&self, _history: Vec<(String, String)>, prompt: String, max_tokens: usize) -> Result<TokenStream> {
        let words: Vec<Result<String>> = prompt
            .split_whitespace()
            .take(max_tokens.max(1))
            .map(|w| Ok(format!("{w} ")))
            .collect();
        Ok(Box::pin(futures::stream::iter(words)))
    }
}

/// Resolves every `(provider, model)` pair to the one fixture completion
/// service; a real deployment dispatches by provider/model to distinct SDK
/// clients instead.
pub struct FixtureCompletionResolver;

impl LlmCompletionResolver for FixtureCompletionResolver {
    fn resolve(&self, _provider: &str, _model: &str) -> Option<Arc<dyn CompletionService>> {
        Some(Arc::new(FixtureCompletionService))
    }
}

#[derive(Debug, Deserialize)]
struct FixtureDocument {
    text: String,
    #[serde(default)]
    metadata: Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FixtureCollectionConfig {
    id: String,
    #[serde(default)]
    documents: Vec<FixtureDocument>,
    #[serde(default)]
    knowledge_graph_context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FixtureConfig {
    collections: Vec<FixtureCollectionConfig>,
}

/// Returns the single, fixed knowledge-graph context block configured for
/// a collection, mirroring `KnowledgeGraphStore::query`'s "one already
/// assembled context block" contract (spec.md §4.6.4).
pub struct FixtureGraphStore {
    context: String,
}

#[async_trait]
impl ragflow_runners::KnowledgeGraphStore for FixtureGraphStore {
    async fn query(&self, _query: &str, _top_k: usize) -> Result<Option<String>> {
        Ok(Some(self.context.clone()))
    }
}

/// Resolves collection ids to `Collection`s built at startup from a JSON
/// fixture file: `{"collections": [{"id": ..., "documents": [{"text",
/// "metadata"}], "knowledge_graph_context": "..."}]}`. Every document is
/// embedded once, eagerly, at load time.
pub struct FixtureCollectionResolver {
    collections: HashMap<String, Collection>,
}

impl FixtureCollectionResolver {
    /// Loads `path` and builds one shared vector/full-text backend plus one
    /// `Collection` per configured entry, embedding every document eagerly.
    pub fn load(path: impl AsRef<Path>, embedding_dimension: usize) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("reading collections config {}: {e}", path.as_ref().display()))?;
        let config: FixtureConfig = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing collections config {}: {e}", path.as_ref().display()))?;

        let vector_store = Arc::new(FixtureVectorStore::new());
        let fulltext_index = Arc::new(FixtureFullTextIndex::new());
        let embedding: Arc<dyn EmbeddingService> = Arc::new(FixtureEmbeddingService::new(embedding_dimension));

        let mut collections = HashMap::new();
        for entry in config.collections {
            let vector_collection_name = format!("{}-vectors", entry.id);
            let fulltext_index_name = format!("{}-fulltext", entry.id);

            for raw_doc in &entry.documents {
                let doc = DocumentWithScore {
                    text: Some(raw_doc.text.clone()),
                    score: 0.0,
                    metadata: raw_doc.metadata.clone(),
                };
                let vector = hash_embed(&raw_doc.text, embedding_dimension);
                vector_store.index(&vector_collection_name, vector, doc.clone());
                fulltext_index.index(&fulltext_index_name, doc);
            }

            let mut collection = Collection::new(
                entry.id.clone(),
                vector_collection_name,
                fulltext_index_name,
                embedding.clone(),
                vector_store.clone() as Arc<dyn VectorStore>,
                fulltext_index.clone() as Arc<dyn FullTextIndex>,
            );
            if let Some(context) = entry.knowledge_graph_context {
                collection = collection.with_graph_store(Arc::new(FixtureGraphStore { context }));
            }
            collections.insert(entry.id, collection);
        }

        Ok(Self { collections })
    }
}

impl CollectionResolver for FixtureCollectionResolver {
    fn resolve(&self, collection_id: &str) -> Option<Collection> {
        self.collections.get(collection_id).cloned()
    }
}
