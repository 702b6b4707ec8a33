//! The `Collection` capability bundle (Design Notes: "thin `Collection`
//! capability that bundles `{embedding, vector_index, fulltext_index,
//! graph?}`"), replacing the source's circular vector-store/embedding-service
//! dependency with a single value threaded through `SystemInput`.

use std::sync::Arc;

use crate::interfaces::{EmbeddingService, FullTextIndex, KnowledgeGraphStore, VectorStore};

/// Everything a retrieval node runner needs to search one document
/// collection, bundled so runners never reach for a global registry of
/// collections keyed by id.
#[derive(Clone)]
pub struct Collection {
    pub id: String,
    pub vector_collection_name: String,
    pub fulltext_index_name: String,
    pub embedding: Arc<dyn EmbeddingService>,
    pub vector_store: Arc<dyn VectorStore>,
    pub fulltext_index: Arc<dyn FullTextIndex>,
    pub graph_store: Option<Arc<dyn KnowledgeGraphStore>>,
    /// Mirrors the source's `enable_knowledge_graph` collection-config flag;
    /// `graph_search` treats a collection with the capability disabled the
    /// same as one with no `graph_store` at all.
    pub knowledge_graph_enabled: bool,
}

impl Collection {
    pub fn new(
        id: impl Into<String>,
        vector_collection_name: impl Into<String>,
        fulltext_index_name: impl Into<String>,
        embedding: Arc<dyn EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        fulltext_index: Arc<dyn FullTextIndex>,
    ) -> Self {
        Self {
            id: id.into(),
            vector_collection_name: vector_collection_name.into(),
            fulltext_index_name: fulltext_index_name.into(),
            embedding,
            vector_store,
            fulltext_index,
            graph_store: None,
            knowledge_graph_enabled: false,
        }
    }

    pub fn with_graph_store(mut self, store: Arc<dyn KnowledgeGraphStore>) -> Self {
        self.graph_store = Some(store);
        self.knowledge_graph_enabled = true;
        self
    }
}

/// Looks up a `Collection` by id. A flow's `collection_ids` input names
/// collections this way; the first lookup hit is used, mirroring the
/// source's `collection_ids[0]` convention (§4.6 runners only ever read the
/// first id of a multi-id field).
pub trait CollectionResolver: Send + Sync {
    fn resolve(&self, collection_id: &str) -> Option<Collection>;
}
