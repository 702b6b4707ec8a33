//! The `vector_search` node (spec §4.6.1): embed the query, then search one
//! collection's vector index for nearest neighbours at or above a score
//! threshold.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::{RecallType, Result};
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

use crate::collection::CollectionResolver;
use crate::retrieval::embed_query;
use crate::runners::common::{docs_outcome, empty_docs_outcome, first_collection_id, input_f64, input_str, input_u64};

pub struct VectorSearchRunner {
    resolver: Arc<dyn CollectionResolver>,
}

impl VectorSearchRunner {
    pub fn new(resolver: Arc<dyn CollectionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl NodeRunner for VectorSearchRunner {
    fn type_key(&self) -> &str {
        "vector_search"
    }

    async fn run(&self, inputs: HashMap<String, Value>, _system: &SystemInput) -> Result<RunOutcome> {
        let Some(collection_id) = first_collection_id(&inputs) else {
            return Ok(empty_docs_outcome());
        };
        let Some(collection) = self.resolver.resolve(&collection_id) else {
            return Ok(empty_docs_outcome());
        };

        let top_k = input_u64(&inputs, "top_k", 5) as usize;
        let threshold = input_f64(&inputs, "similarity_threshold", 0.7);
        let query = input_str(&inputs, "query");

        let vector = embed_query(collection.embedding.as_ref(), query).await?;
        let hits = collection
            .vector_store
            .search(&collection.vector_collection_name, &vector, top_k, threshold, None)
            .await?;
        let docs = hits.into_iter().map(|d| d.tagged(RecallType::Vector)).collect();
        docs_outcome(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::interfaces::{EmbeddingService, VectorStore};
    use ragflow_core::DocumentWithScore;
    use serde_json::json;

    struct FakeEmbedder;
    #[async_trait]
    impl EmbeddingService for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct FakeVectorStore;
    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            top_k: usize,
            _threshold: f64,
            _filter: Option<&[String]>,
        ) -> Result<Vec<DocumentWithScore>> {
            Ok((0..top_k.min(2)).map(|i| DocumentWithScore::new(format!("doc{i}"), 0.9)).collect())
        }
    }

    struct NoFulltext;
    #[async_trait]
    impl crate::interfaces::FullTextIndex for NoFulltext {
        async fn exists(&self, _index: &str) -> Result<bool> {
            Ok(false)
        }
        async fn analyze(&self, _index: &str, _text: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn search(&self, _index: &str, _keywords: &[String], _top_k: usize) -> Result<Vec<DocumentWithScore>> {
            Ok(vec![])
        }
    }

    struct OneCollection(Collection);
    impl CollectionResolver for OneCollection {
        fn resolve(&self, collection_id: &str) -> Option<Collection> {
            (collection_id == self.0.id).then(|| self.0.clone())
        }
    }

    fn collection() -> Collection {
        Collection::new(
            "c1",
            "c1_vectors",
            "c1_fulltext",
            Arc::new(FakeEmbedder),
            Arc::new(FakeVectorStore),
            Arc::new(NoFulltext),
        )
    }

    #[tokio::test]
    async fn tags_results_with_vector_recall_type() {
        let runner = VectorSearchRunner::new(Arc::new(OneCollection(collection())));
        let inputs = HashMap::from([
            ("query".to_string(), json!("hello")),
            ("collection_ids".to_string(), json!(["c1"])),
            ("top_k".to_string(), json!(2)),
        ]);
        let system = SystemInput::new("u", "m", "hello");
        let outcome = runner.run(inputs, &system).await.unwrap();
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get("recall_type").unwrap(), "vector_search");
    }

    #[tokio::test]
    async fn empty_collection_ids_returns_no_docs() {
        let runner = VectorSearchRunner::new(Arc::new(OneCollection(collection())));
        let inputs = HashMap::from([("query".to_string(), json!("hello"))]);
        let system = SystemInput::new("u", "m", "hello");
        let outcome = runner.run(inputs, &system).await.unwrap();
        assert_eq!(outcome.values()["docs"], json!([]));
    }

    #[tokio::test]
    async fn unknown_collection_returns_no_docs() {
        let runner = VectorSearchRunner::new(Arc::new(OneCollection(collection())));
        let inputs = HashMap::from([
            ("query".to_string(), json!("hello")),
            ("collection_ids".to_string(), json!(["missing"])),
        ]);
        let system = SystemInput::new("u", "m", "hello");
        let outcome = runner.run(inputs, &system).await.unwrap();
        assert_eq!(outcome.values()["docs"], json!([]));
    }
}
