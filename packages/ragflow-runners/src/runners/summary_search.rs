//! The `summary_search` node (spec §4.6.3): vector search restricted to
//! chunks indexed as summaries, with a backward-compatibility allowance for
//! chunks that predate the `indexer` metadata field entirely.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::{RecallType, Result};
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

use crate::collection::CollectionResolver;
use crate::retrieval::embed_query;
use crate::runners::common::{docs_outcome, empty_docs_outcome, first_collection_id, input_f64, input_u64};

pub struct SummarySearchRunner {
    resolver: Arc<dyn CollectionResolver>,
}

impl SummarySearchRunner {
    pub fn new(resolver: Arc<dyn CollectionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl NodeRunner for SummarySearchRunner {
    fn type_key(&self) -> &str {
        "summary_search"
    }

    async fn run(&self, inputs: HashMap<String, Value>, system: &SystemInput) -> Result<RunOutcome> {
        let Some(collection_id) = first_collection_id(&inputs) else {
            return Ok(empty_docs_outcome());
        };
        let Some(collection) = self.resolver.resolve(&collection_id) else {
            return Ok(empty_docs_outcome());
        };

        let top_k = input_u64(&inputs, "top_k", 5) as usize;
        let threshold = input_f64(&inputs, "similarity_threshold", 0.7);

        let vector = embed_query(collection.embedding.as_ref(), &system.query).await?;
        let filter = vec!["summary".to_string()];
        let hits = collection
            .vector_store
            .search(&collection.vector_collection_name, &vector, top_k, threshold, Some(&filter))
            .await?;
        let docs = hits.into_iter().map(|d| d.tagged(RecallType::Summary)).collect();
        docs_outcome(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::interfaces::{EmbeddingService, FullTextIndex, VectorStore};
    use ragflow_core::DocumentWithScore;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeEmbedder;
    #[async_trait]
    impl EmbeddingService for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
        fn dimension(&self) -> usize {
            1
        }
    }

    struct RecordingVectorStore {
        seen_filter: Mutex<Option<Vec<String>>>,
    }
    #[async_trait]
    impl VectorStore for RecordingVectorStore {
        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            _top_k: usize,
            _threshold: f64,
            filter: Option<&[String]>,
        ) -> Result<Vec<DocumentWithScore>> {
            *self.seen_filter.lock().unwrap() = filter.map(|f| f.to_vec());
            Ok(vec![DocumentWithScore::new("summary chunk", 0.8)])
        }
    }

    struct NoFulltext;
    #[async_trait]
    impl FullTextIndex for NoFulltext {
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

    #[tokio::test]
    async fn searches_with_summary_indexer_filter_and_tags_result() {
        let store = Arc::new(RecordingVectorStore {
            seen_filter: Mutex::new(None),
        });
        let collection = Collection::new("c1", "vecs", "ft", Arc::new(FakeEmbedder), store.clone(), Arc::new(NoFulltext));
        let runner = SummarySearchRunner::new(Arc::new(OneCollection(collection)));
        let inputs = HashMap::from([("collection_ids".to_string(), json!(["c1"]))]);
        let system = SystemInput::new("u", "m", "what's the summary?");
        let outcome = runner.run(inputs, &system).await.unwrap();
        assert_eq!(store.seen_filter.lock().unwrap().as_deref(), Some(&["summary".to_string()][..]));
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs[0].metadata.get("recall_type").unwrap(), "summary_search");
    }
}
