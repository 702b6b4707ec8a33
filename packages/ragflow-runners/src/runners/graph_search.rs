//! The `graph_search` node (spec §4.6.4): a hybrid knowledge-graph/vector
//! context block, returned as a single synthetic Document-With-Score rather
//! than a ranked list. A collection with the knowledge-graph capability
//! disabled is treated exactly like one with no graph store at all.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::{DocumentWithScore, RecallType, Result};
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

use crate::collection::CollectionResolver;
use crate::runners::common::{docs_outcome, empty_docs_outcome, first_collection_id, input_str, input_u64};

pub struct GraphSearchRunner {
    resolver: Arc<dyn CollectionResolver>,
}

impl GraphSearchRunner {
    pub fn new(resolver: Arc<dyn CollectionResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl NodeRunner for GraphSearchRunner {
    fn type_key(&self) -> &str {
        "graph_search"
    }

    async fn run(&self, inputs: HashMap<String, Value>, system: &SystemInput) -> Result<RunOutcome> {
        let Some(collection_id) = first_collection_id(&inputs) else {
            return Ok(empty_docs_outcome());
        };
        let Some(collection) = self.resolver.resolve(&collection_id) else {
            return Ok(empty_docs_outcome());
        };
        if !collection.knowledge_graph_enabled {
            return Ok(empty_docs_outcome());
        }
        let Some(graph_store) = &collection.graph_store else {
            return Ok(empty_docs_outcome());
        };

        let top_k = input_u64(&inputs, "top_k", 5) as usize;
        let query = input_str(&inputs, "query");
        let query = if query.is_empty() { &system.query } else { query };
        match graph_store.query(query, top_k).await? {
            Some(context) => docs_outcome(vec![DocumentWithScore::new(context, 1.0).tagged(RecallType::Graph)]),
            None => Ok(empty_docs_outcome()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::interfaces::{EmbeddingService, FullTextIndex, KnowledgeGraphStore, VectorStore};
    use serde_json::json;

    struct NoEmbed;
    #[async_trait]
    impl EmbeddingService for NoEmbed {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![])
        }
        fn dimension(&self) -> usize {
            0
        }
    }
    struct NoVector;
    #[async_trait]
    impl VectorStore for NoVector {
        async fn search(
            &self,
            _c: &str,
            _v: &[f32],
            _k: usize,
            _t: f64,
            _f: Option<&[String]>,
        ) -> Result<Vec<DocumentWithScore>> {
            Ok(vec![])
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

    struct FakeGraph;
    #[async_trait]
    impl KnowledgeGraphStore for FakeGraph {
        async fn query(&self, _query: &str, _top_k: usize) -> Result<Option<String>> {
            Ok(Some("graph context block".to_string()))
        }
    }

    struct OneCollection(Collection);
    impl CollectionResolver for OneCollection {
        fn resolve(&self, collection_id: &str) -> Option<Collection> {
            (collection_id == self.0.id).then(|| self.0.clone())
        }
    }

    fn base_collection() -> Collection {
        Collection::new("c1", "vecs", "ft", Arc::new(NoEmbed), Arc::new(NoVector), Arc::new(NoFulltext))
    }

    #[tokio::test]
    async fn disabled_capability_returns_empty() {
        let runner = GraphSearchRunner::new(Arc::new(OneCollection(base_collection())));
        let inputs = HashMap::from([("collection_ids".to_string(), json!(["c1"]))]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = runner.run(inputs, &system).await.unwrap();
        assert_eq!(outcome.values()["docs"], json!([]));
    }

    #[tokio::test]
    async fn enabled_capability_returns_single_tagged_document() {
        let collection = base_collection().with_graph_store(Arc::new(FakeGraph));
        let runner = GraphSearchRunner::new(Arc::new(OneCollection(collection)));
        let inputs = HashMap::from([("collection_ids".to_string(), json!(["c1"]))]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = runner.run(inputs, &system).await.unwrap();
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text_or_empty(), "graph context block");
        assert_eq!(docs[0].metadata.get("recall_type").unwrap(), "graph_search");
    }
}
