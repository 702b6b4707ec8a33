//! The `rerank` node (spec §4.6.6): submits candidate documents to a
//! cross-encoder service and reorders them by the returned permutation.
//! The `model` input names which provider-bound service this runner should
//! already have been constructed with; there is no runtime model dispatch
//! here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::Result;
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

use crate::interfaces::RerankService;
use crate::policy::RetrievalPolicy;
use crate::retrieval::assemble_and_rerank;
use crate::runners::common::{docs_outcome, parse_docs_field};

pub struct RerankRunner {
    service: Arc<dyn RerankService>,
    policy: RetrievalPolicy,
}

impl RerankRunner {
    pub fn new(service: Arc<dyn RerankService>, policy: RetrievalPolicy) -> Self {
        Self { service, policy }
    }
}

#[async_trait]
impl NodeRunner for RerankRunner {
    fn type_key(&self) -> &str {
        "rerank"
    }

    async fn run(&self, inputs: HashMap<String, Value>, system: &SystemInput) -> Result<RunOutcome> {
        let docs = parse_docs_field(&inputs, "docs")?;
        let top_k = docs.len();
        let reranked = assemble_and_rerank(self.service.as_ref(), &system.query, docs, top_k, &self.policy).await?;
        docs_outcome(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_core::DocumentWithScore;
    use serde_json::json;

    struct ReverseRerank;
    #[async_trait]
    impl RerankService for ReverseRerank {
        async fn rerank(&self, _query: &str, documents: &[String]) -> Result<Vec<usize>> {
            Ok((0..documents.len()).rev().collect())
        }
    }

    struct PanicsIfCalled;
    #[async_trait]
    impl RerankService for PanicsIfCalled {
        async fn rerank(&self, _query: &str, _documents: &[String]) -> Result<Vec<usize>> {
            panic!("rerank service should not be called for an empty candidate set");
        }
    }

    #[tokio::test]
    async fn empty_docs_never_calls_the_service() {
        let runner = RerankRunner::new(Arc::new(PanicsIfCalled), RetrievalPolicy::default());
        let inputs = HashMap::from([("docs".to_string(), json!([]))]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = runner.run(inputs, &system).await.unwrap();
        assert_eq!(outcome.values()["docs"], json!([]));
    }

    #[tokio::test]
    async fn reorders_by_permutation() {
        let runner = RerankRunner::new(Arc::new(ReverseRerank), RetrievalPolicy::default());
        let docs = vec![
            serde_json::to_value(DocumentWithScore::new("a", 0.1)).unwrap(),
            serde_json::to_value(DocumentWithScore::new("b", 0.2)).unwrap(),
        ];
        let inputs = HashMap::from([("docs".to_string(), json!(docs))]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = runner.run(inputs, &system).await.unwrap();
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs.iter().map(|d| d.text_or_empty()).collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
