//! The `keyword_search` / `fulltext_search` nodes (spec §4.6.2): one shared
//! implementation registered twice, distinguished only by `type_key` and
//! the `recall_type` tag applied to its results — the spec describes them
//! as a single semantics block under two names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ragflow_core::RecallType;
use ragflow_core::Result;
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

use crate::collection::CollectionResolver;
use crate::policy::RetrievalPolicy;
use crate::runners::common::{docs_outcome, empty_docs_outcome, first_collection_id, input_str, input_u64};

pub struct KeywordSearchRunner {
    resolver: Arc<dyn CollectionResolver>,
    type_key: &'static str,
    recall_type: RecallType,
    policy: RetrievalPolicy,
}

impl KeywordSearchRunner {
    pub fn keyword(resolver: Arc<dyn CollectionResolver>, policy: RetrievalPolicy) -> Self {
        Self {
            resolver,
            type_key: "keyword_search",
            recall_type: RecallType::Keyword,
            policy,
        }
    }

    pub fn fulltext(resolver: Arc<dyn CollectionResolver>, policy: RetrievalPolicy) -> Self {
        Self {
            resolver,
            type_key: "fulltext_search",
            recall_type: RecallType::Fulltext,
            policy,
        }
    }
}

#[async_trait]
impl NodeRunner for KeywordSearchRunner {
    fn type_key(&self) -> &str {
        self.type_key
    }

    async fn run(&self, inputs: HashMap<String, Value>, _system: &SystemInput) -> Result<RunOutcome> {
        let Some(collection_id) = first_collection_id(&inputs) else {
            return Ok(empty_docs_outcome());
        };
        let Some(collection) = self.resolver.resolve(&collection_id) else {
            return Ok(empty_docs_outcome());
        };

        if !collection.fulltext_index.exists(&collection.fulltext_index_name).await? {
            return Ok(empty_docs_outcome());
        }

        let top_k = input_u64(&inputs, "top_k", 5) as usize;
        let query = input_str(&inputs, "query");

        let keywords = collection.fulltext_index.analyze(&collection.fulltext_index_name, query).await?;
        let oversampled_k = top_k * self.policy.keyword_oversample_factor;
        let hits = collection
            .fulltext_index
            .search(&collection.fulltext_index_name, &keywords, oversampled_k)
            .await?;
        let docs = hits.into_iter().map(|d| d.tagged(self.recall_type)).collect();
        docs_outcome(docs)
    }
}
