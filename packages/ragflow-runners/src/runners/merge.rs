//! The `merge` node (spec §4.6.5): combines the outputs of one or more
//! upstream search nodes into a single document list.
//!
//! The runner's flat `HashMap<String, Value>` input contract does not
//! preserve the order in which a flow's author declared bindings, so
//! "binding order" is realized here as a fixed canonical recall-source
//! order (vector, keyword, fulltext, summary, graph) rather than threaded
//! binding-declaration order — see DESIGN.md.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use ragflow_core::{DocumentWithScore, FlowError, Result};
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

use crate::runners::common::docs_outcome;

const CANONICAL_SOURCE_FIELDS: [&str; 5] = [
    "vector_search_docs",
    "keyword_search_docs",
    "fulltext_search_docs",
    "summary_search_docs",
    "graph_search_docs",
];

pub struct MergeRunner;

#[async_trait]
impl NodeRunner for MergeRunner {
    fn type_key(&self) -> &str {
        "merge"
    }

    async fn run(&self, inputs: HashMap<String, Value>, _system: &SystemInput) -> Result<RunOutcome> {
        let strategy = inputs.get("merge_strategy").and_then(Value::as_str).unwrap_or("union");
        if strategy != "union" {
            return Err(FlowError::UnknownMergeStrategy(strategy.to_string()));
        }
        let deduplicate = inputs.get("deduplicate").and_then(Value::as_bool).unwrap_or(true);

        let mut merged: Vec<DocumentWithScore> = Vec::new();
        for field in CANONICAL_SOURCE_FIELDS {
            if let Some(Value::Array(items)) = inputs.get(field) {
                for item in items {
                    if let Ok(doc) = serde_json::from_value::<DocumentWithScore>(item.clone()) {
                        merged.push(doc);
                    }
                }
            }
        }

        if deduplicate {
            let mut seen: HashSet<Option<String>> = HashSet::new();
            merged.retain(|doc| seen.insert(doc.text.clone()));
        }

        docs_outcome(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(text: &str) -> Value {
        serde_json::to_value(DocumentWithScore::new(text, 1.0)).unwrap()
    }

    #[tokio::test]
    async fn concatenates_in_canonical_recall_order() {
        let inputs = HashMap::from([
            ("keyword_search_docs".to_string(), json!([doc("kw")])),
            ("vector_search_docs".to_string(), json!([doc("vec")])),
        ]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = MergeRunner.run(inputs, &system).await.unwrap();
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs.iter().map(|d| d.text_or_empty()).collect::<Vec<_>>(), vec!["vec", "kw"]);
    }

    #[tokio::test]
    async fn deduplicates_by_text_keeping_first_occurrence() {
        let inputs = HashMap::from([
            ("vector_search_docs".to_string(), json!([doc("same")])),
            ("keyword_search_docs".to_string(), json!([doc("same")])),
        ]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = MergeRunner.run(inputs, &system).await.unwrap();
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn deduplicate_false_keeps_duplicates() {
        let inputs = HashMap::from([
            ("vector_search_docs".to_string(), json!([doc("same")])),
            ("keyword_search_docs".to_string(), json!([doc("same")])),
            ("deduplicate".to_string(), json!(false)),
        ]);
        let system = SystemInput::new("u", "m", "q");
        let outcome = MergeRunner.run(inputs, &system).await.unwrap();
        let docs: Vec<DocumentWithScore> = serde_json::from_value(outcome.values()["docs"].clone()).unwrap();
        assert_eq!(docs.len(), 2);
    }

    proptest! {
        #[test]
        fn union_dedup_is_idempotent_and_order_preserving(
            texts in proptest::collection::vec("[a-c]{1,3}", 0..12),
        ) {
            let inputs = HashMap::from([
                ("vector_search_docs".to_string(), json!(texts.iter().map(|t| doc(t)).collect::<Vec<_>>())),
            ]);
            let system = SystemInput::new("u", "m", "q");
            let once = tokio_test::block_on(MergeRunner.run(inputs.clone(), &system)).unwrap();
            let once_docs: Vec<DocumentWithScore> = serde_json::from_value(once.values()["docs"].clone()).unwrap();

            let merged_again_input = HashMap::from([(
                "vector_search_docs".to_string(),
                json!(once_docs.iter().map(|d| serde_json::to_value(d).unwrap()).collect::<Vec<_>>()),
            )]);
            let twice = tokio_test::block_on(MergeRunner.run(merged_again_input, &system)).unwrap();
            let twice_docs: Vec<DocumentWithScore> = serde_json::from_value(twice.values()["docs"].clone()).unwrap();

            prop_assert_eq!(
                once_docs.iter().map(|d| d.text_or_empty().to_string()).collect::<Vec<_>>(),
                twice_docs.iter().map(|d| d.text_or_empty().to_string()).collect::<Vec<_>>()
            );

            let mut first_occurrence = Vec::new();
            for t in &texts {
                if !first_occurrence.contains(t) {
                    first_occurrence.push(t.clone());
                }
            }
            prop_assert_eq!(
                once_docs.iter().map(|d| d.text_or_empty().to_string()).collect::<Vec<_>>(),
                first_occurrence
            );
        }
    }

    #[tokio::test]
    async fn unknown_strategy_is_an_error() {
        let inputs = HashMap::from([("merge_strategy".to_string(), json!("intersection"))]);
        let system = SystemInput::new("u", "m", "q");
        let err = MergeRunner.run(inputs, &system).await.unwrap_err();
        assert!(matches!(err, FlowError::UnknownMergeStrategy(s) if s == "intersection"));
    }
}
