//! Node Definitions (C1, schema half) for every node type this crate ships
//! a runner for. Field names and defaults mirror spec.md §4.6 exactly so
//! the Flow Validator's per-binding checks (I3–I7) see the same schema the
//! runners actually read from their `inputs` map.

use ragflow_core::{FieldDefinition, FieldType, NodeDefinition};
use serde_json::json;

fn docs_field(name: &str) -> FieldDefinition {
    FieldDefinition::new(name, FieldType::Array).with_description("retrieved documents")
}

/// The `start` node definition (spec §4.6.8).
pub fn start() -> NodeDefinition {
    NodeDefinition::new("start")
        .with_description("identity pass-through surfacing the run's original query")
        .with_input(FieldDefinition::new("query", FieldType::String))
        .with_output(FieldDefinition::new("query", FieldType::String).required())
}

/// The `vector_search` node definition (spec §4.6.1).
pub fn vector_search() -> NodeDefinition {
    NodeDefinition::new("vector_search")
        .with_description("nearest-neighbour vector search over one collection")
        .with_input(FieldDefinition::new("query", FieldType::String).required())
        .with_input(FieldDefinition::new("top_k", FieldType::Integer).with_default(json!(5)))
        .with_input(FieldDefinition::new("similarity_threshold", FieldType::Float).with_default(json!(0.7)))
        .with_input(FieldDefinition::new("collection_ids", FieldType::Array).with_default(json!([])))
        .with_output(docs_field("docs").required())
}

/// The `keyword_search` node definition (spec §4.6.2).
pub fn keyword_search() -> NodeDefinition {
    NodeDefinition::new("keyword_search")
        .with_description("best-fields boolean keyword search over one collection's inverted index")
        .with_input(FieldDefinition::new("query", FieldType::String).required())
        .with_input(FieldDefinition::new("top_k", FieldType::Integer).with_default(json!(5)))
        .with_input(FieldDefinition::new("collection_ids", FieldType::Array).with_default(json!([])))
        .with_output(docs_field("docs").required())
}

/// The `fulltext_search` node definition (spec §4.6.2, shares semantics
/// with `keyword_search` under a different `type_key`).
pub fn fulltext_search() -> NodeDefinition {
    NodeDefinition::new("fulltext_search")
        .with_description("best-fields boolean full-text search over one collection's inverted index")
        .with_input(FieldDefinition::new("query", FieldType::String).required())
        .with_input(FieldDefinition::new("top_k", FieldType::Integer).with_default(json!(5)))
        .with_input(FieldDefinition::new("collection_ids", FieldType::Array).with_default(json!([])))
        .with_output(docs_field("docs").required())
}

/// The `summary_search` node definition (spec §4.6.3).
pub fn summary_search() -> NodeDefinition {
    NodeDefinition::new("summary_search")
        .with_description("vector search restricted to chunks indexed as summaries")
        .with_input(FieldDefinition::new("query", FieldType::String).required())
        .with_input(FieldDefinition::new("top_k", FieldType::Integer).with_default(json!(5)))
        .with_input(FieldDefinition::new("similarity_threshold", FieldType::Float).with_default(json!(0.7)))
        .with_input(FieldDefinition::new("collection_ids", FieldType::Array).with_default(json!([])))
        .with_output(docs_field("docs").required())
}

/// The `graph_search` node definition (spec §4.6.4).
pub fn graph_search() -> NodeDefinition {
    NodeDefinition::new("graph_search")
        .with_description("hybrid knowledge-graph/vector context lookup")
        .with_input(FieldDefinition::new("query", FieldType::String).with_default(json!("")))
        .with_input(FieldDefinition::new("top_k", FieldType::Integer).with_default(json!(5)))
        .with_input(FieldDefinition::new("collection_ids", FieldType::Array).with_default(json!([])))
        .with_output(docs_field("docs").required())
}

/// The `merge` node definition (spec §4.6.5). Only the canonical upstream
/// fields this workspace wires through `MergeRunner` are declared; a flow
/// author binds whichever subset it has upstream search results for.
pub fn merge() -> NodeDefinition {
    NodeDefinition::new("merge")
        .with_description("union (with optional dedup) of one or more upstream search results")
        .with_input(FieldDefinition::new("merge_strategy", FieldType::String).with_default(json!("union")))
        .with_input(FieldDefinition::new("deduplicate", FieldType::Boolean).with_default(json!(true)))
        .with_input(docs_field("vector_search_docs").with_default(json!([])))
        .with_input(docs_field("keyword_search_docs").with_default(json!([])))
        .with_input(docs_field("fulltext_search_docs").with_default(json!([])))
        .with_input(docs_field("summary_search_docs").with_default(json!([])))
        .with_input(docs_field("graph_search_docs").with_default(json!([])))
        .with_output(docs_field("docs").required())
}

/// The `rerank` node definition (spec §4.6.6).
pub fn rerank() -> NodeDefinition {
    NodeDefinition::new("rerank")
        .with_description("cross-encoder reorder of candidate documents")
        .with_input(FieldDefinition::new("model", FieldType::String).with_default(json!("")))
        .with_input(docs_field("docs").required())
        .with_output(docs_field("docs").required())
}

/// The `llm` completion node definition (spec §4.6.7).
pub fn llm() -> NodeDefinition {
    NodeDefinition::new("llm")
        .with_description("context-packing prompt render plus streaming completion")
        .with_input(FieldDefinition::new("model_service_provider", FieldType::String).required())
        .with_input(FieldDefinition::new("model_name", FieldType::String).required())
        .with_input(FieldDefinition::new("prompt_template", FieldType::String).required())
        .with_input(FieldDefinition::new("temperature", FieldType::Float).with_default(json!(0.7)))
        .with_input(FieldDefinition::new("max_tokens", FieldType::Integer).with_default(json!(1024)))
        .with_input(docs_field("docs").with_default(json!([])))
        .with_output(docs_field("references").required())
        .with_output(FieldDefinition::new("urls", FieldType::Array).required())
}

/// All node definitions this crate ships a runner for, in registration
/// order. `ragflow-cli`'s `build_registry` folds these into a
/// `NodeDefinitionRegistryBuilder`.
pub fn all() -> Vec<NodeDefinition> {
    vec![
        start(),
        vector_search(),
        keyword_search(),
        fulltext_search(),
        summary_search(),
        graph_search(),
        merge(),
        rerank(),
        llm(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_definitions_have_unique_type_keys() {
        let defs = all();
        let mut keys: Vec<&str> = defs.iter().map(|d| d.type_key.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), defs.len());
    }
}
