//! Flow construction (spec.md §4.9 step 4: "Build the corresponding flow
//! instance"). Retrieval and generation are built as separate flow
//! instances: a retrieval flow ending at whichever node produces the final
//! candidate list, and a generation flow whose `llm` node's `docs` input is
//! a `Static` binding carrying the already-assembled, already-labelled
//! candidate list. This keeps the engine's single `merge` "union" strategy
//! untouched while still letting `mix` mode's knowledge-graph/document-chunk
//! section labelling (`knowledge_pipeline.py::build_context`) happen as
//! ordinary Rust composition rather than a new merge strategy.

use ragflow_core::{FlowInstance, InputBinding, NodeInstance};
use serde_json::{json, Value};

use crate::config::BotConfig;

/// A retrieval flow's node ids, so the pipeline knows which node's `docs`
/// output is the final candidate list once the engine has run it.
pub struct RetrievalFlow {
    pub flow: FlowInstance,
    pub final_node: &'static str,
}

/// The classic retrieval flow: `vector_search` (oversampled ahead of
/// rerank), optional `keyword_search`, `merge`, optional `rerank`.
pub fn build_classic_retrieval_flow(
    cfg: &BotConfig,
    collection_id: &str,
    search_text: &str,
    rerank_oversample_factor: usize,
) -> RetrievalFlow {
    let oversampled_top_k = if cfg.rerank.is_some() {
        cfg.topk * rerank_oversample_factor
    } else {
        cfg.topk
    };

    let mut flow = FlowInstance::new("classic-retrieval", "classic retrieval").with_node(
        NodeInstance::new("start", "start").with_binding(InputBinding::static_value("query", json!(search_text))),
    );

    flow = flow.with_node(
        NodeInstance::new("vector_search", "vector_search")
            .with_binding(InputBinding::dynamic("query", "start", "query"))
            .with_binding(InputBinding::static_value("top_k", json!(oversampled_top_k)))
            .with_binding(InputBinding::static_value("similarity_threshold", json!(cfg.score_threshold)))
            .with_binding(InputBinding::static_value("collection_ids", json!([collection_id]))),
    );

    let mut merge_node = NodeInstance::new("merge", "merge")
        .with_binding(InputBinding::dynamic("vector_search_docs", "vector_search", "docs"))
        .with_binding(InputBinding::static_value("deduplicate", json!(true)));

    if cfg.enable_keyword_recall {
        flow = flow.with_node(
            NodeInstance::new("keyword_search", "keyword_search")
                .with_binding(InputBinding::dynamic("query", "start", "query"))
                .with_binding(InputBinding::static_value("top_k", json!(cfg.topk)))
                .with_binding(InputBinding::static_value("collection_ids", json!([collection_id]))),
        );
        merge_node = merge_node
            .with_binding(InputBinding::dynamic("keyword_search_docs", "keyword_search", "docs"));
    }
    flow = flow.with_node(merge_node);

    let final_node = if let Some(rerank) = &cfg.rerank {
        flow = flow.with_node(
            NodeInstance::new("rerank", "rerank")
                .with_binding(InputBinding::dynamic("docs", "merge", "docs"))
                .with_binding(InputBinding::static_value("model", json!(rerank.model))),
        );
        "rerank"
    } else {
        "merge"
    };

    RetrievalFlow { flow, final_node }
}

/// The knowledge-graph-only retrieval flow: a single `graph_search` node.
pub fn build_graph_retrieval_flow(cfg: &BotConfig, collection_id: &str, search_text: &str) -> RetrievalFlow {
    let flow = FlowInstance::new("graph-retrieval", "graph retrieval")
        .with_node(
            NodeInstance::new("start", "start").with_binding(InputBinding::static_value("query", json!(search_text))),
        )
        .with_node(
            NodeInstance::new("graph_search", "graph_search")
                .with_binding(InputBinding::dynamic("query", "start", "query"))
                .with_binding(InputBinding::static_value("top_k", json!(cfg.topk)))
                .with_binding(InputBinding::static_value("collection_ids", json!([collection_id]))),
        );
    RetrievalFlow {
        flow,
        final_node: "graph_search",
    }
}

/// The generation flow: a `start` node plus a single `llm` node whose `docs`
/// input is the already-assembled candidate list for this turn.
pub fn build_generation_flow(cfg: &BotConfig, query: &str, docs: Value) -> FlowInstance {
    FlowInstance::new("generation", "generation")
        .with_node(NodeInstance::new("start", "start").with_binding(InputBinding::static_value("query", json!(query))))
        .with_node(
            NodeInstance::new("llm", "llm")
                .with_binding(InputBinding::static_value("model_service_provider", json!(cfg.completion.provider)))
                .with_binding(InputBinding::static_value("model_name", json!(cfg.completion.model)))
                .with_binding(InputBinding::static_value("prompt_template", json!(cfg.completion.prompt_template)))
                .with_binding(InputBinding::static_value("temperature", json!(cfg.completion.temperature)))
                .with_binding(InputBinding::static_value("max_tokens", json!(cfg.completion.max_tokens)))
                .with_binding(InputBinding::static_value("docs", docs)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_flow_without_rerank_ends_at_merge() {
        let cfg = BotConfig::default();
        let retrieval = build_classic_retrieval_flow(&cfg, "c1", "q", 6);
        assert_eq!(retrieval.final_node, "merge");
        assert!(retrieval.flow.nodes.contains_key("vector_search"));
        assert!(!retrieval.flow.nodes.contains_key("keyword_search"));
    }

    #[test]
    fn classic_flow_with_keyword_recall_wires_merge_input() {
        let mut cfg = BotConfig::default();
        cfg.enable_keyword_recall = true;
        let retrieval = build_classic_retrieval_flow(&cfg, "c1", "q", 6);
        let merge = &retrieval.flow.nodes["merge"];
        assert!(merge.input_bindings.iter().any(|b| b.field == "keyword_search_docs"));
    }

    #[test]
    fn classic_flow_with_rerank_ends_at_rerank() {
        let mut cfg = BotConfig::default();
        cfg.rerank = Some(crate::config::RerankConfig {
            provider: "p".to_string(),
            model: "m".to_string(),
        });
        let retrieval = build_classic_retrieval_flow(&cfg, "c1", "q", 6);
        assert_eq!(retrieval.final_node, "rerank");
    }

    #[test]
    fn generation_flow_binds_docs_statically() {
        let cfg = BotConfig::default();
        let flow = build_generation_flow(&cfg, "query", json!([]));
        let llm = &flow.nodes["llm"];
        assert!(llm.input_bindings.iter().any(|b| b.field == "docs"));
    }
}
