//! Builds the process-wide Node Type Registry (C1): folds every node
//! definition `ragflow-runners::definitions::all()` ships into a
//! `NodeDefinitionRegistry`, and wires one runner instance per type against
//! the resolvers/services assembled for this process.

use std::collections::HashMap;
use std::sync::Arc;

use ragflow_core::{NodeDefinitionRegistry, NodeDefinitionRegistryBuilder};
use ragflow_engine::NodeRunnerRegistry;
use ragflow_runners::{
    definitions, CollectionResolver, GraphSearchRunner, KeywordSearchRunner, LlmCompletionResolver, LlmRunner,
    MergeRunner, RerankRunner, RerankService, RetrievalPolicy, StartRunner, SummarySearchRunner, VectorSearchRunner,
};

/// Assembles both halves of the Node Type Registry for one process:
/// schemas (shared, immutable, built once) and runners (bound to the
/// capabilities this process was configured with).
pub fn build_registry(
    collections: Arc<dyn CollectionResolver>,
    completions: Arc<dyn LlmCompletionResolver>,
    rerank_service: Arc<dyn RerankService>,
    policy: RetrievalPolicy,
    context_window: usize,
) -> (NodeDefinitionRegistry, NodeRunnerRegistry) {
    let definitions = definitions::all()
        .into_iter()
        .fold(NodeDefinitionRegistryBuilder::new(), |builder, definition| builder.register(definition))
        .build();

    let mut runners: NodeRunnerRegistry = HashMap::new();
    runners.insert("start".to_string(), Arc::new(StartRunner));
    runners.insert("vector_search".to_string(), Arc::new(VectorSearchRunner::new(collections.clone())));
    runners.insert(
        "keyword_search".to_string(),
        Arc::new(KeywordSearchRunner::keyword(collections.clone(), policy.clone())),
    );
    runners.insert(
        "fulltext_search".to_string(),
        Arc::new(KeywordSearchRunner::fulltext(collections.clone(), policy.clone())),
    );
    runners.insert("summary_search".to_string(), Arc::new(SummarySearchRunner::new(collections.clone())));
    runners.insert("graph_search".to_string(), Arc::new(GraphSearchRunner::new(collections.clone())));
    runners.insert("merge".to_string(), Arc::new(MergeRunner));
    runners.insert("rerank".to_string(), Arc::new(RerankRunner::new(rerank_service, policy.clone())));
    runners.insert("llm".to_string(), Arc::new(LlmRunner::new(completions, policy, context_window)));

    (definitions, runners)
}
