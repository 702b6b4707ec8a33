//! Node Runner implementations (C6): one module per node type, registered
//! against the engine's `NodeRunnerRegistry` by whoever assembles the
//! process (see `ragflow-cli`).

pub(crate) mod common;
pub mod graph_search;
pub mod keyword_search;
pub mod llm;
pub mod merge;
pub mod rerank;
pub mod start;
pub mod summary_search;
pub mod vector_search;

pub use graph_search::GraphSearchRunner;
pub use keyword_search::KeywordSearchRunner;
pub use llm::{CompletionResolver, LlmRunner};
pub use merge::MergeRunner;
pub use rerank::RerankRunner;
pub use start::StartRunner;
pub use summary_search::SummarySearchRunner;
pub use vector_search::VectorSearchRunner;
