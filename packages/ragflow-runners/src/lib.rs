//! Node Runner catalogue (C6) and Retrieval Primitives (C7): the typed
//! search/merge/rerank/completion operations, the external-interface
//! traits of spec.md §6, the `Collection` capability bundle, and the
//! retrieval policy knobs that replace the source's hard-coded
//! oversampling factors.

pub mod collection;
pub mod definitions;
pub mod interfaces;
pub mod policy;
pub mod retrieval;
pub mod runners;

pub use collection::{Collection, CollectionResolver};
pub use interfaces::{CompletionService, EmbeddingService, FullTextIndex, KnowledgeGraphStore, RerankService, VectorStore};
pub use policy::RetrievalPolicy;
pub use runners::{
    CompletionResolver as LlmCompletionResolver, GraphSearchRunner, KeywordSearchRunner, LlmRunner, MergeRunner,
    RerankRunner, StartRunner, SummarySearchRunner, VectorSearchRunner,
};
