//! The Streaming Query Pipeline (C9) and Chat Transport Adapter (C10):
//! composes the flow-graph engine and its node runners into one
//! turn-at-a-time conversational loop, plus the WebSocket transport that
//! drives it.

pub mod config;
pub mod flow_builder;
pub mod memory;
pub mod pipeline;
pub mod quota;
pub mod related_questions;
pub mod transport;

pub use config::{BotConfig, CompletionConfig, EmbeddingConfig, FaqEntry, RerankConfig, RetrieveMode, WelcomeConfig};
pub use flow_builder::{build_classic_retrieval_flow, build_generation_flow, build_graph_retrieval_flow, RetrievalFlow};
pub use memory::{load_history, query_with_history, LoadedHistory};
pub use pipeline::{PipelineEvent, StreamingPipeline, TurnRequest, TurnSummary};
pub use quota::QuotaTracker;
pub use related_questions::generate_related_questions;
pub use transport::{chat_handler, ChatParams, ChatSession, ChatState, SessionResolver};
