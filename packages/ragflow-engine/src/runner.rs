//! Node Runner contract (C6 interface): every node type's behavior is an
//! implementation of `NodeRunner`, looked up by `type_key` from a registry
//! built externally (by whoever assembles the process — see Design Notes'
//! preference for explicit construction over a global mutable registry).

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use ragflow_core::{ConversationMessage, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// The `HistoryHandle` capability (Design Notes: "a dynamic history object
/// passed through kwargs" becomes "a `HistoryHandle` capability explicitly
/// listed on `SystemInput`"). Implemented by `ragflow-history`; the engine
/// and its runners only ever see this trait object.
#[async_trait]
pub trait HistoryHandle: Send + Sync {
    /// Append one turn's message to the conversation's history.
    async fn append(&self, message: ConversationMessage) -> Result<()>;

    /// The conversation's messages, oldest first.
    async fn messages(&self) -> Result<Vec<ConversationMessage>>;
}

/// Ambient, per-run information available to every node runner. Threaded
/// from the transport layer down through the engine to each runner
/// invocation; not part of the flow's own data model.
#[derive(Clone)]
pub struct SystemInput {
    pub user: String,
    pub message_id: String,
    pub query: String,
    pub history: Option<Arc<dyn HistoryHandle>>,
    pub cancellation: CancellationToken,
}

impl SystemInput {
    pub fn new(user: impl Into<String>, message_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            message_id: message_id.into(),
            query: query.into(),
            history: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryHandle>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// What a node runner produces. Most runners resolve synchronously to a
/// set of named output values. The `llm` runner is the one exception: it
/// returns an immediately-resolved output placeholder plus a token stream
/// that the pipeline drains on the side — a first-class variant here
/// rather than an out-of-band side dictionary a caller has to know to look
/// for.
pub enum RunOutcome {
    Values(HashMap<String, Value>),
    Streaming {
        values: HashMap<String, Value>,
        tokens: TokenStream,
    },
}

impl RunOutcome {
    pub fn values(&self) -> &HashMap<String, Value> {
        match self {
            RunOutcome::Values(v) => v,
            RunOutcome::Streaming { values, .. } => values,
        }
    }

    pub fn into_values(self) -> HashMap<String, Value> {
        match self {
            RunOutcome::Values(v) => v,
            RunOutcome::Streaming { values, .. } => values,
        }
    }
}

/// The behavior half of a node type; the schema half lives in
/// `NodeDefinition` in the Node Type Registry.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    fn type_key(&self) -> &str;

    async fn run(&self, inputs: HashMap<String, Value>, system: &SystemInput) -> Result<RunOutcome>;
}

/// A process-wide map from `type_key` to the runner implementing it,
/// handed to the engine at construction time.
pub type NodeRunnerRegistry = HashMap<String, std::sync::Arc<dyn NodeRunner>>;
