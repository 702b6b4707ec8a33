//! Shared data model for the flow-graph execution engine: field/node
//! schemas, flow definitions, retrieved documents, conversation messages,
//! lifecycle events, the node-type registry, and the error taxonomy.

pub mod document;
pub mod error;
pub mod event;
pub mod message;
pub mod registry;
pub mod types;

pub use document::{DocumentWithScore, RecallType};
pub use error::{ErrorCategory, FlowError, Result};
pub use event::{FlowEvent, FlowEventType};
pub use message::{ConversationMessage, MessageRole, Provenance};
pub use registry::{NodeDefinitionRegistry, NodeDefinitionRegistryBuilder};
pub use types::{
    BindingSource, Edge, FieldDefinition, FieldType, FlowInstance, GlobalVariable, InputBinding,
    NodeDefinition, NodeInstance,
};
