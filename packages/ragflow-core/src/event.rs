//! Flow execution events, published on the Event Bus (C8).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of lifecycle event a `FlowEvent` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowEventType {
    FlowStart,
    FlowEnd,
    FlowError,
    NodeStart,
    NodeEnd,
    NodeError,
}

/// A single lifecycle event emitted during a flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEvent {
    pub event_type: FlowEventType,
    pub execution_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl FlowEvent {
    pub fn flow(event_type: FlowEventType, execution_id: impl Into<String>) -> Self {
        Self {
            event_type,
            execution_id: execution_id.into(),
            node_id: None,
            data: Map::new(),
        }
    }

    pub fn node(event_type: FlowEventType, execution_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            event_type,
            execution_id: execution_id.into(),
            node_id: Some(node_id.into()),
            data: Map::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}
