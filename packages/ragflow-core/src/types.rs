//! Flow data model: fields, node/flow definitions, bindings, edges.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared type of a field on a node's schema or a global variable.
///
/// Used by the Input Binder to enforce required-field presence and to apply
/// numeric widening coercion (`Integer` -> `Float`) at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    /// True if a JSON value of type `other` may be bound into a field of
    /// this type without loss, per the numeric-widening coercion rule
    /// (an `Integer` value satisfies a `Float` field).
    pub fn accepts(self, other: FieldType) -> bool {
        self == other || (self == FieldType::Float && other == FieldType::Integer)
    }

    /// Classify a JSON value's runtime type for validation purposes.
    pub fn of_value(value: &Value) -> Option<FieldType> {
        match value {
            Value::String(_) => Some(FieldType::String),
            Value::Bool(_) => Some(FieldType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Integer),
            Value::Number(_) => Some(FieldType::Float),
            Value::Array(_) => Some(FieldType::Array),
            Value::Object(_) => Some(FieldType::Object),
            Value::Null => None,
        }
    }
}

/// One field in a node's input or output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: String::new(),
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The schema and static description of one node type, keyed by `type_key`
/// in the Node Type Registry (C1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub type_key: String,
    pub description: String,
    pub input_schema: Vec<FieldDefinition>,
    pub output_schema: Vec<FieldDefinition>,
}

impl NodeDefinition {
    pub fn new(type_key: impl Into<String>) -> Self {
        Self {
            type_key: type_key.into(),
            description: String::new(),
            input_schema: Vec::new(),
            output_schema: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, field: FieldDefinition) -> Self {
        self.input_schema.push(field);
        self
    }

    pub fn with_output(mut self, field: FieldDefinition) -> Self {
        self.output_schema.push(field);
        self
    }

    pub fn input_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.input_schema.iter().find(|f| f.name == name)
    }
}

/// Where an `InputBinding`'s value comes from. A tagged union (not a flat
/// struct with optional fields) so a binding can only ever be in one valid
/// state at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BindingSource {
    /// A literal value embedded in the flow definition.
    Static { value: Value },
    /// A reference to another node's output field, resolved once that node
    /// has run.
    Dynamic { node: String, field: String },
    /// A reference to a flow-level global variable.
    Global { name: String },
}

/// One binding of a node's input field to a value source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBinding {
    pub field: String,
    #[serde(flatten)]
    pub source: BindingSource,
}

impl InputBinding {
    pub fn static_value(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            source: BindingSource::Static { value },
        }
    }

    pub fn dynamic(field: impl Into<String>, node: impl Into<String>, ref_field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            source: BindingSource::Dynamic {
                node: node.into(),
                field: ref_field.into(),
            },
        }
    }

    pub fn global(field: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            source: BindingSource::Global { name: name.into() },
        }
    }
}

/// One instantiated node within a flow: a reference to a registered node
/// type plus the bindings that supply its input fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: String,
    pub type_key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input_bindings: Vec<InputBinding>,
}

impl NodeInstance {
    pub fn new(id: impl Into<String>, type_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_key: type_key.into(),
            name: None,
            input_bindings: Vec::new(),
        }
    }

    pub fn with_binding(mut self, binding: InputBinding) -> Self {
        self.input_bindings.push(binding);
        self
    }

    /// Dependencies implied by `Dynamic` bindings (the nodes this one must
    /// run after). `Static`/`Global` bindings impose no ordering.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.input_bindings.iter().filter_map(|b| match &b.source {
            BindingSource::Dynamic { node, .. } => Some(node.as_str()),
            _ => None,
        })
    }
}

/// A directed edge in the flow graph, from an upstream node to a
/// downstream one. Edges are a visualization/documentation aid; actual
/// execution ordering is derived from `Dynamic` bindings (see
/// `NodeInstance::dependencies`), per Design Notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

/// A named, typed value shared across every node in a flow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: String::new(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// A complete, named flow graph: its nodes, edges, and global variables.
///
/// Invariants (enforced by the Flow Validator, not by construction):
/// - I1: every `Dynamic` binding's `node` refers to a node present in
///   `nodes`.
/// - I2: every `Dynamic` binding's `node` is not the binding's own node
///   (no self-loops).
/// - I3: the dependency graph induced by `Dynamic` bindings is acyclic.
/// - I4: every `Global` binding's `name` refers to a declared global.
/// - I5: every bound value is type-compatible with its field's declared
///   `FieldType` (with numeric widening).
/// - I6: every `required` field of a node's type is bound by exactly one
///   binding.
/// - I7: no two bindings on the same node share a `field` name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowInstance {
    pub id: String,
    pub name: String,
    pub nodes: HashMap<String, NodeInstance>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub globals: HashMap<String, GlobalVariable>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowInstance {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            nodes: HashMap::new(),
            edges: Vec::new(),
            globals: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_node(mut self, node: NodeInstance) -> Self {
        self.edges.extend(
            node.dependencies()
                .map(|dep| Edge {
                    source: dep.to_string(),
                    target: node.id.clone(),
                })
                .collect::<Vec<_>>(),
        );
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn with_global(mut self, global: GlobalVariable) -> Self {
        self.globals.insert(global.name.clone(), global);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_accepts_numeric_widening() {
        assert!(FieldType::Float.accepts(FieldType::Integer));
        assert!(!FieldType::Integer.accepts(FieldType::Float));
        assert!(FieldType::String.accepts(FieldType::String));
    }

    #[test]
    fn node_instance_dependencies_only_dynamic() {
        let node = NodeInstance::new("n2", "merge")
            .with_binding(InputBinding::dynamic("a", "n0", "docs"))
            .with_binding(InputBinding::global("b", "topk"))
            .with_binding(InputBinding::static_value("c", Value::Bool(true)));
        let deps: Vec<&str> = node.dependencies().collect();
        assert_eq!(deps, vec!["n0"]);
    }

    #[test]
    fn flow_instance_with_node_derives_edges() {
        let flow = FlowInstance::new("f1", "test")
            .with_node(NodeInstance::new("start", "start"))
            .with_node(
                NodeInstance::new("search", "vector_search")
                    .with_binding(InputBinding::dynamic("query", "start", "query")),
            );
        assert_eq!(flow.edges.len(), 1);
        assert_eq!(flow.edges[0].source, "start");
        assert_eq!(flow.edges[0].target, "search");
    }
}
