//! Node Type Registry (C1): a process-wide, immutable map from `type_key`
//! to `NodeDefinition`, built once at startup via explicit registration
//! rather than a lazily-initialized global or a decorator-style side
//! effect at module import time.

use std::collections::HashMap;

use crate::error::{FlowError, Result};
use crate::types::NodeDefinition;

/// An immutable collection of node schemas, keyed by `type_key`.
///
/// Built once via `NodeDefinitionRegistryBuilder` and then shared via
/// `Arc` for the lifetime of the process; lookups are O(1) map gets.
#[derive(Debug, Clone, Default)]
pub struct NodeDefinitionRegistry {
    definitions: HashMap<String, NodeDefinition>,
}

impl NodeDefinitionRegistry {
    pub fn get(&self, type_key: &str) -> Option<&NodeDefinition> {
        self.definitions.get(type_key)
    }

    pub fn contains(&self, type_key: &str) -> bool {
        self.definitions.contains_key(type_key)
    }

    pub fn list(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values()
    }

    pub fn require(&self, type_key: &str) -> Result<&NodeDefinition> {
        self.get(type_key)
            .ok_or_else(|| FlowError::NodeTypeUnknown(type_key.to_string()))
    }
}

/// Accumulates node definitions before they are frozen into a
/// `NodeDefinitionRegistry`. Registering the same `type_key` twice with an
/// identical definition is a no-op (idempotent, per spec.md §4.1);
/// registering it twice with a *different* definition is a programmer
/// error, caught at build time rather than at lookup time.
#[derive(Debug, Default)]
pub struct NodeDefinitionRegistryBuilder {
    definitions: HashMap<String, NodeDefinition>,
}

impl NodeDefinitionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, definition: NodeDefinition) -> Self {
        match self.definitions.get(&definition.type_key) {
            Some(existing) if existing == &definition => {}
            Some(_) => panic!(
                "conflicting node type registration for {}: a different definition is already registered",
                definition.type_key
            ),
            None => {
                self.definitions.insert(definition.type_key.clone(), definition);
            }
        }
        self
    }

    pub fn build(self) -> NodeDefinitionRegistry {
        NodeDefinitionRegistry {
            definitions: self.definitions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDefinition, FieldType};

    #[test]
    fn registry_lookup_and_require() {
        let registry = NodeDefinitionRegistryBuilder::new()
            .register(
                NodeDefinition::new("start")
                    .with_output(FieldDefinition::new("query", FieldType::String)),
            )
            .build();
        assert!(registry.contains("start"));
        assert!(registry.get("missing").is_none());
        assert!(registry.require("missing").is_err());
    }

    #[test]
    #[should_panic(expected = "conflicting node type registration")]
    fn conflicting_registration_panics() {
        NodeDefinitionRegistryBuilder::new()
            .register(NodeDefinition::new("start"))
            .register(
                NodeDefinition::new("start")
                    .with_output(FieldDefinition::new("query", FieldType::String)),
            )
            .build();
    }

    #[test]
    fn identical_re_registration_is_idempotent() {
        let registry = NodeDefinitionRegistryBuilder::new()
            .register(
                NodeDefinition::new("start")
                    .with_output(FieldDefinition::new("query", FieldType::String)),
            )
            .register(
                NodeDefinition::new("start")
                    .with_output(FieldDefinition::new("query", FieldType::String)),
            )
            .build();
        assert!(registry.contains("start"));
        assert_eq!(registry.list().count(), 1);
    }
}
