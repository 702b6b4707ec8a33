//! Execution Context (C4): single-assignment store of every node's
//! resolved outputs plus the flow's global variables, scoped to exactly
//! one flow execution.
//!
//! An `ExecutionContext` is owned by the engine task that drives one run
//! and is never shared across runs or cloned into a second execution —
//! constructing a fresh one per run is how the engine avoids the
//! cross-execution data corruption a reused context would cause.

use std::collections::HashMap;

use ragflow_core::{FlowError, GlobalVariable, Result};
use serde_json::Value;

/// Per-run store of node outputs and global variables.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    outputs: HashMap<String, HashMap<String, Value>>,
    globals: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed globals from the flow's declared `GlobalVariable`s and, where
    /// provided, the run's initial input overrides.
    pub fn seed_globals(
        globals: impl IntoIterator<Item = GlobalVariable>,
        overrides: &HashMap<String, Value>,
    ) -> Self {
        let mut ctx = Self::new();
        for global in globals {
            let value = overrides
                .get(&global.name)
                .cloned()
                .or(global.value)
                .unwrap_or(Value::Null);
            ctx.globals.insert(global.name, value);
        }
        ctx
    }

    /// Record a node's output fields. Called exactly once per node, by the
    /// one task that ran it (single-writer).
    ///
    /// # Errors
    /// Returns `FlowError::Other` if this node's outputs were already
    /// recorded (would violate single-assignment).
    pub fn set_outputs(&mut self, node_id: &str, outputs: HashMap<String, Value>) -> Result<()> {
        if self.outputs.contains_key(node_id) {
            return Err(FlowError::Other(anyhow::anyhow!(
                "node {node_id} already has recorded outputs"
            )));
        }
        self.outputs.insert(node_id.to_string(), outputs);
        Ok(())
    }

    pub fn get_output(&self, node_id: &str, field: &str) -> Option<&Value> {
        self.outputs.get(node_id).and_then(|fields| fields.get(field))
    }

    pub fn get_global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn has_output(&self, node_id: &str) -> bool {
        self.outputs.contains_key(node_id)
    }

    /// All node outputs recorded so far, e.g. for returning a completed
    /// run's full result set to the caller.
    pub fn all_outputs(&self) -> &HashMap<String, HashMap<String, Value>> {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_assignment_is_enforced() {
        let mut ctx = ExecutionContext::new();
        ctx.set_outputs("a", HashMap::from([("x".to_string(), json!(1))]))
            .unwrap();
        assert!(ctx.set_outputs("a", HashMap::new()).is_err());
    }

    #[test]
    fn seed_globals_prefers_overrides() {
        let globals = vec![GlobalVariable::new("topk", ragflow_core::FieldType::Integer).with_value(json!(5))];
        let overrides = HashMap::from([("topk".to_string(), json!(10))]);
        let ctx = ExecutionContext::seed_globals(globals, &overrides);
        assert_eq!(ctx.get_global("topk"), Some(&json!(10)));
    }

    #[test]
    fn get_output_reads_back_recorded_field() {
        let mut ctx = ExecutionContext::new();
        ctx.set_outputs("search", HashMap::from([("docs".to_string(), json!([]))]))
            .unwrap();
        assert_eq!(ctx.get_output("search", "docs"), Some(&json!([])));
        assert_eq!(ctx.get_output("search", "missing"), None);
    }
}
