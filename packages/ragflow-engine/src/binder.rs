//! Input Binder (C5): resolves a node's `InputBinding`s against the
//! `ExecutionContext` into the concrete `HashMap<String, Value>` passed to
//! its runner, applying field defaults and numeric-widening coercion.

use std::collections::HashMap;

use ragflow_core::{BindingSource, FieldType, FlowError, NodeDefinition, NodeInstance, Result};
use serde_json::Value;

use crate::context::ExecutionContext;

/// Resolve every binding on `node`, then fill any unbound field with its
/// schema default, then enforce that every required field ended up with a
/// value.
pub fn bind_inputs(
    node: &NodeInstance,
    definition: &NodeDefinition,
    context: &ExecutionContext,
) -> Result<HashMap<String, Value>> {
    let mut inputs = HashMap::new();

    for binding in &node.input_bindings {
        let value = resolve_binding(node, &binding.source, context)?;
        let value = coerce(node, &binding.field, definition, value)?;
        inputs.insert(binding.field.clone(), value);
    }

    for field in &definition.input_schema {
        if !inputs.contains_key(&field.name) {
            if let Some(default) = &field.default {
                inputs.insert(field.name.clone(), default.clone());
            }
        }
    }

    for field in &definition.input_schema {
        if field.required && !inputs.contains_key(&field.name) {
            return Err(FlowError::MissingRequiredInput {
                node: node.id.clone(),
                field: field.name.clone(),
            });
        }
    }

    Ok(inputs)
}

fn resolve_binding(node: &NodeInstance, source: &BindingSource, context: &ExecutionContext) -> Result<Value> {
    match source {
        BindingSource::Static { value } => Ok(value.clone()),
        BindingSource::Dynamic { node: ref_node, field } => context
            .get_output(ref_node, field)
            .cloned()
            .ok_or_else(|| FlowError::MissingRequiredInput {
                node: node.id.clone(),
                field: format!("{ref_node}.{field}"),
            }),
        BindingSource::Global { name } => context
            .get_global(name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownGlobal {
                node: node.id.clone(),
                field: String::new(),
                name: name.clone(),
            }),
    }
}

/// Apply numeric widening: an `Integer` JSON number bound into a `Float`
/// field is converted so downstream code can treat it uniformly as a
/// float.
fn coerce(node: &NodeInstance, field_name: &str, definition: &NodeDefinition, value: Value) -> Result<Value> {
    let Some(field) = definition.input_field(field_name) else {
        return Ok(value);
    };
    if field.field_type == FieldType::Float {
        if let Some(n) = value.as_i64() {
            return Ok(Value::from(n as f64));
        }
        if let Some(n) = value.as_u64() {
            return Ok(Value::from(n as f64));
        }
    }
    let _ = node;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragflow_core::{FieldDefinition, InputBinding};
    use serde_json::json;

    fn definition() -> NodeDefinition {
        NodeDefinition::new("vector_search")
            .with_input(FieldDefinition::new("query", FieldType::String).required())
            .with_input(
                FieldDefinition::new("top_k", FieldType::Integer).with_default(json!(5)),
            )
            .with_input(FieldDefinition::new("similarity_threshold", FieldType::Float))
    }

    #[test]
    fn unbound_optional_field_gets_schema_default() {
        let node = NodeInstance::new("search", "vector_search")
            .with_binding(InputBinding::static_value("query", json!("hello")));
        let inputs = bind_inputs(&node, &definition(), &ExecutionContext::new()).unwrap();
        assert_eq!(inputs["top_k"], json!(5));
    }

    #[test]
    fn missing_required_field_errors() {
        let node = NodeInstance::new("search", "vector_search");
        assert!(matches!(
            bind_inputs(&node, &definition(), &ExecutionContext::new()),
            Err(FlowError::MissingRequiredInput { .. })
        ));
    }

    #[test]
    fn integer_widens_to_float_field() {
        let node = NodeInstance::new("search", "vector_search")
            .with_binding(InputBinding::static_value("query", json!("hello")))
            .with_binding(InputBinding::static_value("similarity_threshold", json!(1)));
        let inputs = bind_inputs(&node, &definition(), &ExecutionContext::new()).unwrap();
        assert_eq!(inputs["similarity_threshold"], json!(1.0));
    }

    #[test]
    fn dynamic_binding_resolves_from_context() {
        let mut ctx = ExecutionContext::new();
        ctx.set_outputs("start", HashMap::from([("query".to_string(), json!("hi"))]))
            .unwrap();
        let node = NodeInstance::new("search", "vector_search")
            .with_binding(InputBinding::dynamic("query", "start", "query"));
        let inputs = bind_inputs(&node, &definition(), &ctx).unwrap();
        assert_eq!(inputs["query"], json!("hi"));
    }
}
