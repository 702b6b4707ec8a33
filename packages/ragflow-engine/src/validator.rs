//! Flow Validator (C2): checks a `FlowInstance` against the Node Type
//! Registry and invariants I1–I7 before it is ever scheduled or executed.
//! Purely deterministic and side-effect-free — it never calls a node
//! runner.

use std::collections::HashSet;

use ragflow_core::{BindingSource, FieldType, FlowError, FlowInstance, NodeDefinitionRegistry, Result};

use crate::scheduler::schedule;

/// Validate `flow` against `registry`.
///
/// Checks, in order:
/// 1. the dependency graph is acyclic (I3) — delegated to the scheduler,
///    since a valid execution plan is itself a proof of acyclicity;
/// 2. every node's `type_key` is registered (part of binding-schema
///    validation below, surfaced explicitly here first so the error is
///    about the node type rather than a confusing missing-field error);
/// 3. per node, in topological order: no duplicate binding names (I7), no
///    forward references (I2, a `Dynamic` binding may only reference a
///    node that precedes it in topological order), every `Dynamic`
///    binding's target node exists (I1), every `Global` binding's name is
///    declared (I4), every bound value's type is compatible with its
///    field's declared type (I5), and every required field is bound
///    exactly once (I6).
pub fn validate(flow: &FlowInstance, registry: &NodeDefinitionRegistry) -> Result<()> {
    let plan = schedule(flow)?;
    let order: Vec<&str> = plan.groups.iter().flatten().map(String::as_str).collect();

    let mut preceding: HashSet<&str> = HashSet::new();
    for node_id in order {
        let node = &flow.nodes[node_id];
        let definition = registry.require(&node.type_key)?;

        let mut seen_fields: HashSet<&str> = HashSet::new();
        for binding in &node.input_bindings {
            if !seen_fields.insert(binding.field.as_str()) {
                return Err(FlowError::DuplicateBinding {
                    node: node.id.clone(),
                    field: binding.field.clone(),
                });
            }

            match &binding.source {
                BindingSource::Dynamic { node: ref_node, field: ref_field } => {
                    if !flow.nodes.contains_key(ref_node) {
                        return Err(FlowError::UnknownBindingTarget {
                            node: node.id.clone(),
                            field: binding.field.clone(),
                            ref_node: ref_node.clone(),
                        });
                    }
                    if !preceding.contains(ref_node.as_str()) {
                        return Err(FlowError::UnknownBindingTarget {
                            node: node.id.clone(),
                            field: binding.field.clone(),
                            ref_node: format!("{ref_node} (forward reference)"),
                        });
                    }
                    if let Some(ref_def) = flow
                        .nodes
                        .get(ref_node)
                        .and_then(|n| registry.get(&n.type_key))
                    {
                        match ref_def.output_schema.iter().find(|f| &f.name == ref_field) {
                            Some(out_field) => {
                                check_field_type(node.id.as_str(), &binding.field, definition.input_field(&binding.field), out_field.field_type)?;
                            }
                            None => {
                                return Err(FlowError::UnknownBindingField {
                                    node: node.id.clone(),
                                    field: binding.field.clone(),
                                    ref_node: ref_node.clone(),
                                    ref_field: ref_field.clone(),
                                });
                            }
                        }
                    }
                }
                BindingSource::Global { name } => {
                    if !flow.globals.contains_key(name) {
                        return Err(FlowError::UnknownGlobal {
                            node: node.id.clone(),
                            field: binding.field.clone(),
                            name: name.clone(),
                        });
                    }
                    let global_type = flow.globals[name].field_type;
                    check_field_type(node.id.as_str(), &binding.field, definition.input_field(&binding.field), global_type)?;
                }
                BindingSource::Static { value } => {
                    if let Some(actual) = FieldType::of_value(value) {
                        check_field_type(node.id.as_str(), &binding.field, definition.input_field(&binding.field), actual)?;
                    }
                }
            }
        }

        for field in &definition.input_schema {
            if field.required && !seen_fields.contains(field.name.as_str()) {
                return Err(FlowError::MissingRequiredInput {
                    node: node.id.clone(),
                    field: field.name.clone(),
                });
            }
        }

        preceding.insert(node_id);
    }

    Ok(())
}

fn check_field_type(
    node: &str,
    field_name: &str,
    expected: Option<&ragflow_core::FieldDefinition>,
    actual: FieldType,
) -> Result<()> {
    if let Some(expected) = expected {
        if !expected.field_type.accepts(actual) {
            return Err(FlowError::TypeMismatch {
                node: node.to_string(),
                field: field_name.to_string(),
                expected: format!("{:?}", expected.field_type),
                actual: format!("{:?}", actual),
            });
        }
    }
    Ok(())
}
