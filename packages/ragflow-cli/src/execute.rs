//! The single-flow entry point (spec.md §6: "a single entry point per
//! flow (`execute`)"): loads a `FlowInstance` and an optional globals
//! overlay from JSON files, drives it once through the engine, and prints
//! its node outputs as JSON.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ragflow_core::{FlowInstance, NodeDefinitionRegistry};
use ragflow_engine::{FlowEngine, NodeRunnerRegistry, SystemInput};
use serde_json::Value;

pub struct ExecuteRequest<'a> {
    pub flow_path: &'a Path,
    pub globals_path: Option<&'a Path>,
    pub user: String,
    pub message_id: String,
    pub query: String,
}

/// Loads and runs one flow to completion, returning every node's outputs
/// keyed by node id. Structural/runtime failures propagate as-is; the
/// caller maps `FlowError::category()` to a process exit code.
pub async fn execute(
    request: ExecuteRequest<'_>,
    node_definitions: &NodeDefinitionRegistry,
    node_runners: &NodeRunnerRegistry,
) -> anyhow::Result<Value> {
    let raw_flow = fs::read_to_string(request.flow_path)
        .map_err(|e| anyhow::anyhow!("reading flow {}: {e}", request.flow_path.display()))?;
    let flow: FlowInstance = serde_json::from_str(&raw_flow)
        .map_err(|e| anyhow::anyhow!("parsing flow {}: {e}", request.flow_path.display()))?;

    let overrides: HashMap<String, Value> = match request.globals_path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading globals {}: {e}", path.display()))?;
            serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing globals {}: {e}", path.display()))?
        }
        None => HashMap::new(),
    };

    let engine = FlowEngine::new(node_definitions, node_runners);
    let system = SystemInput::new(request.user, request.message_id, request.query);
    let result = engine.execute(&flow, overrides, &system).await?;

    let mut outputs = serde_json::Map::new();
    for (node_id, fields) in result.context.all_outputs() {
        outputs.insert(node_id.clone(), Value::Object(fields.clone().into_iter().collect()));
    }
    Ok(Value::Object(outputs))
}
