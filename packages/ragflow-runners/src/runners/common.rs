//! Small input-extraction helpers shared by the search runners. Kept out of
//! the binder itself: these are node-specific defaulting/coercion rules,
//! not part of the general binding contract.

use std::collections::HashMap;

use ragflow_core::{DocumentWithScore, FlowError, Result};
use serde_json::Value;

pub(crate) fn first_collection_id(inputs: &HashMap<String, Value>) -> Option<String> {
    inputs
        .get("collection_ids")?
        .as_array()?
        .first()?
        .as_str()
        .map(str::to_string)
}

pub(crate) fn input_u64(inputs: &HashMap<String, Value>, field: &str, default: u64) -> u64 {
    inputs.get(field).and_then(Value::as_u64).unwrap_or(default)
}

pub(crate) fn input_f64(inputs: &HashMap<String, Value>, field: &str, default: f64) -> f64 {
    inputs.get(field).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn input_str<'a>(inputs: &'a HashMap<String, Value>, field: &str) -> &'a str {
    inputs.get(field).and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn empty_docs_outcome() -> ragflow_engine::RunOutcome {
    ragflow_engine::RunOutcome::Values(HashMap::from([("docs".to_string(), Value::Array(Vec::new()))]))
}

pub(crate) fn docs_outcome(docs: Vec<DocumentWithScore>) -> Result<ragflow_engine::RunOutcome> {
    Ok(ragflow_engine::RunOutcome::Values(HashMap::from([(
        "docs".to_string(),
        serde_json::to_value(docs).map_err(FlowError::from)?,
    )])))
}

pub(crate) fn parse_docs_field(inputs: &HashMap<String, Value>, field: &str) -> Result<Vec<DocumentWithScore>> {
    match inputs.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| serde_json::from_value(v.clone()).map_err(FlowError::from))
            .collect(),
        _ => Ok(Vec::new()),
    }
}
