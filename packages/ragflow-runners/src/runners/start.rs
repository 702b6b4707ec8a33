//! The `start` node (§4.6.8): an identity pass-through that surfaces the
//! run's original query so every other node can bind to `start.query`
//! uniformly instead of reading `SystemInput` directly.

use std::collections::HashMap;

use async_trait::async_trait;
use ragflow_core::Result;
use ragflow_engine::{NodeRunner, RunOutcome, SystemInput};
use serde_json::Value;

pub struct StartRunner;

#[async_trait]
impl NodeRunner for StartRunner {
    fn type_key(&self) -> &str {
        "start"
    }

    async fn run(&self, inputs: HashMap<String, Value>, system: &SystemInput) -> Result<RunOutcome> {
        let query = inputs
            .get("query")
            .cloned()
            .unwrap_or_else(|| Value::String(system.query.clone()));
        Ok(RunOutcome::Values(HashMap::from([("query".to_string(), query)])))
    }
}
