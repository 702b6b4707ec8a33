//! The `FlowEngine`: validates a flow, schedules it, and drives execution
//! group by group, binding inputs, dispatching to node runners, recording
//! outputs, and publishing lifecycle events.
//!
//! A `FlowEngine` (and the `ExecutionContext` it builds) is constructed
//! fresh for each call to `execute`. It is intentionally not `Clone` and
//! holds no state that would make sense to reuse across runs — reusing
//! one across concurrent executions would let one run's node outputs leak
//! into another's context.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use ragflow_core::{FlowError, FlowEvent, FlowEventType, FlowInstance, NodeDefinitionRegistry, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::binder::bind_inputs;
use crate::context::ExecutionContext;
use crate::events::EventBus;
use crate::runner::{NodeRunnerRegistry, RunOutcome, SystemInput, TokenStream};
use crate::scheduler::schedule;
use crate::validator::validate;

/// The result of a completed (or streaming-in-progress) flow execution.
pub struct ExecutionResult {
    pub execution_id: String,
    pub context: ExecutionContext,
    /// Token streams produced by any node that returned
    /// `RunOutcome::Streaming`, keyed by node id. Draining these is the
    /// caller's responsibility; the engine itself has already moved on by
    /// the time this is returned.
    pub streams: HashMap<String, TokenStream>,
}

pub struct FlowEngine<'a> {
    node_definitions: &'a NodeDefinitionRegistry,
    node_runners: &'a NodeRunnerRegistry,
    bus: EventBus,
}

impl<'a> FlowEngine<'a> {
    pub fn new(node_definitions: &'a NodeDefinitionRegistry, node_runners: &'a NodeRunnerRegistry) -> Self {
        Self {
            node_definitions,
            node_runners,
            bus: EventBus::new(),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Validate, schedule, and execute `flow` to completion (or to the
    /// first node error / cancellation).
    pub async fn execute(
        &self,
        flow: &FlowInstance,
        initial_overrides: HashMap<String, Value>,
        system: &SystemInput,
    ) -> Result<ExecutionResult> {
        validate(flow, self.node_definitions)?;
        let plan = schedule(flow)?;

        let execution_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        self.bus.emit(FlowEvent::flow(FlowEventType::FlowStart, execution_id.clone()));

        let mut context = ExecutionContext::seed_globals(flow.globals.values().cloned(), &initial_overrides);
        let mut streams = HashMap::new();

        let result = self
            .run_groups(flow, &plan.groups, &mut context, &mut streams, &execution_id, system)
            .await;

        match result {
            Ok(()) => {
                self.bus.emit(FlowEvent::flow(FlowEventType::FlowEnd, execution_id.clone()));
                Ok(ExecutionResult {
                    execution_id,
                    context,
                    streams,
                })
            }
            Err(err) => {
                self.bus.emit(
                    FlowEvent::flow(FlowEventType::FlowError, execution_id.clone())
                        .with_data("error", Value::String(err.to_string())),
                );
                Err(err)
            }
        }
    }

    async fn run_groups(
        &self,
        flow: &FlowInstance,
        groups: &[Vec<String>],
        context: &mut ExecutionContext,
        streams: &mut HashMap<String, TokenStream>,
        execution_id: &str,
        system: &SystemInput,
    ) -> Result<()> {
        for group in groups {
            if system.is_cancelled() {
                return Err(FlowError::Cancelled);
            }

            let mut prepared = Vec::with_capacity(group.len());
            for node_id in group {
                let node = &flow.nodes[node_id];
                let definition = self.node_definitions.require(&node.type_key)?;
                let runner = self
                    .node_runners
                    .get(&node.type_key)
                    .cloned()
                    .ok_or_else(|| FlowError::NodeTypeUnknown(node.type_key.clone()))?;
                let inputs = bind_inputs(node, definition, context)?;
                self.bus.emit(
                    FlowEvent::node(FlowEventType::NodeStart, execution_id, node_id.clone())
                        .with_data("inputs", Value::Object(inputs.clone().into_iter().collect())),
                );
                prepared.push((node_id.clone(), runner, inputs));
            }

            let outcomes = join_all(
                prepared
                    .into_iter()
                    .map(|(node_id, runner, inputs)| async move {
                        let outcome = runner.run(inputs, system).await;
                        (node_id, outcome)
                    }),
            )
            .await;

            for (node_id, outcome) in outcomes {
                match outcome {
                    Ok(outcome) => {
                        let node = &flow.nodes[&node_id];
                        let definition = self.node_definitions.require(&node.type_key)?;
                        let values = outcome.values().clone();
                        for field in &definition.output_schema {
                            if field.required && !values.contains_key(&field.name) {
                                let err = FlowError::MissingRequiredInput {
                                    node: node_id.clone(),
                                    field: field.name.clone(),
                                };
                                self.bus.emit(
                                    FlowEvent::node(FlowEventType::NodeError, execution_id, node_id.clone())
                                        .with_data("error", Value::String(err.to_string())),
                                );
                                return Err(err);
                            }
                        }
                        if let RunOutcome::Streaming { tokens, .. } = outcome {
                            streams.insert(node_id.clone(), tokens);
                        }
                        context.set_outputs(&node_id, values)?;
                        self.bus
                            .emit(FlowEvent::node(FlowEventType::NodeEnd, execution_id, node_id));
                    }
                    Err(err) => {
                        self.bus.emit(
                            FlowEvent::node(FlowEventType::NodeError, execution_id, node_id)
                                .with_data("error", Value::String(err.to_string())),
                        );
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragflow_core::{FieldDefinition, FieldType, InputBinding, NodeDefinition, NodeDefinitionRegistryBuilder, NodeInstance};
    use serde_json::json;

    struct EchoRunner;

    #[async_trait]
    impl crate::runner::NodeRunner for EchoRunner {
        fn type_key(&self) -> &str {
            "start"
        }
        async fn run(&self, inputs: HashMap<String, Value>, _system: &SystemInput) -> Result<RunOutcome> {
            let query = inputs.get("query").cloned().unwrap_or(Value::Null);
            Ok(RunOutcome::Values(HashMap::from([("query".to_string(), query)])))
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl crate::runner::NodeRunner for FailingRunner {
        fn type_key(&self) -> &str {
            "fail"
        }
        async fn run(&self, _inputs: HashMap<String, Value>, _system: &SystemInput) -> Result<RunOutcome> {
            Err(FlowError::InvalidDocument("boom".into()))
        }
    }

    fn registries() -> (NodeDefinitionRegistry, NodeRunnerRegistry) {
        let definitions = NodeDefinitionRegistryBuilder::new()
            .register(
                NodeDefinition::new("start")
                    .with_input(FieldDefinition::new("query", FieldType::String))
                    .with_output(FieldDefinition::new("query", FieldType::String).required()),
            )
            .register(NodeDefinition::new("fail"))
            .build();
        let mut runners: NodeRunnerRegistry = HashMap::new();
        runners.insert("start".to_string(), Arc::new(EchoRunner));
        runners.insert("fail".to_string(), Arc::new(FailingRunner));
        (definitions, runners)
    }

    #[tokio::test]
    async fn executes_single_node_flow() {
        let (defs, runners) = registries();
        let engine = FlowEngine::new(&defs, &runners);
        let flow = FlowInstance::new("f", "t").with_node(
            NodeInstance::new("start", "start").with_binding(InputBinding::static_value("query", json!("hi"))),
        );
        let system = SystemInput::new("user-1", "msg-1", "hi");
        let result = engine.execute(&flow, HashMap::new(), &system).await.unwrap();
        assert_eq!(result.context.get_output("start", "query"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn node_error_aborts_run() {
        let (defs, runners) = registries();
        let engine = FlowEngine::new(&defs, &runners);
        let flow = FlowInstance::new("f", "t").with_node(NodeInstance::new("bad", "fail"));
        let system = SystemInput::new("user-1", "msg-1", "query");
        let err = engine.execute(&flow, HashMap::new(), &system).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn cancellation_before_a_group_aborts() {
        let (defs, runners) = registries();
        let engine = FlowEngine::new(&defs, &runners);
        let flow = FlowInstance::new("f", "t").with_node(NodeInstance::new("start", "start"));
        let system = SystemInput::new("user-1", "msg-1", "query");
        system.cancellation.cancel();
        let err = engine.execute(&flow, HashMap::new(), &system).await.unwrap_err();
        assert!(matches!(err, FlowError::Cancelled));
    }

    #[tokio::test]
    async fn events_are_published_on_the_bus() {
        let (defs, runners) = registries();
        let engine = FlowEngine::new(&defs, &runners);
        let mut sub = engine.event_bus().subscribe();
        let flow = FlowInstance::new("f", "t").with_node(NodeInstance::new("start", "start"));
        let system = SystemInput::new("user-1", "msg-1", "query");
        engine.execute(&flow, HashMap::new(), &system).await.unwrap();
        let first = sub.recv().await.unwrap();
        assert_eq!(first.event_type, FlowEventType::FlowStart);
    }
}
