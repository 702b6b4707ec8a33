//! Flow execution engine: validator (C2), scheduler (C3), execution
//! context (C4), input binder (C5), node runner contract, event bus (C8),
//! and the `FlowEngine` that drives all of them for one run.

pub mod binder;
pub mod context;
pub mod engine;
pub mod events;
pub mod runner;
pub mod scheduler;
pub mod validator;

pub use context::ExecutionContext;
pub use engine::{ExecutionResult, FlowEngine};
pub use events::{EventBus, EventSubscriber};
pub use runner::{HistoryHandle, NodeRunner, NodeRunnerRegistry, RunOutcome, SystemInput, TokenStream};
pub use scheduler::{schedule, ExecutionPlan};
pub use validator::validate;
