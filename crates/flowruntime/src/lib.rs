//! Workflow execution runtime
//!
//! This crate provides the execution engine that validates, schedules and
//! runs workflows, the node registry that dispatches each node to its
//! handler, and the run stores that keep the audit trail.

mod executor;
mod recorder;
mod registry;
mod router;
mod runtime;
pub mod scheduler;
pub mod store;
pub mod validator;

pub use executor::{RunOutcome, WorkflowExecutor};
pub use recorder::RunRecorder;
pub use registry::{ConfigField, NodeFactory, NodeMetadata, NodeRegistry};
pub use router::{resolve_input, ExecutionContext};
pub use runtime::{FlowRuntime, RuntimeConfig};
pub use store::{InMemoryRunStore, SqliteRunStore};
