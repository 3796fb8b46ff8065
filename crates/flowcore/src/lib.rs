//! Core abstractions for the flow engine
//!
//! This crate provides the data model, error taxonomy and collaborator
//! traits that all other components depend on.

mod error;
pub mod events;
mod llm;
mod node;
mod run;
mod value;
mod workflow;

pub use error::{FlowError, NodeError, StoreError, WorkflowError};
pub use events::*;
pub use llm::{LlmError, LlmProvider, LlmResponse};
pub use node::{Node, NodeContext};
pub use run::{LogPhase, Run, RunId, RunLogEntry, RunStatus, RunStore};
pub use value::Value;
pub use workflow::{Edge, NodeId, NodeKind, NodeSpec, Workflow, WorkflowId};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
