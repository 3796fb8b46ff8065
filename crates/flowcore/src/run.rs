use crate::{NodeId, StoreError, Value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type RunId = Uuid;

/// Lifecycle of a run: `queued -> running -> succeeded | failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Whether a run in this status may move to `next`
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Succeeded)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// One execution attempt of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_ref: String,
    pub status: RunStatus,
    pub input: Value,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// A fresh run in `queued` status
    pub fn queued(workflow_ref: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_ref: workflow_ref.into(),
            status: RunStatus::Queued,
            input,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPhase {
    Start,
    Success,
    Failure,
}

impl LogPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogPhase::Start => "start",
            LogPhase::Success => "success",
            LogPhase::Failure => "failure",
        }
    }
}

impl fmt::Display for LogPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(LogPhase::Start),
            "success" => Ok(LogPhase::Success),
            "failure" => Ok(LogPhase::Failure),
            other => Err(format!("unknown log phase: {other}")),
        }
    }
}

/// Append-only record of a node lifecycle event within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_id: RunId,
    pub node_id: NodeId,
    pub node_type: String,
    pub phase: LogPhase,
    pub payload: Value,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Durable storage for runs and their logs
///
/// Each call must be atomic on its own; the engine does no cross-run locking.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a run in `queued` status
    async fn create_run(&self, workflow_ref: &str, input: &Value) -> Result<Run, StoreError>;

    /// Move a run to `status`, optionally setting its result
    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        result: Option<&Value>,
    ) -> Result<(), StoreError>;

    async fn append_run_log(&self, entry: RunLogEntry) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>, StoreError>;

    /// Log entries of a run in insertion order
    async fn run_logs(&self, run_id: RunId) -> Result<Vec<RunLogEntry>, StoreError>;

    /// Runs of a workflow, newest first
    async fn list_runs(&self, workflow_ref: &str) -> Result<Vec<Run>, StoreError>;
}
