//! In-memory run store for testing and short-lived processes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flowcore::{Run, RunId, RunLogEntry, RunStatus, RunStore, StoreError, Value};
use tokio::sync::RwLock;

/// In-memory implementation of [`RunStore`].
///
/// Uses `BTreeMap` for deterministic iteration order.
#[derive(Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<BTreeMap<RunId, Run>>>,
    logs: Arc<RwLock<BTreeMap<RunId, Vec<RunLogEntry>>>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, workflow_ref: &str, input: &Value) -> Result<Run, StoreError> {
        let run = Run::queued(workflow_ref, input.clone());
        self.runs.write().await.insert(run.id, run.clone());
        Ok(run)
    }

    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        result: Option<&Value>,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;

        if !run.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                run_id: run_id.to_string(),
                from: run.status.to_string(),
                to: status.to_string(),
            });
        }

        run.status = status;
        if let Some(result) = result {
            run.result = Some(result.clone());
        }
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn append_run_log(&self, entry: RunLogEntry) -> Result<(), StoreError> {
        if !self.runs.read().await.contains_key(&entry.run_id) {
            return Err(StoreError::RunNotFound(entry.run_id.to_string()));
        }
        self.logs
            .write()
            .await
            .entry(entry.run_id)
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn run_logs(&self, run_id: RunId) -> Result<Vec<RunLogEntry>, StoreError> {
        Ok(self
            .logs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_runs(&self, workflow_ref: &str) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.workflow_ref == workflow_ref)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }
}
