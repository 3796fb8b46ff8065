use crate::store::InMemoryRunStore;
use crate::{registry::NodeRegistry, RunOutcome, WorkflowExecutor};
use flowcore::{
    EventBus, FlowError, Run, RunId, RunLogEntry, RunStore, StoreError, Value, Workflow,
    WorkflowError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Main runtime for executing workflows
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn RunStore>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    workflows: Arc<RwLock<HashMap<uuid::Uuid, Workflow>>>,
}

impl FlowRuntime {
    /// Create a runtime that keeps runs in memory
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self::with_store(registry, Arc::new(InMemoryRunStore::new()), config)
    }

    /// Create a runtime backed by the given run store
    pub fn with_store(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn RunStore>,
        config: RuntimeConfig,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let executor = Arc::new(WorkflowExecutor::new(
            registry.clone(),
            store.clone(),
            event_bus.clone(),
        ));

        Self {
            registry,
            store,
            executor,
            event_bus,
            workflows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get access to the node registry
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Register a workflow
    pub async fn register_workflow(&self, workflow: Workflow) {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow);
    }

    /// Execute a registered workflow by ID
    pub async fn execute_workflow(
        &self,
        workflow_id: uuid::Uuid,
        input: Value,
    ) -> Result<RunOutcome, FlowError> {
        let workflow = self.find_workflow(workflow_id).await?;
        self.executor.run(&workflow, input).await
    }

    /// Execute a workflow directly (without registration)
    pub async fn execute(&self, workflow: &Workflow, input: Value) -> Result<RunOutcome, FlowError> {
        self.executor.run(workflow, input).await
    }

    /// Create a `queued` run to be executed later with [`FlowRuntime::execute_queued`]
    pub async fn enqueue(&self, workflow: &Workflow, input: Value) -> Result<Run, FlowError> {
        Ok(self.store.create_run(&workflow.reference(), &input).await?)
    }

    /// Execute a previously enqueued run
    pub async fn execute_queued(
        &self,
        run_id: RunId,
        workflow: &Workflow,
    ) -> Result<RunOutcome, FlowError> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        self.executor.execute_queued(run, workflow).await
    }

    /// Read back a run together with its ordered log entries
    pub async fn inspect_run(
        &self,
        run_id: RunId,
    ) -> Result<Option<(Run, Vec<RunLogEntry>)>, FlowError> {
        match self.store.get_run(run_id).await? {
            Some(run) => {
                let logs = self.store.run_logs(run_id).await?;
                Ok(Some((run, logs)))
            }
            None => Ok(None),
        }
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<flowcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    async fn find_workflow(&self, workflow_id: uuid::Uuid) -> Result<Workflow, FlowError> {
        let workflows = self.workflows.read().await;
        workflows
            .get(&workflow_id)
            .cloned()
            .ok_or_else(|| FlowError::Workflow(WorkflowError::NotFound(workflow_id.to_string())))
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}
