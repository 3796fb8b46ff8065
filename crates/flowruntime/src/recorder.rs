use chrono::Utc;
use flowcore::{
    EventBus, ExecutionEvent, LogPhase, NodeError, NodeSpec, RunId, RunLogEntry, RunStore,
    StoreError, Value,
};
use std::sync::Arc;

/// Appends node lifecycle entries to the run log and mirrors them on the event bus.
///
/// Every call writes exactly one entry. Nothing here updates or removes
/// earlier entries.
#[derive(Clone)]
pub struct RunRecorder {
    store: Arc<dyn RunStore>,
    event_bus: Arc<EventBus>,
}

impl RunRecorder {
    pub fn new(store: Arc<dyn RunStore>, event_bus: Arc<EventBus>) -> Self {
        Self { store, event_bus }
    }

    pub async fn record_start(
        &self,
        run_id: RunId,
        node: &NodeSpec,
        input: &Value,
    ) -> Result<(), StoreError> {
        let payload = Value::object().with_field("input", input.clone());
        self.append(run_id, node, LogPhase::Start, payload, None, None)
            .await?;

        self.event_bus.emit(ExecutionEvent::NodeStarted {
            run_id,
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub async fn record_success(
        &self,
        run_id: RunId,
        node: &NodeSpec,
        input: &Value,
        output: &Value,
        duration_ms: u64,
    ) -> Result<(), StoreError> {
        let payload = Value::object()
            .with_field("input", input.clone())
            .with_field("output", output.clone());
        self.append(run_id, node, LogPhase::Success, payload, None, Some(duration_ms))
            .await?;

        self.event_bus.emit(ExecutionEvent::NodeSucceeded {
            run_id,
            node_id: node.id.clone(),
            duration_ms,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub async fn record_failure(
        &self,
        run_id: RunId,
        node: &NodeSpec,
        input: &Value,
        error: &NodeError,
        duration_ms: u64,
    ) -> Result<(), StoreError> {
        let payload = Value::object().with_field("input", input.clone());
        let message = error.to_string();
        self.append(
            run_id,
            node,
            LogPhase::Failure,
            payload,
            Some(message.clone()),
            Some(duration_ms),
        )
        .await?;

        self.event_bus.emit(ExecutionEvent::NodeFailed {
            run_id,
            node_id: node.id.clone(),
            error: message,
            duration_ms,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn append(
        &self,
        run_id: RunId,
        node: &NodeSpec,
        phase: LogPhase,
        payload: Value,
        error: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<(), StoreError> {
        self.store
            .append_run_log(RunLogEntry {
                run_id,
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                phase,
                payload,
                error,
                duration_ms,
                created_at: Utc::now(),
            })
            .await
    }
}
