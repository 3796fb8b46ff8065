use crate::recorder::RunRecorder;
use crate::registry::NodeRegistry;
use crate::router::{resolve_input, ExecutionContext};
use crate::{scheduler, validator};
use chrono::Utc;
use flowcore::{
    EventBus, ExecutionEvent, FlowError, NodeContext, Run, RunId, RunLogEntry, RunStatus,
    RunStore, StoreError, Value, Workflow,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Executes workflows sequentially in topological order
///
/// Any node failure is terminal for the run: the remaining nodes are never
/// started and nothing is retried.
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn RunStore>,
    event_bus: Arc<EventBus>,
    recorder: RunRecorder,
}

impl WorkflowExecutor {
    pub fn new(
        registry: Arc<NodeRegistry>,
        store: Arc<dyn RunStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let recorder = RunRecorder::new(store.clone(), event_bus.clone());
        Self {
            registry,
            store,
            event_bus,
            recorder,
        }
    }

    /// Create a run for `workflow` and execute it to a terminal state
    ///
    /// Graph and node failures are reported through [`RunOutcome::error`];
    /// `Err` is returned only when the run store itself fails.
    pub async fn run(&self, workflow: &Workflow, input: Value) -> Result<RunOutcome, FlowError> {
        let run = self.store.create_run(&workflow.reference(), &input).await?;
        self.execute_queued(run, workflow).await
    }

    /// Execute a run that was created earlier in `queued` status
    pub async fn execute_queued(&self, run: Run, workflow: &Workflow) -> Result<RunOutcome, FlowError> {
        if run.status != RunStatus::Queued {
            return Err(StoreError::InvalidTransition {
                run_id: run.id.to_string(),
                from: run.status.to_string(),
                to: RunStatus::Running.to_string(),
            }
            .into());
        }

        let run_id = run.id;
        let start_time = Instant::now();

        self.store
            .update_run_status(run_id, RunStatus::Running, None)
            .await?;

        self.event_bus.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow_ref: run.workflow_ref.clone(),
            timestamp: Utc::now(),
        });

        info!("Starting run {} of workflow {}", run_id, run.workflow_ref);

        let result = match self.execute_dag(run_id, workflow, run.input).await {
            Ok(result) => result,
            Err(store_err) => {
                error!("Run {} aborted by store failure: {}", run_id, store_err);
                let payload = error_payload(&store_err.to_string());
                if let Err(e) = self
                    .store
                    .update_run_status(run_id, RunStatus::Failed, Some(&payload))
                    .await
                {
                    warn!("Could not mark run {} as failed: {}", run_id, e);
                }
                self.finish(run_id, RunStatus::Failed, start_time);
                return Err(store_err.into());
            }
        };

        let (status, payload, error) = match result {
            Ok(output) => (RunStatus::Succeeded, output, None),
            Err(err) => {
                error!("Run {} failed: {}", run_id, err);
                (RunStatus::Failed, error_payload(&err.to_string()), Some(err))
            }
        };

        self.store
            .update_run_status(run_id, status, Some(&payload))
            .await?;
        self.finish(run_id, status, start_time);

        let trace = self.store.run_logs(run_id).await?;

        Ok(RunOutcome {
            run_id,
            status,
            result: payload,
            error,
            trace,
        })
    }

    /// Validate, schedule and run every node in order.
    ///
    /// The outer `Result` carries store failures, the inner one the run's
    /// own success or failure.
    async fn execute_dag(
        &self,
        run_id: RunId,
        workflow: &Workflow,
        input: Value,
    ) -> Result<Result<Value, FlowError>, StoreError> {
        if let Err(e) = validator::validate(workflow) {
            return Ok(Err(e.into()));
        }

        let order = match scheduler::order(&workflow.nodes, &workflow.edges) {
            Ok(order) => order,
            Err(e) => return Ok(Err(e.into())),
        };

        debug!(
            "Execution order for run {}: {:?}",
            run_id,
            order.iter().map(|n| n.id.as_str()).collect::<Vec<_>>()
        );

        let mut ctx = ExecutionContext::new(input);
        let mut last_output = Value::Null;

        for node in order {
            let node_input = resolve_input(&node.id, &workflow.edges, &ctx);

            self.recorder.record_start(run_id, node, &node_input).await?;

            let node_ctx = NodeContext {
                run_id,
                node_id: node.id.clone(),
                input: node_input.clone(),
                config: node.config.clone(),
                events: self.event_bus.create_emitter(run_id, node.id.clone()),
            };

            let start = Instant::now();
            let result = self.registry.dispatch(node, node_ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    info!("Node {} completed in {}ms", node.id, duration_ms);
                    self.recorder
                        .record_success(run_id, node, &node_input, &output, duration_ms)
                        .await?;
                    ctx.record_output(node.id.clone(), output.clone());
                    last_output = output;
                }
                Err(e) => {
                    error!("Node {} failed: {}", node.id, e);
                    self.recorder
                        .record_failure(run_id, node, &node_input, &e, duration_ms)
                        .await?;
                    return Ok(Err(FlowError::Node {
                        node_id: node.id.clone(),
                        source: e,
                    }));
                }
            }
        }

        debug!("Run {} executed {} nodes", run_id, ctx.completed());
        Ok(Ok(last_output))
    }

    fn finish(&self, run_id: RunId, status: RunStatus, start_time: Instant) {
        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Run {} finished as {} in {}ms", run_id, status, duration_ms);
        self.event_bus.emit(ExecutionEvent::RunFinished {
            run_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}

fn error_payload(message: &str) -> Value {
    Value::object().with_field("error", message)
}

/// Result of workflow execution
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Last node's output on success, `{ "error": ... }` on failure
    pub result: Value,
    pub error: Option<FlowError>,
    /// Run log entries in the order they were written
    pub trace: Vec<RunLogEntry>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
