use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{
    ExecutionEvent, LogPhase, NodeEvent, NodeKind, NodeSpec, RunId, RunStore, Value, Workflow,
};
use flownodes::{LlmConfig, NodesConfig};
use flowruntime::{scheduler, validator, FlowRuntime, RuntimeConfig, SqliteRunStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Run input as a JSON value
        #[arg(short, long)]
        input: Option<String>,

        /// Persist the run to this SQLite database
        #[arg(long, env = "FLOW_DB")]
        db: Option<PathBuf>,

        /// Answer LLM nodes with the mock provider
        #[arg(long, env = "LLM_MOCK_MODE", default_value_t = true, action = clap::ArgAction::Set)]
        llm_mock: bool,

        /// Model name reported by the LLM provider
        #[arg(long, env = "LLM_MODEL", default_value = "mock-gpt")]
        llm_model: String,
    },

    /// Validate a workflow file and print its execution order
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },

    /// Inspect persisted runs
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
}

#[derive(Subcommand)]
enum RunsCommand {
    /// Show one run and its log
    Show {
        #[arg(long, env = "FLOW_DB")]
        db: PathBuf,

        run_id: RunId,
    },

    /// List runs of a workflow, newest first
    List {
        #[arg(long, env = "FLOW_DB")]
        db: PathBuf,

        /// Workflow id the runs were recorded under
        workflow_ref: String,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            file,
            input,
            db,
            llm_mock,
            llm_model,
        } => {
            let config = NodesConfig {
                llm: LlmConfig {
                    mock: llm_mock,
                    model: llm_model,
                },
            };
            run_workflow(&file, input, db, &config).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }

        Commands::Runs { command } => match command {
            RunsCommand::Show { db, run_id } => show_run(&db, run_id).await?,
            RunsCommand::List { db, workflow_ref } => list_runs(&db, &workflow_ref).await?,
        },
    }

    Ok(())
}

fn read_workflow(file: &Path) -> Result<String> {
    std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read workflow file {}", file.display()))
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    Ok(Workflow::from_json(&read_workflow(file)?)?)
}

fn parse_input(input: Option<String>) -> Result<Value> {
    match input {
        Some(raw) => {
            let json: serde_json::Value =
                serde_json::from_str(&raw).context("Input must be valid JSON")?;
            Ok(Value::from(json))
        }
        None => Ok(Value::object()),
    }
}

async fn run_workflow(
    file: &Path,
    input: Option<String>,
    db: Option<PathBuf>,
    config: &NodesConfig,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow_json = read_workflow(file)?;
    let workflow = Workflow::from_json(&workflow_json)?;
    let input = parse_input(input)?;

    println!("📋 Workflow: {} ({})", workflow.name, workflow.id);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    if db.is_some() && !Workflow::declares_id(&workflow_json) {
        tracing::warn!(workflow_id = %workflow.id, "workflow file has no id");
        println!(
            "   ⚠️  No \"id\" in {}, so runs of this file will not share a workflow reference",
            file.display()
        );
    }
    println!();

    let registry = Arc::new(flownodes::default_registry(config));
    let runtime = match &db {
        Some(path) => {
            let store = SqliteRunStore::open(path)?;
            FlowRuntime::with_store(registry, Arc::new(store), RuntimeConfig::default())
        }
        None => FlowRuntime::with_registry(registry, RuntimeConfig::default()),
    };

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    println!("     ⚠️  {} events dropped", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match event {
                ExecutionEvent::RunStarted { run_id, .. } => {
                    println!("▶️  Run {} started", run_id);
                }
                ExecutionEvent::NodeStarted {
                    node_id, node_type, ..
                } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, node_type);
                }
                ExecutionEvent::NodeSucceeded {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", node_id, message);
                    }
                    NodeEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", node_id, message);
                    }
                },
                ExecutionEvent::RunFinished {
                    status,
                    duration_ms,
                    ..
                } => {
                    println!("🏁 Run finished as {} in {}ms", status, duration_ms);
                    break;
                }
            }
        }
    });

    let outcome = runtime.execute(&workflow, input).await?;

    // Let the listener drain the final events
    if tokio::time::timeout(Duration::from_millis(500), event_task)
        .await
        .is_err()
    {
        tracing::debug!("event listener did not finish in time");
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", outcome.run_id);
    println!("   Status: {}", outcome.status);
    println!("   Log entries: {}", outcome.trace.len());
    if let Some(path) = &db {
        println!("   Stored in: {}", path.display());
    }
    println!();
    println!("📤 Result:");
    println!("{}", serde_json::to_string_pretty(&outcome.result)?);

    if let Some(err) = outcome.error {
        bail!("Run {} failed: {}", outcome.run_id, err);
    }

    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    validator::validate(&workflow)?;
    let order = scheduler::order(&workflow.nodes, &workflow.edges)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!("   Execution order:");
    for (position, node) in order.iter().enumerate() {
        println!("     {}. {} ({})", position + 1, node.id, node.node_type);
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = flownodes::default_registry(&NodesConfig::default());

    for kind in registry.list_node_types() {
        let Some(metadata) = registry.get_metadata(kind) else {
            println!("  • {}", kind);
            continue;
        };
        println!("  • {} ({})", kind, metadata.category);
        println!("    {}", metadata.description);
        for field in &metadata.config {
            let marker = if field.required { "required" } else { "optional" };
            println!("      - {} [{}]: {}", field.name, marker, field.description);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new("Example Webhook Workflow");

    let hook = workflow.add_node(NodeSpec::new("webhook", NodeKind::Webhook));
    let shape = workflow.add_node(
        NodeSpec::new("transform", NodeKind::Transform)
            .with_config("expr", "({...input, added: 123})"),
    );
    let ask = workflow.add_node(NodeSpec::new("llm", NodeKind::Llm).with_config("prompt", "Echo"));

    workflow.connect(hook, shape.clone());
    workflow.connect(shape, ask);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --input '{{\"foo\": \"bar\"}}'",
        output.display()
    );

    Ok(())
}

async fn show_run(db: &Path, run_id: RunId) -> Result<()> {
    let store = SqliteRunStore::open(db)?;
    let Some(run) = store.get_run(run_id).await? else {
        bail!("Run {} not found in {}", run_id, db.display());
    };

    println!("📋 Run {}", run.id);
    println!("   Workflow: {}", run.workflow_ref);
    println!("   Status: {}", run.status);
    println!("   Created: {}", run.created_at.to_rfc3339());
    println!("   Updated: {}", run.updated_at.to_rfc3339());
    println!("   Input: {}", run.input);
    if let Some(result) = &run.result {
        println!("   Result: {}", result);
    }

    println!();
    println!("📜 Log:");
    for entry in store.run_logs(run_id).await? {
        let icon = match entry.phase {
            LogPhase::Start => "⚡",
            LogPhase::Success => "✅",
            LogPhase::Failure => "❌",
        };
        let duration = entry
            .duration_ms
            .map(|ms| format!(" {}ms", ms))
            .unwrap_or_default();
        println!(
            "  {} {} {} ({}){}",
            icon,
            entry.created_at.to_rfc3339(),
            entry.node_id,
            entry.node_type,
            duration
        );
        if let Some(error) = &entry.error {
            println!("       error: {}", error);
        }
    }

    Ok(())
}

async fn list_runs(db: &Path, workflow_ref: &str) -> Result<()> {
    let store = SqliteRunStore::open(db)?;
    let runs = store.list_runs(workflow_ref).await?;

    if runs.is_empty() {
        println!("No runs recorded for workflow {}", workflow_ref);
        return Ok(());
    }

    println!("📚 Runs of workflow {}:", workflow_ref);
    for run in runs {
        println!(
            "  • {} {} {}",
            run.id,
            run.status,
            run.created_at.to_rfc3339()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_applies_to_every_command() {
        let cli = Cli::try_parse_from(["flow", "validate", "wf.json", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Validate { .. }));

        let cli = Cli::try_parse_from(["flow", "-v", "nodes"]).unwrap();
        assert!(cli.verbose);

        let cli = Cli::try_parse_from(["flow", "run", "--file", "wf.json"]).unwrap();
        assert!(!cli.verbose);
    }
}
