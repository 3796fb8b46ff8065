//! Durable run store backed by SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use flowcore::{LogPhase, Run, RunId, RunLogEntry, RunStatus, RunStore, StoreError, Value};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

const SCHEMA: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;

     CREATE TABLE IF NOT EXISTS runs (
         id TEXT PRIMARY KEY,
         workflow_ref TEXT NOT NULL,
         status TEXT NOT NULL,
         input TEXT NOT NULL,
         result TEXT,
         created_at TEXT NOT NULL,
         updated_at TEXT NOT NULL
     );

     CREATE INDEX IF NOT EXISTS idx_runs_workflow
         ON runs(workflow_ref, created_at DESC);

     CREATE TABLE IF NOT EXISTS run_logs (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         run_id TEXT NOT NULL REFERENCES runs(id),
         node_id TEXT NOT NULL,
         node_type TEXT NOT NULL,
         phase TEXT NOT NULL,
         payload TEXT NOT NULL,
         error TEXT,
         duration_ms INTEGER,
         created_at TEXT NOT NULL
     );

     CREATE INDEX IF NOT EXISTS idx_run_logs_run
         ON run_logs(run_id, id);";

/// Persistent run store backed by SQLite.
///
/// Log order is the insertion order of the `run_logs` rowid.
pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    /// Open or create the run database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("Failed to create store directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(backend)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_value(raw: &str) -> Result<Value, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

/// Raw `runs` row before decoding
struct RunRow {
    id: String,
    workflow_ref: String,
    status: String,
    input: String,
    result: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RunRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            workflow_ref: row.get(1)?,
            status: row.get(2)?,
            input: row.get(3)?,
            result: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_run(self) -> Result<Run, StoreError> {
        Ok(Run {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| StoreError::Serialization(format!("bad run id: {}", e)))?,
            workflow_ref: self.workflow_ref,
            status: self.status.parse().map_err(StoreError::Serialization)?,
            input: parse_value(&self.input)?,
            result: self.result.as_deref().map(parse_value).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Raw `run_logs` row before decoding
struct LogRow {
    run_id: String,
    node_id: String,
    node_type: String,
    phase: String,
    payload: String,
    error: Option<String>,
    duration_ms: Option<i64>,
    created_at: String,
}

impl LogRow {
    fn into_entry(self) -> Result<RunLogEntry, StoreError> {
        Ok(RunLogEntry {
            run_id: Uuid::parse_str(&self.run_id)
                .map_err(|e| StoreError::Serialization(format!("bad run id: {}", e)))?,
            node_id: self.node_id,
            node_type: self.node_type,
            phase: self
                .phase
                .parse::<LogPhase>()
                .map_err(StoreError::Serialization)?,
            payload: parse_value(&self.payload)?,
            error: self.error,
            duration_ms: self.duration_ms.map(|d| d.max(0) as u64),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

const RUN_COLUMNS: &str = "id, workflow_ref, status, input, result, created_at, updated_at";

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn create_run(&self, workflow_ref: &str, input: &Value) -> Result<Run, StoreError> {
        let run = Run::queued(workflow_ref, input.clone());
        let input_json = serde_json::to_string(&run.input)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (id, workflow_ref, status, input, result, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
            params![
                run.id.to_string(),
                run.workflow_ref,
                run.status.as_str(),
                input_json,
                timestamp(&run.created_at),
                timestamp(&run.updated_at),
            ],
        )
        .map_err(backend)?;

        Ok(run)
    }

    async fn update_run_status(
        &self,
        run_id: RunId,
        status: RunStatus,
        result: Option<&Value>,
    ) -> Result<(), StoreError> {
        let result_json = result.map(serde_json::to_string).transpose()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(backend)?;

        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;

        let current: RunStatus = current
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?
            .parse()
            .map_err(StoreError::Serialization)?;

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                run_id: run_id.to_string(),
                from: current.to_string(),
                to: status.to_string(),
            });
        }

        tx.execute(
            "UPDATE runs
             SET status = ?1, result = COALESCE(?2, result), updated_at = ?3
             WHERE id = ?4",
            params![
                status.as_str(),
                result_json,
                timestamp(&Utc::now()),
                run_id.to_string(),
            ],
        )
        .map_err(backend)?;

        tx.commit().map_err(backend)
    }

    async fn append_run_log(&self, entry: RunLogEntry) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&entry.payload)?;

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM runs WHERE id = ?1",
                params![entry.run_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        if exists.is_none() {
            return Err(StoreError::RunNotFound(entry.run_id.to_string()));
        }

        conn.execute(
            "INSERT INTO run_logs (run_id, node_id, node_type, phase, payload, error, duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.run_id.to_string(),
                entry.node_id,
                entry.node_type,
                entry.phase.as_str(),
                payload,
                entry.error,
                entry.duration_ms.map(|d| d as i64),
                timestamp(&entry.created_at),
            ],
        )
        .map_err(backend)?;

        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<Run>, StoreError> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id.to_string()],
                RunRow::from_row,
            )
            .optional()
            .map_err(backend)?
        };

        row.map(RunRow::into_run).transpose()
    }

    async fn run_logs(&self, run_id: RunId) -> Result<Vec<RunLogEntry>, StoreError> {
        let rows: Vec<LogRow> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare(
                    "SELECT run_id, node_id, node_type, phase, payload, error, duration_ms, created_at
                     FROM run_logs
                     WHERE run_id = ?1
                     ORDER BY id ASC",
                )
                .map_err(backend)?;

            let rows = stmt
                .query_map(params![run_id.to_string()], |row| {
                    Ok(LogRow {
                        run_id: row.get(0)?,
                        node_id: row.get(1)?,
                        node_type: row.get(2)?,
                        phase: row.get(3)?,
                        payload: row.get(4)?,
                        error: row.get(5)?,
                        duration_ms: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })
                .map_err(backend)?;

            let collected = rows.collect::<Result<Vec<_>, _>>().map_err(backend)?;
            collected
        };

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    async fn list_runs(&self, workflow_ref: &str) -> Result<Vec<Run>, StoreError> {
        let rows: Vec<RunRow> = {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM runs WHERE workflow_ref = ?1 ORDER BY created_at DESC, rowid DESC",
                    RUN_COLUMNS
                ))
                .map_err(backend)?;

            let rows = stmt
                .query_map(params![workflow_ref], RunRow::from_row)
                .map_err(backend)?;

            let collected = rows.collect::<Result<Vec<_>, _>>().map_err(backend)?;
            collected
        };

        rows.into_iter().map(RunRow::into_run).collect()
    }
}
