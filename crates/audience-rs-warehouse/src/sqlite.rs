//! SQLite warehouse using `rusqlite`.
//!
//! [`SqliteWarehouse`] implements [`WarehouseExecutor`] for local files and
//! in-memory databases. Queries run on `tokio::task::spawn_blocking` behind
//! an async mutex. If the awaiting future is dropped (deadline elapsed or
//! context cancelled), a statement still waiting for the connection is
//! skipped, and one already running is interrupted. Statements of other
//! callers sharing the connection are never touched.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use audience_rs_core::{AudienceError, AudienceResult, WarehouseDialect};
use audience_rs_query::executor::{ExecutionContext, WarehouseExecutor};
use audience_rs_query::{Row, Value};
use rusqlite::types::ValueRef;
use tokio::sync::Mutex;

/// A SQLite-backed warehouse.
pub struct SqliteWarehouse {
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
    interrupt: Arc<rusqlite::InterruptHandle>,
}

impl SqliteWarehouse {
    /// Opens the database at `path`. `:memory:` opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `WarehouseError` if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> AudienceResult<Self> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| AudienceError::WarehouseError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| AudienceError::WarehouseError(format!("Failed to set pragmas: {e}")))?;

        tracing::debug!(path = %path.display(), "Opened SQLite warehouse");
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        })
    }

    /// Opens a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `WarehouseError` if the database cannot be created.
    pub fn memory() -> AudienceResult<Self> {
        Self::open(":memory:")
    }

    /// Returns the database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs a batch of statements without parameters (schema and seed data).
    ///
    /// # Errors
    ///
    /// Returns `WarehouseError` if any statement fails.
    pub async fn execute_batch(&self, sql: &str) -> AudienceResult<()> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            conn.blocking_lock()
                .execute_batch(&sql)
                .map_err(|e| AudienceError::WarehouseError(e.to_string()))
        })
        .await
        .map_err(|e| AudienceError::WarehouseError(format!("Task join error: {e}")))?
    }

    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> AudienceResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Date(d) => stmt.raw_bind_parameter(idx, d.to_string()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_string()),
                Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string()),
                Value::List(_) => stmt.raw_bind_parameter(idx, param.to_json().to_string()),
            }
            .map_err(|e| AudienceError::WarehouseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> AudienceResult<Row> {
        let mut values = Vec::with_capacity(column_names.len());
        for i in 0..column_names.len() {
            let cell = sqlite_row
                .get_ref(i)
                .map_err(|e| AudienceError::WarehouseError(e.to_string()))?;
            values.push(match cell {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => Value::Int(v),
                ValueRef::Real(v) => Value::Float(v),
                ValueRef::Text(b) | ValueRef::Blob(b) => {
                    Value::String(String::from_utf8_lossy(b).into_owned())
                }
            });
        }
        Ok(Row::new(column_names.to_vec(), values))
    }

    fn query_blocking(
        conn: &rusqlite::Connection,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AudienceError::WarehouseError(e.to_string()))?;
        let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        Self::bind_params(&mut stmt, params)?;

        let mut raw_rows = stmt.raw_query();
        let mut rows = Vec::new();
        while let Some(row) = raw_rows
            .next()
            .map_err(|e| AudienceError::WarehouseError(e.to_string()))?
        {
            rows.push(Self::convert_row(row, &column_names)?);
        }
        Ok(rows)
    }
}

/// Where one call stands relative to the shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    /// Waiting for the connection lock.
    Queued,
    /// Holds the lock and is running its statement.
    Running,
    /// Finished; the connection may belong to another call.
    Done,
    /// The caller went away; a queued statement must not start.
    Abandoned,
}

/// Shared between a call's future and its blocking task.
struct Call {
    state: StdMutex<CallState>,
    interrupt: Arc<rusqlite::InterruptHandle>,
}

impl Call {
    /// Moves `from` to `to`, returning `false` if the call was elsewhere.
    fn transition(&self, from: CallState, to: CallState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }
}

/// Abandons the call when the awaiting future is dropped.
///
/// A queued call is marked so its task never runs the statement. A running
/// call is interrupted while the state lock is held, so the interrupt can
/// only land on the statement this call owns.
struct AbandonOnDrop(Arc<Call>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            CallState::Queued => {
                tracing::debug!("Abandoning queued SQLite statement");
                *state = CallState::Abandoned;
            }
            CallState::Running => {
                tracing::debug!("Interrupting abandoned SQLite statement");
                self.0.interrupt.interrupt();
                *state = CallState::Abandoned;
            }
            CallState::Done | CallState::Abandoned => {}
        }
    }
}

#[async_trait::async_trait]
impl WarehouseExecutor for SqliteWarehouse {
    fn dialect(&self) -> WarehouseDialect {
        WarehouseDialect::Sqlite
    }

    async fn execute_query(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        let cancellation = ctx.cancellation.clone();

        let call = Arc::new(Call {
            state: StdMutex::new(CallState::Queued),
            interrupt: self.interrupt.clone(),
        });
        let guard = AbandonOnDrop(call.clone());
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            if cancellation.is_cancelled() || !call.transition(CallState::Queued, CallState::Running) {
                return Err(AudienceError::WarehouseError(
                    "query cancelled before start".into(),
                ));
            }
            let result = Self::query_blocking(&conn, &sql, &params);
            call.transition(CallState::Running, CallState::Done);
            result
        })
        .await
        .map_err(|e| AudienceError::WarehouseError(format!("Task join error: {e}")));
        drop(guard);
        result?
    }
}
