//! A seeded in-memory warehouse for tests.
//!
//! [`TestWarehouse`] wraps a [`SqliteWarehouse`] and records every query it
//! runs, so tests can assert on the SQL the assembler produced as well as on
//! the rows it got back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use audience_rs_query::{ExecutionContext, SqlQueryAssembler};
//! use audience_rs_test::fixtures::{director_filters, sample_config};
//! use audience_rs_test::test_warehouse::TestWarehouse;
//!
//! async fn example() {
//!     let warehouse = TestWarehouse::seeded().await;
//!     let counts = SqlQueryAssembler::default()
//!         .get_counts(&warehouse, &ExecutionContext::new("default"), &director_filters(), &sample_config())
//!         .await
//!         .unwrap();
//!     assert_eq!(counts.company_count, 2);
//!     assert_eq!(warehouse.query_count(), 1);
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use audience_rs_core::{AudienceResult, WarehouseDialect};
use audience_rs_query::executor::{ExecutionContext, WarehouseExecutor};
use audience_rs_query::{Row, Value};
use audience_rs_warehouse::SqliteWarehouse;

use crate::fixtures::SAMPLE_SCHEMA;

/// One query seen by a [`TestWarehouse`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    /// Connection id of the context the query ran under.
    pub connection_id: String,
    /// SQL text.
    pub sql: String,
    /// Bound parameters.
    pub params: Vec<Value>,
}

/// An in-memory SQLite warehouse with a query counter and log.
///
/// Every `TestWarehouse::new()` call creates a fresh database.
#[derive(Clone)]
pub struct TestWarehouse {
    inner: Arc<SqliteWarehouse>,
    query_count: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<LoggedQuery>>>,
}

impl TestWarehouse {
    /// Creates an empty in-memory warehouse.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory database cannot be created.
    pub fn new() -> Self {
        let inner = SqliteWarehouse::memory().expect("Failed to create in-memory SQLite warehouse");
        Self {
            inner: Arc::new(inner),
            query_count: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a warehouse loaded with [`SAMPLE_SCHEMA`].
    ///
    /// # Panics
    ///
    /// Panics if the schema cannot be loaded.
    pub async fn seeded() -> Self {
        let warehouse = Self::new();
        warehouse
            .execute_raw(SAMPLE_SCHEMA)
            .await
            .expect("Failed to load sample schema");
        warehouse
    }

    /// Runs statements directly, bypassing the counter and log.
    pub async fn execute_raw(&self, sql: &str) -> AudienceResult<()> {
        self.inner.execute_batch(sql).await
    }

    /// Returns the number of queries run since the last reset.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Resets the query counter and clears the log.
    pub fn reset_query_count(&self) {
        self.query_count.store(0, Ordering::SeqCst);
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Returns the logged queries in the order they started.
    pub fn queries(&self) -> Vec<LoggedQuery> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the SQL of the logged queries.
    pub fn executed_sql(&self) -> Vec<String> {
        self.queries().into_iter().map(|q| q.sql).collect()
    }
}

impl Default for TestWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WarehouseExecutor for TestWarehouse {
    fn dialect(&self) -> WarehouseDialect {
        WarehouseDialect::Sqlite
    }

    async fn execute_query(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedQuery {
                connection_id: ctx.connection_id.clone(),
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        self.inner.execute_query(ctx, sql, params).await
    }
}
