//! Warehouse executor trait and per-call execution context.
//!
//! This module defines the [`WarehouseExecutor`] trait that the compiled
//! queries are handed to. Concrete warehouses (e.g. `SqliteWarehouse`) live
//! in the `audience-rs-warehouse` crate; this crate only needs the trait so
//! that execution can be defined without a dependency on any driver.
//!
//! Every call carries an [`ExecutionContext`] naming the connection, the
//! tenant, a deadline, and a cancellation token. Nothing about a call is
//! stored on a shared executor instance.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use audience_rs_core::logging::query_span;
use audience_rs_core::{AudienceError, AudienceResult, WarehouseDialect, WarehouseSettings};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::query::compiler::CompiledQuery;
use crate::row::Row;
use crate::value::Value;

/// Minimal async warehouse executor.
#[async_trait::async_trait]
pub trait WarehouseExecutor: Send + Sync {
    /// Returns the dialect queries must be compiled for.
    fn dialect(&self) -> WarehouseDialect;

    /// Runs a query and returns all result rows.
    async fn execute_query(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>>;
}

#[async_trait::async_trait]
impl<T: WarehouseExecutor + ?Sized> WarehouseExecutor for Arc<T> {
    fn dialect(&self) -> WarehouseDialect {
        (**self).dialect()
    }

    async fn execute_query(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>> {
        (**self).execute_query(ctx, sql, params).await
    }
}

/// Per-call execution parameters.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use audience_rs_query::executor::ExecutionContext;
///
/// let ctx = ExecutionContext::new("tenant-42")
///     .with_tenant("acme")
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(ctx.connection_id, "tenant-42");
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The warehouse connection the query is routed to.
    pub connection_id: String,
    /// The tenant on whose behalf the query runs.
    pub tenant_id: Option<String>,
    /// Deadline for each query; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Cancels in-flight queries when triggered.
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Creates a context for `connection_id` with no deadline.
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            tenant_id: None,
            timeout: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Creates a context from warehouse settings.
    pub fn from_settings(settings: &WarehouseSettings) -> Self {
        Self {
            timeout: settings.query_timeout(),
            ..Self::new(settings.connection_id.clone())
        }
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Sets the per-query deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Removes the per-query deadline.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Cancels every query running under this context.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::from_settings(&WarehouseSettings::default())
    }
}

/// Which query shape is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Listing query.
    Listing,
    /// Count query.
    Count,
    /// Parent preview.
    CompanyPreview,
    /// Child preview.
    ContactPreview,
    /// Distinct values of one field.
    DistinctValues,
}

impl QueryMode {
    /// Returns the name used in logs and errors.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Count => "count",
            Self::CompanyPreview => "company_preview",
            Self::ContactPreview => "contact_preview",
            Self::DistinctValues => "distinct_values",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs a compiled query under the context's deadline and cancellation.
///
/// Executor failures are wrapped in `ExecutionError` with the mode and SQL
/// text. Timeouts and cancellations are returned as `QueryTimeout` and
/// `Cancelled`. Configuration and validation errors (an unknown connection
/// id, for one) pass through unwrapped.
pub async fn run_query(
    executor: &dyn WarehouseExecutor,
    ctx: &ExecutionContext,
    mode: QueryMode,
    query: &CompiledQuery,
) -> AudienceResult<Vec<Row>> {
    let span = query_span(mode.as_str(), &ctx.connection_id, ctx.tenant_id.as_deref());
    async move {
        tracing::debug!(sql = %query.sql, params = query.params.len(), "Executing warehouse query");
        let started = Instant::now();

        let call = async {
            let pending = executor.execute_query(ctx, &query.sql, &query.params);
            match ctx.timeout {
                Some(after) => match tokio::time::timeout(after, pending).await {
                    Ok(result) => result,
                    Err(_) => Err(AudienceError::QueryTimeout {
                        mode: mode.to_string(),
                        after,
                    }),
                },
                None => pending.await,
            }
        };

        let result = tokio::select! {
            biased;
            () = ctx.cancellation.cancelled() => Err(AudienceError::Cancelled {
                mode: mode.to_string(),
            }),
            result = call => result,
        };

        match result {
            Ok(rows) => {
                tracing::info!(rows = rows.len(), elapsed = ?started.elapsed(), "Warehouse query finished");
                Ok(rows)
            }
            Err(e) if e.is_interrupted() => {
                tracing::warn!(error = %e, "Warehouse query interrupted");
                Err(e)
            }
            Err(e @ (AudienceError::ConfigurationError(_) | AudienceError::ValidationError(_))) => {
                tracing::error!(error = %e, "Warehouse query rejected");
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "Warehouse query failed");
                Err(AudienceError::ExecutionError {
                    mode: mode.to_string(),
                    sql: query.sql.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowWarehouse {
        delay: Duration,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl WarehouseExecutor for SlowWarehouse {
        fn dialect(&self) -> WarehouseDialect {
            WarehouseDialect::Sqlite
        }

        async fn execute_query(
            &self,
            _ctx: &ExecutionContext,
            _sql: &str,
            _params: &[Value],
        ) -> AudienceResult<Vec<Row>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AudienceError::WarehouseError("relation does not exist".into()));
            }
            Ok(vec![Row::from_pairs([("n", 1_i64)])])
        }
    }

    fn query() -> CompiledQuery {
        CompiledQuery::new("SELECT 1 AS n", Vec::new())
    }

    #[tokio::test]
    async fn test_run_query_returns_rows() {
        let warehouse = SlowWarehouse {
            delay: Duration::ZERO,
            fail: false,
        };
        let rows = run_query(&warehouse, &ExecutionContext::new("default"), QueryMode::Count, &query())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_run_query_wraps_failures() {
        let warehouse = SlowWarehouse {
            delay: Duration::ZERO,
            fail: true,
        };
        let err = run_query(&warehouse, &ExecutionContext::new("default"), QueryMode::Listing, &query())
            .await
            .unwrap_err();
        match err {
            AudienceError::ExecutionError { mode, sql, reason } => {
                assert_eq!(mode, "listing");
                assert_eq!(sql, "SELECT 1 AS n");
                assert!(reason.contains("relation does not exist"));
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    struct Unrouted;

    #[async_trait::async_trait]
    impl WarehouseExecutor for Unrouted {
        fn dialect(&self) -> WarehouseDialect {
            WarehouseDialect::Postgres
        }

        async fn execute_query(
            &self,
            ctx: &ExecutionContext,
            _sql: &str,
            _params: &[Value],
        ) -> AudienceResult<Vec<Row>> {
            Err(AudienceError::ConfigurationError(format!(
                "Unknown warehouse connection '{}'",
                ctx.connection_id
            )))
        }
    }

    #[tokio::test]
    async fn test_run_query_passes_configuration_errors_through() {
        let ctx = ExecutionContext::new("tenant-zzz").with_tenant("acme");
        let err = run_query(&Unrouted, &ctx, QueryMode::Count, &query())
            .await
            .unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(ref m) if m.contains("tenant-zzz")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_query_times_out() {
        let warehouse = SlowWarehouse {
            delay: Duration::from_secs(600),
            fail: false,
        };
        let ctx = ExecutionContext::new("default").with_timeout(Duration::from_secs(5));
        let err = run_query(&warehouse, &ctx, QueryMode::Count, &query())
            .await
            .unwrap_err();
        assert!(matches!(err, AudienceError::QueryTimeout { after, .. } if after == Duration::from_secs(5)));
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_query_cancelled() {
        let warehouse = SlowWarehouse {
            delay: Duration::from_secs(600),
            fail: false,
        };
        let ctx = ExecutionContext::new("default");
        let token = ctx.cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let err = run_query(&warehouse, &ctx, QueryMode::CompanyPreview, &query())
            .await
            .unwrap_err();
        assert!(matches!(err, AudienceError::Cancelled { ref mode } if mode == "company_preview"));
    }

    #[tokio::test]
    async fn test_already_cancelled_context() {
        let warehouse = SlowWarehouse {
            delay: Duration::ZERO,
            fail: false,
        };
        let ctx = ExecutionContext::new("default");
        ctx.cancel();
        let err = run_query(&warehouse, &ctx, QueryMode::Count, &query())
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
    }

    #[test]
    fn test_context_from_settings() {
        let mut settings = WarehouseSettings::default();
        settings.connection_id = "snowflake-eu".into();
        settings.query_timeout_secs = 0;
        let ctx = ExecutionContext::from_settings(&settings);
        assert_eq!(ctx.connection_id, "snowflake-eu");
        assert_eq!(ctx.timeout, None);
        assert_eq!(ExecutionContext::default().timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_query_mode_display() {
        assert_eq!(QueryMode::ContactPreview.to_string(), "contact_preview");
        assert_eq!(QueryMode::Count.as_str(), "count");
    }
}
