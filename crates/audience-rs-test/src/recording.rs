//! A warehouse that records queries and answers from a script.
//!
//! Each [`RecordingWarehouse`] rule matches queries whose SQL contains a
//! fragment and replies with rows, an error, or rows after a delay. Queries
//! matching no rule return no rows. Any dialect can be reported, so SQL
//! compiled for Postgres or Snowflake can be exercised without a server.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use audience_rs_core::{AudienceError, AudienceResult, WarehouseDialect};
use audience_rs_query::executor::{ExecutionContext, WarehouseExecutor};
use audience_rs_query::{Row, Value};

#[derive(Debug, Clone)]
enum Reply {
    Rows(Vec<Row>),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    fragment: String,
    reply: Reply,
    delay: Duration,
}

/// A recording warehouse.
///
/// # Examples
///
/// ```
/// use audience_rs_core::WarehouseDialect;
/// use audience_rs_query::Row;
/// use audience_rs_test::RecordingWarehouse;
///
/// let warehouse = RecordingWarehouse::new(WarehouseDialect::Postgres)
///     .on("company_count", vec![Row::from_pairs([("company_count", 3_i64), ("people_count", 7_i64)])])
///     .fail_on("LIMIT", "warehouse is read-only");
/// assert!(warehouse.seen().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RecordingWarehouse {
    dialect: WarehouseDialect,
    rules: Vec<Rule>,
    seen: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl RecordingWarehouse {
    /// Creates a warehouse that reports `dialect` and answers every query
    /// with no rows.
    pub fn new(dialect: WarehouseDialect) -> Self {
        Self {
            dialect,
            rules: Vec::new(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers queries containing `fragment` with `rows`.
    #[must_use]
    pub fn on(mut self, fragment: impl Into<String>, rows: Vec<Row>) -> Self {
        self.rules.push(Rule {
            fragment: fragment.into(),
            reply: Reply::Rows(rows),
            delay: Duration::ZERO,
        });
        self
    }

    /// Fails queries containing `fragment` with a warehouse error.
    #[must_use]
    pub fn fail_on(mut self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push(Rule {
            fragment: fragment.into(),
            reply: Reply::Fail(message.into()),
            delay: Duration::ZERO,
        });
        self
    }

    /// Answers queries containing `fragment` with `rows` after `delay`.
    #[must_use]
    pub fn slow_on(mut self, fragment: impl Into<String>, rows: Vec<Row>, delay: Duration) -> Self {
        self.rules.push(Rule {
            fragment: fragment.into(),
            reply: Reply::Rows(rows),
            delay,
        });
        self
    }

    /// Returns the SQL and parameters of every query received.
    pub fn seen(&self) -> Vec<(String, Vec<Value>)> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait::async_trait]
impl WarehouseExecutor for RecordingWarehouse {
    fn dialect(&self) -> WarehouseDialect {
        self.dialect
    }

    async fn execute_query(
        &self,
        _ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((sql.to_string(), params.to_vec()));

        let Some(rule) = self.rules.iter().find(|r| sql.contains(&r.fragment)) else {
            return Ok(Vec::new());
        };
        if !rule.delay.is_zero() {
            tokio::time::sleep(rule.delay).await;
        }
        match &rule.reply {
            Reply::Rows(rows) => Ok(rows.clone()),
            Reply::Fail(message) => Err(AudienceError::WarehouseError(message.clone())),
        }
    }
}
