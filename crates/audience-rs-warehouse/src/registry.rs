//! Routing queries to warehouse connections.
//!
//! A [`WarehouseRegistry`] holds one executor per connection id and is
//! itself a [`WarehouseExecutor`]: each call is dispatched by the
//! `connection_id` of its [`ExecutionContext`]. All registered executors
//! must speak the registry's dialect, since SQL is compiled once before
//! dispatch.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use audience_rs_core::WarehouseDialect;
//! use audience_rs_warehouse::{SqliteWarehouse, WarehouseRegistry};
//!
//! let mut registry = WarehouseRegistry::new(WarehouseDialect::Sqlite);
//! registry
//!     .register("tenant-a", Arc::new(SqliteWarehouse::memory().unwrap()))
//!     .unwrap();
//! assert!(registry.contains("tenant-a"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use audience_rs_core::{AudienceError, AudienceResult, WarehouseDialect};
use audience_rs_query::executor::{ExecutionContext, WarehouseExecutor};
use audience_rs_query::{Row, Value};

/// Executors keyed by connection id.
pub struct WarehouseRegistry {
    dialect: WarehouseDialect,
    executors: HashMap<String, Arc<dyn WarehouseExecutor>>,
}

impl WarehouseRegistry {
    /// Creates an empty registry for `dialect`.
    pub fn new(dialect: WarehouseDialect) -> Self {
        Self {
            dialect,
            executors: HashMap::new(),
        }
    }

    /// Registers an executor under `connection_id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the executor speaks another dialect.
    pub fn register(
        &mut self,
        connection_id: impl Into<String>,
        executor: Arc<dyn WarehouseExecutor>,
    ) -> AudienceResult<()> {
        let connection_id = connection_id.into();
        if executor.dialect() != self.dialect {
            return Err(AudienceError::ConfigurationError(format!(
                "Connection '{connection_id}' speaks {:?}, registry expects {:?}",
                executor.dialect(),
                self.dialect
            )));
        }
        tracing::debug!(connection = %connection_id, "Registered warehouse connection");
        self.executors.insert(connection_id, executor);
        Ok(())
    }

    /// Removes a connection.
    pub fn unregister(&mut self, connection_id: &str) -> Option<Arc<dyn WarehouseExecutor>> {
        self.executors.remove(connection_id)
    }

    /// Returns `true` if `connection_id` is registered.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.executors.contains_key(connection_id)
    }

    /// Returns the registered connection ids, sorted.
    pub fn connection_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the executor for `connection_id`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for an unknown connection.
    pub fn get(&self, connection_id: &str) -> AudienceResult<&Arc<dyn WarehouseExecutor>> {
        self.executors.get(connection_id).ok_or_else(|| {
            AudienceError::ConfigurationError(format!(
                "Unknown warehouse connection '{connection_id}'"
            ))
        })
    }
}

#[async_trait::async_trait]
impl WarehouseExecutor for WarehouseRegistry {
    fn dialect(&self) -> WarehouseDialect {
        self.dialect
    }

    async fn execute_query(
        &self,
        ctx: &ExecutionContext,
        sql: &str,
        params: &[Value],
    ) -> AudienceResult<Vec<Row>> {
        self.get(&ctx.connection_id)?
            .execute_query(ctx, sql, params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        dialect: WarehouseDialect,
        label: &'static str,
    }

    #[async_trait::async_trait]
    impl WarehouseExecutor for Fixed {
        fn dialect(&self) -> WarehouseDialect {
            self.dialect
        }

        async fn execute_query(
            &self,
            _ctx: &ExecutionContext,
            _sql: &str,
            _params: &[Value],
        ) -> AudienceResult<Vec<Row>> {
            Ok(vec![Row::from_pairs([("source", self.label)])])
        }
    }

    fn fixed(label: &'static str) -> Arc<dyn WarehouseExecutor> {
        Arc::new(Fixed {
            dialect: WarehouseDialect::Postgres,
            label,
        })
    }

    #[tokio::test]
    async fn test_dispatch_by_connection_id() {
        let mut registry = WarehouseRegistry::new(WarehouseDialect::Postgres);
        registry.register("tenant-a", fixed("a")).unwrap();
        registry.register("tenant-b", fixed("b")).unwrap();

        let rows = registry
            .execute_query(&ExecutionContext::new("tenant-b"), "SELECT 1", &[])
            .await
            .unwrap();
        assert_eq!(rows[0].get::<String>("source").unwrap(), "b");
    }

    #[tokio::test]
    async fn test_unknown_connection() {
        let registry = WarehouseRegistry::new(WarehouseDialect::Postgres);
        let err = registry
            .execute_query(&ExecutionContext::new("missing"), "SELECT 1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
    }

    #[test]
    fn test_register_rejects_other_dialect() {
        let mut registry = WarehouseRegistry::new(WarehouseDialect::Snowflake);
        assert!(registry.register("tenant-a", fixed("a")).is_err());
        assert!(!registry.contains("tenant-a"));
    }

    #[test]
    fn test_connection_ids_sorted() {
        let mut registry = WarehouseRegistry::new(WarehouseDialect::Postgres);
        registry.register("zeta", fixed("z")).unwrap();
        registry.register("alpha", fixed("a")).unwrap();
        assert_eq!(registry.connection_ids(), vec!["alpha", "zeta"]);
        assert!(registry.unregister("zeta").is_some());
        assert_eq!(registry.connection_ids(), vec!["alpha"]);
    }
}
