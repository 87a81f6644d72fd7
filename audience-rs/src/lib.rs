//! # audience-rs
//!
//! Compiles audience filters over a multi-object warehouse schema into SQL
//! for listings, counts, and previews, and runs them.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on it for
//! everything, or on individual crates for finer-grained control.
//!
//! ## Example
//!
//! ```
//! use audience_rs::prelude::*;
//!
//! let config = AudienceConfig::new()
//!     .with_object(
//!         ConfiguredObject::new(
//!             AudienceObject::new("companies", "companies").with_field(Field::string("country")),
//!             "c",
//!         )
//!         .with_role(ObjectRole::Parent),
//!     )
//!     .with_object(
//!         ConfiguredObject::new(
//!             AudienceObject::new("contacts", "contacts").with_field(Field::string("job_title")),
//!             "p",
//!         )
//!         .with_role(ObjectRole::Child),
//!     )
//!     .with_relationship(Relationship::new("c.company_id = p.company_id"));
//!
//! let filters = CohortFilters::new()
//!     .with_company_filter(Filter::new("country", Operator::Equals, "USA"));
//!
//! let counts = SqlQueryAssembler::default().compile_counts(&filters, &config).unwrap();
//! assert!(counts.sql.starts_with("WITH qualified_companies AS"));
//! ```

/// Errors, settings, and logging.
pub use audience_rs_core as core;

/// Data model, compiler, and execution flows.
pub use audience_rs_query as query;

/// Warehouse executors: SQLite and the connection registry.
#[cfg(feature = "warehouse")]
pub use audience_rs_warehouse as warehouse;

/// Management commands (CLI).
#[cfg(feature = "cli")]
pub use audience_rs_cli as cli;

/// Testing utilities.
#[cfg(feature = "testing")]
pub use audience_rs_test as test;

// Third-party re-exports
pub use async_trait;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// Commonly used types.
pub mod prelude {
    pub use audience_rs_core::{AudienceError, AudienceResult, Settings, WarehouseDialect};
    pub use audience_rs_query::{
        AudienceConfig, AudienceCounts, AudienceObject, AudiencePreview, CohortFilters,
        CompileOptions, ConfiguredObject, ExecutionContext, Field, Filter, LogicalOperator,
        ObjectRole, Operator, Relationship, Row, SqlQueryAssembler, Value, WarehouseExecutor,
    };
    #[cfg(feature = "warehouse")]
    pub use audience_rs_warehouse::{SqliteWarehouse, WarehouseRegistry};
}
