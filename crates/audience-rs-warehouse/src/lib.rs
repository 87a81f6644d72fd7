//! # audience-rs-warehouse
//!
//! Concrete [`WarehouseExecutor`](audience_rs_query::WarehouseExecutor)
//! implementations for audience-rs.
//!
//! ## Feature Flags
//!
//! - `sqlite` (default) - Enables [`SqliteWarehouse`] via `rusqlite`
//!
//! ## Modules
//!
//! - [`registry`] - Routes queries to executors by connection id
//! - [`sqlite`] - SQLite warehouse (requires `sqlite` feature)

// These clippy lints are allowed for the warehouse crate:
// - result_large_err: AudienceError carries structured validation errors
// - significant_drop_tightening: the connection guard lives for the whole blocking closure
#![allow(clippy::result_large_err)]
#![allow(clippy::significant_drop_tightening)]

pub mod registry;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use registry::WarehouseRegistry;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWarehouse;
