//! # audience-rs-test
//!
//! Testing utilities for audience-rs. Provides a seeded in-memory warehouse
//! that logs every query it runs, a recording warehouse for tests that need
//! canned rows or failures, query-count assertions, and a sample audience.
//!
//! ## Modules
//!
//! - [`test_warehouse`] - Seeded SQLite warehouse with a query log
//! - [`recording`] - Warehouse that records queries and replies from a script
//! - [`assert_queries`] - Query-count assertions
//! - [`fixtures`] - Sample companies and contacts audience

#[cfg(feature = "sqlite")]
pub mod assert_queries;
pub mod fixtures;
pub mod recording;
#[cfg(feature = "sqlite")]
pub mod test_warehouse;

#[cfg(feature = "sqlite")]
pub use assert_queries::{assert_max_queries, assert_num_queries};
pub use recording::RecordingWarehouse;
#[cfg(feature = "sqlite")]
pub use test_warehouse::{LoggedQuery, TestWarehouse};
