//! Query-count assertions.
//!
//! [`assert_num_queries`] counts the warehouse queries issued during an
//! async closure. Useful for pinning that counts cost one round trip and a
//! preview costs exactly two.
//!
//! ## Example
//!
//! ```rust,no_run
//! use audience_rs_query::{ExecutionContext, SqlQueryAssembler};
//! use audience_rs_test::assert_queries::assert_num_queries;
//! use audience_rs_test::fixtures::{director_filters, sample_config};
//! use audience_rs_test::test_warehouse::TestWarehouse;
//!
//! async fn example() {
//!     let warehouse = TestWarehouse::seeded().await;
//!     assert_num_queries(&warehouse, 2, || async {
//!         SqlQueryAssembler::default()
//!             .get_preview(&warehouse, &ExecutionContext::new("default"), &director_filters(), &sample_config(), None)
//!             .await
//!             .unwrap();
//!     })
//!     .await;
//! }
//! ```

use std::future::Future;

use crate::test_warehouse::TestWarehouse;

/// Asserts that exactly `expected_count` queries run during the closure.
///
/// # Panics
///
/// Panics if the number of queries does not match `expected_count`.
pub async fn assert_num_queries<F, Fut>(warehouse: &TestWarehouse, expected_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    warehouse.reset_query_count();
    f().await;
    let actual = warehouse.query_count();
    assert_eq!(
        actual,
        expected_count,
        "Expected {expected_count} warehouse queries, but {actual} were executed: {:#?}",
        warehouse.executed_sql()
    );
}

/// Asserts that at most `max_count` queries run during the closure.
///
/// # Panics
///
/// Panics if more than `max_count` queries are executed.
pub async fn assert_max_queries<F, Fut>(warehouse: &TestWarehouse, max_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    warehouse.reset_query_count();
    f().await;
    let actual = warehouse.query_count();
    assert!(
        actual <= max_count,
        "Expected at most {max_count} warehouse queries, but {actual} were executed"
    );
}
