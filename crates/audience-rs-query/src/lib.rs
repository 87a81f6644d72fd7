//! # audience-rs-query
//!
//! The filter-to-SQL compiler for audience-rs. It turns a structured filter
//! specification into warehouse SQL across a configured multi-object join
//! graph, and derives three query shapes from the same filters: listing,
//! aggregate count, and bounded preview.
//!
//! ## Modules
//!
//! - [`model`] - Objects, fields, relationships, audience configuration
//! - [`filter`] - Filters and cohort filter specifications
//! - [`value`] - Backend-agnostic values
//! - [`row`] - Result rows
//! - [`query`] - Field resolution, condition grouping, joins, query modes
//! - [`assembler`] - The compile-and-execute facade
//! - [`executor`] - The warehouse executor trait and execution context
//! - [`cohort`] - Cohort lifecycle and cached counts
//! - [`source`] - Audience configuration sources

// These clippy lints are allowed for the compiler crate:
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - result_large_err: AudienceError carries structured validation errors
// - return_self_not_must_use: builder methods on models and options
// - missing_const_for_fn: accessors that may stop being const
#![allow(clippy::format_push_string)]
#![allow(clippy::result_large_err)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]

pub mod assembler;
pub mod cohort;
pub mod executor;
pub mod filter;
pub mod model;
pub mod query;
pub mod row;
pub mod source;
pub mod value;

pub use assembler::{AudienceCounts, AudiencePreview, SqlQueryAssembler};
pub use cohort::{refresh_cohort_counts, Cohort, CohortStatus};
pub use executor::{run_query, ExecutionContext, QueryMode, WarehouseExecutor};
pub use filter::{CohortFilters, Filter, FilterValue, LogicalOperator, Operator};
pub use model::{
    AudienceConfig, AudienceObject, ConfiguredObject, DataType, Field, JoinType, ObjectRole,
    Relationship,
};
pub use query::compiler::CompiledQuery;
pub use query::CompileOptions;
pub use row::Row;
pub use source::{AudienceConfigSource, InMemoryAudienceSource};
pub use value::Value;
