//! # audience-rs-core
//!
//! Core types for the audience-rs workspace: the shared error taxonomy,
//! settings and their loaders, and logging setup. This crate has no
//! workspace dependencies and is the foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Compiler, warehouse, and cohort settings
//! - [`settings_loader`] - TOML/JSON loading with environment overrides
//! - [`logging`] - Tracing-based logging integration

// - result_large_err: AudienceError carries structured validation errors
#![allow(clippy::result_large_err)]

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{AudienceError, AudienceResult, ValidationError};
pub use settings::{
    CohortSettings, CompilerSettings, GroupingMode, JoinStrategy, Settings, ValueMode,
    WarehouseDialect, WarehouseSettings,
};
