//! # audience-rs-cli
//!
//! Management commands for audience-rs.
//!
//! - `compile` prints the SQL and parameters of a query mode
//! - `run` executes a query mode against a SQLite warehouse and prints JSON
//! - `check` validates an audience file and reports how it will compile
//!
//! ## Quick Start
//!
//! ```rust
//! use audience_rs_cli::command::CommandRegistry;
//! use audience_rs_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! assert_eq!(registry.list_commands(), vec!["check", "compile", "run"]);
//! ```

// These clippy lints are intentionally allowed:
// - result_large_err: AudienceError is the workspace-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
// - unused_async: command handlers maintain consistent async signatures
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;
pub mod input;

pub use command::{CommandRegistry, ManagementCommand};
