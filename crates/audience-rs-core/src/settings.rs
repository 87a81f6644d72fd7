//! Settings for audience-rs.
//!
//! This module provides the [`Settings`] struct, which holds every tunable of
//! the compiler and the warehouse layer. Settings are plain values passed to
//! the components that need them; there is no process-global instance, so two
//! tenants served by the same process never observe each other's defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The SQL dialect spoken by a warehouse.
///
/// The dialect only affects parameter placeholders; the compiled SQL is
/// otherwise portable across the supported engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseDialect {
    /// PostgreSQL (`$1, $2, ...`).
    #[default]
    Postgres,
    /// Amazon Redshift (`$1, $2, ...`).
    Redshift,
    /// Snowflake (`?`).
    Snowflake,
    /// SQLite (`?`).
    Sqlite,
}

impl WarehouseDialect {
    /// Returns `true` if placeholders are numbered (`$n`).
    pub const fn numbered_placeholders(self) -> bool {
        matches!(self, Self::Postgres | Self::Redshift)
    }

    /// Parses an engine name as used in settings files and env vars.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "redshift" => Some(Self::Redshift),
            "snowflake" => Some(Self::Snowflake),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// How filter values reach the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    /// Values are sent as bound parameters alongside placeholder SQL.
    #[default]
    Bound,
    /// Values are rendered as escaped SQL literals.
    Inline,
}

/// How a flat filter list is turned into a boolean expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupingMode {
    /// Adjacent filters sharing a connector form one group; groups are AND-ed.
    #[default]
    Adjacency,
    /// Each connector links a filter to the next one; AND binds tighter than OR.
    Precedence,
}

/// How the listing query joins configured objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// Each object after the root joins through the first relationship that
    /// mentions its alias; objects without one are dropped.
    #[default]
    Flat,
    /// Joins follow a breadth-first walk of the relationship graph; an
    /// unreachable object is an error.
    Graph,
}

/// Warehouse connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSettings {
    /// The warehouse dialect.
    pub dialect: WarehouseDialect,
    /// The connection identifier used when a caller does not name one.
    pub connection_id: String,
    /// Per-query deadline in seconds; `0` disables the deadline.
    pub query_timeout_secs: u64,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            dialect: WarehouseDialect::Postgres,
            connection_id: "default".to_string(),
            query_timeout_secs: 300,
        }
    }
}

impl WarehouseSettings {
    /// Returns the per-query deadline, if any.
    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_secs > 0).then(|| Duration::from_secs(self.query_timeout_secs))
    }
}

/// Filter compiler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Literal rendering versus parameter binding.
    pub value_mode: ValueMode,
    /// Boolean grouping of filter lists.
    pub grouping: GroupingMode,
    /// Join strategy for listing queries.
    pub join_strategy: JoinStrategy,
    /// Hard row cap applied to preview queries.
    pub preview_limit: usize,
    /// Column shared by parent and child objects in count and preview queries.
    pub default_join_key: String,
    /// Field whose presence marks an untagged object as the parent.
    pub parent_marker_field: String,
    /// Field whose presence marks an untagged object as the child.
    pub child_marker_field: String,
    /// Reject unknown operators instead of compiling them as `equals`.
    pub strict_operators: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            value_mode: ValueMode::Bound,
            grouping: GroupingMode::Adjacency,
            join_strategy: JoinStrategy::Flat,
            preview_limit: 25,
            default_join_key: "company_id".to_string(),
            parent_marker_field: "company_name".to_string(),
            child_marker_field: "job_title".to_string(),
            strict_operators: false,
        }
    }
}

/// Cohort count caching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortSettings {
    /// How long cached cohort counts stay valid, in seconds.
    pub count_ttl_secs: u64,
}

impl Default for CohortSettings {
    fn default() -> Self {
        Self {
            count_ttl_secs: 3600,
        }
    }
}

impl CohortSettings {
    /// Returns the count TTL as a `Duration`.
    pub const fn count_ttl(&self) -> Duration {
        Duration::from_secs(self.count_ttl_secs)
    }
}

/// The complete set of audience-rs settings.
///
/// # Examples
///
/// ```
/// use audience_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.compiler.preview_limit, 25);
/// assert_eq!(settings.warehouse.connection_id, "default");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log filter (e.g. "info", "audience_rs_query=debug").
    pub log_level: String,
    /// Warehouse connection settings.
    pub warehouse: WarehouseSettings,
    /// Compiler settings.
    pub compiler: CompilerSettings,
    /// Cohort settings.
    pub cohort: CohortSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            warehouse: WarehouseSettings::default(),
            compiler: CompilerSettings::default(),
            cohort: CohortSettings::default(),
        }
    }
}
