//! The filter-to-SQL compiler.
//!
//! - [`resolver`] maps filter field names onto catalog columns.
//! - [`literal`] renders values as escaped SQL literals.
//! - [`lookups`] and [`compiler`] hold the expression tree and its rendering.
//! - [`conditions`] turns a flat filter list into an expression tree.
//! - [`joins`] resolves object roles and plans FROM/JOIN clauses.
//! - [`modes`] composes listing, count, and preview queries.

pub mod compiler;
pub mod conditions;
pub mod joins;
pub mod literal;
pub mod lookups;
pub mod modes;
pub mod resolver;

use audience_rs_core::{
    CompilerSettings, GroupingMode, JoinStrategy, Settings, ValueMode, WarehouseDialect,
};

use self::compiler::SqlCompiler;

/// Everything the compiler needs besides the audience and the filters.
///
/// Options are passed by reference into every compilation; there is no
/// shared default that one caller could change under another.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Placeholder style of the target warehouse.
    pub dialect: WarehouseDialect,
    /// Compiler behaviour.
    pub compiler: CompilerSettings,
}

impl CompileOptions {
    /// Builds options from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dialect: settings.warehouse.dialect,
            compiler: settings.compiler.clone(),
        }
    }

    /// Returns a copy targeting another dialect.
    #[must_use]
    pub fn with_dialect(mut self, dialect: WarehouseDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Sets the value mode.
    #[must_use]
    pub fn with_value_mode(mut self, value_mode: ValueMode) -> Self {
        self.compiler.value_mode = value_mode;
        self
    }

    /// Sets the grouping mode.
    #[must_use]
    pub fn with_grouping(mut self, grouping: GroupingMode) -> Self {
        self.compiler.grouping = grouping;
        self
    }

    /// Sets the join strategy.
    #[must_use]
    pub fn with_join_strategy(mut self, join_strategy: JoinStrategy) -> Self {
        self.compiler.join_strategy = join_strategy;
        self
    }

    /// Rejects unknown operators instead of compiling them as `equals`.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.compiler.strict_operators = true;
        self
    }

    /// Returns a renderer for these options.
    pub const fn sql_compiler(&self) -> SqlCompiler {
        SqlCompiler::new(self.dialect, self.compiler.value_mode)
    }
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub(crate) fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
