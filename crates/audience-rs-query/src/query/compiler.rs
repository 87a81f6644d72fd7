//! Boolean expression tree and SQL rendering.
//!
//! The [`SqlCompiler`] renders a [`WhereNode`] tree into SQL text. In
//! [`ValueMode::Bound`] every operand becomes a dialect placeholder and is
//! appended to a parameter list in textual order; in [`ValueMode::Inline`]
//! operands are rendered as escaped literals by the
//! [`literal`](super::literal) formatter.

use audience_rs_core::{ValueMode, WarehouseDialect};
use serde::Serialize;

use super::literal::{format_list, format_literal, quote_string};
use super::lookups::Lookup;
use crate::value::Value;

/// A node in a WHERE clause tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// A single comparison against an alias-qualified column.
    Condition {
        /// The qualified column (`alias.column`).
        column: String,
        /// The comparison.
        lookup: Lookup,
    },
    /// All children must hold. An empty AND is always true.
    And(Vec<WhereNode>),
    /// Any child may hold. An empty OR is always false.
    Or(Vec<WhereNode>),
}

impl WhereNode {
    /// Creates a condition node.
    pub fn condition(column: impl Into<String>, lookup: Lookup) -> Self {
        Self::Condition {
            column: column.into(),
            lookup,
        }
    }

    /// Returns `true` for a childless AND/OR.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            Self::Condition { .. } => false,
        }
    }

    /// AND-s several trees together.
    ///
    /// Top-level AND children are concatenated and empty trees are skipped,
    /// so combining two grouped filter lists keeps each list's groups intact.
    pub fn and_all(nodes: impl IntoIterator<Item = Self>) -> Self {
        let mut children = Vec::new();
        for node in nodes {
            match node {
                Self::And(inner) => children.extend(inner),
                other if other.is_empty() => {}
                other => children.push(other),
            }
        }
        Self::And(children)
    }

    /// Counts the condition leaves in the tree.
    pub fn condition_count(&self) -> usize {
        match self {
            Self::Condition { .. } => 1,
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::condition_count).sum()
            }
        }
    }
}

/// The output of compiling one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// The SQL text.
    pub sql: String,
    /// Bound parameters in placeholder order; empty in inline mode.
    pub params: Vec<Value>,
    /// Non-fatal problems found while compiling (dropped joins, defaulted
    /// operators).
    pub warnings: Vec<String>,
}

impl CompiledQuery {
    /// Creates a compiled query with no warnings.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            warnings: Vec::new(),
        }
    }
}

/// Renders WHERE trees for one dialect and value mode.
///
/// Different dialects use different placeholder styles:
/// - PostgreSQL / Redshift: `$1, $2, $3, ...`
/// - Snowflake / SQLite: `?, ?, ?, ...`
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler {
    dialect: WarehouseDialect,
    value_mode: ValueMode,
}

impl SqlCompiler {
    /// Creates a compiler.
    pub const fn new(dialect: WarehouseDialect, value_mode: ValueMode) -> Self {
        Self {
            dialect,
            value_mode,
        }
    }

    /// Returns the dialect.
    pub const fn dialect(&self) -> WarehouseDialect {
        self.dialect
    }

    /// Returns the value mode.
    pub const fn value_mode(&self) -> ValueMode {
        self.value_mode
    }

    /// Returns a parameter placeholder for the given 1-based index.
    fn placeholder(&self, index: usize) -> String {
        if self.dialect.numbered_placeholders() {
            format!("${index}")
        } else {
            "?".to_string()
        }
    }

    /// Renders an operand, binding it when in bound mode.
    fn operand(&self, value: &Value, params: &mut Vec<Value>) -> String {
        match self.value_mode {
            ValueMode::Inline => format_literal(value),
            ValueMode::Bound => {
                params.push(value.clone());
                self.placeholder(params.len())
            }
        }
    }

    /// Renders a tree into a fresh string and parameter list.
    pub fn render(&self, node: &WhereNode) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.compile_where(node, &mut sql, &mut params);
        (sql, params)
    }

    /// Appends the rendering of `node` to `sql`, pushing bound operands onto
    /// `params`.
    ///
    /// The root is never parenthesized; nested groups with more than one
    /// member are.
    pub fn compile_where(&self, node: &WhereNode, sql: &mut String, params: &mut Vec<Value>) {
        self.compile_where_node(node, false, sql, params);
    }

    fn compile_where_node(
        &self,
        node: &WhereNode,
        nested: bool,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        let (children, keyword, identity) = match node {
            WhereNode::Condition { column, lookup } => {
                self.compile_lookup(column, lookup, sql, params);
                return;
            }
            WhereNode::And(children) => (children, " AND ", "1=1"),
            WhereNode::Or(children) => (children, " OR ", "1=0"),
        };

        match children.as_slice() {
            [] => sql.push_str(identity),
            [only] => self.compile_where_node(only, true, sql, params),
            _ => {
                if nested {
                    sql.push('(');
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(keyword);
                    }
                    self.compile_where_node(child, true, sql, params);
                }
                if nested {
                    sql.push(')');
                }
            }
        }
    }

    /// Compiles a single lookup into SQL.
    fn compile_lookup(&self, column: &str, lookup: &Lookup, sql: &mut String, params: &mut Vec<Value>) {
        match lookup {
            Lookup::Exact(Value::Null) => sql.push_str(&format!("{column} IS NULL")),
            Lookup::NotExact(Value::Null) => sql.push_str(&format!("{column} IS NOT NULL")),
            Lookup::Exact(val) => {
                let rhs = self.operand(val, params);
                sql.push_str(&format!("{column} = {rhs}"));
            }
            Lookup::NotExact(val) => {
                let rhs = self.operand(val, params);
                sql.push_str(&format!("{column} != {rhs}"));
            }
            Lookup::Gt(val) => {
                let rhs = self.operand(val, params);
                sql.push_str(&format!("{column} > {rhs}"));
            }
            Lookup::Lt(val) => {
                let rhs = self.operand(val, params);
                sql.push_str(&format!("{column} < {rhs}"));
            }
            Lookup::Contains(text) => {
                let rhs = self.like_pattern(text, params);
                sql.push_str(&format!("{column} LIKE {rhs}"));
            }
            Lookup::NotContains(text) => {
                let rhs = self.like_pattern(text, params);
                sql.push_str(&format!("{column} NOT LIKE {rhs}"));
            }
            Lookup::In(vals) if vals.is_empty() => sql.push_str("1=0"),
            Lookup::NotIn(vals) if vals.is_empty() => sql.push_str("1=1"),
            Lookup::In(vals) => {
                let list = self.operand_list(vals, params);
                sql.push_str(&format!("{column} IN ({list})"));
            }
            Lookup::NotIn(vals) => {
                let list = self.operand_list(vals, params);
                sql.push_str(&format!("{column} NOT IN ({list})"));
            }
        }
    }

    fn like_pattern(&self, text: &str, params: &mut Vec<Value>) -> String {
        let pattern = format!("%{text}%");
        match self.value_mode {
            ValueMode::Inline => quote_string(&pattern),
            ValueMode::Bound => self.operand(&Value::String(pattern), params),
        }
    }

    fn operand_list(&self, vals: &[Value], params: &mut Vec<Value>) -> String {
        match self.value_mode {
            ValueMode::Inline => format_list(vals),
            ValueMode::Bound => vals
                .iter()
                .map(|v| self.operand(v, params))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
