//! SQL literal rendering (the value formatter).
//!
//! Used when the compiler runs in [`ValueMode::Inline`] and for the human
//! readable SQL printed by the CLI. Strings are single-quoted with internal
//! quotes doubled; numbers are emitted bare.
//!
//! [`ValueMode::Inline`]: audience_rs_core::ValueMode::Inline

use crate::value::Value;

/// Wraps `s` in single quotes, doubling any embedded quote.
///
/// ```
/// use audience_rs_query::query::literal::quote_string;
///
/// assert_eq!(quote_string("O'Brien"), "'O''Brien'");
/// ```
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Reverses [`quote_string`], returning `None` if `literal` is not a
/// well-formed quoted string.
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\'' {
            // A lone quote would have terminated the literal.
            if chars.next() != Some('\'') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Renders a value as a SQL literal.
///
/// Lists render as their comma-joined elements; the caller supplies the
/// surrounding parentheses.
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::String(s) => quote_string(s),
        Value::Date(d) => quote_string(&d.to_string()),
        Value::DateTime(dt) => quote_string(&dt.to_string()),
        Value::Json(j) => quote_string(&j.to_string()),
        Value::List(items) => format_list(items),
    }
}

/// Renders each element with [`format_literal`] and joins them with `, `.
pub fn format_list(items: &[Value]) -> String {
    items.iter().map(format_literal).collect::<Vec<_>>().join(", ")
}
