//! Field-level comparisons produced from filter operators.

use audience_rs_core::ValidationError;

use crate::filter::{FilterValue, Operator};
use crate::value::Value;

/// A comparison applied to one column.
///
/// Each variant corresponds to a filter [`Operator`] and produces the
/// matching SQL fragment in [`SqlCompiler`](super::compiler::SqlCompiler).
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// `col = val`
    Exact(Value),
    /// `col != val`
    NotExact(Value),
    /// `col > val`
    Gt(Value),
    /// `col < val`
    Lt(Value),
    /// `col LIKE '%val%'`
    Contains(String),
    /// `col NOT LIKE '%val%'`
    NotContains(String),
    /// `col IN (v1, v2, ...)`
    In(Vec<Value>),
    /// `col NOT IN (v1, v2, ...)`
    NotIn(Vec<Value>),
}

impl Lookup {
    /// Builds the lookup for `operator` applied to `value`.
    ///
    /// `in` and `not_in` with a scalar operand fall back to `=` and `!=`.
    /// List operands are only accepted by `in` and `not_in`.
    pub fn build(operator: Operator, value: &FilterValue) -> Result<Self, ValidationError> {
        match (operator, value) {
            (Operator::In, FilterValue::List(_)) => Ok(Self::In(list_values(value)?)),
            (Operator::NotIn, FilterValue::List(_)) => Ok(Self::NotIn(list_values(value)?)),
            (_, FilterValue::List(_)) => Err(ValidationError::new(
                format!("Operator '{operator}' does not accept a list value"),
                "invalid_value",
            )
            .with_param("operator", operator.as_str())),
            (Operator::Equals | Operator::In, _) => Ok(Self::Exact(value.to_value()?)),
            (Operator::NotEquals | Operator::NotIn, _) => Ok(Self::NotExact(value.to_value()?)),
            (Operator::GreaterThan, _) => Ok(Self::Gt(value.to_value()?)),
            (Operator::LessThan, _) => Ok(Self::Lt(value.to_value()?)),
            (Operator::Contains, _) => Ok(Self::Contains(pattern_text(value)?)),
            (Operator::NotContains, _) => Ok(Self::NotContains(pattern_text(value)?)),
        }
    }
}

fn list_values(value: &FilterValue) -> Result<Vec<Value>, ValidationError> {
    match value.to_value()? {
        Value::List(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

fn pattern_text(value: &FilterValue) -> Result<String, ValidationError> {
    match value.to_value()? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scalar_lookups() {
        let usa = FilterValue::from("USA");
        assert_eq!(
            Lookup::build(Operator::Equals, &usa).unwrap(),
            Lookup::Exact(Value::from("USA"))
        );
        assert_eq!(
            Lookup::build(Operator::NotEquals, &usa).unwrap(),
            Lookup::NotExact(Value::from("USA"))
        );
        assert_eq!(
            Lookup::build(Operator::GreaterThan, &FilterValue::from(50)).unwrap(),
            Lookup::Gt(Value::Int(50))
        );
        assert_eq!(
            Lookup::build(Operator::LessThan, &FilterValue::from(10)).unwrap(),
            Lookup::Lt(Value::Int(10))
        );
    }

    #[test]
    fn test_build_contains_number_uses_text() {
        assert_eq!(
            Lookup::build(Operator::Contains, &FilterValue::from(415)).unwrap(),
            Lookup::Contains("415".to_string())
        );
    }

    #[test]
    fn test_build_in_list() {
        let value = FilterValue::from(vec!["USA", "Canada"]);
        assert_eq!(
            Lookup::build(Operator::In, &value).unwrap(),
            Lookup::In(vec![Value::from("USA"), Value::from("Canada")])
        );
        assert_eq!(
            Lookup::build(Operator::NotIn, &value).unwrap(),
            Lookup::NotIn(vec![Value::from("USA"), Value::from("Canada")])
        );
    }

    #[test]
    fn test_build_in_scalar_falls_back() {
        let value = FilterValue::from("USA");
        assert_eq!(
            Lookup::build(Operator::In, &value).unwrap(),
            Lookup::Exact(Value::from("USA"))
        );
        assert_eq!(
            Lookup::build(Operator::NotIn, &value).unwrap(),
            Lookup::NotExact(Value::from("USA"))
        );
    }

    #[test]
    fn test_build_list_with_scalar_operator() {
        let err = Lookup::build(Operator::Equals, &FilterValue::from(vec!["a", "b"])).unwrap_err();
        assert_eq!(err.code, "invalid_value");
        assert_eq!(err.params["operator"], "equals");
    }
}
