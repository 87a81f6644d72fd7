//! User-authored filter specifications.
//!
//! A filter list is a left-to-right token stream: the connector on filter
//! *i* links it to filter *i + 1*, not to its predecessor. The stream is
//! turned into a boolean expression by
//! [`conditions`](crate::query::conditions).
//!
//! # Examples
//!
//! ```
//! use audience_rs_query::filter::{Filter, LogicalOperator, Operator};
//!
//! let f = Filter::new("country", Operator::Equals, "USA").with_connector(LogicalOperator::Or);
//! assert_eq!(f.parsed_operator(), Some(Operator::Equals));
//! assert_eq!(f.connector(), LogicalOperator::Or);
//! ```

use std::collections::HashMap;
use std::fmt;

use audience_rs_core::{AudienceError, AudienceResult, ValidationError};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The comparison a filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `col = val`
    Equals,
    /// `col != val`
    NotEquals,
    /// `col > val`
    GreaterThan,
    /// `col < val`
    LessThan,
    /// `col LIKE '%val%'`
    Contains,
    /// `col NOT LIKE '%val%'`
    NotContains,
    /// `col IN (...)`
    In,
    /// `col NOT IN (...)`
    NotIn,
}

impl Operator {
    /// Every supported operator.
    pub const ALL: [Self; 8] = [
        Self::Equals,
        Self::NotEquals,
        Self::GreaterThan,
        Self::LessThan,
        Self::Contains,
        Self::NotContains,
        Self::In,
        Self::NotIn,
    ];

    /// Returns the wire name of the operator.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::In => "in",
            Self::NotIn => "not_in",
        }
    }

    /// Parses a wire name, ignoring case and surrounding whitespace.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The connector between a filter and the one after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LogicalOperator {
    /// Both sides must hold.
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    /// Either side may hold.
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl LogicalOperator {
    /// Returns the SQL keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A filter operand: a string, a number, or a list of either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// A string operand.
    String(String),
    /// A numeric operand.
    Number(serde_json::Number),
    /// A list operand, used by `in` and `not_in`.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Returns `true` for list operands.
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Converts the operand into a bindable [`Value`].
    ///
    /// Integral numbers become `Value::Int`, other numbers `Value::Float`.
    pub fn to_value(&self) -> Result<Value, ValidationError> {
        match self {
            Self::String(s) => Ok(Value::String(s.clone())),
            Self::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => Ok(Value::Float(f)),
                        _ => Err(ValidationError::new(
                            format!("Number '{n}' cannot be represented"),
                            "invalid_number",
                        )),
                    }
                }
            }
            Self::List(items) => items
                .iter()
                .map(Self::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Number(v.into())
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Number(v.into())
    }
}

impl<T: Into<Self>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// One user-authored condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// The field name, resolved against the target object's catalog.
    pub field: String,
    /// The raw operator name; unknown names are handled by the compiler.
    pub operator: String,
    /// The operand.
    pub value: FilterValue,
    /// The connector to the next filter; absent means AND.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
}

impl Filter {
    /// Creates a filter with no explicit connector.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<FilterValue>) -> Self {
        Self::raw(field, operator.as_str(), value)
    }

    /// Creates a filter from a raw operator name.
    pub fn raw(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            logical_operator: None,
        }
    }

    /// Sets the connector to the next filter.
    pub fn with_connector(mut self, connector: LogicalOperator) -> Self {
        self.logical_operator = Some(connector);
        self
    }

    /// Shorthand for `with_connector(LogicalOperator::Or)`.
    pub fn or(self) -> Self {
        self.with_connector(LogicalOperator::Or)
    }

    /// Shorthand for `with_connector(LogicalOperator::And)`.
    pub fn and(self) -> Self {
        self.with_connector(LogicalOperator::And)
    }

    /// Returns the connector, defaulting to AND.
    pub fn connector(&self) -> LogicalOperator {
        self.logical_operator.unwrap_or_default()
    }

    /// Returns the operator if it is one of the supported names.
    pub fn parsed_operator(&self) -> Option<Operator> {
        Operator::parse(&self.operator)
    }
}

/// The two filter lists of a cohort; their compiled conditions are AND-ed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CohortFilters {
    /// Filters applied to the parent (company) object.
    #[serde(default)]
    pub company_filters: Vec<Filter>,
    /// Filters applied to the child (contact) object.
    #[serde(default)]
    pub contact_filters: Vec<Filter>,
}

impl CohortFilters {
    /// Creates an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a company filter.
    pub fn with_company_filter(mut self, filter: Filter) -> Self {
        self.company_filters.push(filter);
        self
    }

    /// Appends a contact filter.
    pub fn with_contact_filter(mut self, filter: Filter) -> Self {
        self.contact_filters.push(filter);
        self
    }

    /// Returns `true` if neither list has filters.
    pub fn is_empty(&self) -> bool {
        self.company_filters.is_empty() && self.contact_filters.is_empty()
    }

    /// Parses and validates a filter specification.
    ///
    /// Missing or `null` lists are empty. A list that is not an array, or an
    /// element that is not a well-formed filter, is reported as a field
    /// error keyed by its path (`companyFilters`, `contactFilters[1]`).
    pub fn from_json(json: &serde_json::Value) -> AudienceResult<Self> {
        let Some(map) = json.as_object() else {
            return Err(AudienceError::validation(
                "Filter specification must be a JSON object",
                "invalid_type",
            ));
        };

        let mut errors: HashMap<String, Vec<ValidationError>> = HashMap::new();
        let company_filters = parse_list(map.get("companyFilters"), "companyFilters", &mut errors);
        let contact_filters = parse_list(map.get("contactFilters"), "contactFilters", &mut errors);

        if errors.is_empty() {
            Ok(Self {
                company_filters,
                contact_filters,
            })
        } else {
            Err(ValidationError::with_field_errors(errors).into())
        }
    }

    /// Parses and validates a filter specification from JSON text.
    pub fn from_json_str(json: &str) -> AudienceResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
            AudienceError::validation(format!("Malformed filter JSON: {e}"), "invalid_json")
        })?;
        Self::from_json(&value)
    }
}

fn parse_list(
    value: Option<&serde_json::Value>,
    key: &str,
    errors: &mut HashMap<String, Vec<ValidationError>>,
) -> Vec<Filter> {
    let items = match value {
        None | Some(serde_json::Value::Null) => return Vec::new(),
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => {
            errors
                .entry(key.to_string())
                .or_default()
                .push(ValidationError::new("Expected an array.", "invalid_type"));
            return Vec::new();
        }
    };

    let mut filters = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match Filter::deserialize(item) {
            Ok(filter) => filters.push(filter),
            Err(e) => errors
                .entry(format!("{key}[{i}]"))
                .or_default()
                .push(ValidationError::new(e.to_string(), "invalid_filter")),
        }
    }
    filters
}
