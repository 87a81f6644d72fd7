//! Field resolution against an object's catalog.

use std::collections::HashMap;

use audience_rs_core::{AudienceError, AudienceResult, ValidationError};
use once_cell::sync::Lazy;

use crate::filter::Operator;
use crate::model::{ConfiguredObject, Field};

/// Historical filter field names still found in saved cohorts, mapped to
/// their current catalog names.
static LEGACY_FIELD_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("companyName", "company_name"),
        ("companyId", "company_id"),
        ("companyDomain", "domain"),
        ("companySize", "employee_count"),
        ("employeeCount", "employee_count"),
        ("annualRevenue", "annual_revenue"),
        ("industryName", "industry"),
        ("countryName", "country"),
        ("hqCity", "city"),
        ("jobTitle", "job_title"),
        ("firstName", "first_name"),
        ("lastName", "last_name"),
        ("emailAddress", "email"),
        ("seniorityLevel", "seniority"),
        ("departmentName", "department"),
    ])
});

/// Returns the current name for a historical field alias, if any.
pub fn legacy_field_name(name: &str) -> Option<&'static str> {
    LEGACY_FIELD_NAMES.get(name).copied()
}

/// Resolves filter field names against one configured object.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'a> {
    object: &'a ConfiguredObject,
}

impl<'a> FieldResolver<'a> {
    /// Creates a resolver for `object`.
    pub const fn new(object: &'a ConfiguredObject) -> Self {
        Self { object }
    }

    /// Looks up a field by name, falling back to the legacy alias table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the name matches neither the catalog
    /// nor a legacy alias of a catalog field.
    pub fn resolve(&self, name: &str) -> AudienceResult<&'a Field> {
        let catalog = &self.object.object;
        catalog
            .field(name)
            .or_else(|| legacy_field_name(name).and_then(|current| catalog.field(current)))
            .ok_or_else(|| {
                AudienceError::ConfigurationError(format!(
                    "Field '{name}' is not in the catalog of object '{}' (alias {})",
                    catalog.name(),
                    self.object.alias
                ))
            })
    }

    /// Resolves a field for use in a filter with `operator`.
    ///
    /// # Errors
    ///
    /// Besides the errors of [`resolve`](Self::resolve), returns a
    /// `ValidationError` if the field is not filterable or does not accept
    /// the operator.
    pub fn resolve_filterable(&self, name: &str, operator: Operator) -> AudienceResult<&'a Field> {
        let field = self.resolve(name)?;
        if !field.is_filterable {
            return Err(ValidationError::new(
                format!("Field '{}' cannot be used in filters", field.name),
                "not_filterable",
            )
            .with_param("field", field.name.clone())
            .into());
        }
        if !field.allows_operator(operator) {
            return Err(ValidationError::new(
                format!("Operator '{operator}' is not allowed for field '{}'", field.name),
                "operator_not_allowed",
            )
            .with_param("field", field.name.clone())
            .with_param("operator", operator.as_str())
            .into());
        }
        Ok(field)
    }

    /// Returns the alias-qualified physical column for a field name.
    pub fn qualified_column(&self, name: &str) -> AudienceResult<String> {
        let field = self.resolve(name)?;
        Ok(self.object.qualify(field.column_name()))
    }
}
