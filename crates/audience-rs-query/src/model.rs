//! Audience data model: objects, fields, relationships, and the audience
//! configuration that ties them into a join graph.
//!
//! Everything here deserializes from the camelCase JSON persisted by the
//! surrounding service, so an [`AudienceConfig`] can be loaded straight from
//! stored audience/object/relationship records.

use std::collections::HashSet;
use std::fmt;

use audience_rs_core::{AudienceError, AudienceResult};
use serde::{Deserialize, Serialize};

use crate::filter::Operator;

const fn default_true() -> bool {
    true
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Text.
    #[default]
    String,
    /// Any numeric type.
    Number,
}

/// One entry of an object's field catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// The name filters refer to.
    pub name: String,
    /// The physical column, when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// The declared type.
    #[serde(default)]
    pub data_type: DataType,
    /// Free-form grouping used by filter pickers (e.g. "firmographics").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Whether filters may reference this field.
    #[serde(default = "default_true")]
    pub is_filterable: bool,
    /// Whether listing and preview queries select this field.
    #[serde(default = "default_true")]
    pub is_displayable: bool,
    /// Operator names accepted for this field; empty accepts all.
    #[serde(default)]
    pub allowed_operators: Vec<String>,
    /// Whether the field has a small set of distinct values worth listing.
    #[serde(default)]
    pub has_distinct_values: bool,
}

impl Field {
    /// Creates a filterable, displayable field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            column: None,
            data_type,
            category: None,
            is_filterable: true,
            is_displayable: true,
            allowed_operators: Vec::new(),
            has_distinct_values: false,
        }
    }

    /// Creates a string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, DataType::String)
    }

    /// Creates a numeric field.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Number)
    }

    /// Maps the field to a physical column with a different name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Sets the field category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Marks the field as not filterable.
    pub fn not_filterable(mut self) -> Self {
        self.is_filterable = false;
        self
    }

    /// Marks the field as not displayable.
    pub fn hidden(mut self) -> Self {
        self.is_displayable = false;
        self
    }

    /// Restricts the operators accepted for this field.
    pub fn allow_operators(mut self, operators: &[Operator]) -> Self {
        self.allowed_operators = operators.iter().map(|op| op.as_str().to_string()).collect();
        self
    }

    /// Marks the field as having a listable set of distinct values.
    pub fn with_distinct_values(mut self) -> Self {
        self.has_distinct_values = true;
        self
    }

    /// Returns the physical column name.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` if `operator` may be used with this field.
    pub fn allows_operator(&self, operator: Operator) -> bool {
        self.allowed_operators.is_empty()
            || self
                .allowed_operators
                .iter()
                .any(|name| name.eq_ignore_ascii_case(operator.as_str()))
    }
}

/// A configured reference to one physical warehouse table and its field
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceObject {
    /// Logical name; defaults to the table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable name; defaults to the logical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// The physical table, optionally schema-qualified.
    #[serde(rename = "table", alias = "physicalTable")]
    pub physical_table: String,
    /// Row identifier used for distinct counts.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// The field catalog.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl AudienceObject {
    /// Creates an object with an empty field catalog.
    pub fn new(name: impl Into<String>, physical_table: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            display_name: None,
            physical_table: physical_table.into(),
            primary_key: default_primary_key(),
            fields: Vec::new(),
        }
    }

    /// Adds a field to the catalog.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the primary key column.
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Returns the logical name.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.physical_table)
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.name())
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if the catalog contains a field with this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterates over the displayable fields in catalog order.
    pub fn displayable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_displayable)
    }
}

/// The part an object plays in count and preview queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectRole {
    /// The company-like object qualified first.
    Parent,
    /// The contact-like object joined to the qualified parents.
    Child,
}

impl fmt::Display for ObjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => write!(f, "parent"),
            Self::Child => write!(f, "child"),
        }
    }
}

/// An object placed in an audience under an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredObject {
    /// The object.
    pub object: AudienceObject,
    /// The alias used to qualify its columns.
    pub alias: String,
    /// The explicit role, if tagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ObjectRole>,
}

impl ConfiguredObject {
    /// Places `object` under `alias` without a role tag.
    pub fn new(object: AudienceObject, alias: impl Into<String>) -> Self {
        Self {
            object,
            alias: alias.into(),
            role: None,
        }
    }

    /// Tags the object with an explicit role.
    pub fn with_role(mut self, role: ObjectRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Returns `alias.column` for a physical column.
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{column}", self.alias)
    }
}

/// SQL JOIN types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// INNER JOIN.
    #[default]
    Inner,
    /// LEFT JOIN.
    Left,
}

impl JoinType {
    /// Returns the SQL keyword for this join type.
    pub const fn sql_keyword(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// A literal SQL join predicate between two aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// One side of the relationship, when recorded explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_object_alias: Option<String>,
    /// The other side of the relationship, when recorded explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_object_alias: Option<String>,
    /// The join predicate, e.g. `c.company_id = p.company_id`.
    pub join_condition: String,
    /// The join type used in listing queries.
    #[serde(default)]
    pub join_type: JoinType,
}

impl Relationship {
    /// Creates a relationship known only by its join condition.
    pub fn new(join_condition: impl Into<String>) -> Self {
        Self {
            from_object_alias: None,
            to_object_alias: None,
            join_condition: join_condition.into(),
            join_type: JoinType::Inner,
        }
    }

    /// Creates a relationship with explicit endpoints.
    pub fn between(
        from_alias: impl Into<String>,
        to_alias: impl Into<String>,
        join_condition: impl Into<String>,
    ) -> Self {
        Self {
            from_object_alias: Some(from_alias.into()),
            to_object_alias: Some(to_alias.into()),
            ..Self::new(join_condition)
        }
    }

    /// Sets the join type.
    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Returns `true` if explicit endpoints are recorded.
    pub const fn has_endpoints(&self) -> bool {
        self.from_object_alias.is_some() || self.to_object_alias.is_some()
    }

    /// Returns `true` if this relationship involves `alias`.
    ///
    /// Explicit endpoints win; otherwise the join condition must reference
    /// the alias as a column qualifier (`alias.`).
    pub fn mentions(&self, alias: &str) -> bool {
        if self.has_endpoints() {
            self.from_object_alias.as_deref() == Some(alias)
                || self.to_object_alias.as_deref() == Some(alias)
        } else {
            condition_references(&self.join_condition, alias)
        }
    }
}

/// Returns `true` if `condition` contains `alias.` at an identifier boundary.
pub fn condition_references(condition: &str, alias: &str) -> bool {
    let pattern = format!(r"(?:^|[^A-Za-z0-9_]){}\.", regex::escape(alias));
    regex::Regex::new(&pattern).is_ok_and(|re| re.is_match(condition))
}

/// The ordered object list and relationship set defining a join graph.
///
/// The first object is the join root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AudienceConfig {
    /// Configured objects in join order.
    pub objects: Vec<ConfiguredObject>,
    /// Relationships available between the objects.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Column shared by parent and child in count and preview queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_key: Option<String>,
}

impl AudienceConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for malformed JSON or a configuration
    /// that fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> AudienceResult<Self> {
        let config = Self::parse_json(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from JSON without validating it.
    ///
    /// Every compile entry point validates again, so an unchecked config
    /// can be inspected but never turned into SQL.
    pub fn parse_json(json: &str) -> AudienceResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            AudienceError::ConfigurationError(format!("Invalid audience configuration: {e}"))
        })
    }

    /// Appends an object.
    pub fn with_object(mut self, object: ConfiguredObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Appends a relationship.
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Sets the join key.
    pub fn with_join_key(mut self, join_key: impl Into<String>) -> Self {
        self.join_key = Some(join_key.into());
        self
    }

    /// Returns the root object.
    pub fn root(&self) -> Option<&ConfiguredObject> {
        self.objects.first()
    }

    /// Looks up an object by alias.
    pub fn object(&self, alias: &str) -> Option<&ConfiguredObject> {
        self.objects.iter().find(|o| o.alias == alias)
    }

    /// Checks the structural invariants of the configuration.
    ///
    /// Aliases must be unique identifiers, tables and columns must be
    /// (optionally dotted) identifiers, and explicit relationship endpoints
    /// must name configured aliases.
    pub fn validate(&self) -> AudienceResult<()> {
        if self.objects.is_empty() {
            return Err(AudienceError::ConfigurationError(
                "Audience has no objects".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for configured in &self.objects {
            let alias = configured.alias.as_str();
            if !is_identifier(alias) {
                return Err(AudienceError::ConfigurationError(format!(
                    "Invalid alias '{alias}'"
                )));
            }
            if !seen.insert(alias) {
                return Err(AudienceError::ConfigurationError(format!(
                    "Duplicate alias '{alias}'"
                )));
            }

            let object = &configured.object;
            if !is_qualified_identifier(&object.physical_table) {
                return Err(AudienceError::ConfigurationError(format!(
                    "Invalid table name '{}' for alias '{alias}'",
                    object.physical_table
                )));
            }
            if !is_identifier(&object.primary_key) {
                return Err(AudienceError::ConfigurationError(format!(
                    "Invalid primary key '{}' on object '{}'",
                    object.primary_key,
                    object.name()
                )));
            }
            if let Some(field) = object.fields.iter().find(|f| !is_identifier(f.column_name())) {
                return Err(AudienceError::ConfigurationError(format!(
                    "Invalid column '{}' for field '{}' on object '{}'",
                    field.column_name(),
                    field.name,
                    object.name()
                )));
            }
        }

        if let Some(key) = self.join_key.as_deref() {
            if !is_identifier(key) {
                return Err(AudienceError::ConfigurationError(format!(
                    "Invalid join key '{key}'"
                )));
            }
        }

        for relationship in &self.relationships {
            for alias in [&relationship.from_object_alias, &relationship.to_object_alias]
                .into_iter()
                .flatten()
            {
                if !seen.contains(alias.as_str()) {
                    return Err(AudienceError::ConfigurationError(format!(
                        "Relationship references unknown alias '{alias}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Returns `true` for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns `true` for dot-separated identifiers (`schema.table`).
pub fn is_qualified_identifier(s: &str) -> bool {
    s.split('.').all(is_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn companies() -> AudienceObject {
        AudienceObject::new("companies", "analytics.companies")
            .with_field(Field::string("company_name"))
            .with_field(Field::string("country").with_distinct_values())
            .with_field(Field::number("employee_count").with_column("employees"))
            .with_field(Field::string("internal_score").hidden().not_filterable())
    }

    #[test]
    fn test_field_defaults_from_json() {
        let field: Field = serde_json::from_str(r#"{"name": "country"}"#).unwrap();
        assert_eq!(field.data_type, DataType::String);
        assert!(field.is_filterable);
        assert!(field.is_displayable);
        assert!(field.allowed_operators.is_empty());
        assert_eq!(field.column_name(), "country");
    }

    #[test]
    fn test_field_camel_case_json() {
        let field: Field = serde_json::from_str(
            r#"{"name": "employee_count", "dataType": "number", "isDisplayable": false,
                "allowedOperators": ["greater_than", "less_than"], "hasDistinctValues": true}"#,
        )
        .unwrap();
        assert_eq!(field.data_type, DataType::Number);
        assert!(!field.is_displayable);
        assert!(field.has_distinct_values);
        assert!(field.allows_operator(Operator::GreaterThan));
        assert!(!field.allows_operator(Operator::Contains));
    }

    #[test]
    fn test_field_column_override() {
        let object = companies();
        assert_eq!(object.field("employee_count").unwrap().column_name(), "employees");
    }

    #[test]
    fn test_object_name_defaults_to_table() {
        let object: AudienceObject =
            serde_json::from_str(r#"{"table": "contacts", "fields": []}"#).unwrap();
        assert_eq!(object.name(), "contacts");
        assert_eq!(object.display_name(), "contacts");
        assert_eq!(object.primary_key, "id");
    }

    #[test]
    fn test_object_accepts_physical_table_key() {
        let object: AudienceObject =
            serde_json::from_str(r#"{"name": "people", "physicalTable": "crm.contacts"}"#).unwrap();
        assert_eq!(object.physical_table, "crm.contacts");
        assert_eq!(object.name(), "people");
    }

    #[test]
    fn test_displayable_fields() {
        let object = companies();
        let names: Vec<&str> = object.displayable_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["company_name", "country", "employee_count"]);
    }

    #[test]
    fn test_relationship_mentions_by_condition() {
        let rel = Relationship::new("c.company_id = p.company_id");
        assert!(rel.mentions("c"));
        assert!(rel.mentions("p"));
        assert!(!rel.mentions("x"));
        // "company_id" contains a "c" but never as a qualifier
        assert!(!Relationship::new("co.company_id = p.company_id").mentions("c"));
    }

    #[test]
    fn test_relationship_mentions_by_endpoints() {
        let rel = Relationship::between("c", "p", "c.id = p.company_id");
        assert!(rel.mentions("c"));
        assert!(rel.mentions("p"));
        let rel = Relationship::between("a", "b", "c.id = p.company_id");
        assert!(!rel.mentions("c"));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "objects": [
                {"object": {"table": "companies", "fields": [{"name": "country"}]}, "alias": "c", "role": "parent"},
                {"object": {"table": "contacts", "fields": [{"name": "job_title"}]}, "alias": "p"}
            ],
            "relationships": [{"joinCondition": "c.company_id = p.company_id"}]
        }"#;
        let config = AudienceConfig::from_json_str(json).unwrap();
        assert_eq!(config.objects.len(), 2);
        assert_eq!(config.root().unwrap().alias, "c");
        assert_eq!(config.object("c").unwrap().role, Some(ObjectRole::Parent));
        assert_eq!(config.object("p").unwrap().role, None);
        assert_eq!(config.relationships[0].join_type, JoinType::Inner);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_invalid() {
        let err = AudienceConfig::from_json_str(r#"{"objects": 3}"#).unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
    }

    #[test]
    fn test_config_from_json_validates() {
        let json = r#"{
            "objects": [
                {"object": {"table": "companies", "fields": [{"name": "country"}]}, "alias": "c"},
                {"object": {"table": "contacts", "fields": [{"name": "job_title"}]}, "alias": "c"}
            ]
        }"#;
        let err = AudienceConfig::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate alias 'c'"));

        let parsed = AudienceConfig::parse_json(json).unwrap();
        assert_eq!(parsed.objects.len(), 2);
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(AudienceConfig::new().validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_alias() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(companies(), "c"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate alias 'c'"));
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let config = AudienceConfig::new().with_object(ConfiguredObject::new(companies(), "c; DROP"));
        assert!(config.validate().is_err());

        let bad_table = AudienceObject::new("x", "companies c");
        let config = AudienceConfig::new().with_object(ConfiguredObject::new(bad_table, "c"));
        assert!(config.validate().is_err());

        let bad_column = AudienceObject::new("x", "companies")
            .with_field(Field::string("name").with_column("name--"));
        let config = AudienceConfig::new().with_object(ConfiguredObject::new(bad_column, "c"));
        assert!(config.validate().is_err());

        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_join_key("company id");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_relationship_alias() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_relationship(Relationship::between("c", "z", "c.id = z.id"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown alias 'z'"));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("company_id"));
        assert!(is_identifier("_c1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1c"));
        assert!(!is_identifier("a-b"));
        assert!(is_qualified_identifier("analytics.companies"));
        assert!(!is_qualified_identifier("analytics..companies"));
    }

    #[test]
    fn test_qualify() {
        let configured = ConfiguredObject::new(companies(), "c");
        assert_eq!(configured.qualify("country"), "c.country");
    }
}
