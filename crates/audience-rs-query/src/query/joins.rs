//! Role resolution and FROM/JOIN planning.
//!
//! Listing queries join every configured object starting from the root.
//! Count and preview queries only ever involve two objects, the parent and
//! the child, staged through a `qualified_<parent>` CTE. Deeper hierarchies
//! are not supported by those modes.

use std::collections::{HashSet, VecDeque};

use audience_rs_core::{AudienceError, AudienceResult, JoinStrategy};

use super::{sanitize_identifier, CompileOptions};
use crate::model::{AudienceConfig, AudienceObject, ConfiguredObject, ObjectRole, Relationship};

/// Finds the object playing `role`.
///
/// An explicit role tag wins. Otherwise the first untagged object whose
/// catalog contains the role's marker field is chosen.
pub fn find_role<'a>(
    config: &'a AudienceConfig,
    role: ObjectRole,
    options: &CompileOptions,
) -> Option<&'a ConfiguredObject> {
    if let Some(tagged) = config.objects.iter().find(|o| o.role == Some(role)) {
        return Some(tagged);
    }
    let marker = match role {
        ObjectRole::Parent => &options.compiler.parent_marker_field,
        ObjectRole::Child => &options.compiler.child_marker_field,
    };
    config
        .objects
        .iter()
        .find(|o| o.role.is_none() && o.object.has_field(marker))
}

/// The parent and child objects of a two-level audience.
#[derive(Debug, Clone, Copy)]
pub struct RoleAssignment<'a> {
    /// The company-like object qualified first.
    pub parent: &'a ConfiguredObject,
    /// The contact-like object joined to the qualified parents.
    pub child: &'a ConfiguredObject,
}

impl<'a> RoleAssignment<'a> {
    /// Resolves both roles.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if either role cannot be resolved or
    /// both resolve to the same object.
    pub fn resolve(config: &'a AudienceConfig, options: &CompileOptions) -> AudienceResult<Self> {
        let parent = find_role(config, ObjectRole::Parent, options).ok_or_else(|| {
            AudienceError::ConfigurationError(format!(
                "Audience has no parent object: tag one with role \"parent\" or include a '{}' field",
                options.compiler.parent_marker_field
            ))
        })?;
        let child = find_role(config, ObjectRole::Child, options).ok_or_else(|| {
            AudienceError::ConfigurationError(format!(
                "Audience has no child object: tag one with role \"child\" or include a '{}' field",
                options.compiler.child_marker_field
            ))
        })?;
        if parent.alias == child.alias {
            return Err(AudienceError::ConfigurationError(format!(
                "Object '{}' cannot be both parent and child",
                parent.alias
            )));
        }
        Ok(Self { parent, child })
    }
}

/// Returns the name of the CTE holding the qualified parent keys.
pub fn qualified_cte_name(parent: &AudienceObject) -> String {
    let base = parent.name.as_deref().unwrap_or_else(|| {
        parent
            .physical_table
            .rsplit('.')
            .next()
            .unwrap_or(&parent.physical_table)
    });
    format!("qualified_{}", sanitize_identifier(base).to_ascii_lowercase())
}

/// One emitted JOIN.
#[derive(Debug, Clone, Copy)]
pub struct PlannedJoin<'a> {
    /// The joined object.
    pub object: &'a ConfiguredObject,
    /// The relationship supplying the ON condition.
    pub relationship: &'a Relationship,
}

/// The FROM/JOIN clause of a listing query.
#[derive(Debug, Clone)]
pub struct JoinPlan<'a> {
    /// The root object.
    pub root: &'a ConfiguredObject,
    /// Joins in emission order.
    pub joins: Vec<PlannedJoin<'a>>,
    /// Objects left out because no relationship reaches them.
    pub dropped: Vec<&'a ConfiguredObject>,
}

impl<'a> JoinPlan<'a> {
    /// Plans joins with the configured strategy.
    pub fn build(config: &'a AudienceConfig, strategy: JoinStrategy) -> AudienceResult<Self> {
        match strategy {
            JoinStrategy::Flat => Self::flat(config),
            JoinStrategy::Graph => Self::graph(config),
        }
    }

    /// Joins each object after the root through the first relationship
    /// that mentions its alias. Objects without one are dropped.
    pub fn flat(config: &'a AudienceConfig) -> AudienceResult<Self> {
        let root = root_of(config)?;
        let mut joins = Vec::new();
        let mut dropped = Vec::new();

        for object in config.objects.iter().skip(1) {
            match config.relationships.iter().find(|r| r.mentions(&object.alias)) {
                Some(relationship) => joins.push(PlannedJoin {
                    object,
                    relationship,
                }),
                None => {
                    tracing::warn!(
                        alias = %object.alias,
                        table = %object.object.physical_table,
                        "No relationship mentions alias; object left out of the join"
                    );
                    dropped.push(object);
                }
            }
        }

        Ok(Self {
            root,
            joins,
            dropped,
        })
    }

    /// Walks the relationship graph breadth-first from the root.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if an object cannot be reached.
    pub fn graph(config: &'a AudienceConfig) -> AudienceResult<Self> {
        let root = root_of(config)?;
        let mut visited: HashSet<&str> = HashSet::from([root.alias.as_str()]);
        let mut queue: VecDeque<&ConfiguredObject> = VecDeque::from([root]);
        let mut joins = Vec::new();

        while let Some(current) = queue.pop_front() {
            for relationship in config
                .relationships
                .iter()
                .filter(|r| r.mentions(&current.alias))
            {
                for object in &config.objects {
                    if visited.contains(object.alias.as_str()) || !relationship.mentions(&object.alias)
                    {
                        continue;
                    }
                    visited.insert(object.alias.as_str());
                    joins.push(PlannedJoin {
                        object,
                        relationship,
                    });
                    queue.push_back(object);
                }
            }
        }

        if let Some(unreached) = config
            .objects
            .iter()
            .find(|o| !visited.contains(o.alias.as_str()))
        {
            return Err(AudienceError::ConfigurationError(format!(
                "Object '{}' (alias {}) is not connected to root '{}'",
                unreached.object.name(),
                unreached.alias,
                root.alias
            )));
        }

        Ok(Self {
            root,
            joins,
            dropped: Vec::new(),
        })
    }

    /// Returns `true` if `alias` appears in the FROM clause.
    pub fn includes(&self, alias: &str) -> bool {
        self.root.alias == alias || self.joins.iter().any(|j| j.object.alias == alias)
    }

    /// Iterates over the root and the joined objects in emission order.
    pub fn objects(&self) -> impl Iterator<Item = &'a ConfiguredObject> + '_ {
        std::iter::once(self.root).chain(self.joins.iter().map(|j| j.object))
    }

    /// Renders `FROM ... [JOIN ... ON ...]*`.
    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            "FROM {} {}",
            self.root.object.physical_table, self.root.alias
        );
        for join in &self.joins {
            sql.push_str(&format!(
                " {} {} {} ON {}",
                join.relationship.join_type.sql_keyword(),
                join.object.object.physical_table,
                join.object.alias,
                join.relationship.join_condition
            ));
        }
        sql
    }

    /// Describes the dropped objects for [`CompiledQuery::warnings`].
    ///
    /// [`CompiledQuery::warnings`]: super::compiler::CompiledQuery::warnings
    pub fn drop_warnings(&self) -> Vec<String> {
        self.dropped
            .iter()
            .map(|o| {
                format!(
                    "Object '{}' (alias {}) has no relationship to the join and was left out",
                    o.object.name(),
                    o.alias
                )
            })
            .collect()
    }
}

fn root_of(config: &AudienceConfig) -> AudienceResult<&ConfiguredObject> {
    config
        .root()
        .ok_or_else(|| AudienceError::ConfigurationError("Audience has no objects".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, JoinType};

    fn companies() -> AudienceObject {
        AudienceObject::new("companies", "companies")
            .with_field(Field::string("company_name"))
            .with_field(Field::string("country"))
    }

    fn contacts() -> AudienceObject {
        AudienceObject::new("contacts", "contacts")
            .with_field(Field::string("job_title"))
            .with_field(Field::string("first_name"))
    }

    fn offices() -> AudienceObject {
        AudienceObject::new("offices", "offices").with_field(Field::string("city"))
    }

    fn two_objects() -> AudienceConfig {
        AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p"))
            .with_relationship(Relationship::new("c.company_id = p.company_id"))
    }

    #[test]
    fn test_roles_by_marker_fields() {
        let config = two_objects();
        let roles = RoleAssignment::resolve(&config, &CompileOptions::default()).unwrap();
        assert_eq!(roles.parent.alias, "c");
        assert_eq!(roles.child.alias, "p");
    }

    #[test]
    fn test_roles_by_explicit_tags() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(offices(), "o").with_role(ObjectRole::Parent))
            .with_object(
                ConfiguredObject::new(AudienceObject::new("people", "people"), "x")
                    .with_role(ObjectRole::Child),
            );
        let roles = RoleAssignment::resolve(&config, &CompileOptions::default()).unwrap();
        assert_eq!(roles.parent.alias, "o");
        assert_eq!(roles.child.alias, "x");
    }

    #[test]
    fn test_explicit_tag_beats_marker() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(offices(), "o").with_role(ObjectRole::Parent))
            .with_object(ConfiguredObject::new(contacts(), "p"));
        let roles = RoleAssignment::resolve(&config, &CompileOptions::default()).unwrap();
        assert_eq!(roles.parent.alias, "o");
    }

    #[test]
    fn test_missing_child_is_configuration_error() {
        let config = AudienceConfig::new().with_object(ConfiguredObject::new(companies(), "c"));
        let err = RoleAssignment::resolve(&config, &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
        assert!(err.to_string().contains("job_title"));
    }

    #[test]
    fn test_same_object_both_roles() {
        let both = companies().with_field(Field::string("job_title"));
        let config = AudienceConfig::new().with_object(ConfiguredObject::new(both, "c"));
        assert!(RoleAssignment::resolve(&config, &CompileOptions::default()).is_err());
    }

    #[test]
    fn test_qualified_cte_name() {
        assert_eq!(qualified_cte_name(&companies()), "qualified_companies");
        let unnamed: AudienceObject =
            serde_json::from_str(r#"{"table": "analytics.Companies"}"#).unwrap();
        assert_eq!(qualified_cte_name(&unnamed), "qualified_companies");
        let spaced = AudienceObject::new("Target Accounts", "accounts");
        assert_eq!(qualified_cte_name(&spaced), "qualified_target_accounts");
    }

    #[test]
    fn test_flat_join_single_relationship() {
        let config = two_objects();
        let plan = JoinPlan::flat(&config).unwrap();
        assert_eq!(
            plan.to_sql(),
            "FROM companies c INNER JOIN contacts p ON c.company_id = p.company_id"
        );
        assert_eq!(plan.to_sql().matches("JOIN").count(), 1);
        assert!(plan.dropped.is_empty());
    }

    #[test]
    fn test_flat_join_drops_unrelated_object() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p"));
        let plan = JoinPlan::flat(&config).unwrap();
        assert_eq!(plan.to_sql(), "FROM companies c");
        assert!(!plan.to_sql().contains("JOIN"));
        assert_eq!(plan.dropped.len(), 1);
        assert!(!plan.includes("p"));
        assert!(plan.drop_warnings()[0].contains("alias p"));
    }

    #[test]
    fn test_flat_join_left_join_type() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p"))
            .with_relationship(
                Relationship::new("c.company_id = p.company_id").with_join_type(JoinType::Left),
            );
        let plan = JoinPlan::flat(&config).unwrap();
        assert!(plan.to_sql().contains("LEFT JOIN contacts p ON"));
    }

    #[test]
    fn test_flat_join_prefers_explicit_endpoints() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p"))
            .with_relationship(Relationship::between("c", "o", "c.id = p.company_id"))
            .with_relationship(Relationship::between("c", "p", "c.company_id = p.company_id"));
        let plan = JoinPlan::flat(&config).unwrap();
        assert!(plan.to_sql().ends_with("ON c.company_id = p.company_id"));
    }

    #[test]
    fn test_graph_join_reaches_chain() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(offices(), "o"))
            .with_object(ConfiguredObject::new(contacts(), "p"))
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_relationship(Relationship::new("c.company_id = p.company_id"))
            .with_relationship(Relationship::new("o.company_id = c.company_id"));
        let plan = JoinPlan::graph(&config).unwrap();
        assert_eq!(
            plan.to_sql(),
            "FROM offices o INNER JOIN companies c ON o.company_id = c.company_id \
             INNER JOIN contacts p ON c.company_id = p.company_id"
        );
        let order: Vec<&str> = plan.objects().map(|o| o.alias.as_str()).collect();
        assert_eq!(order, vec!["o", "c", "p"]);
    }

    #[test]
    fn test_graph_join_disconnected_is_error() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p"))
            .with_object(ConfiguredObject::new(offices(), "o"))
            .with_relationship(Relationship::new("c.company_id = p.company_id"));
        let err = JoinPlan::graph(&config).unwrap_err();
        assert!(err.to_string().contains("alias o"));
    }

    #[test]
    fn test_build_dispatches_on_strategy() {
        let config = AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p"));
        assert!(JoinPlan::build(&config, JoinStrategy::Flat).is_ok());
        assert!(JoinPlan::build(&config, JoinStrategy::Graph).is_err());
    }
}
