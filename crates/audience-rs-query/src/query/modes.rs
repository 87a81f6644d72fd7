//! The three query shapes built from compiled filter conditions.
//!
//! - **Listing**: `SELECT DISTINCT <displayable columns> FROM <join plan>
//!   [WHERE ...] [LIMIT n]`.
//! - **Count**: one row with `company_count` and `people_count`, staged
//!   through a `qualified_<parent>` CTE.
//! - **Preview**: a parent query and a child query over the same CTE, each
//!   capped at the preview limit.

use audience_rs_core::{AudienceError, AudienceResult, ValidationError};

use super::compiler::{CompiledQuery, WhereNode};
use super::conditions::ConditionGroupCompiler;
use super::joins::{find_role, qualified_cte_name, JoinPlan, RoleAssignment};
use super::resolver::FieldResolver;
use super::{sanitize_identifier, CompileOptions};
use crate::filter::CohortFilters;
use crate::model::{is_identifier, AudienceConfig, ConfiguredObject, ObjectRole};
use crate::value::Value;

/// The parent and child preview queries.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewQueries {
    /// The parent (company) preview.
    pub company: CompiledQuery,
    /// The child (contact) preview.
    pub contact: CompiledQuery,
    /// The row cap applied to both queries.
    pub limit: usize,
}

/// Composes complete queries for one set of options.
#[derive(Debug, Clone, Copy)]
pub struct QueryModeAssembler<'a> {
    options: &'a CompileOptions,
}

impl<'a> QueryModeAssembler<'a> {
    /// Creates an assembler.
    pub const fn new(options: &'a CompileOptions) -> Self {
        Self { options }
    }

    /// Returns the preview row count for a requested limit.
    ///
    /// The configured cap always wins over a larger request.
    pub fn preview_limit(&self, requested: Option<usize>) -> usize {
        let cap = self.options.compiler.preview_limit;
        requested.map_or(cap, |n| n.min(cap))
    }

    /// Compiles the listing query.
    ///
    /// Company filters apply to the parent object and contact filters to
    /// the child object; a list is only resolved when it is non-empty, so a
    /// single-object audience can be listed with company filters alone.
    pub fn listing(
        &self,
        config: &AudienceConfig,
        filters: &CohortFilters,
        limit: Option<usize>,
    ) -> AudienceResult<CompiledQuery> {
        config.validate()?;
        let plan = JoinPlan::build(config, self.options.compiler.join_strategy)?;
        let mut warnings = plan.drop_warnings();
        let conditions = ConditionGroupCompiler::new(self.options);

        let mut roots = Vec::with_capacity(2);
        for (role, list, list_name) in [
            (ObjectRole::Parent, &filters.company_filters, "companyFilters"),
            (ObjectRole::Child, &filters.contact_filters, "contactFilters"),
        ] {
            if list.is_empty() {
                continue;
            }
            let target = self.filter_target(config, &plan, role, list_name)?;
            roots.push(conditions.compile(target, list, list_name, &mut warnings)?);
        }
        let where_node = WhereNode::and_all(roots);

        let columns: Vec<String> = plan
            .objects()
            .flat_map(|o| {
                o.object.displayable_fields().map(move |f| {
                    format!(
                        "{} AS {}_{}",
                        o.qualify(f.column_name()),
                        o.alias,
                        sanitize_identifier(&f.name)
                    )
                })
            })
            .collect();
        let select_list = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };

        let mut sql = format!("SELECT DISTINCT {select_list} {}", plan.to_sql());
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params, &where_node);
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        tracing::debug!(mode = "listing", sql = %sql, "Compiled audience query");
        Ok(CompiledQuery {
            sql,
            params,
            warnings,
        })
    }

    /// Compiles the count query.
    pub fn counts(
        &self,
        config: &AudienceConfig,
        filters: &CohortFilters,
    ) -> AudienceResult<CompiledQuery> {
        let stage = self.stage(config, filters)?;
        let child = stage.roles.child;
        let (cte, key) = (&stage.cte, stage.key);

        let mut sql = String::new();
        let mut params = Vec::new();
        self.push_cte(&mut sql, &mut params, &stage);
        sql.push_str(&format!(
            " SELECT (SELECT COUNT(DISTINCT {key}) FROM {cte}) AS company_count, \
             (SELECT COUNT(DISTINCT {}) FROM {} {} INNER JOIN {cte} ON {} = {cte}.{key}",
            child.qualify(&child.object.primary_key),
            child.object.physical_table,
            child.alias,
            child.qualify(key),
        ));
        self.push_where(&mut sql, &mut params, &stage.child_where);
        sql.push_str(") AS people_count");

        tracing::debug!(mode = "count", sql = %sql, "Compiled audience query");
        Ok(CompiledQuery {
            sql,
            params,
            warnings: stage.warnings,
        })
    }

    /// Compiles the parent and child preview queries.
    pub fn previews(
        &self,
        config: &AudienceConfig,
        filters: &CohortFilters,
        limit: Option<usize>,
    ) -> AudienceResult<PreviewQueries> {
        let stage = self.stage(config, filters)?;
        let limit = self.preview_limit(limit);

        let company = self.preview_query(&stage, stage.roles.parent, None, limit);
        let contact = self.preview_query(&stage, stage.roles.child, Some(&stage.child_where), limit);

        tracing::debug!(mode = "company_preview", sql = %company.sql, "Compiled audience query");
        tracing::debug!(mode = "contact_preview", sql = %contact.sql, "Compiled audience query");
        Ok(PreviewQueries {
            company,
            contact,
            limit,
        })
    }

    /// Compiles the distinct-value listing of one field.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the field is not flagged as having
    /// distinct values.
    pub fn distinct_values(
        &self,
        config: &AudienceConfig,
        alias: &str,
        field_name: &str,
        limit: usize,
    ) -> AudienceResult<CompiledQuery> {
        config.validate()?;
        let object = config.object(alias).ok_or_else(|| {
            AudienceError::ConfigurationError(format!("Unknown object alias '{alias}'"))
        })?;
        let field = FieldResolver::new(object).resolve(field_name)?;
        if !field.has_distinct_values {
            return Err(ValidationError::new(
                format!("Field '{}' does not list distinct values", field.name),
                "no_distinct_values",
            )
            .with_param("field", field.name.clone())
            .into());
        }

        let column = object.qualify(field.column_name());
        let sql = format!(
            "SELECT DISTINCT {column} AS value FROM {} {alias} WHERE {column} IS NOT NULL \
             ORDER BY value LIMIT {limit}",
            object.object.physical_table
        );
        Ok(CompiledQuery::new(sql, Vec::new()))
    }

    fn filter_target<'c>(
        &self,
        config: &'c AudienceConfig,
        plan: &JoinPlan<'_>,
        role: ObjectRole,
        list_name: &str,
    ) -> AudienceResult<&'c ConfiguredObject> {
        let target = find_role(config, role, self.options).ok_or_else(|| {
            AudienceError::ConfigurationError(format!(
                "{list_name} were given but the audience has no {role} object"
            ))
        })?;
        if !plan.includes(&target.alias) {
            return Err(AudienceError::ConfigurationError(format!(
                "{list_name} target object '{}' (alias {}), which is not joined",
                target.object.name(),
                target.alias
            )));
        }
        Ok(target)
    }

    fn stage<'c>(
        &'c self,
        config: &'c AudienceConfig,
        filters: &CohortFilters,
    ) -> AudienceResult<Stage<'c>> {
        config.validate()?;
        let roles = RoleAssignment::resolve(config, self.options)?;
        let key = config
            .join_key
            .as_deref()
            .unwrap_or(&self.options.compiler.default_join_key);
        if !is_identifier(key) {
            return Err(AudienceError::ConfigurationError(format!(
                "Invalid join key '{key}'"
            )));
        }

        let conditions = ConditionGroupCompiler::new(self.options);
        let mut warnings = Vec::new();
        let parent_where = conditions.compile(
            roles.parent,
            &filters.company_filters,
            "companyFilters",
            &mut warnings,
        )?;
        let child_where = conditions.compile(
            roles.child,
            &filters.contact_filters,
            "contactFilters",
            &mut warnings,
        )?;

        Ok(Stage {
            cte: qualified_cte_name(&roles.parent.object),
            roles,
            key,
            parent_where,
            child_where,
            warnings,
        })
    }

    fn push_cte(&self, sql: &mut String, params: &mut Vec<Value>, stage: &Stage<'_>) {
        let parent = stage.roles.parent;
        sql.push_str(&format!(
            "WITH {} AS (SELECT DISTINCT {} FROM {} {}",
            stage.cte,
            parent.qualify(stage.key),
            parent.object.physical_table,
            parent.alias
        ));
        self.push_where(sql, params, &stage.parent_where);
        sql.push(')');
    }

    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>, node: &WhereNode) {
        if !node.is_empty() {
            sql.push_str(" WHERE ");
            self.options.sql_compiler().compile_where(node, sql, params);
        }
    }

    fn preview_query(
        &self,
        stage: &Stage<'_>,
        object: &ConfiguredObject,
        filter: Option<&WhereNode>,
        limit: usize,
    ) -> CompiledQuery {
        let (cte, key) = (&stage.cte, stage.key);
        let columns: Vec<String> = object
            .object
            .displayable_fields()
            .map(|f| {
                format!(
                    "{} AS {}",
                    object.qualify(f.column_name()),
                    sanitize_identifier(&f.name)
                )
            })
            .collect();
        let select_list = if columns.is_empty() {
            object.qualify("*")
        } else {
            columns.join(", ")
        };

        let mut sql = String::new();
        let mut params = Vec::new();
        self.push_cte(&mut sql, &mut params, stage);
        sql.push_str(&format!(
            " SELECT {select_list} FROM {} {} INNER JOIN {cte} ON {} = {cte}.{key}",
            object.object.physical_table,
            object.alias,
            object.qualify(key),
        ));
        if let Some(node) = filter {
            self.push_where(&mut sql, &mut params, node);
        }
        sql.push_str(&format!(" LIMIT {limit}"));

        CompiledQuery {
            sql,
            params,
            warnings: stage.warnings.clone(),
        }
    }
}

/// The resolved two-level staging shared by count and preview queries.
struct Stage<'c> {
    roles: RoleAssignment<'c>,
    cte: String,
    key: &'c str,
    parent_where: WhereNode,
    child_where: WhereNode,
    warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, Operator};
    use crate::model::{AudienceObject, Field, Relationship};
    use audience_rs_core::{JoinStrategy, ValueMode};

    fn config() -> AudienceConfig {
        AudienceConfig::new()
            .with_object(ConfiguredObject::new(
                AudienceObject::new("companies", "companies")
                    .with_field(Field::string("company_name"))
                    .with_field(Field::string("country").with_distinct_values())
                    .with_field(Field::number("employee_count").with_column("employees"))
                    .with_field(Field::string("internal_score").hidden()),
                "c",
            ))
            .with_object(ConfiguredObject::new(
                AudienceObject::new("contacts", "contacts")
                    .with_field(Field::string("first_name"))
                    .with_field(Field::string("job_title")),
                "p",
            ))
            .with_relationship(Relationship::new("c.company_id = p.company_id"))
    }

    fn scenario() -> CohortFilters {
        CohortFilters::new()
            .with_company_filter(Filter::new("country", Operator::Equals, "USA"))
            .with_contact_filter(Filter::new("job_title", Operator::Contains, "Director"))
    }

    fn inline() -> CompileOptions {
        CompileOptions::default().with_value_mode(ValueMode::Inline)
    }

    #[test]
    fn test_listing_inline() {
        let options = inline();
        let query = QueryModeAssembler::new(&options)
            .listing(&config(), &scenario(), Some(100))
            .unwrap();
        assert_eq!(
            query.sql,
            "SELECT DISTINCT c.company_name AS c_company_name, c.country AS c_country, \
             c.employees AS c_employee_count, p.first_name AS p_first_name, \
             p.job_title AS p_job_title FROM companies c INNER JOIN contacts p \
             ON c.company_id = p.company_id WHERE c.country = 'USA' AND \
             p.job_title LIKE '%Director%' LIMIT 100"
        );
        assert!(query.params.is_empty());
        assert!(query.warnings.is_empty());
    }

    #[test]
    fn test_listing_without_filters_or_limit() {
        let options = inline();
        let query = QueryModeAssembler::new(&options)
            .listing(&config(), &CohortFilters::new(), None)
            .unwrap();
        assert!(!query.sql.contains("WHERE"));
        assert!(!query.sql.contains("LIMIT"));
    }

    #[test]
    fn test_listing_bound_params() {
        let options = CompileOptions::default();
        let query = QueryModeAssembler::new(&options)
            .listing(&config(), &scenario(), None)
            .unwrap();
        assert!(query.sql.ends_with("WHERE c.country = $1 AND p.job_title LIKE $2"));
        assert_eq!(query.params, vec![Value::from("USA"), Value::from("%Director%")]);
    }

    #[test]
    fn test_listing_is_deterministic() {
        let options = CompileOptions::default();
        let assembler = QueryModeAssembler::new(&options);
        let first = assembler.listing(&config(), &scenario(), Some(10)).unwrap();
        let second = assembler.listing(&config(), &scenario(), Some(10)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_listing_dropped_object_warns() {
        let mut config = config();
        config.relationships.clear();
        let options = inline();
        let filters = CohortFilters::new()
            .with_company_filter(Filter::new("country", Operator::Equals, "USA"));
        let query = QueryModeAssembler::new(&options)
            .listing(&config, &filters, None)
            .unwrap();
        assert!(!query.sql.contains("JOIN"));
        assert!(!query.sql.contains("p.first_name"));
        assert_eq!(query.warnings.len(), 1);
    }

    #[test]
    fn test_listing_filters_on_dropped_object_fail() {
        let mut config = config();
        config.relationships.clear();
        let options = inline();
        let err = QueryModeAssembler::new(&options)
            .listing(&config, &scenario(), None)
            .unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
        assert!(err.to_string().contains("contactFilters"));
    }

    #[test]
    fn test_listing_graph_strategy_rejects_disconnected() {
        let mut config = config();
        config.relationships.clear();
        let options = inline().with_join_strategy(JoinStrategy::Graph);
        assert!(QueryModeAssembler::new(&options)
            .listing(&config, &CohortFilters::new(), None)
            .is_err());
    }

    #[test]
    fn test_count_query_inline() {
        let options = inline();
        let query = QueryModeAssembler::new(&options)
            .counts(&config(), &scenario())
            .unwrap();
        assert_eq!(
            query.sql,
            "WITH qualified_companies AS (SELECT DISTINCT c.company_id FROM companies c \
             WHERE c.country = 'USA') SELECT (SELECT COUNT(DISTINCT company_id) FROM \
             qualified_companies) AS company_count, (SELECT COUNT(DISTINCT p.id) FROM \
             contacts p INNER JOIN qualified_companies ON p.company_id = \
             qualified_companies.company_id WHERE p.job_title LIKE '%Director%') AS people_count"
        );
    }

    #[test]
    fn test_count_query_bound_param_order() {
        let options = CompileOptions::default();
        let query = QueryModeAssembler::new(&options)
            .counts(&config(), &scenario())
            .unwrap();
        assert!(query.sql.contains("WHERE c.country = $1)"));
        assert!(query.sql.contains("WHERE p.job_title LIKE $2)"));
        assert_eq!(query.params, vec![Value::from("USA"), Value::from("%Director%")]);
    }

    #[test]
    fn test_count_query_custom_join_key() {
        let options = inline();
        let config = config().with_join_key("account_id");
        let query = QueryModeAssembler::new(&options)
            .counts(&config, &CohortFilters::new())
            .unwrap();
        assert!(query.sql.contains("SELECT DISTINCT c.account_id FROM companies c)"));
        assert!(query.sql.contains("ON p.account_id = qualified_companies.account_id"));
        assert!(!query.sql.contains("WHERE"));
    }

    #[test]
    fn test_count_query_requires_roles() {
        let options = inline();
        let config = AudienceConfig::new().with_object(config().objects[0].clone());
        let err = QueryModeAssembler::new(&options)
            .counts(&config, &scenario())
            .unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
    }

    #[test]
    fn test_preview_queries() {
        let options = inline();
        let previews = QueryModeAssembler::new(&options)
            .previews(&config(), &scenario(), None)
            .unwrap();
        assert_eq!(previews.limit, 25);
        assert_eq!(
            previews.company.sql,
            "WITH qualified_companies AS (SELECT DISTINCT c.company_id FROM companies c \
             WHERE c.country = 'USA') SELECT c.company_name AS company_name, c.country AS \
             country, c.employees AS employee_count FROM companies c INNER JOIN \
             qualified_companies ON c.company_id = qualified_companies.company_id LIMIT 25"
        );
        assert!(previews.contact.sql.ends_with(
            "FROM contacts p INNER JOIN qualified_companies ON p.company_id = \
             qualified_companies.company_id WHERE p.job_title LIKE '%Director%' LIMIT 25"
        ));
    }

    #[test]
    fn test_preview_limit_is_capped() {
        let options = inline();
        let assembler = QueryModeAssembler::new(&options);
        assert_eq!(assembler.preview_limit(Some(1000)), 25);
        assert_eq!(assembler.preview_limit(Some(5)), 5);
        let previews = assembler.previews(&config(), &scenario(), Some(500)).unwrap();
        assert!(previews.company.sql.ends_with("LIMIT 25"));
        assert!(previews.contact.sql.ends_with("LIMIT 25"));
    }

    #[test]
    fn test_preview_bound_params_per_query() {
        let options = CompileOptions::default();
        let previews = QueryModeAssembler::new(&options)
            .previews(&config(), &scenario(), None)
            .unwrap();
        assert_eq!(previews.company.params, vec![Value::from("USA")]);
        assert_eq!(
            previews.contact.params,
            vec![Value::from("USA"), Value::from("%Director%")]
        );
    }

    #[test]
    fn test_distinct_values() {
        let options = inline();
        let query = QueryModeAssembler::new(&options)
            .distinct_values(&config(), "c", "country", 50)
            .unwrap();
        assert_eq!(
            query.sql,
            "SELECT DISTINCT c.country AS value FROM companies c WHERE c.country IS NOT NULL \
             ORDER BY value LIMIT 50"
        );
    }

    #[test]
    fn test_distinct_values_requires_flag() {
        let options = inline();
        let err = QueryModeAssembler::new(&options)
            .distinct_values(&config(), "c", "company_name", 50)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = QueryModeAssembler::new(&options)
            .distinct_values(&config(), "z", "country", 50)
            .unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
    }
}
