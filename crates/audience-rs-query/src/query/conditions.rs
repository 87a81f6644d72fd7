//! Turning an ordered filter list into a boolean expression.
//!
//! Two groupings are supported:
//!
//! - [`GroupingMode::Adjacency`] walks the list once and collects runs of
//!   filters whose own connector matches the running connector. Each run
//!   becomes one group (parenthesized when it has more than one member) and
//!   all groups are AND-ed. `[A(OR), B(OR), C(AND)]` compiles to
//!   `(A OR B) AND C`; `[A(AND), B(OR), C(AND)]` compiles to
//!   `A AND B AND C`. Saved cohorts rely on this grouping.
//! - [`GroupingMode::Precedence`] reads the connector on filter *i* as the
//!   operator between *i* and *i + 1*, with AND binding tighter than OR.

use audience_rs_core::{AudienceError, AudienceResult, GroupingMode, ValidationError};

use super::compiler::WhereNode;
use super::lookups::Lookup;
use super::resolver::FieldResolver;
use super::CompileOptions;
use crate::filter::{Filter, LogicalOperator, Operator};
use crate::model::ConfiguredObject;

/// Compiles filter lists for one set of options.
#[derive(Debug, Clone, Copy)]
pub struct ConditionGroupCompiler<'a> {
    options: &'a CompileOptions,
}

impl<'a> ConditionGroupCompiler<'a> {
    /// Creates a compiler.
    pub const fn new(options: &'a CompileOptions) -> Self {
        Self { options }
    }

    /// Compiles `filters` against `object` into one expression tree.
    ///
    /// `list_name` prefixes the field path of validation errors
    /// (`companyFilters[2]`). Operators compiled as `equals` because they
    /// are unknown are reported in `warnings`.
    pub fn compile(
        &self,
        object: &ConfiguredObject,
        filters: &[Filter],
        list_name: &str,
        warnings: &mut Vec<String>,
    ) -> AudienceResult<WhereNode> {
        let resolver = FieldResolver::new(object);
        let mut conditions = Vec::with_capacity(filters.len());
        for (i, filter) in filters.iter().enumerate() {
            let path = format!("{list_name}[{i}]");
            let node = self.compile_filter(&resolver, filter, &path, warnings)?;
            conditions.push((node, filter.connector()));
        }

        Ok(match self.options.compiler.grouping {
            GroupingMode::Adjacency => group_by_adjacency(conditions),
            GroupingMode::Precedence => group_by_precedence(conditions),
        })
    }

    fn compile_filter(
        &self,
        resolver: &FieldResolver<'_>,
        filter: &Filter,
        path: &str,
        warnings: &mut Vec<String>,
    ) -> AudienceResult<WhereNode> {
        let operator = match filter.parsed_operator() {
            Some(op) => op,
            None if self.options.compiler.strict_operators => {
                return Err(at_path(
                    path,
                    ValidationError::new(
                        format!("Unsupported operator '{}'", filter.operator),
                        "unsupported_operator",
                    )
                    .with_param("operator", filter.operator.clone()),
                ));
            }
            None => {
                tracing::warn!(
                    field = %filter.field,
                    operator = %filter.operator,
                    "Unsupported filter operator compiled as equals"
                );
                warnings.push(format!(
                    "{path}: unsupported operator '{}' compiled as 'equals'",
                    filter.operator
                ));
                Operator::Equals
            }
        };

        let field = resolver
            .resolve_filterable(&filter.field, operator)
            .map_err(|e| match e {
                AudienceError::ValidationError(v) => at_path(path, v),
                other => other,
            })?;
        let lookup = Lookup::build(operator, &filter.value).map_err(|v| at_path(path, v))?;
        let column = resolver.qualified_column(&field.name)?;
        Ok(WhereNode::condition(column, lookup))
    }
}

fn at_path(path: &str, error: ValidationError) -> AudienceError {
    ValidationError::for_field(path, error).into()
}

fn close_group(mut members: Vec<WhereNode>, connector: LogicalOperator) -> WhereNode {
    if members.len() == 1 {
        if let Some(only) = members.pop() {
            return only;
        }
    }
    match connector {
        LogicalOperator::And => WhereNode::And(members),
        LogicalOperator::Or => WhereNode::Or(members),
    }
}

/// Groups conditions by runs of equal connectors and AND-s the groups.
pub fn group_by_adjacency(conditions: Vec<(WhereNode, LogicalOperator)>) -> WhereNode {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    let mut connector = LogicalOperator::And;

    for (node, op) in conditions {
        if !current.is_empty() && op != connector {
            groups.push(close_group(std::mem::take(&mut current), connector));
        }
        if current.is_empty() {
            connector = op;
        }
        current.push(node);
    }
    if !current.is_empty() {
        groups.push(close_group(current, connector));
    }

    WhereNode::And(groups)
}

/// Builds an OR of AND-terms, splitting after every OR connector.
pub fn group_by_precedence(conditions: Vec<(WhereNode, LogicalOperator)>) -> WhereNode {
    let mut terms = Vec::new();
    let mut current = Vec::new();

    for (node, op) in conditions {
        current.push(node);
        if op == LogicalOperator::Or {
            terms.push(close_group(std::mem::take(&mut current), LogicalOperator::And));
        }
    }
    if !current.is_empty() {
        terms.push(close_group(current, LogicalOperator::And));
    }

    match terms.len() {
        0 | 1 => match terms.pop() {
            Some(WhereNode::And(members)) => WhereNode::And(members),
            Some(term) => WhereNode::And(vec![term]),
            None => WhereNode::And(Vec::new()),
        },
        _ => WhereNode::Or(terms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterValue;
    use crate::model::{AudienceObject, Field};
    use audience_rs_core::ValueMode;

    fn companies() -> ConfiguredObject {
        ConfiguredObject::new(
            AudienceObject::new("companies", "companies")
                .with_field(Field::string("country"))
                .with_field(Field::string("industry"))
                .with_field(Field::string("city"))
                .with_field(Field::number("employee_count").with_column("employees"))
                .with_field(Field::string("domain").not_filterable()),
            "c",
        )
    }

    fn inline() -> CompileOptions {
        CompileOptions::default().with_value_mode(ValueMode::Inline)
    }

    fn filter(field: &str, value: &str, connector: LogicalOperator) -> Filter {
        Filter::new(field, Operator::Equals, value).with_connector(connector)
    }

    fn compile(options: &CompileOptions, filters: &[Filter]) -> AudienceResult<String> {
        let mut warnings = Vec::new();
        let node = ConditionGroupCompiler::new(options).compile(
            &companies(),
            filters,
            "companyFilters",
            &mut warnings,
        )?;
        Ok(options.sql_compiler().render(&node).0)
    }

    use LogicalOperator::{And, Or};

    #[test]
    fn test_single_filter_has_no_parentheses() {
        let sql = compile(&inline(), &[filter("country", "USA", And)]).unwrap();
        assert_eq!(sql, "c.country = 'USA'");
    }

    #[test]
    fn test_uniform_and_is_one_group() {
        let sql = compile(
            &inline(),
            &[filter("country", "USA", And), filter("industry", "Software", And)],
        )
        .unwrap();
        assert_eq!(sql, "(c.country = 'USA' AND c.industry = 'Software')");
    }

    #[test]
    fn test_uniform_or_is_one_group() {
        let sql = compile(
            &inline(),
            &[
                filter("country", "USA", Or),
                filter("country", "Canada", Or),
                filter("country", "Mexico", Or),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "(c.country = 'USA' OR c.country = 'Canada' OR c.country = 'Mexico')"
        );
    }

    #[test]
    fn test_or_run_then_and() {
        let sql = compile(
            &inline(),
            &[
                filter("country", "USA", Or),
                filter("country", "Canada", Or),
                filter("industry", "Software", And),
            ],
        )
        .unwrap();
        assert_eq!(sql, "(c.country = 'USA' OR c.country = 'Canada') AND c.industry = 'Software'");
    }

    #[test]
    fn test_alternating_connectors_are_and_ed() {
        let sql = compile(
            &inline(),
            &[
                filter("country", "USA", And),
                filter("industry", "Software", Or),
                filter("city", "Austin", And),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "c.country = 'USA' AND c.industry = 'Software' AND c.city = 'Austin'"
        );
    }

    #[test]
    fn test_missing_connector_defaults_to_and() {
        let filters = vec![
            Filter::new("country", Operator::Equals, "USA"),
            Filter::new("industry", Operator::Equals, "Software"),
        ];
        let sql = compile(&inline(), &filters).unwrap();
        assert_eq!(sql, "(c.country = 'USA' AND c.industry = 'Software')");
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        let options = inline().with_grouping(GroupingMode::Precedence);
        let sql = compile(
            &options,
            &[
                filter("country", "USA", Or),
                filter("industry", "Software", And),
                filter("city", "Austin", And),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "c.country = 'USA' OR (c.industry = 'Software' AND c.city = 'Austin')"
        );
    }

    #[test]
    fn test_precedence_all_and_is_flat() {
        let options = inline().with_grouping(GroupingMode::Precedence);
        let sql = compile(
            &options,
            &[filter("country", "USA", And), filter("industry", "Software", And)],
        )
        .unwrap();
        assert_eq!(sql, "c.country = 'USA' AND c.industry = 'Software'");
    }

    #[test]
    fn test_empty_list_is_empty_tree() {
        let options = inline();
        let mut warnings = Vec::new();
        let node = ConditionGroupCompiler::new(&options)
            .compile(&companies(), &[], "companyFilters", &mut warnings)
            .unwrap();
        assert!(node.is_empty());
    }

    #[test]
    fn test_unknown_operator_defaults_to_equals() {
        let options = inline();
        let mut warnings = Vec::new();
        let node = ConditionGroupCompiler::new(&options)
            .compile(
                &companies(),
                &[Filter::raw("country", "sounds_like", "USA")],
                "companyFilters",
                &mut warnings,
            )
            .unwrap();
        assert_eq!(options.sql_compiler().render(&node).0, "c.country = 'USA'");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("sounds_like"));
    }

    #[test]
    fn test_unknown_operator_strict() {
        let err = compile(&inline().strict(), &[Filter::raw("country", "sounds_like", "USA")])
            .unwrap_err();
        match err {
            AudienceError::ValidationError(v) => {
                assert_eq!(v.field_errors["companyFilters[0]"][0].code, "unsupported_operator");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let err = compile(&inline(), &[filter("contry", "USA", And)]).unwrap_err();
        assert!(matches!(err, AudienceError::ConfigurationError(_)));
    }

    #[test]
    fn test_non_filterable_field_reports_path() {
        let err = compile(
            &inline(),
            &[filter("country", "USA", And), filter("domain", "acme.com", And)],
        )
        .unwrap_err();
        match err {
            AudienceError::ValidationError(v) => {
                assert_eq!(v.field_errors["companyFilters[1]"][0].code, "not_filterable");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_column_mapping_and_numbers() {
        let sql = compile(
            &inline(),
            &[Filter::new("employee_count", Operator::GreaterThan, 50)],
        )
        .unwrap();
        assert_eq!(sql, "c.employees > 50");
    }

    #[test]
    fn test_bound_mode_params_follow_filter_order() {
        let options = CompileOptions::default();
        let mut warnings = Vec::new();
        let node = ConditionGroupCompiler::new(&options)
            .compile(
                &companies(),
                &[
                    Filter::new("country", Operator::In, FilterValue::from(vec!["USA", "Canada"])),
                    Filter::new("employee_count", Operator::LessThan, 500),
                ],
                "companyFilters",
                &mut warnings,
            )
            .unwrap();
        let (sql, params) = options.sql_compiler().render(&node);
        assert_eq!(sql, "(c.country IN ($1, $2) AND c.employees < $3)");
        assert_eq!(params.len(), 3);
    }
}
