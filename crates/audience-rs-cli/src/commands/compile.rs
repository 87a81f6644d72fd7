//! The `compile` command.
//!
//! Prints the SQL, parameters, and warnings of one query mode as JSON
//! without contacting a warehouse.

use async_trait::async_trait;
use audience_rs_core::{AudienceError, AudienceResult, Settings, ValueMode, WarehouseDialect};
use audience_rs_query::query::compiler::CompiledQuery;
use audience_rs_query::{CompileOptions, SqlQueryAssembler};
use serde_json::json;

use super::{query_arguments, QueryArgs, QueryKind, DEFAULT_DISTINCT_LIMIT};
use crate::command::ManagementCommand;

/// Compiles a query mode and prints it.
pub struct CompileCommand;

/// Renders a compiled query with plain JSON parameters.
pub fn query_json(query: &CompiledQuery) -> serde_json::Value {
    json!({
        "sql": query.sql,
        "params": query.params.iter().map(audience_rs_query::Value::to_json).collect::<Vec<_>>(),
        "warnings": query.warnings,
    })
}

/// Compiles the requested mode into its JSON description.
pub fn compile_output(assembler: &SqlQueryAssembler, args: &QueryArgs) -> AudienceResult<serde_json::Value> {
    Ok(match args.kind {
        QueryKind::Listing => {
            query_json(&assembler.compile_listing(&args.filters, &args.config, args.limit)?)
        }
        QueryKind::Counts => query_json(&assembler.compile_counts(&args.filters, &args.config)?),
        QueryKind::Preview => {
            let previews = assembler.compile_previews(&args.filters, &args.config, args.limit)?;
            json!({
                "limit": previews.limit,
                "company": query_json(&previews.company),
                "contact": query_json(&previews.contact),
            })
        }
        QueryKind::Distinct => {
            let (alias, field) = args.distinct_target()?;
            query_json(&assembler.compile_distinct_values(
                &args.config,
                alias,
                field,
                args.limit.unwrap_or(DEFAULT_DISTINCT_LIMIT),
            )?)
        }
    })
}

/// Builds compile options from settings and command-line overrides.
pub fn options_from(matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<CompileOptions> {
    let mut options = CompileOptions::from_settings(settings);
    if let Some(name) = matches.get_one::<String>("dialect") {
        let dialect = WarehouseDialect::from_name(name).ok_or_else(|| {
            AudienceError::ConfigurationError(format!("Unknown dialect '{name}'"))
        })?;
        options = options.with_dialect(dialect);
    }
    if matches.get_flag("inline") {
        options = options.with_value_mode(ValueMode::Inline);
    }
    if matches.get_flag("strict") {
        options = options.strict();
    }
    Ok(options)
}

#[async_trait]
impl ManagementCommand for CompileCommand {
    fn name(&self) -> &'static str {
        "compile"
    }

    fn help(&self) -> &'static str {
        "Print the SQL of a query mode"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        query_arguments(cmd)
            .arg(
                clap::Arg::new("dialect")
                    .long("dialect")
                    .help("Warehouse dialect (postgres, redshift, snowflake, sqlite)"),
            )
            .arg(
                clap::Arg::new("inline")
                    .long("inline")
                    .action(clap::ArgAction::SetTrue)
                    .help("Inline values as escaped literals instead of binding them"),
            )
            .arg(
                clap::Arg::new("strict")
                    .long("strict")
                    .action(clap::ArgAction::SetTrue)
                    .help("Reject unknown operators"),
            )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<()> {
        let args = QueryArgs::from_matches(matches)?;
        let assembler = SqlQueryAssembler::new(options_from(matches, settings)?);
        let output = compile_output(&assembler, &args)?;
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| AudienceError::SerializationError(e.to_string()))?;
        println!("{text}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audience_rs_query::{
        AudienceConfig, AudienceObject, CohortFilters, ConfiguredObject, Field, Filter,
        ObjectRole, Operator, Relationship,
    };

    fn args(kind: QueryKind) -> QueryArgs {
        let config = AudienceConfig::new()
            .with_object(
                ConfiguredObject::new(
                    AudienceObject::new("companies", "companies")
                        .with_field(Field::string("country").with_distinct_values()),
                    "c",
                )
                .with_role(ObjectRole::Parent),
            )
            .with_object(
                ConfiguredObject::new(
                    AudienceObject::new("contacts", "contacts").with_field(Field::string("job_title")),
                    "p",
                )
                .with_role(ObjectRole::Child),
            )
            .with_relationship(Relationship::new("c.company_id = p.company_id"));
        QueryArgs {
            config,
            filters: CohortFilters::new()
                .with_company_filter(Filter::new("country", Operator::Equals, "USA")),
            kind,
            limit: Some(10),
            target: Some(("c".into(), "country".into())),
        }
    }

    fn matches(argv: &[&str]) -> clap::ArgMatches {
        CompileCommand
            .add_arguments(clap::Command::new("compile"))
            .try_get_matches_from(argv)
            .unwrap()
    }

    #[test]
    fn test_compile_counts_bound() {
        let output = compile_output(&SqlQueryAssembler::default(), &args(QueryKind::Counts)).unwrap();
        assert!(output["sql"].as_str().unwrap().contains("WHERE c.country = $1"));
        assert_eq!(output["params"], json!(["USA"]));
    }

    #[test]
    fn test_compile_preview_pair() {
        let output = compile_output(&SqlQueryAssembler::default(), &args(QueryKind::Preview)).unwrap();
        assert_eq!(output["limit"], 10);
        assert!(output["company"]["sql"].as_str().unwrap().ends_with("LIMIT 10"));
        assert!(output["contact"]["sql"].as_str().unwrap().contains("FROM contacts p"));
    }

    #[test]
    fn test_compile_distinct() {
        let output = compile_output(&SqlQueryAssembler::default(), &args(QueryKind::Distinct)).unwrap();
        assert_eq!(
            output["sql"],
            "SELECT DISTINCT c.country AS value FROM companies c WHERE c.country IS NOT NULL ORDER BY value LIMIT 10"
        );
    }

    #[test]
    fn test_options_from_flags() {
        let m = matches(&["compile", "--audience", "a.json", "--dialect", "snowflake", "--inline", "--strict"]);
        let options = options_from(&m, &Settings::default()).unwrap();
        assert_eq!(options.dialect, WarehouseDialect::Snowflake);
        assert_eq!(options.compiler.value_mode, ValueMode::Inline);
        assert!(options.compiler.strict_operators);
    }

    #[test]
    fn test_options_unknown_dialect() {
        let m = matches(&["compile", "--audience", "a.json", "--dialect", "oracle"]);
        assert!(options_from(&m, &Settings::default()).is_err());
    }

    #[test]
    fn test_inline_listing() {
        let m = matches(&["compile", "--audience", "a.json", "--inline"]);
        let assembler = SqlQueryAssembler::new(options_from(&m, &Settings::default()).unwrap());
        let output = compile_output(&assembler, &args(QueryKind::Listing)).unwrap();
        assert!(output["sql"].as_str().unwrap().contains("c.country = 'USA'"));
        assert_eq!(output["params"], json!([]));
    }
}
