//! The `check` command.
//!
//! Validates an audience file and reports how it will compile: the resolved
//! parent and child objects, the planned joins, and objects left out of the
//! join. With `--filters`, the filters are compiled as well so unknown
//! fields and disallowed operators are reported before anything runs.

use async_trait::async_trait;
use audience_rs_core::{AudienceError, AudienceResult, Settings};
use audience_rs_query::query::joins::{JoinPlan, RoleAssignment};
use audience_rs_query::{AudienceConfig, CohortFilters, CompileOptions, SqlQueryAssembler};

use crate::command::ManagementCommand;
use crate::input::{load_filters, read_input};

/// Validates an audience configuration.
pub struct CheckCommand;

/// The result of a single check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// The severity.
    pub level: CheckLevel,
    /// A human-readable description.
    pub msg: String,
    /// How to resolve the issue, if known.
    pub hint: Option<String>,
    /// A stable identifier (e.g. `audience.E001`).
    pub id: &'static str,
}

/// Severity levels of check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    /// Informational message.
    Info,
    /// A warning that may indicate a problem.
    Warning,
    /// An error that prevents compilation.
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl CheckMessage {
    fn new(level: CheckLevel, id: &'static str, msg: impl Into<String>) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: None,
            id,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Runs every check against an audience and optional filters.
pub fn run_checks(
    config: &AudienceConfig,
    filters: Option<&CohortFilters>,
    options: &CompileOptions,
) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if let Err(e) = config.validate() {
        messages.push(CheckMessage::new(CheckLevel::Error, "audience.E001", e.to_string()));
        return messages;
    }

    match RoleAssignment::resolve(config, options) {
        Ok(roles) => {
            for (label, object) in [("Parent", roles.parent), ("Child", roles.child)] {
                let how = if object.role.is_some() { "tagged" } else { "inferred from marker field" };
                messages.push(CheckMessage::new(
                    CheckLevel::Info,
                    "audience.I001",
                    format!("{label} object: {} (alias {}, {how})", object.object.name(), object.alias),
                ));
            }
        }
        Err(e) => messages.push(
            CheckMessage::new(CheckLevel::Error, "audience.E002", e.to_string())
                .with_hint("Set \"role\": \"parent\" and \"role\": \"child\" on the configured objects"),
        ),
    }

    match JoinPlan::build(config, options.compiler.join_strategy) {
        Ok(plan) => {
            messages.push(CheckMessage::new(CheckLevel::Info, "audience.I002", plan.to_sql()));
            for warning in plan.drop_warnings() {
                messages.push(
                    CheckMessage::new(CheckLevel::Warning, "audience.W001", warning)
                        .with_hint("Add a relationship whose join condition references the alias"),
                );
            }
        }
        Err(e) => messages.push(CheckMessage::new(CheckLevel::Error, "audience.E003", e.to_string())),
    }

    if let Some(filters) = filters {
        match SqlQueryAssembler::new(options.clone()).compile_counts(filters, config) {
            Ok(query) => {
                for warning in query.warnings {
                    messages.push(CheckMessage::new(CheckLevel::Warning, "filters.W001", warning));
                }
            }
            Err(e) => messages.push(CheckMessage::new(CheckLevel::Error, "filters.E001", e.to_string())),
        }
    }

    messages
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Validate an audience configuration"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("audience")
                .long("audience")
                .short('a')
                .required(true)
                .value_name("FILE")
                .help("Audience configuration JSON (- for stdin)"),
        )
        .arg(
            clap::Arg::new("filters")
                .long("filters")
                .short('f')
                .value_name("FILE")
                .help("Also compile this filter specification"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<()> {
        let path = matches
            .get_one::<String>("audience")
            .ok_or_else(|| AudienceError::ConfigurationError("--audience is required".into()))?;
        let config = AudienceConfig::parse_json(&read_input(path)?)?;
        let filters = match matches.get_one::<String>("filters") {
            Some(p) => Some(load_filters(Some(p.as_str()))?),
            None => None,
        };

        let messages = run_checks(&config, filters.as_ref(), &CompileOptions::from_settings(settings));
        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        let warnings = messages.iter().filter(|m| m.level == CheckLevel::Warning).count();

        for msg in &messages {
            let hint_text = msg
                .hint
                .as_ref()
                .map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            println!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint_text);
        }
        tracing::info!(errors, warnings, "Audience check finished");

        if errors > 0 {
            return Err(AudienceError::ConfigurationError(format!(
                "Audience check found {errors} error(s)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audience_rs_core::JoinStrategy;
    use audience_rs_query::{
        AudienceObject, ConfiguredObject, Field, Filter, ObjectRole, Operator, Relationship,
    };

    fn companies() -> AudienceObject {
        AudienceObject::new("companies", "companies")
            .with_field(Field::string("company_name"))
            .with_field(Field::string("country"))
    }

    fn contacts() -> AudienceObject {
        AudienceObject::new("contacts", "contacts").with_field(Field::string("job_title"))
    }

    fn config() -> AudienceConfig {
        AudienceConfig::new()
            .with_object(ConfiguredObject::new(companies(), "c"))
            .with_object(ConfiguredObject::new(contacts(), "p").with_role(ObjectRole::Child))
            .with_relationship(Relationship::new("c.company_id = p.company_id"))
    }

    fn ids(messages: &[CheckMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_clean_audience() {
        let messages = run_checks(&config(), None, &CompileOptions::default());
        assert!(messages.iter().all(|m| m.level == CheckLevel::Info));
        assert!(messages[0].msg.contains("inferred from marker field"));
        assert!(messages[1].msg.contains("tagged"));
        assert!(messages[2]
            .msg
            .contains("FROM companies c INNER JOIN contacts p ON c.company_id = p.company_id"));
    }

    #[test]
    fn test_invalid_audience_stops_early() {
        let messages = run_checks(&AudienceConfig::new(), None, &CompileOptions::default());
        assert_eq!(ids(&messages), vec!["audience.E001"]);
    }

    #[test]
    fn test_missing_child() {
        let config = AudienceConfig::new().with_object(ConfiguredObject::new(companies(), "c"));
        let messages = run_checks(&config, None, &CompileOptions::default());
        assert!(ids(&messages).contains(&"audience.E002"));
        assert!(messages.iter().any(|m| m.hint.is_some()));
    }

    #[test]
    fn test_dropped_object_warns() {
        let config = config().with_object(ConfiguredObject::new(
            AudienceObject::new("events", "events").with_field(Field::string("kind")),
            "e",
        ));
        let messages = run_checks(&config, None, &CompileOptions::default());
        assert!(ids(&messages).contains(&"audience.W001"));
    }

    #[test]
    fn test_disconnected_object_errors_with_graph_joins() {
        let config = config().with_object(ConfiguredObject::new(
            AudienceObject::new("events", "events").with_field(Field::string("kind")),
            "e",
        ));
        let options = CompileOptions::default().with_join_strategy(JoinStrategy::Graph);
        let messages = run_checks(&config, None, &options);
        assert!(ids(&messages).contains(&"audience.E003"));
    }

    #[test]
    fn test_filters_unknown_field() {
        let filters = CohortFilters::new()
            .with_company_filter(Filter::new("revenue", Operator::GreaterThan, 10));
        let messages = run_checks(&config(), Some(&filters), &CompileOptions::default());
        assert!(ids(&messages).contains(&"filters.E001"));
    }

    #[test]
    fn test_filters_unknown_operator_warns() {
        let filters = CohortFilters::new().with_company_filter(Filter::raw("country", "like", "US"));
        let messages = run_checks(&config(), Some(&filters), &CompileOptions::default());
        assert!(ids(&messages).contains(&"filters.W001"));
    }

    #[test]
    fn test_check_level_ordering() {
        assert!(CheckLevel::Info < CheckLevel::Warning);
        assert!(CheckLevel::Warning < CheckLevel::Error);
        assert_eq!(CheckLevel::Warning.to_string(), "WARNING");
    }
}
