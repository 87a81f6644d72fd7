//! Built-in management commands.
//!
//! `compile` and `run` share the query arguments defined here: the audience
//! file, an optional filter file, the query mode, and its limit.

pub mod check;
pub mod compile;
pub mod run;

pub use check::CheckCommand;
pub use compile::CompileCommand;
pub use run::RunCommand;

use audience_rs_core::{AudienceError, AudienceResult};
use audience_rs_query::{AudienceConfig, CohortFilters};

use crate::command::CommandRegistry;
use crate::input::{load_audience, load_filters};

/// Default row cap of the distinct-values mode.
pub const DEFAULT_DISTINCT_LIMIT: usize = 100;

/// Registers all built-in commands.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(CompileCommand));
    registry.register(Box::new(RunCommand));
    registry.register(Box::new(CheckCommand));
}

/// Which query a command compiles or runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The joined listing.
    Listing,
    /// Company and people counts.
    Counts,
    /// The company and contact previews.
    Preview,
    /// Distinct values of one field.
    Distinct,
}

impl QueryKind {
    /// Names accepted by `--mode`.
    pub const NAMES: [&'static str; 4] = ["listing", "counts", "preview", "distinct"];

    /// Parses a `--mode` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "listing" => Some(Self::Listing),
            "counts" => Some(Self::Counts),
            "preview" => Some(Self::Preview),
            "distinct" => Some(Self::Distinct),
            _ => None,
        }
    }
}

/// Parsed query arguments shared by `compile` and `run`.
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// The audience.
    pub config: AudienceConfig,
    /// The filters; empty when no file was given.
    pub filters: CohortFilters,
    /// The query mode.
    pub kind: QueryKind,
    /// Row limit, if given.
    pub limit: Option<usize>,
    /// Object alias and field name for the distinct mode.
    pub target: Option<(String, String)>,
}

impl QueryArgs {
    /// Reads the shared arguments and loads their files.
    pub fn from_matches(matches: &clap::ArgMatches) -> AudienceResult<Self> {
        let audience = matches
            .get_one::<String>("audience")
            .ok_or_else(|| AudienceError::ConfigurationError("--audience is required".into()))?;
        let kind = matches
            .get_one::<String>("mode")
            .and_then(|m| QueryKind::from_name(m))
            .unwrap_or(QueryKind::Listing);

        let target = match (
            matches.get_one::<String>("object"),
            matches.get_one::<String>("field"),
        ) {
            (Some(object), Some(field)) => Some((object.clone(), field.clone())),
            _ => None,
        };
        if kind == QueryKind::Distinct && target.is_none() {
            return Err(AudienceError::ConfigurationError(
                "--mode distinct needs --object and --field".into(),
            ));
        }

        Ok(Self {
            config: load_audience(audience)?,
            filters: load_filters(matches.get_one::<String>("filters").map(String::as_str))?,
            kind,
            limit: matches.get_one::<usize>("limit").copied(),
            target,
        })
    }

    /// Returns the object alias and field of the distinct mode.
    pub fn distinct_target(&self) -> AudienceResult<(&str, &str)> {
        self.target
            .as_ref()
            .map(|(o, f)| (o.as_str(), f.as_str()))
            .ok_or_else(|| AudienceError::ConfigurationError("No distinct-values target".into()))
    }
}

/// Adds the shared query arguments to a command.
pub fn query_arguments(cmd: clap::Command) -> clap::Command {
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
            .help("Filter specification JSON"),
    )
    .arg(
        clap::Arg::new("mode")
            .long("mode")
            .short('m')
            .default_value("listing")
            .value_parser(clap::builder::PossibleValuesParser::new(QueryKind::NAMES)),
    )
    .arg(
        clap::Arg::new("limit")
            .long("limit")
            .short('n')
            .value_parser(clap::value_parser!(usize))
            .help("Row limit (previews are capped by the preview limit setting)"),
    )
    .arg(
        clap::Arg::new("object")
            .long("object")
            .value_name("ALIAS")
            .help("Object alias for --mode distinct"),
    )
    .arg(
        clap::Arg::new("field")
            .long("field")
            .value_name("NAME")
            .help("Field name for --mode distinct"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin_commands() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);
        assert_eq!(registry.list_commands(), vec!["check", "compile", "run"]);
    }

    #[test]
    fn test_query_kind_names() {
        for name in QueryKind::NAMES {
            assert!(QueryKind::from_name(name).is_some());
        }
        assert_eq!(QueryKind::from_name("count"), None);
    }

    #[test]
    fn test_distinct_needs_target() {
        let matches = query_arguments(clap::Command::new("compile"))
            .try_get_matches_from(["compile", "--audience", "a.json", "--mode", "distinct"])
            .unwrap();
        let err = QueryArgs::from_matches(&matches).unwrap_err();
        assert!(err.to_string().contains("--object"));
    }

    #[test]
    fn test_mode_rejects_unknown() {
        let result = query_arguments(clap::Command::new("compile"))
            .try_get_matches_from(["compile", "--audience", "a.json", "--mode", "everything"]);
        assert!(result.is_err());
    }
}
