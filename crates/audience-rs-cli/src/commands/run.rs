//! The `run` command.
//!
//! Executes one query mode against a SQLite warehouse file and prints the
//! result as JSON.

use async_trait::async_trait;
use audience_rs_core::{AudienceError, AudienceResult, Settings};
use audience_rs_query::{ExecutionContext, SqlQueryAssembler, Value, WarehouseExecutor};
use audience_rs_warehouse::SqliteWarehouse;

use super::{query_arguments, QueryArgs, QueryKind, DEFAULT_DISTINCT_LIMIT};
use crate::command::ManagementCommand;

/// Runs a query mode and prints its result.
pub struct RunCommand;

/// Executes the requested mode and returns its JSON result.
pub async fn run_output(
    assembler: &SqlQueryAssembler,
    executor: &dyn WarehouseExecutor,
    ctx: &ExecutionContext,
    args: &QueryArgs,
) -> AudienceResult<serde_json::Value> {
    let to_json = |e: serde_json::Error| AudienceError::SerializationError(e.to_string());
    match args.kind {
        QueryKind::Listing => {
            let rows = assembler
                .execute(executor, ctx, &args.filters, &args.config, args.limit)
                .await?;
            serde_json::to_value(rows).map_err(to_json)
        }
        QueryKind::Counts => {
            let counts = assembler
                .get_counts(executor, ctx, &args.filters, &args.config)
                .await?;
            serde_json::to_value(counts).map_err(to_json)
        }
        QueryKind::Preview => {
            let preview = assembler
                .get_preview(executor, ctx, &args.filters, &args.config, args.limit)
                .await?;
            serde_json::to_value(preview).map_err(to_json)
        }
        QueryKind::Distinct => {
            let (alias, field) = args.distinct_target()?;
            let values = assembler
                .get_distinct_values(
                    executor,
                    ctx,
                    &args.config,
                    alias,
                    field,
                    args.limit.unwrap_or(DEFAULT_DISTINCT_LIMIT),
                )
                .await?;
            Ok(serde_json::Value::Array(values.iter().map(Value::to_json).collect()))
        }
    }
}

#[async_trait]
impl ManagementCommand for RunCommand {
    fn name(&self) -> &'static str {
        "run"
    }

    fn help(&self) -> &'static str {
        "Run a query mode against a SQLite warehouse"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        query_arguments(cmd).arg(
            clap::Arg::new("database")
                .long("database")
                .short('d')
                .required(true)
                .value_name("PATH")
                .help("SQLite database file (:memory: for an empty database)"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> AudienceResult<()> {
        let args = QueryArgs::from_matches(matches)?;
        let database = matches
            .get_one::<String>("database")
            .ok_or_else(|| AudienceError::ConfigurationError("--database is required".into()))?;

        let warehouse = SqliteWarehouse::open(database)?;
        let ctx = ExecutionContext::from_settings(&settings.warehouse);
        let assembler = SqlQueryAssembler::from_settings(settings);

        let output = run_output(&assembler, &warehouse, &ctx, &args).await?;
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| AudienceError::SerializationError(e.to_string()))?;
        println!("{text}");
        Ok(())
    }
}
