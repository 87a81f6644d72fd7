//! The public compile-and-execute surface.
//!
//! [`SqlQueryAssembler`] wraps the query mode assembler with the three
//! execution flows: listing, counts, and the concurrent preview pair.

use audience_rs_core::{AudienceError, AudienceResult, Settings, ValueMode};
use serde::{Deserialize, Serialize};

use crate::executor::{run_query, ExecutionContext, QueryMode, WarehouseExecutor};
use crate::filter::CohortFilters;
use crate::model::AudienceConfig;
use crate::query::compiler::CompiledQuery;
use crate::query::modes::{PreviewQueries, QueryModeAssembler};
use crate::query::CompileOptions;
use crate::row::Row;
use crate::value::Value;

/// Aggregate counts of an audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceCounts {
    /// Distinct qualifying parent keys.
    pub company_count: i64,
    /// Distinct qualifying child rows joined to the qualifying parents.
    pub people_count: i64,
}

/// Sample rows of an audience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiencePreview {
    /// Parent (company) rows.
    pub company_preview: Vec<Row>,
    /// Child (contact) rows.
    pub contact_preview: Vec<Row>,
}

/// Compiles filter specifications and runs them against a warehouse.
///
/// Compilation is pure: the same filters, configuration, and limit always
/// produce byte-identical SQL. Execution compiles for the dialect reported
/// by the executor it is given.
///
/// # Examples
///
/// ```
/// use audience_rs_query::assembler::SqlQueryAssembler;
/// use audience_rs_query::filter::{CohortFilters, Filter, Operator};
/// use audience_rs_query::model::{AudienceConfig, AudienceObject, ConfiguredObject, Field, ObjectRole};
///
/// let config = AudienceConfig::new().with_object(
///     ConfiguredObject::new(
///         AudienceObject::new("companies", "companies").with_field(Field::string("country")),
///         "c",
///     )
///     .with_role(ObjectRole::Parent),
/// );
/// let filters = CohortFilters::new()
///     .with_company_filter(Filter::new("country", Operator::Equals, "USA"));
///
/// let sql = SqlQueryAssembler::default().generate_sql(&filters, &config, Some(10)).unwrap();
/// assert_eq!(sql, "SELECT DISTINCT c.country AS c_country FROM companies c WHERE c.country = 'USA' LIMIT 10");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqlQueryAssembler {
    options: CompileOptions,
}

impl SqlQueryAssembler {
    /// Creates an assembler with explicit options.
    pub const fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Creates an assembler from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(CompileOptions::from_settings(settings))
    }

    /// Returns the compile options.
    pub const fn options(&self) -> &CompileOptions {
        &self.options
    }

    fn modes(&self) -> QueryModeAssembler<'_> {
        QueryModeAssembler::new(&self.options)
    }

    fn options_for(&self, executor: &dyn WarehouseExecutor) -> CompileOptions {
        self.options.clone().with_dialect(executor.dialect())
    }

    /// Returns the listing SQL without executing it.
    ///
    /// Values are always rendered as escaped literals so the text is
    /// complete on its own, whatever the configured value mode.
    pub fn generate_sql(
        &self,
        filters: &CohortFilters,
        config: &AudienceConfig,
        limit: Option<usize>,
    ) -> AudienceResult<String> {
        let options = self.options.clone().with_value_mode(ValueMode::Inline);
        Ok(QueryModeAssembler::new(&options).listing(config, filters, limit)?.sql)
    }

    /// Compiles the listing query.
    pub fn compile_listing(
        &self,
        filters: &CohortFilters,
        config: &AudienceConfig,
        limit: Option<usize>,
    ) -> AudienceResult<CompiledQuery> {
        self.modes().listing(config, filters, limit)
    }

    /// Compiles the count query.
    pub fn compile_counts(
        &self,
        filters: &CohortFilters,
        config: &AudienceConfig,
    ) -> AudienceResult<CompiledQuery> {
        self.modes().counts(config, filters)
    }

    /// Compiles the preview query pair.
    pub fn compile_previews(
        &self,
        filters: &CohortFilters,
        config: &AudienceConfig,
        limit: Option<usize>,
    ) -> AudienceResult<PreviewQueries> {
        self.modes().previews(config, filters, limit)
    }

    /// Compiles the distinct-value listing of one field.
    pub fn compile_distinct_values(
        &self,
        config: &AudienceConfig,
        alias: &str,
        field: &str,
        limit: usize,
    ) -> AudienceResult<CompiledQuery> {
        self.modes().distinct_values(config, alias, field, limit)
    }

    /// Runs the listing query.
    pub async fn execute(
        &self,
        executor: &dyn WarehouseExecutor,
        ctx: &ExecutionContext,
        filters: &CohortFilters,
        config: &AudienceConfig,
        limit: Option<usize>,
    ) -> AudienceResult<Vec<Row>> {
        let options = self.options_for(executor);
        let query = QueryModeAssembler::new(&options).listing(config, filters, limit)?;
        run_query(executor, ctx, QueryMode::Listing, &query).await
    }

    /// Runs the count query.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if the warehouse returns no row or a count
    /// cell that is not a whole number.
    pub async fn get_counts(
        &self,
        executor: &dyn WarehouseExecutor,
        ctx: &ExecutionContext,
        filters: &CohortFilters,
        config: &AudienceConfig,
    ) -> AudienceResult<AudienceCounts> {
        let options = self.options_for(executor);
        let query = QueryModeAssembler::new(&options).counts(config, filters)?;
        let rows = run_query(executor, ctx, QueryMode::Count, &query).await?;

        let row = rows.first().ok_or_else(|| count_error(&query, "Count query returned no rows"))?;
        let counts = AudienceCounts {
            company_count: count_cell(row, "company_count", &query)?,
            people_count: count_cell(row, "people_count", &query)?,
        };
        tracing::info!(
            company_count = counts.company_count,
            people_count = counts.people_count,
            "Audience counts computed"
        );
        Ok(counts)
    }

    /// Runs the parent and child previews concurrently.
    ///
    /// Both queries must succeed; the first failure aborts the pair. Each
    /// side holds at most the preview cap of rows.
    pub async fn get_preview(
        &self,
        executor: &dyn WarehouseExecutor,
        ctx: &ExecutionContext,
        filters: &CohortFilters,
        config: &AudienceConfig,
        limit: Option<usize>,
    ) -> AudienceResult<AudiencePreview> {
        let options = self.options_for(executor);
        let previews = QueryModeAssembler::new(&options).previews(config, filters, limit)?;

        let (mut company_preview, mut contact_preview) = tokio::try_join!(
            run_query(executor, ctx, QueryMode::CompanyPreview, &previews.company),
            run_query(executor, ctx, QueryMode::ContactPreview, &previews.contact),
        )?;
        company_preview.truncate(previews.limit);
        contact_preview.truncate(previews.limit);

        Ok(AudiencePreview {
            company_preview,
            contact_preview,
        })
    }

    /// Runs the distinct-value listing of one field, skipping NULLs.
    pub async fn get_distinct_values(
        &self,
        executor: &dyn WarehouseExecutor,
        ctx: &ExecutionContext,
        config: &AudienceConfig,
        alias: &str,
        field: &str,
        limit: usize,
    ) -> AudienceResult<Vec<Value>> {
        let options = self.options_for(executor);
        let query = QueryModeAssembler::new(&options).distinct_values(config, alias, field, limit)?;
        let rows = run_query(executor, ctx, QueryMode::DistinctValues, &query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_value("value"))
            .filter(|v| !v.is_null())
            .cloned()
            .collect())
    }
}

fn count_error(query: &CompiledQuery, reason: impl Into<String>) -> AudienceError {
    AudienceError::ExecutionError {
        mode: QueryMode::Count.to_string(),
        sql: query.sql.clone(),
        reason: reason.into(),
    }
}

/// Reads an integer count, accepting whole floats and numeric strings as
/// some warehouses return `COUNT` as `NUMBER` or text.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn count_cell(row: &Row, column: &str, query: &CompiledQuery) -> AudienceResult<i64> {
    let parsed = match row.get_value(column) {
        Some(Value::Int(i)) => Some(*i),
        Some(Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        count_error(
            query,
            format!("Column '{column}' is missing or not a whole number"),
        )
    })
}
