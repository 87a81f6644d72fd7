//! Logging integration for audience-rs.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-query spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "audience_rs_query=trace"). In debug mode a pretty, human-readable format
/// is used; otherwise a structured JSON format is used. Installing a second
/// subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one warehouse query.
///
/// Every event emitted while the query runs carries the query mode, the
/// connection it was sent to, and the tenant when one is known.
///
/// # Examples
///
/// ```
/// use audience_rs_core::logging::query_span;
///
/// let span = query_span("count", "warehouse-eu", Some("acme"));
/// let _guard = span.enter();
/// tracing::info!("running count query");
/// ```
pub fn query_span(mode: &str, connection_id: &str, tenant_id: Option<&str>) -> tracing::Span {
    let span = tracing::info_span!(
        "warehouse_query",
        mode = mode,
        connection = connection_id,
        tenant = tracing::field::Empty
    );
    if let Some(tenant) = tenant_id {
        span.record("tenant", tenant);
    }
    span
}
