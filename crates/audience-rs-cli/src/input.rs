//! Loading audiences and filters from JSON files.
//!
//! A path of `-` reads from standard input.

use std::io::Read;
use std::path::Path;

use audience_rs_core::AudienceResult;
use audience_rs_query::{AudienceConfig, CohortFilters};

/// Reads a file, or standard input for `-`.
pub fn read_input(path: &str) -> AudienceResult<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(Path::new(path))?)
}

/// Loads and validates an audience configuration.
pub fn load_audience(path: &str) -> AudienceResult<AudienceConfig> {
    let config = AudienceConfig::from_json_str(&read_input(path)?)?;
    tracing::debug!(path, objects = config.objects.len(), "Loaded audience");
    Ok(config)
}

/// Loads a filter specification; no path means no filters.
pub fn load_filters(path: Option<&str>) -> AudienceResult<CohortFilters> {
    path.map_or_else(
        || Ok(CohortFilters::new()),
        |path| CohortFilters::from_json_str(&read_input(path)?),
    )
}
