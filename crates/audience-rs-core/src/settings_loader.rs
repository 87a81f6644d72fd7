//! Reading [`Settings`] from TOML or JSON and the `AUDIENCE_*` environment.
//!
//! A file only needs the keys it changes: it is deep-merged over the
//! serialized defaults, and environment variables are applied last.
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `AUDIENCE_LOG_LEVEL` | `log_level` |
//! | `AUDIENCE_DEBUG` | `debug` |
//! | `AUDIENCE_WAREHOUSE_DIALECT` | `warehouse.dialect` |
//! | `AUDIENCE_CONNECTION_ID` | `warehouse.connection_id` |
//! | `AUDIENCE_QUERY_TIMEOUT_SECS` | `warehouse.query_timeout_secs` |
//! | `AUDIENCE_PREVIEW_LIMIT` | `compiler.preview_limit` |
//! | `AUDIENCE_STRICT_OPERATORS` | `compiler.strict_operators` |
//! | `AUDIENCE_VALUE_MODE` | `compiler.value_mode` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use audience_rs_core::settings_loader;
//!
//! let settings = settings_loader::from_file_with_env("config/audience.toml").unwrap();
//! assert!(settings.compiler.preview_limit > 0);
//! ```

use std::path::Path;

use crate::error::AudienceError;
use crate::settings::{Settings, ValueMode, WarehouseDialect};

/// Parses TOML settings; absent keys keep their defaults.
///
/// # Errors
///
/// Returns `ConfigurationError` for malformed TOML or mistyped values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, AudienceError> {
    // TOML is converted to JSON and deep-merged over the serialized defaults,
    // so partial tables keep the defaults of their missing keys.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| AudienceError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Reads and parses a TOML settings file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, AudienceError> {
    let content = read_config_file(path.as_ref(), "TOML")?;
    from_toml_str(&content)
}

/// [`from_toml_file`] followed by [`apply_env_overrides`].
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, AudienceError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Parses JSON settings; absent keys keep their defaults.
///
/// # Errors
///
/// Returns `ConfigurationError` for malformed JSON or mistyped values.
pub fn from_json_str(json_str: &str) -> Result<Settings, AudienceError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| AudienceError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Reads and parses a JSON settings file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, AudienceError> {
    let content = read_config_file(path.as_ref(), "JSON")?;
    from_json_str(&content)
}

/// Loads settings from a file, picking the format from its extension
/// (`.json` is JSON, anything else is TOML), then applies env overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, AudienceError> {
    let path = path.as_ref();
    let mut settings = if path.extension().is_some_and(|ext| ext == "json") {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with `AUDIENCE_*` overrides applied.
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `AUDIENCE_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_with(settings, |key| std::env::var(key).ok());
}

/// Applies overrides read through `lookup`, which maps an `AUDIENCE_*`
/// variable name to its value.
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_overrides_with<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("AUDIENCE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("AUDIENCE_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Some(val) = lookup("AUDIENCE_WAREHOUSE_DIALECT") {
        match WarehouseDialect::from_name(&val) {
            Some(dialect) => settings.warehouse.dialect = dialect,
            None => tracing::warn!(value = %val, "ignoring unknown AUDIENCE_WAREHOUSE_DIALECT"),
        }
    }

    if let Some(val) = lookup("AUDIENCE_CONNECTION_ID") {
        settings.warehouse.connection_id = val;
    }

    if let Some(val) = lookup("AUDIENCE_QUERY_TIMEOUT_SECS") {
        match val.trim().parse::<u64>() {
            Ok(secs) => settings.warehouse.query_timeout_secs = secs,
            Err(_) => tracing::warn!(value = %val, "ignoring invalid AUDIENCE_QUERY_TIMEOUT_SECS"),
        }
    }

    if let Some(val) = lookup("AUDIENCE_PREVIEW_LIMIT") {
        match val.trim().parse::<usize>() {
            Ok(limit) => settings.compiler.preview_limit = limit,
            Err(_) => tracing::warn!(value = %val, "ignoring invalid AUDIENCE_PREVIEW_LIMIT"),
        }
    }

    if let Some(val) = lookup("AUDIENCE_STRICT_OPERATORS") {
        settings.compiler.strict_operators = parse_flag(&val);
    }

    if let Some(val) = lookup("AUDIENCE_VALUE_MODE") {
        match val.trim().to_ascii_lowercase().as_str() {
            "bound" => settings.compiler.value_mode = ValueMode::Bound,
            "inline" => settings.compiler.value_mode = ValueMode::Inline,
            _ => tracing::warn!(value = %val, "ignoring invalid AUDIENCE_VALUE_MODE"),
        }
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn read_config_file(path: &Path, format: &str) -> Result<String, AudienceError> {
    std::fs::read_to_string(path).map_err(|e| {
        AudienceError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, AudienceError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        AudienceError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        AudienceError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
