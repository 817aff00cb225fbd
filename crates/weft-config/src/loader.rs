//! Layered configuration loading.
//!
//! Layers apply in call order over the built-in defaults. Files and strings
//! are merged key by key, so a later file only overrides the keys it sets.
//! Environment overrides apply last, in [`ConfigLoader::load`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::{ConfigError, WeftConfig};

/// Builds a [`WeftConfig`] from defaults, files, strings and environment.
///
/// # Example
///
/// ```no_run
/// use weft_config::ConfigLoader;
///
/// # fn main() -> Result<(), weft_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("weft.toml")?
///     .with_env_prefix("WEFT")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    layers: Map<String, Value>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader that starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a TOML or JSON file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, malformed or neither
    /// `.toml` nor `.json`.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        tracing::debug!(path = %path.display(), "loading configuration file");
        self.with_string(&content, format)
    }

    /// Merges a file if it exists.
    ///
    /// # Errors
    ///
    /// Fails like [`ConfigLoader::with_file`] when the file exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Merges configuration text; `format` is `"toml"` or `"json"`.
    ///
    /// ```
    /// use weft_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    ///
    /// # Errors
    ///
    /// Fails on malformed input or an unknown format.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: Value = match format.to_ascii_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        // Shape errors surface here, against the layer that caused them.
        serde_json::from_value::<WeftConfig>(layer.clone())?;
        if let Value::Object(layer) = layer {
            merge(&mut self.layers, layer);
        }
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` environment overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_ascii_uppercase());
        self
    }

    /// Resolves every layer and validates the result.
    ///
    /// # Errors
    ///
    /// Fails on a malformed environment value or a validation failure.
    pub fn load(self) -> Result<WeftConfig, ConfigError> {
        let mut config: WeftConfig = serde_json::from_value(Value::Object(self.layers))?;
        if let Some(prefix) = &self.env_prefix {
            apply_env(&mut config, prefix, env::vars())?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn merge(base: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Applies `PREFIX__SECTION__KEY` variables to `config`.
pub(crate) fn apply_env(
    config: &mut WeftConfig,
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<(), ConfigError> {
    let marker = format!("{prefix}__");
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(&marker) else {
            continue;
        };
        let parts: Vec<&str> = path.split("__").collect();
        apply_env_var(config, &parts, &key, &value)?;
    }
    Ok(())
}

fn apply_env_var(
    config: &mut WeftConfig,
    parts: &[&str],
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match parts {
        ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
        ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
            config.server.shutdown_timeout_secs = parse_number(key, value)?;
        }
        ["SERVER", "REQUEST_TIMEOUT_MS"] => {
            config.server.request_timeout_ms = if value.is_empty() || value.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_number(key, value)?)
            };
        }
        ["SERVER", "KEEP_ALIVE"] => config.server.keep_alive = parse_flag(key, value)?,
        ["SERVER", "BODY_LIMIT_BYTES"] => {
            config.server.body_limit_bytes = parse_number(key, value)?;
        }

        ["LOGGING", "ENABLED"] => config.logging.enabled = parse_flag(key, value)?,
        ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
        ["LOGGING", "JSON_FORMAT"] => config.logging.json_format = parse_flag(key, value)?,
        ["LOGGING", "SERVICE_NAME"] => config.logging.service_name = value.to_string(),

        ["STATIC_FILES", "ROOT"] => config.static_files.root = non_empty(value).map(PathBuf::from),
        ["STATIC_FILES", "INDEX_FILE"] => config.static_files.index_file = non_empty(value),
        ["STATIC_FILES", "SPA_FILE"] => config.static_files.spa_file = non_empty(value),
        ["STATIC_FILES", "SHOW_HIDDEN"] => {
            config.static_files.show_hidden = parse_flag(key, value)?;
        }

        _ => tracing::warn!(var = key, "ignoring unknown configuration variable"),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected a non-negative integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_load() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, WeftConfig::default());
    }

    #[test]
    fn test_layers_merge_key_by_key() {
        let config = ConfigLoader::new()
            .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"\nkeep_alive = false", "toml")
            .unwrap()
            .with_string(r#"{"server": {"http_addr": "127.0.0.1:4000"}}"#, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:4000");
        assert!(!config.server.keep_alive);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = ConfigLoader::new().with_string("[server]\nport = 80", "toml");
        assert!(matches!(result, Err(ConfigError::JsonError(_))));

        let result = ConfigLoader::new().with_string("[metrics]\nenabled = true", "toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_and_unsupported_input() {
        assert!(matches!(
            ConfigLoader::new().with_string("[server", "toml"),
            Err(ConfigError::TomlError(_))
        ));
        assert!(matches!(
            ConfigLoader::new().with_string("server: {}", "yaml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WeftConfig::default();
        apply_env(
            &mut config,
            "WEFT",
            vars(&[
                ("WEFT__SERVER__HTTP_ADDR", "127.0.0.1:9000"),
                ("WEFT__SERVER__REQUEST_TIMEOUT_MS", "1500"),
                ("WEFT__LOGGING__JSON_FORMAT", "yes"),
                ("WEFT__STATIC_FILES__SPA_FILE", "index.html"),
                ("WEFT__STATIC_FILES__INDEX_FILE", ""),
                ("OTHER__SERVER__HTTP_ADDR", "10.0.0.1:1"),
                ("WEFT__UNKNOWN__KEY", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(config.server.request_timeout_ms, Some(1500));
        assert!(config.logging.json_format);
        assert_eq!(config.static_files.spa_file.as_deref(), Some("index.html"));
        assert_eq!(config.static_files.index_file, None);
    }

    #[test]
    fn test_env_parse_errors() {
        let mut config = WeftConfig::default();
        let err = apply_env(
            &mut config,
            "WEFT",
            vars(&[("WEFT__SERVER__KEEP_ALIVE", "maybe")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { var, .. } if var == "WEFT__SERVER__KEEP_ALIVE"));

        let err = apply_env(
            &mut config,
            "WEFT",
            vars(&[("WEFT__SERVER__SHUTDOWN_TIMEOUT_SECS", "-1")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
