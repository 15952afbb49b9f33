//! Function configuration.
//!
//! Loaded once at cold start from, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (default `/var/task/quotes-function.toml`)
//! 3. The `TARGET_URL`, `QUOTES_URL` and `HTTP_TIMEOUT_MS` environment
//!    variables
//!
//! A missing `TARGET_URL` does not fail loading. It is reported per
//! invocation by [`FunctionConfig::target_url`], before any network call.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/var/task/quotes-function.toml";

/// Default quote source.
pub const DEFAULT_QUOTES_URL: &str = "https://dummyjson.com/quotes/random";

const ENV_KEYS: [&str; 3] = ["TARGET_URL", "QUOTES_URL", "HTTP_TIMEOUT_MS"];

/// Configuration for the quote forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    /// Sink that receives each fetched quote.
    pub target_url: Option<String>,

    /// Source of random quotes.
    pub quotes_url: String,

    /// Timeout applied to each outbound request, in milliseconds.
    pub http_timeout_ms: u64,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            quotes_url: DEFAULT_QUOTES_URL.to_string(),
            http_timeout_ms: 10_000,
        }
    }
}

impl FunctionConfig {
    /// Loads configuration from the default file location and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from a specific file path and the environment.
    ///
    /// A missing file is not an error.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(FunctionConfig::default()));

        if config_path.as_ref().exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(Env::raw().only(&ENV_KEYS));

        Ok(figment.extract()?)
    }

    /// Creates a configuration with the given sink and defaults elsewhere.
    pub fn with_target(target_url: impl Into<String>) -> Self {
        Self {
            target_url: Some(target_url.into()),
            ..Self::default()
        }
    }

    /// Returns the sink URL, or an error if none is configured.
    ///
    /// An empty value counts as unset.
    pub fn target_url(&self) -> Result<&str, ConfigError> {
        self.target_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingTargetUrl)
    }

    /// Timeout applied to each outbound request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn without_function_env<R>(f: impl FnOnce() -> R) -> R {
        let unset: Vec<(&str, Option<&str>)> = ENV_KEYS.iter().map(|k| (*k, None)).collect();
        temp_env::with_vars(unset, f)
    }

    #[test]
    fn test_defaults() {
        let config = FunctionConfig::default();

        assert_eq!(config.target_url, None);
        assert_eq!(config.quotes_url, DEFAULT_QUOTES_URL);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_target_url() {
        let config = FunctionConfig::default();
        assert!(matches!(
            config.target_url(),
            Err(ConfigError::MissingTargetUrl)
        ));

        let blank = FunctionConfig::with_target("  ");
        assert!(matches!(
            blank.target_url(),
            Err(ConfigError::MissingTargetUrl)
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        temp_env::with_vars(
            [
                ("TARGET_URL", Some("https://sink.example.com/quotes")),
                ("QUOTES_URL", Some("http://localhost:9000/random")),
                ("HTTP_TIMEOUT_MS", Some("2500")),
            ],
            || {
                let config =
                    FunctionConfig::load_from_path("/nonexistent/quotes-function.toml").unwrap();

                assert_eq!(
                    config.target_url().unwrap(),
                    "https://sink.example.com/quotes"
                );
                assert_eq!(config.quotes_url, "http://localhost:9000/random");
                assert_eq!(config.http_timeout(), Duration::from_millis(2500));
            },
        );
    }

    #[test]
    #[serial]
    fn test_load_without_env_uses_defaults() {
        let config = without_function_env(|| {
            FunctionConfig::load_from_path("/nonexistent/quotes-function.toml")
        })
        .unwrap();

        assert_eq!(config, FunctionConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        let toml_content = r#"
target_url = "https://file-sink.example.com"
quotes_url = "https://file-quotes.example.com"
http_timeout_ms = 1000
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = without_function_env(|| {
            temp_env::with_var("TARGET_URL", Some("https://env-sink.example.com"), || {
                FunctionConfig::load_from_path(temp_file.path())
            })
        })
        .unwrap();

        assert_eq!(config.target_url().unwrap(), "https://env-sink.example.com");
        assert_eq!(config.quotes_url, "https://file-quotes.example.com");
        assert_eq!(config.http_timeout_ms, 1000);
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_is_a_load_error() {
        let result = temp_env::with_var("HTTP_TIMEOUT_MS", Some("soon"), || {
            FunctionConfig::load_from_path("/nonexistent/quotes-function.toml")
        });

        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
