//! Telemetry configuration loading.
//!
//! Configuration is layered with figment. Later sources override earlier ones:
//! 1. Default values (compiled in)
//! 2. Config file: `/var/task/otel-config.toml` (optional)
//! 3. Standard OpenTelemetry environment variables (`OTEL_*`)
//! 4. Crate-specific environment variables (`LAMBDA_OTEL_*`, nested keys
//!    separated by `__`, e.g. `LAMBDA_OTEL_BATCH__MAX_QUEUE_SIZE`)
//!
//! | Variable | Config Path |
//! |----------|-------------|
//! | `OTEL_TRACES_EXPORTER` | `exporter` (`otlp`, `console`/`stdout`, `none`) |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `otlp.endpoint` |
//! | `OTEL_EXPORTER_OTLP_PROTOCOL` | `otlp.protocol` |
//! | `OTEL_EXPORTER_OTLP_HEADERS` | `otlp.headers` |

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "/var/task/otel-config.toml";
const ENV_PREFIX: &str = "LAMBDA_OTEL_";

/// Span exporter implementation.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    /// Writes spans to stdout, to be picked up from the function's log stream.
    #[default]
    Stdout,
    /// Exports spans to an OTLP collector.
    Otlp,
    /// Spans are created but never exported.
    None,
}

/// OTLP transport protocol.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Protocol {
    /// gRPC (port 4317).
    #[serde(rename = "grpc")]
    Grpc,
    /// HTTP with protobuf payloads (port 4318).
    #[default]
    #[serde(rename = "http/protobuf")]
    HttpBinary,
    /// HTTP with JSON payloads (port 4318).
    #[serde(rename = "http/json")]
    HttpJson,
}

/// Top-level telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Which exporter receives finished spans.
    pub exporter: ExporterKind,
    /// OTLP settings, used when `exporter` is [`ExporterKind::Otlp`].
    pub otlp: OtlpConfig,
    /// Batch span processor settings.
    pub batch: BatchConfig,
    /// Upper bound for a single flush, in milliseconds.
    #[serde(with = "duration_ms")]
    pub flush_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            exporter: ExporterKind::Stdout,
            otlp: OtlpConfig::default(),
            batch: BatchConfig::default(),
            flush_timeout: Duration::from_secs(5),
        }
    }
}

impl TelemetryConfig {
    /// Loads configuration from all sources, reading the config file from
    /// `/var/task/otel-config.toml` if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if any source fails to parse.
    #[allow(clippy::result_large_err)]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration using a custom config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if any source fails to parse.
    #[allow(clippy::result_large_err)]
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(TelemetryConfig::default()));

        if config_path.as_ref().exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(standard_otel_env());
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract()
    }

    /// Creates a builder for programmatic configuration.
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }
}

/// OTLP exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtlpConfig {
    /// Collector endpoint. Falls back to the protocol's localhost default.
    pub endpoint: Option<String>,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Export request timeout in milliseconds.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Extra headers (HTTP) or metadata (gRPC) sent with each export.
    pub headers: HashMap<String, String>,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: Protocol::HttpBinary,
            timeout: Duration::from_secs(3),
            headers: HashMap::new(),
        }
    }
}

impl OtlpConfig {
    /// Returns the configured endpoint or the protocol default.
    pub fn effective_endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| match self.protocol {
            Protocol::Grpc => "http://localhost:4317".to_string(),
            Protocol::HttpBinary | Protocol::HttpJson => "http://localhost:4318".to_string(),
        })
    }

    /// Returns the full traces URL for HTTP protocols.
    pub fn traces_endpoint(&self) -> String {
        let base = self.effective_endpoint();
        if base.ends_with("/v1/traces") {
            base
        } else {
            format!("{}/v1/traces", base.trim_end_matches('/'))
        }
    }
}

/// Batch span processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of spans buffered before new spans are dropped.
    pub max_queue_size: usize,
    /// Delay between scheduled exports, in milliseconds.
    #[serde(with = "duration_ms")]
    pub scheduled_delay: Duration,
    /// Maximum number of spans per export call.
    pub max_export_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            scheduled_delay: Duration::from_millis(5000),
            max_export_batch_size: 512,
        }
    }
}

/// Builder for constructing configuration programmatically.
#[must_use = "builders do nothing unless .build() is called"]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    /// Creates a builder seeded with default values.
    pub fn new() -> Self {
        Self {
            config: TelemetryConfig::default(),
        }
    }

    /// Sets the exporter implementation.
    pub fn exporter(mut self, exporter: ExporterKind) -> Self {
        self.config.exporter = exporter;
        self
    }

    /// Sets the OTLP endpoint and switches the exporter to OTLP.
    pub fn otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.exporter = ExporterKind::Otlp;
        self.config.otlp.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the OTLP protocol.
    pub fn otlp_protocol(mut self, protocol: Protocol) -> Self {
        self.config.otlp.protocol = protocol;
        self
    }

    /// Sets the span queue capacity.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.batch.max_queue_size = size;
        self
    }

    /// Sets the scheduled export delay.
    pub fn scheduled_delay(mut self, delay: Duration) -> Self {
        self.config.batch.scheduled_delay = delay;
        self
    }

    /// Sets the maximum export batch size.
    pub fn max_export_batch_size(mut self, size: usize) -> Self {
        self.config.batch.max_export_batch_size = size;
        self
    }

    /// Sets the flush timeout.
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.config.flush_timeout = timeout;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

impl Default for TelemetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Serialize)]
struct PartialOtlpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize)]
struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    exporter: Option<ExporterKind>,
    #[serde(skip_serializing_if = "is_partial_otlp_empty")]
    otlp: PartialOtlpConfig,
}

fn is_partial_otlp_empty(config: &PartialOtlpConfig) -> bool {
    config.endpoint.is_none() && config.protocol.is_none() && config.headers.is_empty()
}

fn standard_otel_env() -> Serialized<PartialConfig> {
    let mut config = PartialConfig::default();

    if let Ok(exporter) = std::env::var("OTEL_TRACES_EXPORTER") {
        config.exporter = match exporter.to_lowercase().as_str() {
            "otlp" => Some(ExporterKind::Otlp),
            "console" | "stdout" => Some(ExporterKind::Stdout),
            "none" => Some(ExporterKind::None),
            _ => None,
        };
    }

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.otlp.endpoint = Some(endpoint);
        // OTEL_TRACES_EXPORTER defaults to otlp when unset.
        if std::env::var_os("OTEL_TRACES_EXPORTER").is_none() {
            config.exporter = Some(ExporterKind::Otlp);
        }
    }

    if let Ok(protocol) = std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL") {
        config.otlp.protocol = match protocol.to_lowercase().as_str() {
            "grpc" => Some(Protocol::Grpc),
            "http/protobuf" | "http" => Some(Protocol::HttpBinary),
            "http/json" => Some(Protocol::HttpJson),
            _ => None,
        };
    }

    if let Ok(headers_str) = std::env::var("OTEL_EXPORTER_OTLP_HEADERS") {
        for pair in headers_str.split(',') {
            if let Some((key, value)) = pair.split_once('=') {
                config
                    .otlp
                    .headers
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }
    }

    Serialized::defaults(config)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
