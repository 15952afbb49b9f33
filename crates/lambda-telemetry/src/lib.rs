//! Process-wide OpenTelemetry tracer provider for AWS Lambda functions.
//!
//! A Lambda execution environment is started once (cold start), serves any
//! number of invocations, and may be frozen the moment a response is
//! returned. This crate owns the span pipeline for that environment:
//!
//! - **One pipeline per process** - [`init_telemetry`] is idempotent and
//!   returns the existing provider on every call after the first
//! - **Layered configuration** - defaults, an optional TOML file and
//!   environment variables via [figment](https://docs.rs/figment)
//! - **Pluggable export** - stdout, OTLP over HTTP or gRPC, or any custom
//!   [`SpanExporter`](opentelemetry_sdk::trace::SpanExporter), always behind a
//!   batch processor with configurable queue capacity, delay and batch size
//! - **Safe flushing** - [`TelemetryProvider::flush`] blocks until buffered
//!   spans are exported and never fails; errors are logged instead
//!
//! # Example
//!
//! ```no_run
//! use lambda_telemetry::{TelemetryConfig, TelemetryError, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), TelemetryError> {
//!     let (_tracer, provider) = init_telemetry("my-function", TelemetryConfig::load()?)?;
//!
//!     // ... handle an invocation ...
//!
//!     provider.flush().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod provider;
mod resource;

pub use config::{
    BatchConfig, ExporterKind, OtlpConfig, Protocol, TelemetryConfig, TelemetryConfigBuilder,
};
pub use error::TelemetryError;
pub use provider::{TelemetryProvider, TelemetryProviderBuilder, init_telemetry};
pub use resource::{LambdaResourceDetector, lambda_resource};

// Re-export figment for callers layering their own configuration
pub use figment;
