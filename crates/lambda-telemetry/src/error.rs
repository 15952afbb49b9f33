//! Error types for telemetry setup and lifecycle.

use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::error::OTelSdkError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building, flushing or shutting down the
/// tracer provider.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration could not be loaded.
    #[error("configuration error")]
    Config(#[source] Box<figment::Error>),

    /// The OTLP span exporter could not be built.
    #[error("failed to build span exporter")]
    TraceExporter(#[from] ExporterBuildError),

    /// A span processor reported a flush failure.
    #[error("failed to flush tracer provider")]
    Flush(#[source] OTelSdkError),

    /// The flush did not complete within the configured timeout.
    #[error("flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    /// The blocking flush task panicked or was cancelled.
    #[error("flush task failed")]
    FlushTask(#[from] tokio::task::JoinError),

    /// The tracer provider failed to shut down.
    #[error("failed to shut down tracer provider")]
    Shutdown(#[source] OTelSdkError),
}

impl From<figment::Error> for TelemetryError {
    fn from(err: figment::Error) -> Self {
        TelemetryError::Config(Box::new(err))
    }
}
