//! Lambda entry point for the quote forwarder.
//!
//! Environment variables:
//! - `TARGET_URL` - Sink for fetched quotes (required per invocation)
//! - `QUOTES_URL` - Quote source (default: `https://dummyjson.com/quotes/random`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` and `LAMBDA_OTEL_*` - Span export settings
//! - `RUST_LOG` - Log filter (default: `info`)

use anyhow::{Context, Result, anyhow};
use lambda_runtime::Runtime;
use lambda_telemetry::{TelemetryConfig, init_telemetry};
use quotes_function::{FunctionConfig, QuoteClient, SERVICE_NAME, create_service};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("failed to initialise tracing subscriber")?;

    let function_config = FunctionConfig::load().context("failed to load function configuration")?;
    if function_config.target_url().is_err() {
        tracing::warn!("TARGET_URL is not set; invocations will fail until it is configured");
    }

    let telemetry_config =
        TelemetryConfig::load().context("failed to load telemetry configuration")?;
    tracing::debug!(?telemetry_config, "Telemetry configuration loaded");

    let (tracer, provider) =
        init_telemetry(SERVICE_NAME, telemetry_config).context("failed to initialise telemetry")?;

    let client =
        QuoteClient::new(tracer, function_config).context("failed to build HTTP client")?;

    // Runtime::new rather than lambda_runtime::run: run() adds its own
    // invocation span, which would still be open when our flush happens.
    let result = Runtime::new(create_service(provider.clone(), client))
        .run()
        .await
        .map_err(|err| anyhow!(err).context("lambda runtime failed"));

    if let Err(err) = provider.shutdown() {
        tracing::warn!(target: "otel_lifecycle", error = %err, "Failed to shut down tracer provider");
    }

    result
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).without_time())
        .with(filter)
        .try_init()
        .context("failed to initialise tracing registry")?;

    Ok(())
}
