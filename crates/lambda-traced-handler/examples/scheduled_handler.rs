//! Scheduled Lambda example with a traced invocation span.
//!
//! Wraps an EventBridge scheduled handler in `TracedHandlerLayer`. Every
//! invocation gets a root span with `faas.trigger = timer`, and spans are
//! flushed before the response is handed back to the runtime.
//!
//! # Running
//!
//! ```bash
//! cargo build --example scheduled_handler --release
//! ```

use aws_lambda_events::cloudwatch_events::CloudWatchEvent;
use lambda_runtime::{Error, Runtime};
use lambda_telemetry::{TelemetryConfig, init_telemetry};
use lambda_traced_handler::{ScheduledEventExtractor, TracedHandlerLayer, TracedInvocation};
use opentelemetry::KeyValue;
use tower::{ServiceBuilder, service_fn};

async fn function_handler(invocation: TracedInvocation<CloudWatchEvent>) -> Result<(), Error> {
    let (event, _ctx, span) = invocation.into_parts();

    tracing::info!(rule = ?event.resources.first(), "Running scheduled job");

    span.add_event(
        "Job Completed",
        vec![KeyValue::new("job.resources", event.resources.len() as i64)],
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let (_tracer, provider) = init_telemetry("scheduled-job", TelemetryConfig::load()?)?;

    let layer = TracedHandlerLayer::builder(provider)
        .extractor(ScheduledEventExtractor::new())
        .build();

    let service = ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(function_handler));

    Runtime::new(service).run().await
}
