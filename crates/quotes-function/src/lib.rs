//! Scheduled Lambda function that forwards a random quote to a sink.
//!
//! On each invocation the function fetches a quote, validates its shape,
//! posts it to the configured sink and returns a structured
//! [`InvocationResponse`]. The invocation runs inside a root span from
//! `lambda-traced-handler`; each outbound call gets its own `Client` child
//! span, and spans are flushed before the response is returned.
//!
//! ## Configuration
//!
//! | Variable          | Default                               |
//! |-------------------|---------------------------------------|
//! | `TARGET_URL`      | required, checked per invocation      |
//! | `QUOTES_URL`      | `https://dummyjson.com/quotes/random` |
//! | `HTTP_TIMEOUT_MS` | `10000`                               |
//!
//! Telemetry export is configured separately, see
//! [`lambda_telemetry::TelemetryConfig`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod handler;
mod quote;

pub use client::{FETCH_SPAN_NAME, QuoteClient, SAVE_SPAN_NAME};
pub use config::{DEFAULT_CONFIG_PATH, DEFAULT_QUOTES_URL, FunctionConfig};
pub use error::{ConfigError, QuoteError};
pub use handler::{
    InvocationResponse, QUOTE_FETCHED_EVENT, QUOTE_SAVED_EVENT, process_quote,
};
pub use quote::{Quote, ValidationError};

use lambda_runtime::LambdaEvent;
use lambda_telemetry::TelemetryProvider;
use lambda_traced_handler::{TracedHandlerLayer, TracedInvocation};
use opentelemetry_semantic_conventions::attribute::FAAS_TRIGGER;
use serde_json::Value;
use tower::ServiceBuilder;

/// Service name reported in the telemetry resource.
pub const SERVICE_NAME: &str = "quotes-function";

/// Name of the invocation span.
pub const HANDLER_SPAN_NAME: &str = "lambda-handler";

/// Builds the traced service run by the Lambda runtime.
///
/// The payload is accepted as raw JSON: the function is driven by a schedule
/// and ignores the event body.
///
/// # Example
///
/// ```no_run
/// use lambda_telemetry::{TelemetryConfig, init_telemetry};
/// use quotes_function::{FunctionConfig, QuoteClient, SERVICE_NAME, create_service};
///
/// # async fn run() -> Result<(), lambda_runtime::Error> {
/// let (tracer, provider) = init_telemetry(SERVICE_NAME, TelemetryConfig::load()?)?;
/// let client = QuoteClient::new(tracer, FunctionConfig::load()?)?;
/// lambda_runtime::Runtime::new(create_service(provider, client)).run().await
/// # }
/// ```
pub fn create_service(
    provider: TelemetryProvider,
    client: QuoteClient,
) -> impl tower::Service<
    LambdaEvent<Value>,
    Response = InvocationResponse,
    Error = lambda_runtime::Error,
    Future = impl std::future::Future<Output = Result<InvocationResponse, lambda_runtime::Error>>
                 + Send,
> + Clone {
    let layer = TracedHandlerLayer::builder(provider)
        .span_name(HANDLER_SPAN_NAME)
        .attribute(FAAS_TRIGGER, "timer")
        .build();

    ServiceBuilder::new()
        .layer(layer)
        .service_fn(move |invocation: TracedInvocation<Value>| {
            let client = client.clone();
            async move {
                let response = process_quote(&client, &invocation.span).await;
                Ok::<_, lambda_runtime::Error>(response)
            }
        })
}
