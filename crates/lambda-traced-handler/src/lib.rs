//! Tower middleware that traces AWS Lambda invocations.
//!
//! Wrapping a handler in [`TracedHandlerLayer`] gives every invocation a root
//! `Server` span and guarantees that:
//!
//! - the span carries trigger, cold start and Lambda context attributes
//! - the handler's outcome is mirrored onto the span status
//! - the span is ended on every exit path, including panics
//! - the provider is flushed before the result reaches the runtime
//!
//! The last point matters because Lambda may freeze the execution environment
//! as soon as a response is sent; spans still sitting in the batch queue at
//! that moment are lost.
//!
//! # Usage
//!
//! ```no_run
//! use lambda_runtime::{Error, Runtime};
//! use lambda_telemetry::{TelemetryConfig, init_telemetry};
//! use lambda_traced_handler::{TracedHandlerLayer, TracedInvocation};
//! use serde_json::{Value, json};
//! use tower::{ServiceBuilder, service_fn};
//!
//! async fn handler(invocation: TracedInvocation<Value>) -> Result<Value, Error> {
//!     invocation.span.add_event("Work done", vec![]);
//!     Ok(json!({ "statusCode": 200 }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let (_tracer, provider) = init_telemetry("my-function", TelemetryConfig::load()?)?;
//!
//!     let service = ServiceBuilder::new()
//!         .layer(TracedHandlerLayer::new(provider))
//!         .service(service_fn(handler));
//!
//!     Runtime::new(service).run().await
//! }
//! ```
//!
//! # Context passing
//!
//! The invocation span is handed to the handler explicitly through
//! [`TracedInvocation::span`]. Child spans are started against
//! [`InvocationSpan::context`] rather than an ambient current span, so
//! parentage never depends on which task or thread polls the handler.
//!
//! # Features
//!
//! - `scheduled` - [`ScheduledEventExtractor`] for EventBridge scheduled
//!   events (enabled by default)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cold_start;
mod extractor;
mod future;
mod layer;
mod service;
mod span;

pub mod extractors;

pub use cold_start::check_cold_start;
pub use extractor::{DefaultExtractor, FALLBACK_SPAN_NAME, TriggerExtractor};
pub use future::TracedHandlerFuture;
pub use layer::{TracedHandlerLayer, TracedHandlerLayerBuilder};
pub use service::TracedHandlerService;
pub use span::{InvocationSpan, ResponseStatus, TracedInvocation};

#[cfg(feature = "scheduled")]
pub use extractors::scheduled::ScheduledEventExtractor;
