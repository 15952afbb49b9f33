//! Tower Layer implementation for traced invocations.

use crate::extractor::DefaultExtractor;
use crate::service::TracedHandlerService;
use lambda_telemetry::TelemetryProvider;
use opentelemetry::{Key, KeyValue, Value};
use std::borrow::Cow;
use std::sync::Arc;
use tower::Layer;

/// Tower layer that runs each Lambda invocation inside a root span.
///
/// For every invocation the wrapped service:
/// - Starts a `Server` span with trigger, cold start and Lambda attributes
/// - Hands the span to the inner service inside a [`TracedInvocation`]
/// - Mirrors the outcome onto the span and ends it
/// - Flushes the provider before the result is returned to the runtime
///
/// [`TracedInvocation`]: crate::TracedInvocation
///
/// # Example
///
/// ```no_run
/// use lambda_telemetry::{TelemetryConfig, init_telemetry};
/// use lambda_traced_handler::TracedHandlerLayer;
///
/// # fn main() -> Result<(), lambda_telemetry::TelemetryError> {
/// let (_tracer, provider) = init_telemetry("my-function", TelemetryConfig::load()?)?;
///
/// let layer = TracedHandlerLayer::builder(provider)
///     .span_name("lambda-handler")
///     .attribute("faas.trigger", "timer")
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TracedHandlerLayer<E = DefaultExtractor> {
    provider: TelemetryProvider,
    extractor: E,
    span_name: Option<Cow<'static, str>>,
    attributes: Arc<[KeyValue]>,
}

impl TracedHandlerLayer<DefaultExtractor> {
    /// Creates a layer with the default extractor, no fixed span name and no
    /// extra attributes.
    pub fn new(provider: TelemetryProvider) -> Self {
        Self::builder(provider).build()
    }

    /// Creates a builder for more detailed configuration.
    pub fn builder(provider: TelemetryProvider) -> TracedHandlerLayerBuilder<DefaultExtractor> {
        TracedHandlerLayerBuilder {
            provider,
            extractor: DefaultExtractor,
            span_name: None,
            attributes: Vec::new(),
        }
    }
}

impl<S, E> Layer<S> for TracedHandlerLayer<E>
where
    E: Clone,
{
    type Service = TracedHandlerService<S, E>;

    fn layer(&self, inner: S) -> Self::Service {
        TracedHandlerService::new(
            inner,
            self.extractor.clone(),
            self.provider.clone(),
            self.span_name.clone(),
            Arc::clone(&self.attributes),
        )
    }
}

/// Builder for a [`TracedHandlerLayer`].
#[must_use = "builders do nothing unless .build() is called"]
pub struct TracedHandlerLayerBuilder<E> {
    provider: TelemetryProvider,
    extractor: E,
    span_name: Option<Cow<'static, str>>,
    attributes: Vec<KeyValue>,
}

impl<E> TracedHandlerLayerBuilder<E> {
    /// Uses a fixed name for every invocation span instead of the
    /// extractor's.
    pub fn span_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.span_name = Some(name.into());
        self
    }

    /// Adds a static attribute to every invocation span.
    ///
    /// Configured attributes are applied last and replace any attribute with
    /// the same key set by the middleware or the extractor.
    pub fn attribute(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    /// Replaces the trigger extractor.
    pub fn extractor<E2>(self, extractor: E2) -> TracedHandlerLayerBuilder<E2> {
        TracedHandlerLayerBuilder {
            provider: self.provider,
            extractor,
            span_name: self.span_name,
            attributes: self.attributes,
        }
    }

    /// Builds the configured layer.
    pub fn build(self) -> TracedHandlerLayer<E> {
        TracedHandlerLayer {
            provider: self.provider,
            extractor: self.extractor,
            span_name: self.span_name,
            attributes: self.attributes.into(),
        }
    }
}
