//! Trigger-specific behaviour for the invocation span.

use lambda_runtime::Context as LambdaContext;
use opentelemetry::{Context, KeyValue};

/// Span name used when neither the layer nor the Lambda context supplies one.
pub const FALLBACK_SPAN_NAME: &str = "lambda-handler";

/// Describes how an event type maps onto the invocation span.
///
/// An extractor decides the parent context, the `faas.trigger` value, the
/// default span name and any event-specific attributes.
///
/// # Example
///
/// ```
/// use lambda_runtime::Context as LambdaContext;
/// use lambda_traced_handler::TriggerExtractor;
/// use opentelemetry::KeyValue;
///
/// #[derive(Clone)]
/// struct OrderExtractor;
///
/// struct OrderEvent {
///     order_id: String,
/// }
///
/// impl TriggerExtractor<OrderEvent> for OrderExtractor {
///     fn trigger_type(&self) -> &'static str {
///         "datasource"
///     }
///
///     fn record_attributes(&self, event: &OrderEvent, attributes: &mut Vec<KeyValue>) {
///         attributes.push(KeyValue::new("order.id", event.order_id.clone()));
///     }
/// }
/// ```
pub trait TriggerExtractor<T>: Clone + Send + Sync + 'static {
    /// Parent context for the invocation span.
    ///
    /// Defaults to an empty context, which makes the invocation span a trace
    /// root.
    fn extract_context(&self, _payload: &T) -> Context {
        Context::new()
    }

    /// Value for the `faas.trigger` attribute: `http`, `pubsub`,
    /// `datasource`, `timer` or `other`.
    fn trigger_type(&self) -> &'static str;

    /// Span name used when the layer is not given an explicit one.
    ///
    /// Defaults to the function name, or `lambda-handler` if that is empty.
    fn span_name(&self, _payload: &T, lambda_ctx: &LambdaContext) -> String {
        let function_name = &lambda_ctx.env_config.function_name;
        if function_name.is_empty() {
            FALLBACK_SPAN_NAME.to_string()
        } else {
            function_name.clone()
        }
    }

    /// Appends event-specific attributes for the span.
    fn record_attributes(&self, _payload: &T, _attributes: &mut Vec<KeyValue>) {}
}

/// Extractor for any payload type, reporting `faas.trigger = other`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultExtractor;

impl DefaultExtractor {
    /// Creates a new default extractor.
    pub fn new() -> Self {
        Self
    }
}

impl<T> TriggerExtractor<T> for DefaultExtractor {
    fn trigger_type(&self) -> &'static str {
        "other"
    }
}
