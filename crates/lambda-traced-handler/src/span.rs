//! The invocation span handed to business code.

use lambda_runtime::Context as LambdaContext;
use opentelemetry::trace::{SpanContext, Status, TraceContextExt};
use opentelemetry::{Context, KeyValue};
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle on the root span of one invocation.
///
/// Cloning is cheap and every clone refers to the same span. Business code
/// can attach attributes and events, set an explicit status, and use
/// [`context`](Self::context) as the parent when starting child spans.
///
/// The span is ended by the middleware once the handler completes; calls made
/// after that point are ignored by the SDK.
#[derive(Clone, Debug)]
pub struct InvocationSpan {
    cx: Context,
    explicit_status: Arc<AtomicBool>,
}

impl InvocationSpan {
    pub(crate) fn new(cx: Context) -> Self {
        Self {
            cx,
            explicit_status: Arc::new(AtomicBool::new(false)),
        }
    }

    /// OpenTelemetry context with this span active, for parenting child spans.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Trace and span identifiers of the invocation span.
    pub fn span_context(&self) -> SpanContext {
        self.cx.span().span_context().clone()
    }

    /// Sets a single attribute on the span.
    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Adds a named event with attributes.
    pub fn add_event(&self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name, attributes);
    }

    /// Records an error as an `exception` event without changing the status.
    pub fn record_error(&self, err: &dyn std::error::Error) {
        self.cx.span().record_error(err);
    }

    /// Sets the span status explicitly.
    ///
    /// An explicit status is never overwritten by the middleware's outcome
    /// mirroring, even when the response signals a server error.
    pub fn set_status(&self, status: Status) {
        self.explicit_status.store(true, Ordering::SeqCst);
        self.cx.span().set_status(status);
    }

    pub(crate) fn has_explicit_status(&self) -> bool {
        self.explicit_status.load(Ordering::SeqCst)
    }

    pub(crate) fn set_derived_status(&self, status: Status) {
        self.cx.span().set_status(status);
    }

    pub(crate) fn end(&self) {
        self.cx.span().end();
    }
}

/// The request seen by a service wrapped in
/// [`TracedHandlerLayer`](crate::TracedHandlerLayer).
///
/// Carries the original event payload and Lambda context alongside the
/// invocation span.
#[derive(Debug)]
pub struct TracedInvocation<T> {
    /// Event payload as delivered by the runtime.
    pub payload: T,
    /// Lambda invocation context.
    pub context: LambdaContext,
    /// Root span for this invocation.
    pub span: InvocationSpan,
}

impl<T> TracedInvocation<T> {
    /// Splits the invocation into payload, Lambda context and span.
    pub fn into_parts(self) -> (T, LambdaContext, InvocationSpan) {
        (self.payload, self.context, self.span)
    }
}

/// Exposes an HTTP-style status code carried by a handler response.
///
/// When a response reports a status code, the middleware records it as
/// `http.response.status_code` and marks the invocation span as an error for
/// codes of 500 and above, unless the handler set a status explicitly.
pub trait ResponseStatus {
    /// Status code of the response, if it has one.
    fn status_code(&self) -> Option<u16>;
}

impl ResponseStatus for () {
    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl ResponseStatus for serde_json::Value {
    /// Reads a numeric `statusCode` field, the shape used by Lambda proxy
    /// integrations.
    fn status_code(&self) -> Option<u16> {
        self.get("statusCode")
            .and_then(serde_json::Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }
}
