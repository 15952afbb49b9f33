//! Future that drives one traced invocation to completion.

use crate::span::{InvocationSpan, ResponseStatus};
use lambda_telemetry::TelemetryProvider;
use opentelemetry::KeyValue;
use opentelemetry::trace::Status;
use opentelemetry_semantic_conventions::attribute::{
    EXCEPTION_MESSAGE, EXCEPTION_TYPE, HTTP_RESPONSE_STATUS_CODE,
};
use pin_project::pin_project;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

type FlushFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Future returned by [`TracedHandlerService`](crate::TracedHandlerService).
///
/// It polls the handler, records the outcome on the invocation span, ends the
/// span and then waits for the provider flush. The handler's result is only
/// released once the flush has completed or timed out, because the execution
/// environment may be frozen as soon as the runtime sees a response.
///
/// A panic raised while polling the handler is caught, recorded and flushed
/// like any other outcome, then resumed.
#[pin_project]
pub struct TracedHandlerFuture<F, T, E> {
    #[pin]
    inner: F,
    span: InvocationSpan,
    provider: TelemetryProvider,
    phase: Phase<T, E>,
}

enum Phase<T, E> {
    SpanActive,
    Flushing {
        outcome: Outcome<T, E>,
        flush: FlushFuture,
    },
    Done,
}

enum Outcome<T, E> {
    Completed(Result<T, E>),
    Panicked(Box<dyn Any + Send>),
}

impl<F, T, E> TracedHandlerFuture<F, T, E> {
    pub(crate) fn new(inner: F, span: InvocationSpan, provider: TelemetryProvider) -> Self {
        Self {
            inner,
            span,
            provider,
            phase: Phase::SpanActive,
        }
    }
}

impl<F, T, E> Future for TracedHandlerFuture<F, T, E>
where
    F: Future<Output = Result<T, E>>,
    T: ResponseStatus,
    E: Display,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if matches!(this.phase, Phase::SpanActive) {
            let inner = this.inner;
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
                Ok(Poll::Pending) => return Poll::Pending,
                Ok(Poll::Ready(result)) => {
                    record_result(this.span, &result);
                    Outcome::Completed(result)
                }
                Err(payload) => {
                    record_panic(this.span, payload.as_ref());
                    Outcome::Panicked(payload)
                }
            };

            // Only ended spans are handed to the processor, so this must
            // happen before the flush starts.
            this.span.end();

            let provider = this.provider.clone();
            *this.phase = Phase::Flushing {
                outcome,
                flush: Box::pin(async move { provider.flush().await }),
            };
        }

        match this.phase {
            Phase::Flushing { flush, .. } => ready!(flush.as_mut().poll(cx)),
            Phase::SpanActive => unreachable!("span phase always advances to flushing"),
            Phase::Done => panic!("TracedHandlerFuture polled after completion"),
        }

        match mem::replace(this.phase, Phase::Done) {
            Phase::Flushing {
                outcome: Outcome::Completed(result),
                ..
            } => Poll::Ready(result),
            Phase::Flushing {
                outcome: Outcome::Panicked(payload),
                ..
            } => panic::resume_unwind(payload),
            Phase::SpanActive | Phase::Done => unreachable!("flush completed outside flushing"),
        }
    }
}

fn record_result<T, E>(span: &InvocationSpan, result: &Result<T, E>)
where
    T: ResponseStatus,
    E: Display,
{
    match result {
        Ok(response) => {
            let status_code = response.status_code();
            if let Some(code) = status_code {
                span.set_attribute(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, i64::from(code)));
            }

            if span.has_explicit_status() {
                return;
            }

            match status_code {
                Some(code) if code >= 500 => {
                    span.set_derived_status(Status::error(format!("HTTP {code} response")));
                }
                _ => span.set_derived_status(Status::Ok),
            }
        }
        Err(err) => {
            let message = err.to_string();
            tracing::debug!(target: "otel_lifecycle", error = %message, "Handler returned an error");
            span.add_event(
                "exception",
                vec![KeyValue::new(EXCEPTION_MESSAGE, message.clone())],
            );
            span.set_derived_status(Status::error(message));
        }
    }
}

fn record_panic(span: &InvocationSpan, payload: &(dyn Any + Send)) {
    let message = panic_message(payload);
    tracing::warn!(target: "otel_lifecycle", panic = %message, "Handler panicked");
    span.add_event(
        "exception",
        vec![
            KeyValue::new(EXCEPTION_TYPE, "panic"),
            KeyValue::new(EXCEPTION_MESSAGE, message.clone()),
        ],
    );
    span.set_derived_status(Status::error(message));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
