//! Tower Service implementation for traced invocations.

use crate::cold_start::check_cold_start;
use crate::extractor::TriggerExtractor;
use crate::future::TracedHandlerFuture;
use crate::span::{InvocationSpan, ResponseStatus, TracedInvocation};
use lambda_runtime::LambdaEvent;
use lambda_telemetry::TelemetryProvider;
use opentelemetry::KeyValue;
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer};
use opentelemetry_sdk::trace::SdkTracer;
use opentelemetry_semantic_conventions::attribute::{
    CLOUD_ACCOUNT_ID, CLOUD_PROVIDER, CLOUD_REGION, FAAS_COLDSTART, FAAS_INVOCATION_ID,
    FAAS_MAX_MEMORY, FAAS_NAME, FAAS_TRIGGER, FAAS_VERSION,
};
use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Tower service that wraps each invocation of an inner service in a root
/// span.
///
/// The inner service receives a [`TracedInvocation`] and the outer service
/// accepts the runtime's [`LambdaEvent`], so a wrapped handler plugs straight
/// into `lambda_runtime::Runtime`.
#[derive(Clone)]
pub struct TracedHandlerService<S, E> {
    inner: S,
    extractor: E,
    provider: TelemetryProvider,
    tracer: SdkTracer,
    span_name: Option<Cow<'static, str>>,
    attributes: Arc<[KeyValue]>,
}

impl<S, E> TracedHandlerService<S, E> {
    pub(crate) fn new(
        inner: S,
        extractor: E,
        provider: TelemetryProvider,
        span_name: Option<Cow<'static, str>>,
        attributes: Arc<[KeyValue]>,
    ) -> Self {
        let tracer = provider.tracer();
        Self {
            inner,
            extractor,
            provider,
            tracer,
            span_name,
            attributes,
        }
    }
}

impl<S, E, T> Service<LambdaEvent<T>> for TracedHandlerService<S, E>
where
    S: Service<TracedInvocation<T>>,
    S::Response: ResponseStatus,
    S::Error: Display,
    E: TriggerExtractor<T>,
    T: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TracedHandlerFuture<S::Future, S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<T>) -> Self::Future {
        let (payload, lambda_ctx) = event.into_parts();

        let parent = self.extractor.extract_context(&payload);
        let is_cold_start = check_cold_start();

        let span_name: Cow<'static, str> = match &self.span_name {
            Some(name) => name.clone(),
            None => self.extractor.span_name(&payload, &lambda_ctx).into(),
        };

        let mut attributes = vec![
            KeyValue::new(FAAS_TRIGGER, self.extractor.trigger_type()),
            KeyValue::new(FAAS_INVOCATION_ID, lambda_ctx.request_id.clone()),
            KeyValue::new(FAAS_COLDSTART, is_cold_start),
        ];
        lambda_context_attributes(&lambda_ctx, &mut attributes);
        self.extractor.record_attributes(&payload, &mut attributes);

        attributes.retain(|kv| !self.attributes.iter().any(|fixed| fixed.key == kv.key));
        attributes.extend(self.attributes.iter().cloned());

        let span = self
            .tracer
            .span_builder(span_name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &parent);
        let span = InvocationSpan::new(parent.with_span(span));

        tracing::debug!(
            target: "otel_lifecycle",
            request_id = %lambda_ctx.request_id,
            cold_start = is_cold_start,
            "Invocation span started"
        );

        let invocation = TracedInvocation {
            payload,
            context: lambda_ctx,
            span: span.clone(),
        };

        TracedHandlerFuture::new(self.inner.call(invocation), span, self.provider.clone())
    }
}

/// Appends attributes describing the function from the Lambda context.
///
/// Empty values are skipped; they appear when running outside Lambda.
fn lambda_context_attributes(ctx: &lambda_runtime::Context, attributes: &mut Vec<KeyValue>) {
    attributes.push(KeyValue::new(CLOUD_PROVIDER, "aws"));

    let config = &ctx.env_config;
    if !config.function_name.is_empty() {
        attributes.push(KeyValue::new(FAAS_NAME, config.function_name.clone()));
    }
    if !config.version.is_empty() {
        attributes.push(KeyValue::new(FAAS_VERSION, config.version.clone()));
    }
    if config.memory > 0 {
        attributes.push(KeyValue::new(
            FAAS_MAX_MEMORY,
            i64::from(config.memory) * 1024 * 1024,
        ));
    }

    if let Ok(region) = std::env::var("AWS_REGION") {
        attributes.push(KeyValue::new(CLOUD_REGION, region));
    }

    let arn = &ctx.invoked_function_arn;
    if !arn.is_empty() {
        attributes.push(KeyValue::new("aws.lambda.invoked_arn", arn.clone()));

        // arn:aws:lambda:{region}:{account}:function:{name}
        if let Some(account_id) = arn.split(':').nth(4).filter(|id| !id.is_empty()) {
            attributes.push(KeyValue::new(CLOUD_ACCOUNT_ID, account_id.to_string()));
        }
    }
}
