//! Tracer provider lifecycle management.
//!
//! A [`TelemetryProvider`] owns the span pipeline (processor + exporter) for
//! the lifetime of the execution environment. The environment may serve many
//! invocations, so the provider is built once and reused; [`init_telemetry`]
//! stores it process-wide and hands the same instance back on every later
//! call.

use crate::config::{BatchConfig, ExporterKind, OtlpConfig, Protocol, TelemetryConfig};
use crate::error::TelemetryError;
use crate::resource::lambda_resource;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig, WithTonicConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracer, SdkTracerProvider, SpanExporter,
    SpanProcessor, TracerProviderBuilder,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};

static GLOBAL_PROVIDER: Mutex<Option<TelemetryProvider>> = parking_lot::const_mutex(None);

/// Initialises the process-wide tracer provider.
///
/// The first call builds the provider from `config`, installs it as the
/// OpenTelemetry global tracer provider and returns it together with a tracer
/// scoped to `service_name`. Every later call returns the already-initialised
/// instance and ignores its arguments, so two competing exporter pipelines
/// can never exist in one process.
///
/// Call this during cold start, outside the handler.
///
/// # Errors
///
/// Returns an error if the configured exporter cannot be built.
///
/// # Example
///
/// ```no_run
/// use lambda_telemetry::{TelemetryConfig, init_telemetry};
///
/// # fn main() -> Result<(), lambda_telemetry::TelemetryError> {
/// let (tracer, provider) = init_telemetry("quotes-function", TelemetryConfig::load()?)?;
/// # Ok(())
/// # }
/// ```
pub fn init_telemetry(
    service_name: &str,
    config: TelemetryConfig,
) -> Result<(SdkTracer, TelemetryProvider), TelemetryError> {
    let mut slot = GLOBAL_PROVIDER.lock();

    if let Some(existing) = slot.as_ref() {
        tracing::debug!(
            target: "otel_lifecycle",
            service_name = %existing.service_name(),
            "Telemetry already initialised, reusing existing provider"
        );
        return Ok((existing.tracer(), existing.clone()));
    }

    let provider = TelemetryProvider::builder(service_name)
        .config(config)
        .build()?;

    opentelemetry::global::set_tracer_provider(provider.sdk_provider().clone());
    *slot = Some(provider.clone());

    tracing::debug!(
        target: "otel_lifecycle",
        service_name = %service_name,
        "Telemetry initialised"
    );

    Ok((provider.tracer(), provider))
}

/// Handle to a configured tracer provider.
///
/// Cheap to clone; all clones share one span pipeline.
#[derive(Clone, Debug)]
pub struct TelemetryProvider {
    inner: Arc<ProviderInner>,
}

#[derive(Debug)]
struct ProviderInner {
    service_name: String,
    sdk: SdkTracerProvider,
    flush_timeout: Duration,
}

impl TelemetryProvider {
    /// Creates a builder for a standalone provider that is not registered
    /// process-wide.
    pub fn builder(service_name: impl Into<String>) -> TelemetryProviderBuilder {
        TelemetryProviderBuilder::new(service_name)
    }

    /// Returns a tracer whose instrumentation scope is the service name.
    pub fn tracer(&self) -> SdkTracer {
        self.inner.sdk.tracer(self.inner.service_name.clone())
    }

    /// Returns the service name this provider was built for.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Returns the underlying SDK provider.
    pub fn sdk_provider(&self) -> &SdkTracerProvider {
        &self.inner.sdk
    }

    /// Returns `true` if both handles share the same pipeline.
    pub fn ptr_eq(&self, other: &TelemetryProvider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Forces all buffered spans to be exported.
    ///
    /// Must be awaited before an invocation returns: the host may freeze the
    /// process as soon as the response is produced. Failures and timeouts are
    /// logged with target `otel_lifecycle` and swallowed so they can never
    /// replace the invocation's own result. Use [`try_flush`](Self::try_flush)
    /// to observe them.
    pub async fn flush(&self) {
        if let Err(e) = self.try_flush().await {
            tracing::warn!(target: "otel_lifecycle", error = %e, "Failed to flush tracer provider");
        }
    }

    /// Forces all buffered spans to be exported, reporting failures.
    ///
    /// The SDK flush blocks until processors have handed their spans to the
    /// exporter, so it runs on the blocking pool, bounded by the configured
    /// flush timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if any processor fails to flush, the flush exceeds
    /// the timeout, or the blocking task fails.
    pub async fn try_flush(&self) -> Result<(), TelemetryError> {
        let sdk = self.inner.sdk.clone();
        let timeout = self.inner.flush_timeout;

        let task = tokio::task::spawn_blocking(move || sdk.force_flush());

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined?.map_err(TelemetryError::Flush),
            Err(_) => Err(TelemetryError::FlushTimeout(timeout)),
        }
    }

    /// Flushes and shuts down the span pipeline.
    ///
    /// Spans started after shutdown are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first flush or shutdown error.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        self.inner.sdk.force_flush().map_err(TelemetryError::Flush)?;
        self.inner
            .sdk
            .shutdown()
            .map_err(TelemetryError::Shutdown)
    }
}

type Pipeline = Box<dyn FnOnce(TracerProviderBuilder, &TelemetryConfig) -> TracerProviderBuilder>;

/// Builder for a [`TelemetryProvider`].
///
/// By default the span pipeline is derived from [`TelemetryConfig`]. Tests
/// and embedders can swap the exporter (still batched with the configured
/// batch settings) or the whole span processor.
#[must_use = "builders do nothing unless .build() is called"]
pub struct TelemetryProviderBuilder {
    service_name: String,
    config: TelemetryConfig,
    resource: Option<Resource>,
    pipeline: Option<Pipeline>,
}

impl TelemetryProviderBuilder {
    fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            config: TelemetryConfig::default(),
            resource: None,
            pipeline: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: TelemetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a custom exporter behind the configured batch processor.
    pub fn exporter<E>(mut self, exporter: E) -> Self
    where
        E: SpanExporter + 'static,
    {
        self.pipeline = Some(Box::new(move |builder, config| {
            builder.with_span_processor(batch_processor(exporter, &config.batch))
        }));
        self
    }

    /// Uses a custom span processor in place of the configured pipeline.
    pub fn span_processor<P>(mut self, processor: P) -> Self
    where
        P: SpanProcessor + 'static,
    {
        self.pipeline = Some(Box::new(move |builder, _| {
            builder.with_span_processor(processor)
        }));
        self
    }

    /// Overrides the detected resource.
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Builds the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured OTLP exporter cannot be built.
    pub fn build(self) -> Result<TelemetryProvider, TelemetryError> {
        let resource = self
            .resource
            .unwrap_or_else(|| lambda_resource(&self.service_name));

        let builder = SdkTracerProvider::builder().with_resource(resource);
        let builder = match self.pipeline {
            Some(pipeline) => pipeline(builder, &self.config),
            None => configured_pipeline(builder, &self.config)?,
        };

        Ok(TelemetryProvider {
            inner: Arc::new(ProviderInner {
                service_name: self.service_name,
                sdk: builder.build(),
                flush_timeout: self.config.flush_timeout,
            }),
        })
    }
}

fn configured_pipeline(
    builder: TracerProviderBuilder,
    config: &TelemetryConfig,
) -> Result<TracerProviderBuilder, TelemetryError> {
    let builder = match config.exporter {
        ExporterKind::Stdout => builder.with_span_processor(batch_processor(
            opentelemetry_stdout::SpanExporter::default(),
            &config.batch,
        )),
        ExporterKind::Otlp => builder.with_span_processor(batch_processor(
            build_otlp_exporter(&config.otlp)?,
            &config.batch,
        )),
        ExporterKind::None => builder,
    };

    Ok(builder)
}

fn batch_processor<E>(exporter: E, batch: &BatchConfig) -> BatchSpanProcessor
where
    E: SpanExporter + 'static,
{
    let batch_config = BatchConfigBuilder::default()
        .with_max_queue_size(batch.max_queue_size)
        .with_max_export_batch_size(batch.max_export_batch_size)
        .with_scheduled_delay(batch.scheduled_delay)
        .build();

    BatchSpanProcessor::builder(exporter)
        .with_batch_config(batch_config)
        .build()
}

fn build_otlp_exporter(
    config: &OtlpConfig,
) -> Result<opentelemetry_otlp::SpanExporter, TelemetryError> {
    let exporter = match config.protocol {
        Protocol::Grpc => {
            let mut builder = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(config.effective_endpoint())
                .with_timeout(config.timeout);

            if !config.headers.is_empty() {
                let mut metadata = MetadataMap::new();
                for (key, value) in &config.headers {
                    if let (Ok(k), Ok(v)) = (
                        key.parse::<MetadataKey<_>>(),
                        value.parse::<MetadataValue<_>>(),
                    ) {
                        metadata.insert(k, v);
                    }
                }
                builder = builder.with_metadata(metadata);
            }

            builder.build()?
        }
        Protocol::HttpBinary | Protocol::HttpJson => {
            let protocol = if config.protocol == Protocol::HttpJson {
                opentelemetry_otlp::Protocol::HttpJson
            } else {
                opentelemetry_otlp::Protocol::HttpBinary
            };

            let mut builder = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(config.traces_endpoint())
                .with_timeout(config.timeout)
                .with_protocol(protocol);

            if !config.headers.is_empty() {
                builder = builder.with_headers(config.headers.clone());
            }

            builder.build()?
        }
    };

    Ok(exporter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span as _, Tracer as _};
    use opentelemetry::Context;
    use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
    use opentelemetry_sdk::trace::{Span, SpanData};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default)]
    struct CountingProcessor {
        ended: Arc<AtomicUsize>,
        flushes: Arc<AtomicUsize>,
        fail_flush: bool,
        flush_delay: Option<Duration>,
    }

    impl SpanProcessor for CountingProcessor {
        fn on_start(&self, _span: &mut Span, _cx: &Context) {}

        fn on_end(&self, _span: SpanData) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }

        fn force_flush(&self) -> OTelSdkResult {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.flush_delay {
                std::thread::sleep(delay);
            }
            if self.fail_flush {
                Err(OTelSdkError::InternalFailure("collector unreachable".into()))
            } else {
                Ok(())
            }
        }

        fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_flush_reaches_span_processor() {
        let processor = CountingProcessor::default();
        let provider = TelemetryProvider::builder("test-service")
            .span_processor(processor.clone())
            .build()
            .unwrap();

        let mut span = provider.tracer().start("work");
        span.end();

        provider.flush().await;

        assert_eq!(processor.ended.load(Ordering::SeqCst), 1);
        assert_eq!(processor.flushes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_failure_is_swallowed() {
        let processor = CountingProcessor {
            fail_flush: true,
            ..Default::default()
        };
        let provider = TelemetryProvider::builder("test-service")
            .span_processor(processor.clone())
            .build()
            .unwrap();

        provider.flush().await;

        assert_eq!(processor.flushes.load(Ordering::SeqCst), 1);
        assert!(matches!(
            provider.try_flush().await,
            Err(TelemetryError::Flush(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_flush_is_bounded_by_timeout() {
        let processor = CountingProcessor {
            flush_delay: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let config = TelemetryConfig::builder()
            .flush_timeout(Duration::from_millis(100))
            .build();
        let provider = TelemetryProvider::builder("test-service")
            .config(config)
            .span_processor(processor.clone())
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let result = provider.try_flush().await;

        assert!(matches!(
            result,
            Err(TelemetryError::FlushTimeout(timeout)) if timeout == Duration::from_millis(100)
        ));
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_builder_without_exporter_builds() {
        let config = TelemetryConfig::builder()
            .exporter(ExporterKind::None)
            .build();
        let provider = TelemetryProvider::builder("test-service")
            .config(config)
            .build()
            .unwrap();

        assert_eq!(provider.service_name(), "test-service");
        assert!(provider.try_flush().await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_pipeline() {
        let provider = TelemetryProvider::builder("test-service")
            .span_processor(CountingProcessor::default())
            .build()
            .unwrap();
        let other = TelemetryProvider::builder("test-service")
            .span_processor(CountingProcessor::default())
            .build()
            .unwrap();

        assert!(provider.ptr_eq(&provider.clone()));
        assert!(!provider.ptr_eq(&other));
    }

    #[test]
    #[serial]
    fn test_init_telemetry_is_idempotent() {
        let config = TelemetryConfig::builder()
            .exporter(ExporterKind::None)
            .build();

        let (_, first) = init_telemetry("first-service", config.clone()).unwrap();
        let (_, second) = init_telemetry("second-service", config).unwrap();

        assert!(first.ptr_eq(&second));
        assert_eq!(second.service_name(), "first-service");
    }
}
