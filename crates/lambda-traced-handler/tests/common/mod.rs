//! Shared test helpers: an in-memory span processor and provider setup.

#![allow(dead_code)]

use lambda_telemetry::{TelemetryConfig, TelemetryProvider};
use opentelemetry::Context;
use opentelemetry::trace::Status;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{Span, SpanData, SpanProcessor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Span processor that keeps every ended span and counts flushes.
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessor {
    spans: Arc<Mutex<Vec<SpanData>>>,
    flushes: Arc<AtomicUsize>,
    fail_flush: bool,
    flush_delay: Option<Duration>,
}

impl RecordingProcessor {
    /// Recorder whose flush always reports a failure.
    pub fn failing() -> Self {
        Self {
            fail_flush: true,
            ..Default::default()
        }
    }

    /// Recorder whose flush blocks for `delay` before succeeding.
    pub fn slow(delay: Duration) -> Self {
        Self {
            flush_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.lock().unwrap().clone()
    }

    pub fn span_named(&self, name: &str) -> SpanData {
        self.spans()
            .into_iter()
            .find(|span| span.name == name)
            .unwrap_or_else(|| panic!("no span named {name}"))
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl SpanProcessor for RecordingProcessor {
    fn on_start(&self, _span: &mut Span, _cx: &Context) {}

    fn on_end(&self, span: SpanData) {
        self.spans.lock().unwrap().push(span);
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.flush_delay {
            std::thread::sleep(delay);
        }
        if self.fail_flush {
            return Err(OTelSdkError::InternalFailure("collector unreachable".into()));
        }
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }
}

/// Builds a standalone provider backed by a fresh recorder.
pub fn recording_provider() -> (TelemetryProvider, RecordingProcessor) {
    let recorder = RecordingProcessor::default();
    let provider = TelemetryProvider::builder("test-function")
        .span_processor(recorder.clone())
        .build()
        .expect("provider builds");
    (provider, recorder)
}

/// Builds a provider around `recorder` with a custom flush bound.
pub fn provider_with(recorder: &RecordingProcessor, flush_timeout: Duration) -> TelemetryProvider {
    let config = TelemetryConfig::builder()
        .flush_timeout(flush_timeout)
        .build();
    TelemetryProvider::builder("test-function")
        .config(config)
        .span_processor(recorder.clone())
        .build()
        .expect("provider builds")
}

pub fn attribute(span: &SpanData, key: &str) -> Option<opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn is_error(span: &SpanData) -> bool {
    matches!(span.status, Status::Error { .. })
}
