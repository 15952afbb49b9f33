//! Shared test infrastructure: an in-process quote source and sink, and a
//! span processor that records everything it sees.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use lambda_runtime::{Context as LambdaContext, LambdaEvent};
use lambda_telemetry::TelemetryProvider;
use opentelemetry::Context;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{Span, SpanData, SpanProcessor};
use quotes_function::{FunctionConfig, QuoteClient};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Span processor that keeps every ended span and counts flushes.
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessor {
    spans: Arc<Mutex<Vec<SpanData>>>,
    flushes: Arc<AtomicUsize>,
}

impl RecordingProcessor {
    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.lock().unwrap().clone()
    }

    pub fn span_named(&self, name: &str) -> Option<SpanData> {
        self.spans().into_iter().find(|span| span.name == name)
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
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }
}

/// How one mock endpoint answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: json!({"message": status.canonical_reason()}),
        }
    }
}

struct BackendState {
    quote_reply: Reply,
    sink_reply: Reply,
    fetches: AtomicUsize,
    posts: Mutex<Vec<Value>>,
}

/// Running mock of the quote source (`GET /quotes/random`) and the sink
/// (`POST /sink`).
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start(quote_reply: Reply, sink_reply: Reply) -> Self {
        let state = Arc::new(BackendState {
            quote_reply,
            sink_reply,
            fetches: AtomicUsize::new(0),
            posts: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/quotes/random", get(random_quote))
            .route("/sink", post(save_quote))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn quotes_url(&self) -> String {
        format!("http://{}/quotes/random", self.addr)
    }

    pub fn target_url(&self) -> String {
        format!("http://{}/sink", self.addr)
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn posted(&self) -> Vec<Value> {
        self.state.posts.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.fetch_count() + self.posted().len()
    }

    /// Function configuration pointing at this backend.
    pub fn config(&self) -> FunctionConfig {
        FunctionConfig {
            target_url: Some(self.target_url()),
            quotes_url: self.quotes_url(),
            http_timeout_ms: 2_000,
        }
    }
}

async fn random_quote(State(state): State<Arc<BackendState>>) -> (StatusCode, Json<Value>) {
    state.fetches.fetch_add(1, Ordering::SeqCst);
    (state.quote_reply.status, Json(state.quote_reply.body.clone()))
}

async fn save_quote(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.posts.lock().unwrap().push(body);
    (state.sink_reply.status, Json(state.sink_reply.body.clone()))
}

/// Builds a standalone provider backed by a fresh recorder.
pub fn recording_provider() -> (TelemetryProvider, RecordingProcessor) {
    let recorder = RecordingProcessor::default();
    let provider = TelemetryProvider::builder("quotes-function")
        .span_processor(recorder.clone())
        .build()
        .expect("provider builds");
    (provider, recorder)
}

pub fn client_for(provider: &TelemetryProvider, config: FunctionConfig) -> QuoteClient {
    QuoteClient::new(provider.tracer(), config).expect("client builds")
}

pub fn scheduled_event() -> LambdaEvent<Value> {
    let payload = json!({
        "version": "0",
        "id": "53dc4d37-cffa-4f76-80c9-8b7d4a4d2eaa",
        "detail-type": "Scheduled Event",
        "source": "aws.events",
        "time": "2024-05-01T12:00:00Z",
        "resources": ["arn:aws:events:eu-west-2:123456789012:rule/quotes"],
        "detail": {}
    });

    let mut ctx = LambdaContext::default();
    ctx.request_id = "c6af9ac6-7b61-11e6-9a41-93e8deadbeef".to_string();
    LambdaEvent::new(payload, ctx)
}

pub fn attribute(span: &SpanData, key: &str) -> Option<opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn sample_quote() -> Value {
    json!({
        "id": 1,
        "quote": "Q",
        "author": "A"
    })
}
