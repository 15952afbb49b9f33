//! Outbound HTTP calls, each in its own client span.

use crate::config::FunctionConfig;
use crate::error::QuoteError;
use crate::quote::Quote;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::SdkTracer;
use opentelemetry_semantic_conventions::attribute::{
    ERROR_TYPE, HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, URL_FULL,
};
use reqwest::Response;
use serde_json::Value;

/// Span name for the quote fetch.
pub const FETCH_SPAN_NAME: &str = "get_random_quote";

/// Span name for the sink post.
pub const SAVE_SPAN_NAME: &str = "save_quote";

/// HTTP client for the quote source and the sink.
///
/// Every call makes exactly one request. Failures are recorded on the call's
/// span and returned; nothing is retried.
#[derive(Clone, Debug)]
pub struct QuoteClient {
    http: reqwest::Client,
    tracer: SdkTracer,
    config: FunctionConfig,
}

impl QuoteClient {
    /// Creates a client whose spans are produced by `tracer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(tracer: SdkTracer, config: FunctionConfig) -> Result<Self, QuoteError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(QuoteError::Transport)?;

        Ok(Self {
            http,
            tracer,
            config,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    /// Fetches one random quote and validates its shape.
    pub async fn fetch_quote(&self, parent: &Context) -> Result<Quote, QuoteError> {
        let url = self.config.quotes_url.as_str();
        let cx = self.start_span(FETCH_SPAN_NAME, "GET", url, parent, Vec::new());

        let result = async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(QuoteError::Transport)?;
            let body: Value = ensure_success(&cx, response)?
                .json()
                .await
                .map_err(QuoteError::Decode)?;
            Ok::<_, QuoteError>(Quote::validate(&body)?)
        }
        .await;

        end_span(&cx, result)
    }

    /// Posts `quote` as JSON to the sink and returns the decoded response.
    pub async fn save_quote(&self, parent: &Context, quote: &Quote) -> Result<Value, QuoteError> {
        let url = self.config.target_url()?;
        let cx = self.start_span(
            SAVE_SPAN_NAME,
            "POST",
            url,
            parent,
            vec![KeyValue::new("quote.id", quote.id)],
        );

        let result = async {
            let response = self
                .http
                .post(url)
                .json(quote)
                .send()
                .await
                .map_err(QuoteError::Transport)?;
            ensure_success(&cx, response)?
                .json::<Value>()
                .await
                .map_err(QuoteError::Decode)
        }
        .await;

        end_span(&cx, result)
    }

    fn start_span(
        &self,
        name: &'static str,
        method: &'static str,
        url: &str,
        parent: &Context,
        mut attributes: Vec<KeyValue>,
    ) -> Context {
        attributes.push(KeyValue::new(HTTP_REQUEST_METHOD, method));
        attributes.push(KeyValue::new(URL_FULL, url.to_string()));

        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, parent);

        parent.with_span(span)
    }
}

/// Records the status code and rejects non-2xx responses.
fn ensure_success(cx: &Context, response: Response) -> Result<Response, QuoteError> {
    let status = response.status();
    cx.span().set_attribute(KeyValue::new(
        HTTP_RESPONSE_STATUS_CODE,
        i64::from(status.as_u16()),
    ));

    if status.is_success() {
        Ok(response)
    } else {
        Err(QuoteError::Status {
            status: status.as_u16(),
        })
    }
}

/// Ends the call's span, marking it failed when `result` is an error.
fn end_span<T>(cx: &Context, result: Result<T, QuoteError>) -> Result<T, QuoteError> {
    let span = cx.span();

    if let Err(err) = &result {
        tracing::warn!(error = %err, error.type = err.kind(), "Outbound call failed");
        span.record_error(err);
        span.set_attribute(KeyValue::new(ERROR_TYPE, err.kind()));
        span.set_status(Status::error(err.to_string()));
    }

    span.end();
    result
}
