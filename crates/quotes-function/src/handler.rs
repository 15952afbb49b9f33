//! The business function: fetch a quote, forward it, report the outcome.

use crate::client::QuoteClient;
use crate::error::QuoteError;
use crate::quote::Quote;
use lambda_traced_handler::{InvocationSpan, ResponseStatus};
use opentelemetry::KeyValue;
use opentelemetry::trace::Status;
use opentelemetry_semantic_conventions::attribute::ERROR_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Event added to the invocation span once a valid quote has been fetched.
pub const QUOTE_FETCHED_EVENT: &str = "Quote Fetched Successfully";

/// Event added to the invocation span once the sink accepted the quote.
pub const QUOTE_SAVED_EVENT: &str = "Quote Saved Successfully";

/// Structured result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// HTTP-style status: 200 on success, 500 on any failure.
    pub status_code: u16,
    /// JSON-encoded body.
    pub body: String,
    /// Response headers; always JSON content.
    pub headers: BTreeMap<String, String>,
}

impl InvocationResponse {
    fn json(status_code: u16, body: &Value) -> Self {
        Self {
            status_code,
            body: body.to_string(),
            headers: BTreeMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
        }
    }

    /// Parses the body back into JSON.
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

impl ResponseStatus for InvocationResponse {
    fn status_code(&self) -> Option<u16> {
        Some(self.status_code)
    }
}

/// Fetches a random quote, posts it to the sink and describes the outcome.
///
/// Never fails: every error is recorded on the invocation span and turned
/// into a `500` response. The sink URL is checked before any request is made.
pub async fn process_quote(client: &QuoteClient, span: &InvocationSpan) -> InvocationResponse {
    match forward_quote(client, span).await {
        Ok((quote, saved_response)) => {
            tracing::info!(quote.id = quote.id, "Quote processed");
            InvocationResponse::json(
                200,
                &json!({
                    "message": "Quote Processed Successfully",
                    "quote": quote,
                    "savedResponse": saved_response,
                }),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, error.type = err.kind(), "Failed to process quote");

            span.record_error(&err);
            span.set_attribute(KeyValue::new(ERROR_TYPE, err.kind()));
            span.set_status(Status::error(err.to_string()));

            InvocationResponse::json(
                500,
                &json!({
                    "message": "Error processing quote",
                    "error": err.to_string(),
                }),
            )
        }
    }
}

async fn forward_quote(
    client: &QuoteClient,
    span: &InvocationSpan,
) -> Result<(Quote, Value), QuoteError> {
    client.config().target_url()?;

    let quote = client.fetch_quote(span.context()).await?;
    span.add_event(QUOTE_FETCHED_EVENT, vec![KeyValue::new("quote_id", quote.id)]);

    let saved_response = client.save_quote(span.context(), &quote).await?;
    span.add_event(QUOTE_SAVED_EVENT, vec![KeyValue::new("quote_id", quote.id)]);

    Ok((quote, saved_response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_serialises_camel_case() {
        let response = InvocationResponse::json(200, &json!({"message": "ok"}));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["headers"]["Content-Type"], "application/json");
        assert_eq!(
            response.body_json().unwrap(),
            json!({"message": "ok"})
        );
    }

    #[test]
    fn test_response_exposes_status_code() {
        let response = InvocationResponse::json(500, &json!({}));
        assert_eq!(ResponseStatus::status_code(&response), Some(500));
    }
}
