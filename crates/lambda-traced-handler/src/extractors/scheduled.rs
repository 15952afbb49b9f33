//! Scheduled event extractor for timer triggers.
//!
//! EventBridge (formerly CloudWatch Events) scheduled rules deliver a
//! `Scheduled Event` with no trace context, so the invocation span always
//! starts a new trace.

use crate::extractor::TriggerExtractor;
use aws_lambda_events::cloudwatch_events::CloudWatchEvent;
use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::{
    CLOUDEVENTS_EVENT_ID, CLOUDEVENTS_EVENT_SOURCE, CLOUDEVENTS_EVENT_SUBJECT,
    CLOUDEVENTS_EVENT_TYPE, FAAS_TIME,
};

/// Extractor for EventBridge scheduled events.
///
/// Records `faas.trigger = timer`, the scheduled time as `faas.time`, and
/// the event id, source, detail type and rule ARN as CloudEvents attributes.
///
/// # Example
///
/// ```
/// use lambda_telemetry::TelemetryProvider;
/// use lambda_traced_handler::{ScheduledEventExtractor, TracedHandlerLayer};
///
/// # fn main() -> Result<(), lambda_telemetry::TelemetryError> {
/// let provider = TelemetryProvider::builder("nightly-report").build()?;
/// let layer = TracedHandlerLayer::builder(provider)
///     .extractor(ScheduledEventExtractor::new())
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ScheduledEventExtractor;

impl ScheduledEventExtractor {
    /// Creates a new scheduled event extractor.
    pub fn new() -> Self {
        Self
    }
}

impl TriggerExtractor<CloudWatchEvent> for ScheduledEventExtractor {
    fn trigger_type(&self) -> &'static str {
        "timer"
    }

    fn record_attributes(&self, event: &CloudWatchEvent, attributes: &mut Vec<KeyValue>) {
        attributes.push(KeyValue::new(FAAS_TIME, event.time.to_rfc3339()));

        if let Some(id) = &event.id {
            attributes.push(KeyValue::new(CLOUDEVENTS_EVENT_ID, id.clone()));
        }

        if let Some(source) = &event.source {
            attributes.push(KeyValue::new(CLOUDEVENTS_EVENT_SOURCE, source.clone()));
        }

        if let Some(detail_type) = &event.detail_type {
            attributes.push(KeyValue::new(CLOUDEVENTS_EVENT_TYPE, detail_type.clone()));
        }

        // A scheduled rule lists itself as the only resource.
        if let Some(rule_arn) = event.resources.first() {
            attributes.push(KeyValue::new(CLOUDEVENTS_EVENT_SUBJECT, rule_arn.clone()));
        }
    }
}
