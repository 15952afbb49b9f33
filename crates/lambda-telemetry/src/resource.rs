//! Lambda resource attribute detection.
//!
//! Reads the standard Lambda environment variables and maps them onto
//! OpenTelemetry cloud and FaaS semantic conventions. Outside Lambda (no
//! `AWS_EXECUTION_ENV` starting with `AWS_Lambda_`) the detector contributes
//! nothing, so local runs and tests only carry `service.name`.

use opentelemetry::KeyValue;
use opentelemetry_sdk::resource::{Resource, ResourceDetector};
use opentelemetry_semantic_conventions::attribute as semconv_attr;
use opentelemetry_semantic_conventions::resource as semconv_res;
use std::env;

const AWS_EXECUTION_ENV: &str = "AWS_EXECUTION_ENV";
const AWS_REGION: &str = "AWS_REGION";
const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
const AWS_LAMBDA_FUNCTION_VERSION: &str = "AWS_LAMBDA_FUNCTION_VERSION";
const AWS_LAMBDA_FUNCTION_MEMORY_SIZE: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";
const AWS_LAMBDA_LOG_STREAM_NAME: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

/// Environment variables copied verbatim into string attributes.
const STRING_ATTRIBUTES: [(&str, &str); 4] = [
    (AWS_REGION, semconv_attr::CLOUD_REGION),
    (AWS_LAMBDA_FUNCTION_NAME, semconv_attr::FAAS_NAME),
    (AWS_LAMBDA_FUNCTION_VERSION, semconv_attr::FAAS_VERSION),
    (AWS_LAMBDA_LOG_STREAM_NAME, semconv_res::FAAS_INSTANCE),
];

/// Detects the cloud and FaaS attributes of the current Lambda sandbox.
#[derive(Debug, Default)]
pub struct LambdaResourceDetector;

impl LambdaResourceDetector {
    /// Creates a new Lambda detector.
    pub fn new() -> Self {
        Self
    }

    fn running_on_lambda() -> bool {
        env::var(AWS_EXECUTION_ENV).is_ok_and(|value| value.starts_with("AWS_Lambda_"))
    }

    /// Configured memory in bytes; Lambda reports megabytes.
    fn max_memory_bytes() -> Option<i64> {
        let megabytes: i64 = env::var(AWS_LAMBDA_FUNCTION_MEMORY_SIZE).ok()?.parse().ok()?;
        Some(megabytes * 1024 * 1024)
    }
}

impl ResourceDetector for LambdaResourceDetector {
    fn detect(&self) -> Resource {
        if !Self::running_on_lambda() {
            return Resource::builder_empty().build();
        }

        let fixed = [
            KeyValue::new(semconv_attr::CLOUD_PROVIDER, "aws"),
            KeyValue::new(semconv_attr::CLOUD_PLATFORM, "aws_lambda"),
        ];
        let from_env = STRING_ATTRIBUTES.iter().filter_map(|&(var, key)| {
            env::var(var).ok().map(|value| KeyValue::new(key, value))
        });
        let memory = Self::max_memory_bytes()
            .map(|bytes| KeyValue::new(semconv_attr::FAAS_MAX_MEMORY, bytes));

        Resource::builder_empty()
            .with_attributes(fixed.into_iter().chain(from_env).chain(memory))
            .build()
    }
}

/// Builds the resource for a function: SDK defaults, detected Lambda
/// attributes, then `service.name`.
pub fn lambda_resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_detector(Box::new(LambdaResourceDetector::new()))
        .with_service_name(service_name.to_string())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::{Key, Value};
    use serial_test::serial;

    fn lambda_env() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            (AWS_EXECUTION_ENV, Some("AWS_Lambda_provided.al2023")),
            (AWS_REGION, Some("eu-west-2")),
            (AWS_LAMBDA_FUNCTION_NAME, Some("quotes-function")),
            (AWS_LAMBDA_FUNCTION_VERSION, Some("$LATEST")),
            (AWS_LAMBDA_FUNCTION_MEMORY_SIZE, Some("128")),
            (AWS_LAMBDA_LOG_STREAM_NAME, Some("2024/01/01/[$LATEST]abc")),
        ]
    }

    #[test]
    #[serial]
    fn test_detects_lambda_attributes() {
        temp_env::with_vars(lambda_env(), || {
            let resource = LambdaResourceDetector::new().detect();

            assert_eq!(
                resource.get(&Key::from_static_str(semconv_attr::CLOUD_PROVIDER)),
                Some(Value::from("aws"))
            );
            assert_eq!(
                resource.get(&Key::from_static_str(semconv_attr::FAAS_NAME)),
                Some(Value::from("quotes-function"))
            );
            assert_eq!(
                resource.get(&Key::from_static_str(semconv_attr::FAAS_MAX_MEMORY)),
                Some(Value::I64(128 * 1024 * 1024))
            );
            assert_eq!(
                resource.get(&Key::from_static_str(semconv_res::FAAS_INSTANCE)),
                Some(Value::from("2024/01/01/[$LATEST]abc"))
            );
        });
    }

    #[test]
    #[serial]
    fn test_unparseable_memory_is_skipped() {
        let mut vars = lambda_env();
        vars.retain(|(key, _)| *key != AWS_LAMBDA_FUNCTION_MEMORY_SIZE);
        vars.push((AWS_LAMBDA_FUNCTION_MEMORY_SIZE, Some("lots")));

        temp_env::with_vars(vars, || {
            let resource = LambdaResourceDetector::new().detect();
            assert_eq!(
                resource.get(&Key::from_static_str(semconv_attr::FAAS_MAX_MEMORY)),
                None
            );
            assert_eq!(
                resource.get(&Key::from_static_str(semconv_attr::CLOUD_REGION)),
                Some(Value::from("eu-west-2"))
            );
        });
    }

    #[test]
    #[serial]
    fn test_outside_lambda_detects_nothing() {
        temp_env::with_var_unset(AWS_EXECUTION_ENV, || {
            let resource = LambdaResourceDetector::new().detect();
            assert!(resource.is_empty());
        });
    }

    #[test]
    #[serial]
    fn test_lambda_resource_sets_service_name() {
        temp_env::with_var_unset(AWS_EXECUTION_ENV, || {
            let resource = lambda_resource("quotes-function");
            assert_eq!(
                resource.get(&Key::from_static_str(semconv_res::SERVICE_NAME)),
                Some(Value::from("quotes-function"))
            );
        });
    }
}
