//! Error types for the quote forwarder.

use crate::quote::ValidationError;
use thiserror::Error;

/// Errors that can occur while resolving the function configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No sink URL is configured.
    #[error("TARGET_URL is not set")]
    MissingTargetUrl,

    /// Configuration sources could not be merged or extracted.
    #[error("failed to load function configuration: {0}")]
    Load(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Failure while fetching, validating or saving a quote.
///
/// Variants stay distinct so spans and logs can tell validation failures
/// from transport failures; callers of the function only ever see the
/// message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuoteError {
    /// The function is missing required configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The remote side answered with a non-success status.
    #[error("HTTP error, status: {status}")]
    Status {
        /// Status code of the response.
        status: u16,
    },

    /// The response body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(#[source] reqwest::Error),

    /// The fetched payload did not have the shape of a quote.
    #[error("invalid quote: {0}")]
    Validation(#[from] ValidationError),
}

impl QuoteError {
    /// Coarse classification, recorded as the `error.type` span attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteError::Config(_) => "configuration",
            QuoteError::Transport(_) | QuoteError::Status { .. } | QuoteError::Decode(_) => {
                "transport"
            }
            QuoteError::Validation(_) => "validation",
        }
    }
}
