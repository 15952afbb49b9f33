//! Extractors for specific Lambda trigger types.
//!
//! Each extractor is behind a feature flag:
//!
//! - `scheduled` - EventBridge / CloudWatch Events scheduled rules (enabled
//!   by default)

#[cfg(feature = "scheduled")]
pub mod scheduled;
