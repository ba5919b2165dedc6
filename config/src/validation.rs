//! # Configuration Validation
//!
//! Provides validation for engine configuration using the `validator` crate.

use crate::config::EngineConfig;
use validator::Validate;

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Validates every configuration field using the `validator` crate.
///
/// ## Usage
/// ```rust,no_run
/// use config::{EngineConfig, validate};
///
/// let config = EngineConfig::default();
/// match validate(&config) {
///     Ok(()) => println!("Configuration is valid"),
///     Err(errors) => println!("Validation errors: {:?}", errors),
/// }
/// ```
///
/// ## Validation Rules
/// ### Registry
/// - `lookup_timeout_ms`: 1-60000
///
/// ### Resolution
/// - `max_concurrent_keys`: 1-1024
///
/// ### Observability
/// - `logging_level`: must be "trace", "debug", "info", "warn", or "error"
pub fn validate(config: &EngineConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}
