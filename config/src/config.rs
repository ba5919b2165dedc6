//! # Configuration Structures
//!
//! This module defines the configuration structures for the context
//! resolution engine.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Include comprehensive M-CANONICAL-DOCS

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main configuration structure for the context resolution engine.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Aggregates registry access, resolution scheduling and observability
/// settings.
///
/// ## Usage
/// ```rust,no_run
/// use config::EngineConfig;
///
/// let config = EngineConfig::default();
/// println!("Lookup timeout: {}ms", config.registry.lookup_timeout_ms);
/// ```
///
/// ## Fields
/// - `registry`: Registry accessor settings (timeout, catalog file)
/// - `resolution`: Per-key scheduling (parallelism, concurrency cap)
/// - `observability`: Logging settings
///
/// ## Validation
/// All nested configurations must pass their own validation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct EngineConfig {
    /// Registry accessor configuration
    #[serde(default)]
    #[validate(nested)]
    pub registry: RegistryConfig,

    /// Resolution scheduling configuration
    #[serde(default)]
    #[validate(nested)]
    pub resolution: ResolutionConfig,

    /// Observability configuration
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// Registry accessor configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Bounds the latency of registry lookups and optionally names a catalog
/// file used to seed an in-memory registry.
///
/// ## Fields
/// - `lookup_timeout_ms`: Timeout per lookup in milliseconds (default: 2000)
/// - `catalog_path`: Optional TOML/YAML/JSON catalog of context definitions
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RegistryConfig {
    /// Timeout applied to every registry lookup
    #[serde(default = "default_registry_lookup_timeout_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub lookup_timeout_ms: u64,

    /// Catalog file used to seed the in-memory registry
    #[serde(default)]
    pub catalog_path: Option<PathBuf>
}

pub(crate) fn default_registry_lookup_timeout_ms() -> u64 {
    2000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_registry_lookup_timeout_ms(),
            catalog_path: None
        }
    }
}

/// Resolution scheduling configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Controls whether independent context keys are resolved concurrently and
/// how many may be in flight at once.
///
/// ## Fields
/// - `parallel`: Resolve keys concurrently (default: true)
/// - `max_concurrent_keys`: Concurrency cap (default: 16)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ResolutionConfig {
    /// Resolve keys concurrently
    #[serde(default = "default_resolution_parallel")]
    pub parallel: bool,

    /// Maximum number of keys resolved at once
    #[serde(default = "default_resolution_max_concurrent_keys")]
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrent_keys: usize
}

pub(crate) fn default_resolution_parallel() -> bool {
    true
}

pub(crate) fn default_resolution_max_concurrent_keys() -> usize {
    16
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            parallel: default_resolution_parallel(),
            max_concurrent_keys: default_resolution_max_concurrent_keys()
        }
    }
}

/// Observability configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Logging level applied by [`crate::init_tracing`] and
/// [`ObservabilityConfig::env_filter`].
///
/// ## Fields
/// - `logging_level`: trace/debug/info/warn/error (default: "info")
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level
    #[serde(default = "default_observability_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String
}

pub(crate) fn default_observability_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            logging_level: default_observability_logging_level()
        }
    }
}
