//! # Configuration Layers
//!
//! A layer is one configuration source with every field optional. `None`
//! means the source did not mention the field, so an explicitly written
//! default still overrides a lower-precedence source when merged.

use crate::config::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Partial engine configuration from a single source.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Carries exactly what a file, the environment or explicit overrides set.
/// [`crate::merge_configs`] applies layers over the defaults in precedence
/// order.
///
/// ## Usage
/// ```rust
/// use config::{ConfigLayer, EngineConfig, merge_configs};
///
/// let mut overrides = ConfigLayer::default();
/// overrides.resolution.parallel = Some(false);
///
/// let config = merge_configs(
///     EngineConfig::default(),
///     ConfigLayer::default(),
///     "file",
///     ConfigLayer::default(),
///     "env",
///     Some(overrides),
///     "overrides",
/// );
/// assert!(!config.resolution.parallel);
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigLayer {
    #[serde(default)]
    pub registry: RegistryLayer,

    #[serde(default)]
    pub resolution: ResolutionLayer,

    #[serde(default)]
    pub observability: ObservabilityLayer,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RegistryLayer {
    pub lookup_timeout_ms: Option<u64>,
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResolutionLayer {
    pub parallel: Option<bool>,
    pub max_concurrent_keys: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ObservabilityLayer {
    pub logging_level: Option<String>,
}

impl ConfigLayer {
    /// True when the source set nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A complete configuration as a layer that sets every field.
///
/// `catalog_path` is only set when present, since the full configuration
/// has no way to express "explicitly no catalog".
impl From<EngineConfig> for ConfigLayer {
    fn from(config: EngineConfig) -> Self {
        Self {
            registry: RegistryLayer {
                lookup_timeout_ms: Some(config.registry.lookup_timeout_ms),
                catalog_path: config.registry.catalog_path,
            },
            resolution: ResolutionLayer {
                parallel: Some(config.resolution.parallel),
                max_concurrent_keys: Some(config.resolution.max_concurrent_keys),
            },
            observability: ObservabilityLayer {
                logging_level: Some(config.observability.logging_level),
            },
        }
    }
}
