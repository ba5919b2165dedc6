//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. Explicit overrides (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)

use crate::config::{EngineConfig, ObservabilityConfig, RegistryConfig, ResolutionConfig};
use crate::layer::{ConfigLayer, ObservabilityLayer, RegistryLayer, ResolutionLayer};

/// Merge multiple configuration sources with precedence.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Merges configuration following precedence rules:
/// explicit overrides > environment variables > config file > defaults.
///
/// ## Usage
/// ```rust,no_run
/// use config::{EngineConfig, merge_configs, load_from_file, load_from_env};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let defaults = EngineConfig::default();
///     let from_file = load_from_file(Path::new("engine.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(
///         defaults,
///         from_file,
///         "file",
///         from_env,
///         "env",
///         None,
///         "overrides",
///     );
///     Ok(())
/// }
/// ```
///
/// ## Merge Semantics
/// Every field a layer sets wins over lower-precedence sources, including
/// a field set to its default value. Fields a layer leaves unset keep the
/// value from below.
pub fn merge_configs(
    defaults: EngineConfig,
    file_layer: ConfigLayer,
    file_source_name: &str,
    env_layer: ConfigLayer,
    env_source_name: &str,
    override_layer: Option<ConfigLayer>,
    override_source_name: &str,
) -> EngineConfig {
    let mut config = defaults;

    config = merge_with_logging(config, file_layer, file_source_name);
    config = merge_with_logging(config, env_layer, env_source_name);

    if let Some(overrides) = override_layer {
        config = merge_with_logging(config, overrides, override_source_name);
    }

    config
}

fn merge_with_logging(mut base: EngineConfig, layer: ConfigLayer, source_name: &str) -> EngineConfig {
    let mut changes = Vec::new();

    merge_registry(&mut base.registry, layer.registry, &mut changes);
    merge_resolution(&mut base.resolution, layer.resolution, &mut changes);
    merge_observability(&mut base.observability, layer.observability, &mut changes);

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn merge_registry(base: &mut RegistryConfig, layer: RegistryLayer, changes: &mut Vec<String>) {
    if let Some(timeout) = layer.lookup_timeout_ms {
        changes.push(format!("registry.lookup_timeout_ms = {timeout}"));
        base.lookup_timeout_ms = timeout;
    }
    if let Some(path) = layer.catalog_path {
        changes.push(format!("registry.catalog_path = {}", path.display()));
        base.catalog_path = Some(path);
    }
}

fn merge_resolution(base: &mut ResolutionConfig, layer: ResolutionLayer, changes: &mut Vec<String>) {
    if let Some(parallel) = layer.parallel {
        changes.push(format!("resolution.parallel = {parallel}"));
        base.parallel = parallel;
    }
    if let Some(max) = layer.max_concurrent_keys {
        changes.push(format!("resolution.max_concurrent_keys = {max}"));
        base.max_concurrent_keys = max;
    }
}

fn merge_observability(
    base: &mut ObservabilityConfig,
    layer: ObservabilityLayer,
    changes: &mut Vec<String>,
) {
    if let Some(level) = layer.logging_level {
        changes.push(format!("observability.logging_level = {level}"));
        base.logging_level = level;
    }
}
