//! # Environment Variable Loader
//!
//! Loads engine configuration from environment variables following 12-factor
//! app principles.
//!
//! # Naming Convention
//! - `CTX_REGISTRY_*`: Registry accessor settings
//! - `CTX_RESOLUTION_*`: Resolution scheduling settings
//! - `CTX_LOG_LEVEL`: Logging level

use crate::layer::{ConfigLayer, ObservabilityLayer, RegistryLayer, ResolutionLayer};
use std::env;
use std::path::PathBuf;

/// Load the configuration layer set by environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Environment variables override the config file but can be overridden by
/// explicit overrides passed to [`crate::merge_configs`]. Only variables
/// that are present end up set on the layer.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let layer = load_from_env()?;
///     println!("Parallel: {:?}", layer.resolution.parallel);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// - `CTX_REGISTRY_LOOKUP_TIMEOUT_MS`: Lookup timeout (default: 2000)
/// - `CTX_REGISTRY_CATALOG_PATH`: Catalog file path (optional)
/// - `CTX_RESOLUTION_PARALLEL`: Resolve keys concurrently (true/false,
///   default: true)
/// - `CTX_RESOLUTION_MAX_CONCURRENT_KEYS`: Concurrency cap (default: 16)
/// - `CTX_LOG_LEVEL`: Logging level (trace/debug/info/warn/error, default:
///   "info")
///
/// ## Error Handling
/// A value that does not parse is logged and left unset, so the lower
/// layers still apply.
pub fn load_from_env() -> Result<ConfigLayer, Box<dyn std::error::Error>> {
    let layer = ConfigLayer {
        registry: load_registry_from_env()?,
        resolution: load_resolution_from_env()?,
        observability: load_observability_from_env()?,
    };

    Ok(layer)
}

fn load_registry_from_env() -> Result<RegistryLayer, Box<dyn std::error::Error>> {
    Ok(RegistryLayer {
        lookup_timeout_ms: parse_optional_env("CTX_REGISTRY_LOOKUP_TIMEOUT_MS"),
        catalog_path: env::var("CTX_REGISTRY_CATALOG_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from),
    })
}

fn load_resolution_from_env() -> Result<ResolutionLayer, Box<dyn std::error::Error>> {
    Ok(ResolutionLayer {
        parallel: parse_optional_env("CTX_RESOLUTION_PARALLEL"),
        max_concurrent_keys: parse_optional_env("CTX_RESOLUTION_MAX_CONCURRENT_KEYS"),
    })
}

fn load_observability_from_env() -> Result<ObservabilityLayer, Box<dyn std::error::Error>> {
    Ok(ObservabilityLayer {
        logging_level: env::var("CTX_LOG_LEVEL").ok().filter(|l| !l.is_empty()),
    })
}

/// `None` when the variable is missing or does not parse.
fn parse_optional_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match parse_env(key) {
        Ok(value) => Some(value),
        Err(e) => {
            if env::var_os(key).is_some() {
                tracing::warn!("Ignoring {}: {}", key, e);
            }
            None
        }
    }
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>),
    }
}
