//! # Logging Setup
//!
//! Turns [`ObservabilityConfig`] into a `tracing-subscriber` filter and
//! installs the process-wide subscriber for hosts that want the default one.

use crate::config::ObservabilityConfig;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

impl ObservabilityConfig {
    /// Filter for `logging_level`.
    ///
    /// `RUST_LOG` wins when it is set and parses, so operators can raise
    /// verbosity per module without touching configuration.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.logging_level))
    }
}

/// Install a fmt subscriber filtered by `config`.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::{EngineConfig, init_tracing};
///
/// init_tracing(&EngineConfig::default().observability).ok();
/// ```
///
/// ## Error Handling
/// Fails when a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(config.env_filter())
        .try_init()
}
