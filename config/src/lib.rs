//! # Configuration System
//!
//! Configuration management for the context resolution engine.
//!
//! This crate provides:
//! - Configuration structures for registry access, scheduling and logging
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML/JSON)
//! - Partial configuration layers, one per source
//! - Configuration precedence (overrides > env > file > defaults)
//! - Configuration validation
//! - Tracing subscriber setup from the observability section

pub mod config;
pub mod file_loader;
pub mod layer;
pub mod loader;
pub mod logging;
pub mod precedence;
pub mod validation;

pub use config::{EngineConfig, ObservabilityConfig, RegistryConfig, ResolutionConfig};
pub use file_loader::{ConfigFileError, FileFormat, load_from_file, load_from_toml, load_from_yaml};
pub use layer::{ConfigLayer, ObservabilityLayer, RegistryLayer, ResolutionLayer};
pub use loader::load_from_env;
pub use logging::init_tracing;
pub use precedence::merge_configs;
pub use validation::validate;
