//! Context registry access.
//!
//! The registry is an external catalog of [`ContextDefinition`]s. The engine
//! only reads it, through [`RegistryAccessor`], which bounds each lookup with
//! a timeout and turns every failure into "not found".

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use config::FileFormat;
use dashmap::DashMap;
use errors::RegistryError;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::types::ContextDefinition;
use crate::validation::{check_definition, normalize_definition};

/// Lookup-by-key access to context definitions.
#[async_trait]
pub trait ContextRegistry: Send + Sync {
    /// Returns `Ok(None)` when the key is not defined.
    async fn lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError>;
}

/// In-process registry backed by a concurrent map.
///
/// Administrative callers may upsert or remove definitions while
/// resolutions are running.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    definitions: DashMap<String, ContextDefinition>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    contexts: Vec<ContextDefinition>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ContextDefinition>) -> Self {
        let registry = Self::new();
        for definition in definitions {
            registry.upsert(definition);
        }
        registry
    }

    /// Loads a catalog file with a top-level `contexts` list.
    ///
    /// The format follows the extension: `.toml`, `.yaml`/`.yml` or `.json`.
    /// Inconsistent definitions are loaded anyway and logged; empty or
    /// duplicate keys reject the whole catalog.
    pub fn from_catalog_file(path: &Path) -> Result<Self, RegistryError> {
        let catalog_error = |reason: String| RegistryError::CatalogLoad {
            path: path.display().to_string(),
            reason,
        };

        let catalog: Catalog = FileFormat::from_path(path)
            .and_then(|format| format.read(path))
            .map_err(|e| catalog_error(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        for definition in &catalog.contexts {
            if definition.key.trim().is_empty() {
                return Err(RegistryError::InvalidDefinition {
                    key: definition.key.clone(),
                    reason: format!("empty key in catalog {}", path.display()),
                });
            }
            if !seen.insert(definition.key.as_str()) {
                return Err(RegistryError::InvalidDefinition {
                    key: definition.key.clone(),
                    reason: format!("defined more than once in catalog {}", path.display()),
                });
            }
            for warning in check_definition(definition, false).warnings {
                warn!("Catalog definition '{}': {}", definition.key, warning);
            }
        }

        debug!(
            "Loaded {} context definitions from {}",
            catalog.contexts.len(),
            path.display()
        );
        Ok(Self::from_definitions(catalog.contexts))
    }

    /// Inserts or replaces a definition, returning the previous one.
    pub fn upsert(&self, definition: ContextDefinition) -> Option<ContextDefinition> {
        self.definitions.insert(definition.key.clone(), definition)
    }

    pub fn remove(&self, key: &str) -> Option<ContextDefinition> {
        self.definitions.remove(key).map(|(_, definition)| definition)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[async_trait]
impl ContextRegistry for InMemoryRegistry {
    async fn lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError> {
        Ok(self.definitions.get(key).map(|entry| entry.value().clone()))
    }
}

/// A primary store with a static table of system defaults behind it.
///
/// The primary store wins by key. When it fails, the system table is still
/// consulted, so built-in contexts stay resolvable during an outage.
pub struct LayeredRegistry {
    primary: Arc<dyn ContextRegistry>,
    system_defaults: HashMap<String, ContextDefinition>,
}

impl LayeredRegistry {
    pub fn new(
        primary: Arc<dyn ContextRegistry>,
        system_defaults: impl IntoIterator<Item = ContextDefinition>,
    ) -> Self {
        Self {
            primary,
            system_defaults: system_defaults
                .into_iter()
                .map(|definition| (definition.key.clone(), definition))
                .collect(),
        }
    }
}

#[async_trait]
impl ContextRegistry for LayeredRegistry {
    async fn lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError> {
        match self.primary.lookup(key).await {
            Ok(Some(definition)) => Ok(Some(definition)),
            Ok(None) => Ok(self.system_defaults.get(key).cloned()),
            Err(e) => {
                warn!("Primary registry failed for '{}', using system defaults: {}", key, e);
                Ok(self.system_defaults.get(key).cloned())
            }
        }
    }
}

/// The engine's view of the registry.
///
/// One attempt per lookup, no retries. Errors and timeouts are logged and
/// reported as "not found".
#[derive(Clone)]
pub struct RegistryAccessor {
    registry: Arc<dyn ContextRegistry>,
    timeout: Duration,
}

impl RegistryAccessor {
    pub fn new(registry: Arc<dyn ContextRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn from_config(registry: Arc<dyn ContextRegistry>, config: &config::RegistryConfig) -> Self {
        Self::new(registry, Duration::from_millis(config.lookup_timeout_ms))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Looks up and normalizes a definition.
    pub async fn lookup(&self, key: &str) -> Option<ContextDefinition> {
        match self.try_lookup(key).await {
            Ok(Some(definition)) => {
                trace!("Registry definition found for '{}'", key);
                Some(normalize_definition(definition))
            }
            Ok(None) => {
                debug!("Context '{}' not found in registry", key);
                None
            }
            Err(e) => {
                warn!("Registry lookup failed, treating '{}' as not found: {}", key, e);
                None
            }
        }
    }

    async fn try_lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        tokio::time::timeout(self.timeout, self.registry.lookup(key))
            .await
            .map_err(|_| RegistryError::Timeout {
                key: key.to_string(),
                timeout_ms,
            })?
    }
}

impl Default for RegistryAccessor {
    fn default() -> Self {
        Self::new(
            Arc::new(InMemoryRegistry::new()),
            Duration::from_millis(config::RegistryConfig::default().lookup_timeout_ms),
        )
    }
}

impl std::fmt::Debug for RegistryAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAccessor")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
