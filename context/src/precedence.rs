//! Seven-level precedence cascade for a single context key.
//!
//! Levels, highest precedence first:
//!
//! 1. Explicit input (`ExecutionContext::inputs`)
//! 2. Package default (package input contract)
//! 3. Persisted per-entity value (reserved, always empty)
//! 4. Snapshot field
//! 5. Derived context (reserved, always empty)
//! 6. Registry default
//! 7. Fail-open safe default
//!
//! The cascade is an ordered list of [`CascadeLevel`]s walked until one
//! yields a non-null value. A level that fails is logged and skipped. Level 7
//! always yields, so resolution is total.

use std::sync::Arc;

use async_trait::async_trait;
use errors::ResolutionError;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::provenance::{ProvenanceEntry, ProvenanceSource};
use crate::registry::RegistryAccessor;
use crate::snapshot;
use crate::types::{ContextDefinition, ContextRequest, ContextType, ExecutionContext};

/// Everything a level may consult while resolving one key.
///
/// The registry definition is fetched lazily, at most once per key.
pub struct KeyScope<'a> {
    key: &'a str,
    execution: &'a ExecutionContext,
    request: &'a ContextRequest,
    registry: &'a RegistryAccessor,
    definition: OnceCell<Option<ContextDefinition>>,
}

impl<'a> KeyScope<'a> {
    pub fn new(
        key: &'a str,
        execution: &'a ExecutionContext,
        request: &'a ContextRequest,
        registry: &'a RegistryAccessor,
    ) -> Self {
        Self {
            key,
            execution,
            request,
            registry,
            definition: OnceCell::new(),
        }
    }

    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn execution(&self) -> &'a ExecutionContext {
        self.execution
    }

    pub fn request(&self) -> &'a ContextRequest {
        self.request
    }

    /// Registry definition of the key, or `None` if unknown or unreachable.
    pub async fn definition(&self) -> Option<&ContextDefinition> {
        self.definition
            .get_or_init(|| self.registry.lookup(self.key))
            .await
            .as_ref()
    }
}

/// A value produced by one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelHit {
    pub value: Value,
    pub provenance: ProvenanceEntry,
}

impl LevelHit {
    pub fn new(value: Value, provenance: ProvenanceEntry) -> Self {
        Self { value, provenance }
    }
}

/// One step of the cascade.
///
/// `Ok(None)` means the level has nothing for this key; `Err` means it could
/// not tell. Both fall through to the next level.
#[async_trait]
pub trait CascadeLevel: Send + Sync {
    fn source(&self) -> ProvenanceSource;

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError>;
}

pub struct ExplicitInput;

#[async_trait]
impl CascadeLevel for ExplicitInput {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::Input
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Ok(scope
            .execution()
            .inputs
            .get(scope.key())
            .filter(|v| !v.is_null())
            .map(|value| LevelHit::new(value.clone(), ProvenanceEntry::input(scope.key()))))
    }
}

/// Reads `context_contract.inputs[*].default` from a package definition.
pub struct PackageDefault;

impl PackageDefault {
    fn find_default<'v>(definition: &'v Value, key: &str) -> Result<Option<&'v Value>, ResolutionError> {
        let Some(contract) = definition.get("context_contract") else {
            return Ok(None);
        };
        let inputs = match contract.get("inputs") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(inputs)) => inputs,
            Some(_) => {
                return Err(ResolutionError::LevelFailed {
                    level: ProvenanceSource::PackageDefault.precedence_level(),
                    reason: "context_contract.inputs is not a list".to_string(),
                });
            }
        };

        let matches_key = |input: &&Value| {
            ["key", "context_key"]
                .iter()
                .any(|field| input.get(field).and_then(Value::as_str) == Some(key))
        };
        Ok(inputs
            .iter()
            .find(matches_key)
            .and_then(|input| input.get("default"))
            .filter(|v| !v.is_null()))
    }
}

#[async_trait]
impl CascadeLevel for PackageDefault {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::PackageDefault
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        let Some(definition) = scope.execution().package_definition() else {
            return Ok(None);
        };
        Ok(Self::find_default(definition, scope.key())?.map(|value| {
            LevelHit::new(value.clone(), ProvenanceEntry::package_default(scope.key()))
        }))
    }
}

/// Extension point for persisted per-entity values. Yields nothing.
pub struct PersistedValue;

#[async_trait]
impl CascadeLevel for PersistedValue {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::Persisted
    }

    async fn resolve(&self, _scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Ok(None)
    }
}

pub struct SnapshotField;

#[async_trait]
impl CascadeLevel for SnapshotField {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::Snapshot
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Ok(
            snapshot::lookup(&scope.execution().snapshot, scope.key())
                .map(|hit| LevelHit::new(hit.value, ProvenanceEntry::snapshot(&hit.path))),
        )
    }
}

/// Extension point for contexts derived from other contexts. Yields nothing.
pub struct DerivedContext;

#[async_trait]
impl CascadeLevel for DerivedContext {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::Derived
    }

    async fn resolve(&self, _scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Ok(None)
    }
}

pub struct RegistryDefault;

#[async_trait]
impl CascadeLevel for RegistryDefault {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::RegistryDefault
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Ok(scope
            .definition()
            .await
            .and_then(ContextDefinition::declared_default)
            .map(|value| {
                LevelHit::new(value.clone(), ProvenanceEntry::registry_default(scope.key()))
            }))
    }
}

pub struct FailOpen;

#[async_trait]
impl CascadeLevel for FailOpen {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::FailOpen
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Ok(Some(fail_open_hit(scope.key(), scope.definition().await)))
    }
}

/// Safe default for a key: the definition's fail-open value, or `""` for a
/// key the registry does not know.
pub fn fail_open_hit(key: &str, definition: Option<&ContextDefinition>) -> LevelHit {
    match definition {
        Some(definition) => LevelHit::new(
            definition.fail_open_value(),
            ProvenanceEntry::fail_open(key, &definition.context_type, true),
        ),
        None => LevelHit::new(
            ContextType::String.zero_value(),
            ProvenanceEntry::fail_open(key, &ContextType::String, false),
        ),
    }
}

/// The standard cascade, highest precedence first.
pub fn default_cascade() -> Vec<Arc<dyn CascadeLevel>> {
    vec![
        Arc::new(ExplicitInput),
        Arc::new(PackageDefault),
        Arc::new(PersistedValue),
        Arc::new(SnapshotField),
        Arc::new(DerivedContext),
        Arc::new(RegistryDefault),
        Arc::new(FailOpen),
    ]
}

/// Value, provenance and registry definition for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyResolution {
    pub value: Value,
    pub provenance: ProvenanceEntry,
    pub definition: Option<ContextDefinition>,
}

/// Walks the cascade for one key at a time.
#[derive(Clone)]
pub struct PrecedenceResolver {
    registry: RegistryAccessor,
    levels: Vec<Arc<dyn CascadeLevel>>,
}

impl PrecedenceResolver {
    pub fn new(registry: RegistryAccessor) -> Self {
        Self {
            registry,
            levels: default_cascade(),
        }
    }

    /// Replaces the level occupying the same source slot.
    ///
    /// This is how the reserved persisted and derived levels get real
    /// implementations without renumbering the cascade.
    #[must_use]
    pub fn with_level(mut self, level: Arc<dyn CascadeLevel>) -> Self {
        let source = level.source();
        if let Some(slot) = self.levels.iter_mut().find(|l| l.source() == source) {
            *slot = level;
        }
        self
    }

    pub fn registry(&self) -> &RegistryAccessor {
        &self.registry
    }

    pub async fn resolve(
        &self,
        key: &str,
        execution: &ExecutionContext,
        request: &ContextRequest,
    ) -> KeyResolution {
        let scope = KeyScope::new(key, execution, request, &self.registry);

        let mut produced = None;
        for level in &self.levels {
            let source = level.source();
            match level.resolve(&scope).await {
                Ok(Some(hit)) if hit.value.is_null() => {
                    trace!("Level {} ({}) returned null for '{}'", source.precedence_level(), source, key);
                }
                Ok(Some(mut hit)) => {
                    if hit.provenance.source != source {
                        warn!(
                            "Level {} reported source {} for '{}'; restamping",
                            source.precedence_level(),
                            hit.provenance.source,
                            key
                        );
                        hit.provenance.source = source;
                    }
                    hit.provenance.precedence_level = source.precedence_level();
                    produced = Some(hit);
                    break;
                }
                Ok(None) => {
                    trace!("Level {} ({}) had no value for '{}'", source.precedence_level(), source, key);
                }
                Err(e) => {
                    warn!("Level {} ({}) failed for '{}', falling through: {}", source.precedence_level(), source, key, e);
                }
            }
        }

        let hit = match produced {
            Some(hit) => hit,
            None => fail_open_hit(key, scope.definition().await),
        };

        debug!(
            "Resolved '{}' from {} (level {})",
            key, hit.provenance.source, hit.provenance.precedence_level
        );

        KeyResolution {
            value: hit.value,
            provenance: hit.provenance,
            definition: scope.definition().await.cloned(),
        }
    }
}

impl Default for PrecedenceResolver {
    fn default() -> Self {
        Self::new(RegistryAccessor::default())
    }
}

impl std::fmt::Debug for PrecedenceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecedenceResolver")
            .field("registry", &self.registry)
            .field(
                "levels",
                &self.levels.iter().map(|l| l.source()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
