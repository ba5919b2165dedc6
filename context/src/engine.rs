//! Resolution orchestrator.
//!
//! Runs every requested key through the precedence cascade and the
//! validator, then assembles the resolved values, provenance and a flattened
//! warning list. Required keys are always present in the result; optional
//! keys are dropped when nothing meaningful could be resolved.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use config::{EngineConfig, ResolutionConfig};
use errors::{RegistryError, ResolutionError};
use futures_util::FutureExt;
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, trace, warn};
use uuid::Uuid;

use crate::precedence::{KeyResolution, PrecedenceResolver, fail_open_hit};
use crate::provenance::ProvenanceEntry;
use crate::registry::{ContextRegistry, InMemoryRegistry, RegistryAccessor};
use crate::types::{ContextRequest, ExecutionContext, ResolutionMeta, ResolvedContext};
use crate::validation::validate_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Demand {
    Required,
    Optional,
}

/// Validated value for one key.
#[derive(Debug, Clone)]
struct KeyOutcome {
    value: Value,
    provenance: ProvenanceEntry,
    in_registry: bool,
}

impl KeyOutcome {
    /// Nothing but a guess: unknown to the registry and no source had a value.
    fn is_placeholder(&self) -> bool {
        self.provenance.is_fail_open() && !self.in_registry
    }
}

/// Resolves batches of context keys for an execution.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use context::{ContextEngine, ContextRequest, ExecutionContext, InMemoryRegistry};
///
/// let engine = ContextEngine::new(Arc::new(InMemoryRegistry::new()));
/// let request = ContextRequest::new().with_required(["actor_type"]);
/// let resolved = engine
///     .resolve_contexts(&request, &ExecutionContext::new())
///     .await;
/// println!("{:?}", resolved.get("actor_type"));
/// ```
#[derive(Debug, Clone)]
pub struct ContextEngine {
    resolver: Arc<PrecedenceResolver>,
    settings: ResolutionConfig,
}

impl ContextEngine {
    /// Engine with default configuration.
    pub fn new(registry: Arc<dyn ContextRegistry>) -> Self {
        Self::from_config(registry, &EngineConfig::default())
    }

    pub fn from_config(registry: Arc<dyn ContextRegistry>, config: &EngineConfig) -> Self {
        let accessor = RegistryAccessor::from_config(registry, &config.registry);
        Self::with_resolver(PrecedenceResolver::new(accessor), config.resolution.clone())
    }

    /// Engine backed by an in-memory registry seeded from
    /// `registry.catalog_path`, or empty when no catalog is configured.
    pub fn bootstrap(config: &EngineConfig) -> Result<Self, RegistryError> {
        let registry = match &config.registry.catalog_path {
            Some(path) => InMemoryRegistry::from_catalog_file(path)?,
            None => InMemoryRegistry::new(),
        };
        Ok(Self::from_config(Arc::new(registry), config))
    }

    /// Engine with a customised cascade.
    pub fn with_resolver(resolver: PrecedenceResolver, settings: ResolutionConfig) -> Self {
        Self {
            resolver: Arc::new(resolver),
            settings,
        }
    }

    pub fn resolver(&self) -> &PrecedenceResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &ResolutionConfig {
        &self.settings
    }

    /// Resolves every requested key.
    ///
    /// Never fails. Degraded resolutions show up in `warnings` and in the
    /// per-key provenance.
    ///
    /// Must be awaited inside a Tokio runtime with the time driver enabled,
    /// since registry lookups are bounded by `tokio::time::timeout`.
    pub async fn resolve_contexts(
        &self,
        request: &ContextRequest,
        execution: &ExecutionContext,
    ) -> ResolvedContext {
        let request_id = execution
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = info_span!(
            "resolve_contexts",
            request_id = %request_id,
            execution_id = execution.execution_id.as_deref().unwrap_or_default(),
            purpose = execution.purpose.as_deref().unwrap_or_default(),
        );

        async move {
            if !request.include.is_empty() {
                trace!("Snapshot regions hinted: {:?}", request.include);
            }

            let keys: Vec<(String, Demand)> = request
                .required_keys()
                .into_iter()
                .map(|key| (key.to_string(), Demand::Required))
                .chain(
                    request
                        .optional_keys()
                        .into_iter()
                        .map(|key| (key.to_string(), Demand::Optional)),
                )
                .collect();

            let outcomes = if self.settings.parallel && keys.len() > 1 {
                self.resolve_parallel(&keys, request, execution).await
            } else {
                self.resolve_sequential(&keys, request, execution).await
            };

            let mut resolved = BTreeMap::new();
            let mut provenance = BTreeMap::new();
            let mut warnings = Vec::new();

            for ((key, demand), outcome) in keys.into_iter().zip(outcomes) {
                let outcome = match (demand, outcome) {
                    (Demand::Required, Ok(outcome)) => outcome,
                    (Demand::Required, Err(e)) => {
                        warn!("Required context '{}' failed, using fail-open default: {}", key, e);
                        self.substitute(&key, &e).await
                    }
                    (Demand::Optional, Ok(outcome)) if outcome.is_placeholder() => {
                        debug!("Optional context '{}' has no value anywhere, omitting", key);
                        continue;
                    }
                    (Demand::Optional, Ok(outcome)) => outcome,
                    (Demand::Optional, Err(e)) => {
                        debug!("Optional context '{}' failed, omitting: {}", key, e);
                        continue;
                    }
                };

                warnings.extend(
                    outcome
                        .provenance
                        .warnings
                        .iter()
                        .map(|warning| format!("{key}: {warning}")),
                );
                resolved.insert(key.clone(), outcome.value);
                provenance.insert(key, outcome.provenance);
            }

            let fail_open = provenance.values().filter(|p| p.is_fail_open()).count();
            info!(
                "Resolved {} contexts ({} fail-open, {} warnings)",
                resolved.len(),
                fail_open,
                warnings.len()
            );

            ResolvedContext {
                resolved,
                provenance,
                warnings,
                meta: ResolutionMeta {
                    request_id: request_id.clone(),
                    execution_id: execution.execution_id.clone(),
                    purpose: execution.purpose.clone(),
                    created_at: Utc::now(),
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn resolve_sequential(
        &self,
        keys: &[(String, Demand)],
        request: &ContextRequest,
        execution: &ExecutionContext,
    ) -> Vec<Result<KeyOutcome, ResolutionError>> {
        let mut outcomes = Vec::with_capacity(keys.len());
        for (key, _) in keys {
            let outcome = AssertUnwindSafe(resolve_key(&self.resolver, key, execution, request))
                .catch_unwind()
                .await
                .map_err(|panic| ResolutionError::TaskFailed {
                    key: key.clone(),
                    reason: panic_message(panic.as_ref()),
                });
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Every key polled concurrently from the caller's task, at most
    /// `max_concurrent_keys` in flight. Nothing is spawned, so dropping the
    /// returned future cancels all outstanding lookups. Results come back in
    /// key order regardless of completion order.
    async fn resolve_parallel(
        &self,
        keys: &[(String, Demand)],
        request: &ContextRequest,
        execution: &ExecutionContext,
    ) -> Vec<Result<KeyOutcome, ResolutionError>> {
        let permits = Semaphore::new(self.settings.max_concurrent_keys.max(1));

        let pending = keys.iter().map(|(key, _)| {
            let permits = &permits;
            AssertUnwindSafe(async move {
                let _permit = permits.acquire().await.ok();
                resolve_key(&self.resolver, key, execution, request).await
            })
            .catch_unwind()
            .map(|outcome| {
                outcome.map_err(|panic| ResolutionError::TaskFailed {
                    key: key.clone(),
                    reason: panic_message(panic.as_ref()),
                })
            })
        });

        join_all(pending).await
    }

    /// Fail-open value for a required key whose pipeline failed outright.
    async fn substitute(&self, key: &str, error: &ResolutionError) -> KeyOutcome {
        let definition = AssertUnwindSafe(self.resolver.registry().lookup(key))
            .catch_unwind()
            .await
            .ok()
            .flatten();
        let hit = fail_open_hit(key, definition.as_ref());
        KeyOutcome {
            value: hit.value,
            provenance: hit.provenance.with_warning(format!(
                "Resolution failed for context '{key}', using fail-open default: {error}"
            )),
            in_registry: definition.is_some(),
        }
    }
}

/// Cascade plus validation for one key.
async fn resolve_key(
    resolver: &PrecedenceResolver,
    key: &str,
    execution: &ExecutionContext,
    request: &ContextRequest,
) -> KeyOutcome {
    let KeyResolution {
        value,
        mut provenance,
        definition,
    } = resolver.resolve(key, execution, request).await;

    let value = match &definition {
        Some(definition) => {
            let checked = validate_value(key, value, definition);
            provenance.warnings.extend(checked.messages());
            checked.value
        }
        None => {
            if !provenance.is_fail_open() {
                provenance.warnings.push(format!(
                    "No definition available for context '{key}', assuming type 'string'"
                ));
            }
            value
        }
    };

    KeyOutcome {
        value,
        provenance,
        in_registry: definition.is_some(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
