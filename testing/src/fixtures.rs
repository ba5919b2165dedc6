use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use config::{ConfigLayer, EngineConfig, load_from_env, merge_configs};
use context::{
    CascadeLevel, ContextDefinition, ContextRegistry, ContextScope, ContextType,
    InMemoryRegistry, KeyScope, LevelHit, ProvenanceSource, Snapshot
};
use errors::{RegistryError, ResolutionError};
use serde_json::{Map, Value, json};
use tracing_subscriber::{fmt, prelude::*};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);
static TRACING: Once = Once::new();

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn unique_request_id() -> String {
    unique_id("test-request")
}

/// Installs a fmt subscriber once per process, filtered by `CTX_LOG_LEVEL`
/// or `RUST_LOG` like a host would be.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let env_layer = load_from_env().unwrap_or_default();
        let config = merge_configs(
            EngineConfig::default(),
            ConfigLayer::default(),
            "file",
            env_layer,
            "env",
            None,
            "overrides",
        );
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(config.observability.env_filter())
            .try_init();
    });
}

/// Definitions used across the integration tests.
pub fn sample_catalog() -> Vec<ContextDefinition> {
    vec![
        ContextDefinition::new("actor_type", ContextType::String)
            .with_default(json!("anonymous"))
            .with_scope(ContextScope::System)
            .injected(),
        ContextDefinition::new("alumno_id", ContextType::String).with_scope(ContextScope::Personal),
        ContextDefinition::new("alumno_email", ContextType::String)
            .with_scope(ContextScope::Personal),
        ContextDefinition::new("is_authenticated", ContextType::Boolean)
            .with_default(json!(false))
            .with_scope(ContextScope::System),
        ContextDefinition::new("screen", ContextType::String).with_scope(ContextScope::Structural),
        ContextDefinition::new("streak", ContextType::Number).with_scope(ContextScope::Personal),
        ContextDefinition::new("nivel_efectivo", ContextType::Number)
            .with_default(json!(1))
            .with_scope(ContextScope::Personal),
        ContextDefinition::new("puede_practicar", ContextType::Boolean)
            .with_scope(ContextScope::Personal),
        ContextDefinition::enumeration("tono", ["calido", "neutro", "formal"]),
        ContextDefinition::enumeration("modo_visual", ["claro", "oscuro"])
            .with_default(json!("oscuro")),
        ContextDefinition::new("preferencias", ContextType::Json),
        ContextDefinition::new("flag_beta_editor", ContextType::Boolean)
            .with_default(json!(false)),
    ]
}

pub fn sample_registry() -> InMemoryRegistry {
    InMemoryRegistry::from_definitions(sample_catalog())
}

/// Builds snapshots region by region.
#[derive(Debug, Default, Clone)]
pub struct SnapshotBuilder {
    regions: Map<String, Value>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `region.field`, creating the region if needed.
    pub fn field(mut self, region: &str, field: &str, value: Value) -> Self {
        let entry = self
            .regions
            .entry(region.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(fields) = entry {
            fields.insert(field.to_string(), value);
        }
        self
    }

    pub fn student(self, id: &str, email: &str) -> Self {
        self.field("identity", "actorType", json!("student"))
            .field("identity", "actorId", json!(id))
            .field("identity", "email", json!(email))
            .field("identity", "isAuthenticated", json!(true))
    }

    pub fn admin(self, id: &str, email: &str) -> Self {
        self.field("identity", "actorType", json!("admin"))
            .field("identity", "actorId", json!(id))
            .field("identity", "email", json!(email))
            .field("identity", "isAuthenticated", json!(true))
    }

    pub fn screen(self, screen: &str) -> Self {
        self.field("environment", "screen", json!(screen))
    }

    pub fn streak(self, days: i64) -> Self {
        self.field("student", "streak", json!(days))
    }

    pub fn flag(self, name: &str, enabled: bool) -> Self {
        self.field("flags", name, json!(enabled))
    }

    pub fn build(self) -> Snapshot {
        Snapshot::new(Value::Object(self.regions))
    }
}

/// Registry that is always unreachable.
#[derive(Debug, Default)]
pub struct FailingRegistry;

#[async_trait]
impl ContextRegistry for FailingRegistry {
    async fn lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError> {
        Err(RegistryError::Unavailable {
            reason: format!("registry offline while looking up {key}"),
        })
    }
}

/// Wraps a registry and delays every lookup.
pub struct SlowRegistry<R> {
    inner: R,
    delay: Duration,
}

impl<R> SlowRegistry<R> {
    pub fn new(inner: R, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<R: ContextRegistry> ContextRegistry for SlowRegistry<R> {
    async fn lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.lookup(key).await
    }
}

/// Wraps a registry and counts lookups.
pub struct CountingRegistry<R> {
    inner: R,
    calls: Arc<AtomicUsize>,
}

impl<R> CountingRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared handle to the lookup count.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl<R: ContextRegistry> ContextRegistry for CountingRegistry<R> {
    async fn lookup(&self, key: &str) -> Result<Option<ContextDefinition>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(key).await
    }
}

/// Cascade level that always errors from the given slot.
pub struct FailingLevel {
    source: ProvenanceSource,
}

impl FailingLevel {
    pub fn new(source: ProvenanceSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CascadeLevel for FailingLevel {
    fn source(&self) -> ProvenanceSource {
        self.source
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        Err(ResolutionError::LevelFailed {
            level: self.source.precedence_level(),
            reason: format!("store unavailable for {}", scope.key()),
        })
    }
}

/// Cascade level that panics for keys starting with `trigger`.
pub struct PanickingLevel {
    source: ProvenanceSource,
    trigger: String,
}

impl PanickingLevel {
    pub fn new(source: ProvenanceSource, trigger: impl Into<String>) -> Self {
        Self {
            source,
            trigger: trigger.into(),
        }
    }
}

#[async_trait]
impl CascadeLevel for PanickingLevel {
    fn source(&self) -> ProvenanceSource {
        self.source
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        if scope.key().starts_with(&self.trigger) {
            panic!("level {} blew up on {}", self.source, scope.key());
        }
        Ok(None)
    }
}
