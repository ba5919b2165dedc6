use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use config::ResolutionConfig;
use context::{
    CascadeLevel, ContextEngine, ContextRequest, ExecutionContext, KeyScope, LevelHit,
    PrecedenceResolver, ProvenanceEntry, ProvenanceSource, RegistryAccessor
};
use errors::ResolutionError;
use serde_json::json;
use testing::{FailingLevel, PanickingLevel, init_test_tracing, sample_registry};

/// Persisted values for a fixed set of keys.
struct PersistedStore;

#[async_trait]
impl CascadeLevel for PersistedStore {
    fn source(&self) -> ProvenanceSource {
        ProvenanceSource::Persisted
    }

    async fn resolve(&self, scope: &KeyScope<'_>) -> Result<Option<LevelHit>, ResolutionError> {
        let value = match scope.key() {
            "tono" => json!("formal"),
            "streak" => json!("9"),
            _ => return Ok(None),
        };
        Ok(Some(LevelHit::new(value, ProvenanceEntry::persisted(scope.key()))))
    }
}

fn resolver() -> PrecedenceResolver {
    PrecedenceResolver::new(RegistryAccessor::new(
        Arc::new(sample_registry()),
        Duration::from_millis(500),
    ))
}

fn settings(parallel: bool) -> ResolutionConfig {
    ResolutionConfig {
        parallel,
        max_concurrent_keys: 3,
    }
}

#[tokio::test]
async fn persisted_level_sits_between_package_and_snapshot() {
    let engine = ContextEngine::with_resolver(
        resolver().with_level(Arc::new(PersistedStore)),
        settings(true),
    );
    let execution = ExecutionContext::new().with_input("tono", json!("calido"));
    let request = ContextRequest::new().with_required(["tono", "streak", "actor_type"]);

    let resolved = engine.resolve_contexts(&request, &execution).await;

    assert_eq!(resolved.get("tono"), Some(&json!("calido")));
    assert_eq!(resolved.provenance_for("tono").unwrap().precedence_level, 1);

    // persisted values still go through coercion
    assert_eq!(resolved.get("streak"), Some(&json!(9)));
    let streak = resolved.provenance_for("streak").unwrap();
    assert_eq!(streak.source, ProvenanceSource::Persisted);
    assert_eq!(streak.precedence_level, 3);
    assert_eq!(streak.warnings.len(), 1);

    assert_eq!(
        resolved.provenance_for("actor_type").unwrap().source,
        ProvenanceSource::RegistryDefault
    );
}

#[tokio::test]
async fn failing_levels_fall_through_silently() {
    let engine = ContextEngine::with_resolver(
        resolver()
            .with_level(Arc::new(FailingLevel::new(ProvenanceSource::Persisted)))
            .with_level(Arc::new(FailingLevel::new(ProvenanceSource::Derived))),
        settings(true),
    );
    let request = ContextRequest::new().with_required(["actor_type", "tono"]);

    let resolved = engine
        .resolve_contexts(&request, &ExecutionContext::new())
        .await;

    assert_eq!(resolved.get("actor_type"), Some(&json!("anonymous")));
    assert_eq!(resolved.get("tono"), Some(&json!("calido")));
    assert!(resolved.warnings.iter().all(|w| !w.contains("store unavailable")));
}

#[tokio::test]
async fn panics_are_contained_per_key() {
    init_test_tracing();
    for parallel in [true, false] {
        let engine = ContextEngine::with_resolver(
            resolver().with_level(Arc::new(PanickingLevel::new(
                ProvenanceSource::Derived,
                "tono",
            ))),
            settings(parallel),
        );
        let request = ContextRequest::new()
            .with_required(["tono", "actor_type"])
            .with_optional(["tono_secundario", "streak"]);

        let resolved = engine
            .resolve_contexts(&request, &ExecutionContext::new())
            .await;

        // the registry still knows the type, so the substitute is type-aware
        assert_eq!(resolved.get("tono"), Some(&json!("calido")));
        let tono = resolved.provenance_for("tono").unwrap();
        assert!(tono.is_fail_open());
        assert!(tono.warnings.iter().any(|w| w.contains("Resolution failed")));

        assert!(!resolved.contains("tono_secundario"));
        assert_eq!(resolved.get("actor_type"), Some(&json!("anonymous")));
        assert_eq!(resolved.get("streak"), Some(&json!(0)));
        assert!(resolved.warnings[0].starts_with("tono: "));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_and_sequential_passes_agree() {
    let request = ContextRequest::new()
        .with_required([
            "actor_type",
            "tono",
            "streak",
            "modo_visual",
            "ghost_a",
            "ghost_b",
        ])
        .with_optional(["preferencias", "ghost_c", "flag_beta_editor"]);
    let execution = ExecutionContext::new()
        .with_request_id("fixed")
        .with_input("modo_visual", json!("neon"))
        .with_input("preferencias", json!("{\"tema\":\"mar\"}"));

    let parallel = ContextEngine::with_resolver(resolver(), settings(true))
        .resolve_contexts(&request, &execution)
        .await;
    let sequential = ContextEngine::with_resolver(resolver(), settings(false))
        .resolve_contexts(&request, &execution)
        .await;

    assert_eq!(parallel.resolved, sequential.resolved);
    assert_eq!(parallel.provenance, sequential.provenance);
    assert_eq!(parallel.warnings, sequential.warnings);
    assert_eq!(parallel.get("modo_visual"), Some(&json!("oscuro")));
    assert_eq!(parallel.get("preferencias"), Some(&json!({ "tema": "mar" })));
}
