use std::fs;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use config::{ConfigLayer, EngineConfig, load_from_file, merge_configs, validate};
use context::{
    ContextDefinition, ContextEngine, ContextRequest, ContextType, ExecutionContext,
    LayeredRegistry, ProvenanceSource
};
use errors::RegistryError;
use serde_json::json;
use tempfile::TempDir;
use testing::{
    CountingRegistry, FailingRegistry, SlowRegistry, SnapshotBuilder, init_test_tracing,
    sample_catalog, sample_registry
};

#[tokio::test]
async fn unreachable_registry_degrades_to_string_fail_open() {
    init_test_tracing();
    let engine = ContextEngine::new(Arc::new(FailingRegistry));
    let execution = ExecutionContext::new()
        .with_input("streak", json!("5"))
        .with_snapshot(SnapshotBuilder::new().screen("inicio").build());
    let request = ContextRequest::new()
        .with_required(["tono", "streak", "screen"])
        .with_optional(["nivel_efectivo"]);

    let resolved = engine.resolve_contexts(&request, &execution).await;

    assert_eq!(resolved.get("tono"), Some(&json!("")));
    assert!(resolved.provenance_for("tono").unwrap().is_fail_open());

    // no definition, so the raw input is kept as-is
    assert_eq!(resolved.get("streak"), Some(&json!("5")));
    assert_eq!(resolved.get("screen"), Some(&json!("inicio")));
    assert!(
        resolved
            .warnings
            .iter()
            .any(|w| w == "streak: No definition available for context 'streak', assuming type 'string'")
    );

    assert!(!resolved.contains("nivel_efectivo"));
}

#[tokio::test]
async fn layered_registry_falls_back_to_system_defaults() {
    let system_defaults = [
        ContextDefinition::new("app_env", ContextType::String).with_default(json!("production")),
        ContextDefinition::enumeration("tono", ["neutro", "formal"]),
    ];
    let engine = ContextEngine::new(Arc::new(LayeredRegistry::new(
        Arc::new(FailingRegistry),
        system_defaults,
    )));

    let resolved = engine
        .resolve_contexts(
            &ContextRequest::new().with_required(["app_env", "tono"]),
            &ExecutionContext::new(),
        )
        .await;

    assert_eq!(resolved.get("app_env"), Some(&json!("production")));
    assert_eq!(
        resolved.provenance_for("app_env").unwrap().source,
        ProvenanceSource::RegistryDefault
    );
    assert_eq!(resolved.get("tono"), Some(&json!("neutro")));
}

#[tokio::test(start_paused = true)]
async fn slow_registry_is_cut_off_by_lookup_timeout() {
    let mut config = EngineConfig::default();
    config.registry.lookup_timeout_ms = 100;
    let engine = ContextEngine::from_config(
        Arc::new(SlowRegistry::new(sample_registry(), Duration::from_secs(30))),
        &config,
    );

    let resolved = engine
        .resolve_contexts(
            &ContextRequest::new().with_required(["actor_type", "tono"]),
            &ExecutionContext::new(),
        )
        .await;

    assert_eq!(resolved.get("actor_type"), Some(&json!("")));
    assert_eq!(resolved.get("tono"), Some(&json!("")));
    assert!(resolved.provenance.values().all(|p| p.is_fail_open()));
}

#[tokio::test(start_paused = true)]
async fn slow_registry_within_timeout_is_used() {
    let engine = ContextEngine::new(Arc::new(SlowRegistry::new(
        sample_registry(),
        Duration::from_millis(50),
    )));

    let resolved = engine
        .resolve_contexts(
            &ContextRequest::new().with_required(["actor_type"]),
            &ExecutionContext::new(),
        )
        .await;

    assert_eq!(resolved.get("actor_type"), Some(&json!("anonymous")));
}

#[tokio::test]
async fn one_lookup_per_requested_key() {
    let registry = CountingRegistry::new(sample_registry());
    let calls = registry.calls();
    let engine = ContextEngine::new(Arc::new(registry));

    let execution = ExecutionContext::new()
        .with_input("tono", json!("formal"))
        .with_snapshot(SnapshotBuilder::new().streak(3).build());
    let request = ContextRequest::new()
        .with_required(["tono", "streak", "actor_type", "modo_visual"])
        .with_optional(["puede_practicar", "tono"]);

    engine.resolve_contexts(&request, &execution).await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn engine_bootstraps_from_layered_configuration() {
    let dir = TempDir::new().unwrap();
    let catalog = dir.path().join("contexts.yaml");
    fs::write(
        &catalog,
        r#"
contexts:
  - key: tono
    type: enum
    allowed_values: [calido, neutro]
    default_value: neutro
  - key: streak
    type: number
"#,
    )
    .unwrap();

    let config_path = dir.path().join("engine.toml");
    fs::write(
        &config_path,
        format!(
            "[registry]\nlookup_timeout_ms = 500\ncatalog_path = {:?}\n\n[resolution]\nparallel = false\n",
            catalog.display().to_string()
        ),
    )
    .unwrap();

    let file_layer = load_from_file(&config_path).unwrap();
    let config = merge_configs(
        EngineConfig::default(),
        file_layer,
        "file",
        ConfigLayer::default(),
        "env",
        None,
        "overrides",
    );
    validate(&config).unwrap();
    assert_eq!(config.registry.lookup_timeout_ms, 500);
    assert!(!config.resolution.parallel);

    let engine = ContextEngine::bootstrap(&config).unwrap();
    let resolved = engine
        .resolve_contexts(
            &ContextRequest::new().with_required(["tono", "streak"]),
            &ExecutionContext::new().with_input("tono", json!("sarcastico")),
        )
        .await;

    assert_eq!(resolved.get("tono"), Some(&json!("neutro")));
    assert_eq!(resolved.get("streak"), Some(&json!(0)));
    assert!(
        resolved
            .provenance_for("tono")
            .unwrap()
            .warnings
            .iter()
            .any(|w| w.contains("not in allowed_values"))
    );
}

#[test]
fn bootstrap_reports_unreadable_catalog() {
    let mut config = EngineConfig::default();
    config.registry.catalog_path = Some("/nonexistent/contexts.toml".into());

    let result = ContextEngine::bootstrap(&config);
    assert!(matches!(result, Err(RegistryError::CatalogLoad { .. })));
}

#[tokio::test]
async fn registry_updates_are_visible_to_the_next_pass() {
    let registry = Arc::new(context::InMemoryRegistry::from_definitions(sample_catalog()));
    let engine = ContextEngine::new(registry.clone());
    let request = ContextRequest::new().with_required(["streak"]);

    let before = engine
        .resolve_contexts(&request, &ExecutionContext::new())
        .await;
    assert_eq!(before.get("streak"), Some(&json!(0)));

    registry.upsert(ContextDefinition::new("streak", ContextType::Number).with_default(json!(1)));
    let after = engine
        .resolve_contexts(&request, &ExecutionContext::new())
        .await;
    assert_eq!(after.get("streak"), Some(&json!(1)));
    assert_eq!(
        after.provenance_for("streak").unwrap().source,
        ProvenanceSource::RegistryDefault
    );
}
