//! Context resolution engine.
//!
//! Resolves named context values for an execution by consulting ranked
//! sources in a fixed order, coercing each value against a registry
//! definition and recording where every value came from:
//!
//! 1. Explicit input
//! 2. Package default
//! 3. Persisted per-entity value (reserved)
//! 4. Snapshot field
//! 5. Derived context (reserved)
//! 6. Registry default
//! 7. Fail-open safe default
//!
//! Resolution never fails. Required keys are always present in the result;
//! degraded values are reported through warnings and provenance.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use context::{ContextDefinition, ContextEngine, ContextRequest, ContextType,
//!     ExecutionContext, InMemoryRegistry};
//!
//! let registry = InMemoryRegistry::from_definitions([
//!     ContextDefinition::new("streak", ContextType::Number),
//! ]);
//! let engine = ContextEngine::new(Arc::new(registry));
//!
//! let resolved = engine
//!     .resolve_contexts(
//!         &ContextRequest::new().with_required(["streak"]),
//!         &ExecutionContext::new().with_input("streak", "4".into()),
//!     )
//!     .await;
//! for (key, value, source) in resolved.explain() {
//!     println!("{key} = {value} (from {source})");
//! }
//! ```

mod engine;
pub mod precedence;
pub mod provenance;
pub mod registry;
pub mod snapshot;
mod types;
pub mod validation;

pub use engine::ContextEngine;
pub use precedence::{CascadeLevel, KeyResolution, KeyScope, LevelHit, PrecedenceResolver};
pub use provenance::{ProvenanceEntry, ProvenanceSource};
pub use registry::{ContextRegistry, InMemoryRegistry, LayeredRegistry, RegistryAccessor};
pub use snapshot::Snapshot;
pub use types::{
    ContextDefinition, ContextKind, ContextRequest, ContextScope, ContextType, ExecutionContext,
    ExecutionTarget, ResolutionMeta, ResolvedContext
};
pub use validation::{Coercion, DefinitionReport, check_definition, normalize_definition, validate_value};
