//! Provenance records: which precedence level and source produced a value.
//!
//! Every constructor stamps the fixed level for its source and a note
//! describing where the value came from. No I/O.

use serde::{Deserialize, Serialize};

use crate::types::ContextType;

/// Source of a resolved value, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceSource {
    Input,
    PackageDefault,
    Persisted,
    Snapshot,
    Derived,
    RegistryDefault,
    FailOpen,
}

impl ProvenanceSource {
    /// All sources, highest precedence first.
    pub const CASCADE: [ProvenanceSource; 7] = [
        ProvenanceSource::Input,
        ProvenanceSource::PackageDefault,
        ProvenanceSource::Persisted,
        ProvenanceSource::Snapshot,
        ProvenanceSource::Derived,
        ProvenanceSource::RegistryDefault,
        ProvenanceSource::FailOpen,
    ];

    pub const fn precedence_level(self) -> u8 {
        match self {
            ProvenanceSource::Input => 1,
            ProvenanceSource::PackageDefault => 2,
            ProvenanceSource::Persisted => 3,
            ProvenanceSource::Snapshot => 4,
            ProvenanceSource::Derived => 5,
            ProvenanceSource::RegistryDefault => 6,
            ProvenanceSource::FailOpen => 7,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ProvenanceSource::Input => "input",
            ProvenanceSource::PackageDefault => "package_default",
            ProvenanceSource::Persisted => "persisted",
            ProvenanceSource::Snapshot => "snapshot",
            ProvenanceSource::Derived => "derived",
            ProvenanceSource::RegistryDefault => "registry_default",
            ProvenanceSource::FailOpen => "fail_open",
        }
    }
}

impl std::fmt::Display for ProvenanceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record for one resolved key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source: ProvenanceSource,
    pub precedence_level: u8,
    pub path: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ProvenanceEntry {
    fn new(source: ProvenanceSource, path: Option<String>, note: String) -> Self {
        Self {
            source,
            precedence_level: source.precedence_level(),
            path,
            warnings: Vec::new(),
            notes: vec![note],
        }
    }

    pub fn input(key: &str) -> Self {
        Self::new(
            ProvenanceSource::Input,
            Some(format!("inputs.{key}")),
            "Explicit input supplied by the caller".to_string(),
        )
    }

    pub fn package_default(key: &str) -> Self {
        Self::new(
            ProvenanceSource::PackageDefault,
            Some(format!("target.definition.context_contract.inputs[{key}].default")),
            "Default declared by the package input contract".to_string(),
        )
    }

    pub fn persisted(key: &str) -> Self {
        Self::new(
            ProvenanceSource::Persisted,
            Some(format!("persisted.{key}")),
            "Persisted per-entity value".to_string(),
        )
    }

    /// `path` is the snapshot path, e.g. `identity.actorType`.
    pub fn snapshot(path: &str) -> Self {
        Self::new(
            ProvenanceSource::Snapshot,
            Some(path.to_string()),
            format!("Read from snapshot field '{path}'"),
        )
    }

    pub fn derived(key: &str) -> Self {
        Self::new(
            ProvenanceSource::Derived,
            Some(format!("derived.{key}")),
            "Derived from other context values".to_string(),
        )
    }

    pub fn registry_default(key: &str) -> Self {
        Self::new(
            ProvenanceSource::RegistryDefault,
            Some(format!("registry.{key}.default_value")),
            "Default value declared in the context registry".to_string(),
        )
    }

    /// Fail-open record. `in_registry` distinguishes a known key with no
    /// value from a key the registry does not know at all.
    pub fn fail_open(key: &str, context_type: &ContextType, in_registry: bool) -> Self {
        let mut entry = Self::new(
            ProvenanceSource::FailOpen,
            None,
            format!("Safe default for type '{context_type}'"),
        );
        if in_registry {
            entry
                .warnings
                .push(format!("Using fail-open default for context '{key}'"));
        } else {
            entry.warnings.push(format!(
                "Context '{key}' not found in registry, assuming type 'string' and using fail-open default"
            ));
        }
        entry
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_fail_open(&self) -> bool {
        self.source == ProvenanceSource::FailOpen
    }
}
