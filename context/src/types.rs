use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::provenance::ProvenanceEntry;
use crate::snapshot::Snapshot;

/// Declared value type of a context key.
///
/// Types the registry stores but this engine does not know are kept as
/// [`ContextType::Unknown`] and handled as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContextType {
    #[default]
    String,
    Number,
    Boolean,
    Enum,
    Json,
    Unknown(String),
}

impl From<String> for ContextType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => ContextType::String,
            "number" => ContextType::Number,
            "boolean" => ContextType::Boolean,
            "enum" => ContextType::Enum,
            "json" => ContextType::Json,
            _ => ContextType::Unknown(value),
        }
    }
}

impl From<&str> for ContextType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ContextType> for String {
    fn from(value: ContextType) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextType::String => write!(f, "string"),
            ContextType::Number => write!(f, "number"),
            ContextType::Boolean => write!(f, "boolean"),
            ContextType::Enum => write!(f, "enum"),
            ContextType::Json => write!(f, "json"),
            ContextType::Unknown(name) => write!(f, "{name}"),
        }
    }
}

impl ContextType {
    /// The type's zero value: `""`, `0`, `false` or `{}`.
    ///
    /// Enum and unknown types fall back to the empty string; enum callers
    /// should prefer [`ContextType::fail_open_value`].
    pub fn zero_value(&self) -> Value {
        match self {
            ContextType::Number => Value::from(0),
            ContextType::Boolean => Value::Bool(false),
            ContextType::Json => Value::Object(serde_json::Map::new()),
            ContextType::String | ContextType::Enum | ContextType::Unknown(_) => {
                Value::String(String::new())
            }
        }
    }

    /// Safe default used when no level produced a value.
    pub fn fail_open_value(&self, allowed_values: &[String]) -> Value {
        match (self, allowed_values.first()) {
            (ContextType::Enum, Some(first)) => Value::String(first.clone()),
            _ => self.zero_value(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    System,
    Structural,
    Personal,
    #[default]
    Package,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    #[default]
    Normal,
    Level,
}

/// Registry description of one context key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDefinition {
    pub key: String,

    #[serde(rename = "type", default)]
    pub context_type: ContextType,

    #[serde(default)]
    pub allowed_values: Vec<String>,

    #[serde(default)]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub scope: ContextScope,

    #[serde(default)]
    pub kind: ContextKind,

    /// Supplied automatically by the runtime.
    #[serde(default)]
    pub injected: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ContextDefinition {
    pub fn new(key: impl Into<String>, context_type: ContextType) -> Self {
        Self {
            key: key.into(),
            context_type,
            allowed_values: Vec::new(),
            default_value: None,
            scope: ContextScope::default(),
            kind: ContextKind::default(),
            injected: false,
            label: None,
            description: None,
        }
    }

    /// Enum definition with the given allowed values.
    pub fn enumeration<I, S>(key: impl Into<String>, allowed_values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_values: allowed_values.into_iter().map(Into::into).collect(),
            ..Self::new(key, ContextType::Enum)
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ContextScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }

    /// The declared default, treating JSON null as absent.
    pub fn declared_default(&self) -> Option<&Value> {
        self.default_value.as_ref().filter(|v| !v.is_null())
    }

    pub fn fail_open_value(&self) -> Value {
        self.context_type.fail_open_value(&self.allowed_values)
    }

    pub fn allows(&self, value: &Value) -> bool {
        value
            .as_str()
            .is_some_and(|s| self.allowed_values.iter().any(|allowed| allowed == s))
    }
}

/// What an execution runs. Package definitions may carry input defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "definition", rename_all = "snake_case")]
pub enum ExecutionTarget {
    Package(Value),
    Theme(Value),
}

/// Immutable input bundle for one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Explicit caller-supplied values.
    #[serde(default)]
    pub inputs: HashMap<String, Value>,

    #[serde(default)]
    pub snapshot: Snapshot,

    #[serde(default)]
    pub target: Option<ExecutionTarget>,

    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub execution_id: Option<String>,

    #[serde(default)]
    pub purpose: Option<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: impl Into<Snapshot>) -> Self {
        self.snapshot = snapshot.into();
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// The package definition, when the target is a package.
    pub fn package_definition(&self) -> Option<&Value> {
        match &self.target {
            Some(ExecutionTarget::Package(definition)) => Some(definition),
            _ => None,
        }
    }
}

/// Keys an execution must or may resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    pub required: Vec<String>,

    #[serde(default)]
    pub optional: Vec<String>,

    /// Snapshot regions the caller considers relevant. Advisory only.
    #[serde(default)]
    pub include: Vec<String>,
}

impl ContextRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_required<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_optional<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional.extend(keys.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_include<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(regions.into_iter().map(Into::into));
        self
    }

    /// Required keys in declaration order, without duplicates.
    pub fn required_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::with_capacity(self.required.len());
        for key in &self.required {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }

    /// Optional keys in declaration order, skipping duplicates and keys
    /// that are also required.
    pub fn optional_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::with_capacity(self.optional.len());
        for key in &self.optional {
            if !self.required.contains(key) && !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionMeta {
    pub request_id: String,
    pub execution_id: Option<String>,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Output of one resolution pass. Owned entirely by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContext {
    pub resolved: BTreeMap<String, Value>,
    pub provenance: BTreeMap<String, ProvenanceEntry>,
    /// Per-key warnings, each prefixed with its key.
    pub warnings: Vec<String>,
    pub meta: ResolutionMeta,
}

impl ResolvedContext {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.resolved.get(key)
    }

    pub fn provenance_for(&self, key: &str) -> Option<&ProvenanceEntry> {
        self.provenance.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolved.contains_key(key)
    }

    /// `(key, value, source)` triples, ordered by key.
    pub fn explain(&self) -> Vec<(String, String, String)> {
        self.resolved
            .iter()
            .map(|(key, value)| {
                let source = self
                    .provenance
                    .get(key)
                    .map(|p| p.source.to_string())
                    .unwrap_or_default();
                (key.clone(), value.to_string(), source)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_type_round_trip_names() {
        assert_eq!(ContextType::from("enum"), ContextType::Enum);
        assert_eq!(
            ContextType::from("date"),
            ContextType::Unknown("date".to_string())
        );
        assert_eq!(ContextType::Unknown("date".to_string()).to_string(), "date");
        assert_eq!(ContextType::Boolean.to_string(), "boolean");
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(ContextType::String.zero_value(), json!(""));
        assert_eq!(ContextType::Number.zero_value(), json!(0));
        assert_eq!(ContextType::Boolean.zero_value(), json!(false));
        assert_eq!(ContextType::Json.zero_value(), json!({}));
        assert_eq!(ContextType::Enum.zero_value(), json!(""));
    }

    #[test]
    fn test_enum_fail_open_takes_first_allowed() {
        let def = ContextDefinition::enumeration("tono", ["a", "b", "c"]);
        assert_eq!(def.fail_open_value(), json!("a"));

        let empty = ContextDefinition::enumeration("tono", Vec::<String>::new());
        assert_eq!(empty.fail_open_value(), json!(""));
    }

    #[test]
    fn test_definition_deserialize() {
        let def: ContextDefinition = serde_json::from_value(json!({
            "key": "tipo_practica",
            "type": "enum",
            "allowed_values": ["manana", "noche"],
            "default_value": null,
            "scope": "personal",
            "kind": "level",
            "injected": true
        }))
        .unwrap();

        assert_eq!(def.context_type, ContextType::Enum);
        assert_eq!(def.allowed_values, vec!["manana", "noche"]);
        assert!(def.declared_default().is_none());
        assert_eq!(def.scope, ContextScope::Personal);
        assert_eq!(def.kind, ContextKind::Level);
        assert!(def.injected);
    }

    #[test]
    fn test_definition_defaults_when_fields_missing() {
        let def: ContextDefinition = serde_json::from_value(json!({ "key": "x" })).unwrap();
        assert_eq!(def.context_type, ContextType::String);
        assert!(def.allowed_values.is_empty());
        assert_eq!(def.scope, ContextScope::Package);
        assert_eq!(def.kind, ContextKind::Normal);
        assert!(!def.injected);
    }

    #[test]
    fn test_allows() {
        let def = ContextDefinition::enumeration("x", ["1", "two"]);
        assert!(def.allows(&json!("two")));
        assert!(!def.allows(&json!("three")));
        assert!(!def.allows(&json!(1)));
    }

    #[test]
    fn test_request_key_dedup() {
        let request = ContextRequest::new()
            .with_required(["x", "y", "x"])
            .with_optional(["z", "y", "z", "w"]);

        assert_eq!(request.required_keys(), vec!["x", "y"]);
        assert_eq!(request.optional_keys(), vec!["z", "w"]);
    }

    #[test]
    fn test_execution_target_serde() {
        let target: ExecutionTarget = serde_json::from_value(json!({
            "type": "package",
            "definition": { "context_contract": { "inputs": [] } }
        }))
        .unwrap();
        assert!(matches!(target, ExecutionTarget::Package(_)));

        let exec = ExecutionContext::new().with_target(target);
        assert!(exec.package_definition().is_some());

        let exec = ExecutionContext::new().with_target(ExecutionTarget::Theme(json!({})));
        assert!(exec.package_definition().is_none());
    }
}
