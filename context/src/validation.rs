//! Type coercion and validation against registry definitions.
//!
//! Every function here is total. Values that cannot be coerced are kept as
//! they are and the failure is recorded, so a bad value never aborts a
//! resolution pass.

use errors::{CoercionError, DefinitionError};
use serde_json::{Number, Value};

use crate::types::{ContextDefinition, ContextType};

/// Result of coercing one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Coercion {
    pub value: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<CoercionError>,
}

impl Coercion {
    fn unchanged(value: Value) -> Self {
        Self {
            value,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn coerced(value: Value, warning: String) -> Self {
        Self {
            value,
            warnings: vec![warning],
            errors: Vec::new(),
        }
    }

    fn failed(value: Value, error: CoercionError) -> Self {
        Self {
            value,
            warnings: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Warnings followed by rendered errors, in that order.
    pub fn messages(&self) -> Vec<String> {
        self.warnings
            .iter()
            .cloned()
            .chain(self.errors.iter().map(ToString::to_string))
            .collect()
    }
}

/// Coerces `value` to `context_type`.
///
/// Null passes through untouched. Enum membership is not checked here; see
/// [`validate_value`].
pub fn coerce(key: &str, value: Value, context_type: &ContextType) -> Coercion {
    if value.is_null() {
        return Coercion::unchanged(value);
    }

    match context_type {
        ContextType::String => coerce_string(key, value),
        ContextType::Number => coerce_number(key, value),
        ContextType::Boolean => coerce_boolean(key, value),
        ContextType::Json => coerce_json(key, value),
        ContextType::Enum => Coercion::unchanged(value),
        ContextType::Unknown(type_name) => {
            let coerced = Value::String(display_form(&value));
            Coercion::coerced(
                coerced,
                format!("Unknown type '{type_name}' for context '{key}', treating as string"),
            )
        }
    }
}

/// Coerces `value` against a full definition, then checks enum membership.
///
/// An enum value outside `allowed_values` is replaced by the definition's
/// default when that default is itself allowed, otherwise by the first
/// allowed value.
pub fn validate_value(key: &str, value: Value, definition: &ContextDefinition) -> Coercion {
    let mut outcome = coerce(key, value, &definition.context_type);

    if definition.context_type != ContextType::Enum || outcome.value.is_null() {
        return outcome;
    }
    if definition.allows(&outcome.value) {
        return outcome;
    }

    let Some(first) = definition.allowed_values.first() else {
        outcome
            .errors
            .push(CoercionError::EmptyAllowedValues { key: key.to_string() });
        return outcome;
    };

    outcome.warnings.push(format!(
        "Value {} not in allowed_values for context '{key}', using default or first allowed value",
        outcome.value
    ));
    outcome.value = match definition.declared_default() {
        Some(default) if definition.allows(default) => default.clone(),
        _ => Value::String(first.clone()),
    };
    outcome
}

fn coerce_string(key: &str, value: Value) -> Coercion {
    if value.is_string() {
        return Coercion::unchanged(value);
    }
    let coerced = display_form(&value);
    let warning = format!("Coerced value to string for context '{key}': {value} → \"{coerced}\"");
    Coercion::coerced(Value::String(coerced), warning)
}

fn coerce_number(key: &str, value: Value) -> Coercion {
    if value.is_number() {
        return Coercion::unchanged(value);
    }
    let parsed = match &value {
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(Number::from(u8::from(*b))),
        _ => None,
    };

    match parsed {
        Some(number) => {
            let warning =
                format!("Coerced value to number for context '{key}': {value} → {number}");
            Coercion::coerced(Value::Number(number), warning)
        }
        None => {
            let error = CoercionError::NotNumeric {
                key: key.to_string(),
                value: value.to_string(),
            };
            Coercion::failed(value, error)
        }
    }
}

/// Blank strings read as zero, the same as a numeric form field left empty.
fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Number::from(0));
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Number::from(int));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}

fn coerce_boolean(key: &str, value: Value) -> Coercion {
    if value.is_boolean() {
        return Coercion::unchanged(value);
    }
    let coerced = match &value {
        Value::String(s) if s == "true" || s == "1" => Some(true),
        Value::String(s) if s == "false" || s == "0" => Some(false),
        Value::Number(n) if n.as_f64() == Some(1.0) => Some(true),
        Value::Number(n) if n.as_f64() == Some(0.0) => Some(false),
        _ => None,
    };

    match coerced {
        Some(b) => {
            let warning = format!("Coerced value to boolean for context '{key}': {value} → {b}");
            Coercion::coerced(Value::Bool(b), warning)
        }
        None => {
            let error = CoercionError::NotBoolean {
                key: key.to_string(),
                value: value.to_string(),
            };
            Coercion::failed(value, error)
        }
    }
}

fn coerce_json(key: &str, value: Value) -> Coercion {
    if value.is_object() || value.is_array() {
        return Coercion::unchanged(value);
    }
    let parsed = match value.as_str() {
        Some(raw) => serde_json::from_str::<Value>(raw),
        None => return Coercion::failed(value, CoercionError::NotJson { key: key.to_string() }),
    };

    match parsed {
        Ok(parsed) => Coercion::coerced(
            parsed,
            format!("Coerced JSON string to object for context '{key}'"),
        ),
        Err(e) => {
            let error = CoercionError::InvalidJson {
                key: key.to_string(),
                reason: e.to_string(),
            };
            Coercion::failed(value, error)
        }
    }
}

/// Display form of a JSON value: strings unquoted, everything else as
/// compact JSON.
fn display_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Outcome of checking a registry definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionReport {
    pub warnings: Vec<String>,
    pub errors: Vec<DefinitionError>,
}

impl DefinitionReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, strict: bool, problem: DefinitionError) {
        if strict {
            self.errors.push(problem);
        } else {
            self.warnings.push(problem.to_string());
        }
    }
}

/// Checks a definition for internal consistency.
///
/// With `strict` every problem is an error; otherwise problems are reported
/// as warnings and the definition is still usable.
pub fn check_definition(definition: &ContextDefinition, strict: bool) -> DefinitionReport {
    let mut report = DefinitionReport::default();

    match &definition.context_type {
        ContextType::Unknown(type_name) => {
            report.record(
                strict,
                DefinitionError::UnknownType {
                    type_name: type_name.clone(),
                },
            );
        }
        ContextType::Enum => {
            if definition.allowed_values.is_empty() {
                report.record(strict, DefinitionError::EmptyAllowedValues);
            }
            if let Some(default) = definition.declared_default() {
                if !definition.allows(default) {
                    report.record(
                        strict,
                        DefinitionError::DefaultNotAllowed {
                            value: display_form(default),
                        },
                    );
                }
            }
        }
        ContextType::Number => {
            if definition.declared_default().is_some_and(|d| !d.is_number()) {
                report.record(
                    strict,
                    DefinitionError::DefaultTypeMismatch {
                        expected: "number".to_string(),
                    },
                );
            }
        }
        ContextType::Boolean => {
            if definition.declared_default().is_some_and(|d| !d.is_boolean()) {
                report.record(
                    strict,
                    DefinitionError::DefaultTypeMismatch {
                        expected: "boolean".to_string(),
                    },
                );
            }
        }
        ContextType::String | ContextType::Json => {}
    }

    report
}

/// Fills in what a stored definition may leave out.
///
/// Non-enum definitions lose any stray `allowed_values`, and a JSON null
/// default becomes absent.
pub fn normalize_definition(mut definition: ContextDefinition) -> ContextDefinition {
    if definition.context_type != ContextType::Enum {
        definition.allowed_values.clear();
    }
    if definition.default_value.as_ref().is_some_and(Value::is_null) {
        definition.default_value = None;
    }
    definition
}
