//! # Context Engine Errors
//!
//! Structured error definitions for the context resolution workspace.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields in every message
//! - None of these ever cross the engine's public boundary; they are logged,
//!   rendered into warnings, or converted into fail-open defaults

use thiserror::Error;

/// Registry access errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Registry lookup for '{key}' timed out after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },

    #[error("Failed to load context catalog {path}: {reason}")]
    CatalogLoad { path: String, reason: String },

    #[error("Invalid definition for '{key}': {reason}")]
    InvalidDefinition { key: String, reason: String }
}

/// Value coercion errors, recorded per key and never escalated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("Cannot coerce value to number for context '{key}': {value}")]
    NotNumeric { key: String, value: String },

    #[error("Cannot coerce value to boolean for context '{key}': {value}")]
    NotBoolean { key: String, value: String },

    #[error("Cannot parse JSON string for context '{key}': {reason}")]
    InvalidJson { key: String, reason: String },

    #[error("Value must be object or JSON string for context '{key}'")]
    NotJson { key: String },

    #[error("Context '{key}' has empty allowed_values")]
    EmptyAllowedValues { key: String }
}

/// Registry definition consistency errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("Unknown context type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("Enum context requires non-empty allowed_values")]
    EmptyAllowedValues,

    #[error("default_value '{value}' is not in allowed_values")]
    DefaultNotAllowed { value: String },

    #[error("default_value must be {expected} for type '{expected}'")]
    DefaultTypeMismatch { expected: String }
}

/// Internal resolution errors
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Precedence level {level} failed: {reason}")]
    LevelFailed { level: u8, reason: String },

    #[error("Resolution task for '{key}' failed: {reason}")]
    TaskFailed { key: String, reason: String }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_messages() {
        let err = RegistryError::Timeout {
            key: "actor_type".to_string(),
            timeout_ms: 250
        };
        assert_eq!(
            err.to_string(),
            "Registry lookup for 'actor_type' timed out after 250ms"
        );

        let err = RegistryError::Unavailable {
            reason: "connection refused".to_string()
        };
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_coercion_error_names_key() {
        let err = CoercionError::NotBoolean {
            key: "puede_practicar".to_string(),
            value: "\"maybe\"".to_string()
        };
        assert_eq!(
            err.to_string(),
            "Cannot coerce value to boolean for context 'puede_practicar': \"maybe\""
        );
    }

    #[test]
    fn test_definition_error_messages() {
        let err = DefinitionError::DefaultNotAllowed {
            value: "z".to_string()
        };
        assert_eq!(err.to_string(), "default_value 'z' is not in allowed_values");
        assert_eq!(
            DefinitionError::EmptyAllowedValues.to_string(),
            "Enum context requires non-empty allowed_values"
        );
    }

    #[test]
    fn test_resolution_error_messages() {
        let err = ResolutionError::LevelFailed {
            level: 6,
            reason: "boom".to_string()
        };
        assert_eq!(err.to_string(), "Precedence level 6 failed: boom");
    }
}
