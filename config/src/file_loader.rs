//! # Configuration File Loading
//!
//! Loads configuration layers from TOML, YAML or JSON files.
//!
//! Format detection by file extension lives in [`FileFormat`], which the
//! context registry also uses for its catalog files.

use crate::layer::ConfigLayer;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(String),

    #[error("File has no extension")]
    NoExtension,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Structured file format, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Yaml,
    Json,
}

impl FileFormat {
    /// Detects the format from `path`'s extension, case-insensitively.
    ///
    /// `.toml`, `.yaml`, `.yml` and `.json` are recognised.
    pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or(ConfigFileError::NoExtension)?;

        match extension.to_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn parse<T: DeserializeOwned>(self, contents: &str) -> Result<T, ConfigFileError> {
        match self {
            Self::Toml => {
                toml::from_str(contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
            }
            Self::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| ConfigFileError::YamlParse(e.to_string())),
            Self::Json => serde_json::from_str(contents)
                .map_err(|e| ConfigFileError::JsonParse(e.to_string())),
        }
    }

    /// Reads `path` and parses it in this format.
    pub fn read<T: DeserializeOwned>(self, path: &Path) -> Result<T, ConfigFileError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;
        self.parse(&contents)
    }
}

/// Load a configuration layer from a TOML file.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads engine configuration from a TOML format file. Only the fields
/// present in the file are set on the returned layer.
///
/// ## Error Handling
/// Returns `ConfigFileError` for:
/// - File not found
/// - Invalid TOML syntax
pub fn load_from_toml(path: &Path) -> Result<ConfigLayer, ConfigFileError> {
    FileFormat::Toml.read(path)
}

/// Load a configuration layer from a YAML file.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads engine configuration from a YAML format file.
///
/// ## Error Handling
/// Returns `ConfigFileError` for:
/// - File not found
/// - Invalid YAML syntax
pub fn load_from_yaml(path: &Path) -> Result<ConfigLayer, ConfigFileError> {
    FileFormat::Yaml.read(path)
}

/// Load a configuration layer from file with auto-detection.
///
/// # M-CANONICAL-DOCS
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml`: YAML format
/// - `.yml`: YAML format
/// - `.json`: JSON format
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_file;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let layer = load_from_file(Path::new("engine.yaml"))?;
///     Ok(())
/// }
/// ```
pub fn load_from_file(path: &Path) -> Result<ConfigLayer, ConfigFileError> {
    FileFormat::from_path(path)?.read(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");

        let toml_content = r#"
[registry]
lookup_timeout_ms = 500
catalog_path = "contexts.yaml"

[resolution]
parallel = false
max_concurrent_keys = 4

[observability]
logging_level = "debug"
"#;
        fs::write(&path, toml_content).unwrap();

        let layer = load_from_toml(&path).unwrap();
        assert_eq!(layer.registry.lookup_timeout_ms, Some(500));
        assert_eq!(
            layer.registry.catalog_path.as_deref(),
            Some(Path::new("contexts.yaml"))
        );
        assert_eq!(layer.resolution.parallel, Some(false));
        assert_eq!(layer.resolution.max_concurrent_keys, Some(4));
        assert_eq!(layer.observability.logging_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.yml");

        let yaml_content = r#"
registry:
  lookup_timeout_ms: 750
resolution:
  max_concurrent_keys: 2
"#;
        fs::write(&path, yaml_content).unwrap();

        let layer = load_from_file(&path).unwrap();
        assert_eq!(layer.registry.lookup_timeout_ms, Some(750));
        assert_eq!(layer.resolution.max_concurrent_keys, Some(2));
        assert_eq!(layer.resolution.parallel, None);
        assert_eq!(layer.observability.logging_level, None);
    }

    #[test]
    fn test_load_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.JSON");
        fs::write(&path, r#"{"resolution": {"parallel": true}}"#).unwrap();

        let layer = load_from_file(&path).unwrap();
        assert_eq!(layer.resolution.parallel, Some(true));
        assert_eq!(layer.registry.lookup_timeout_ms, None);
    }

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path(Path::new("a.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(FileFormat::from_path(Path::new("a.YML")).unwrap(), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.yaml")).unwrap(), FileFormat::Yaml);
        assert_eq!(FileFormat::from_path(Path::new("a.json")).unwrap(), FileFormat::Json);

        let parsed: serde_json::Value = FileFormat::Yaml.parse("k: 1").unwrap();
        assert_eq!(parsed, serde_json::json!({ "k": 1 }));
        assert!(matches!(
            FileFormat::Json.parse::<serde_json::Value>("{"),
            Err(ConfigFileError::JsonParse(_))
        ));
    }

    #[test]
    fn test_load_from_file_missing() {
        let result = load_from_file(Path::new("/nonexistent/engine.toml"));
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file_unsupported_extension() {
        let result = load_from_file(Path::new("engine.ini"));
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(ext)) if ext == "ini"));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let result = load_from_file(Path::new("engine"));
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[registry\nlookup_timeout_ms = ").unwrap();

        let result = load_from_toml(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }
}
