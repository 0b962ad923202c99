use crate::error::RuntimeResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use xprops_reactive::{DEFAULT_MAX_FLUSH_ITERATIONS, DEFAULT_NAMESPACE};

pub const DEFAULT_CONFIG_NAME: &str = "xprops.config.json";

/// Runtime configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Prefix of every directive attribute (`x-data`, `x-text`, ...)
    #[serde(default = "default_directive_prefix")]
    pub directive_prefix: String,

    /// Attribute carrying a component's prop declaration
    #[serde(default = "default_props_attribute")]
    pub props_attribute: String,

    /// Identifier descendants use to reach received props
    #[serde(default = "default_props_namespace")]
    pub props_namespace: String,

    #[serde(default = "default_max_flush_iterations")]
    pub max_flush_iterations: usize,
}

fn default_directive_prefix() -> String {
    "x-".to_string()
}

fn default_props_attribute() -> String {
    "x-props".to_string()
}

fn default_props_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_max_flush_iterations() -> usize {
    DEFAULT_MAX_FLUSH_ITERATIONS
}

impl RuntimeConfig {
    /// Load config from a directory, falling back to defaults
    pub fn load(dir: impl AsRef<Path>) -> RuntimeResult<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: RuntimeConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(RuntimeConfig::default())
        }
    }

    /// Full attribute name of a directive (`text` -> `x-text`)
    pub fn directive(&self, name: &str) -> String {
        format!("{}{}", self.directive_prefix, name)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            directive_prefix: default_directive_prefix(),
            props_attribute: default_props_attribute(),
            props_namespace: default_props_namespace(),
            max_flush_iterations: default_max_flush_iterations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "propsAttribute": "data-props",
            "propsNamespace": "$in"
        }"#;

        let config: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.props_attribute, "data-props");
        assert_eq!(config.props_namespace, "$in");
        assert_eq!(config.directive_prefix, "x-");
        assert_eq!(config.max_flush_iterations, DEFAULT_MAX_FLUSH_ITERATIONS);
    }

    #[test]
    fn test_directive_names() {
        let config = RuntimeConfig::default();
        assert_eq!(config.directive("data"), "x-data");
        assert_eq!(config.props_attribute, "x-props");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = std::env::temp_dir().join("xprops-config-missing");
        assert_eq!(RuntimeConfig::load(&dir).unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = std::env::temp_dir().join(format!("xprops-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(DEFAULT_CONFIG_NAME), r#"{"maxFlushIterations": 5}"#).unwrap();

        let config = RuntimeConfig::load(&dir).unwrap();
        assert_eq!(config.max_flush_iterations, 5);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
