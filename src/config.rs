use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::generator::DesignPattern;
use crate::schema::is_ncname;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AxiConfig {
    pub generator: GeneratorConfig,
    pub model: ModelConfig,
}

/// Schema generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Design pattern newly registered models start with
    pub default_pattern: Option<DesignPattern>,
    /// Suffix appended to element names for synthesized complex types
    pub type_suffix: String,
}

/// Model maintenance settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Proxy chains deeper than this are logged
    pub max_proxy_depth: usize,
    /// Run the invariant checker after every sync
    pub verify_after_sync: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_pattern: None,
            type_suffix: "Type".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_proxy_depth: 16,
            verify_after_sync: true,
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment
    pub fn load_config(explicit: Option<&Path>) -> Result<AxiConfig> {
        let mut config = AxiConfig::default();

        if let Some(path) = explicit {
            let file_config = Self::load_from_file(path)?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file()? {
            config = Self::merge_configs(config, found_config);
        }

        config = Self::apply_environment_overrides(config)?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<AxiConfig> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<AxiConfig>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Result<Option<AxiConfig>> {
        let config_names = [
            "xml-axi.toml",
            "xml-axi.json",
            ".xml-axi.toml",
            ".xml-axi.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path)?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("xml-axi");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path)?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: AxiConfig) -> Result<AxiConfig> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: AxiConfig,
    ) -> Result<AxiConfig> {
        if let Some(pattern) = env.get("XML_AXI_DESIGN_PATTERN") {
            config.generator.default_pattern = Some(pattern.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid XML_AXI_DESIGN_PATTERN value: {}",
                    pattern
                ))
            })?);
        }

        if let Some(suffix) = env.get("XML_AXI_TYPE_SUFFIX") {
            config.generator.type_suffix = suffix;
        }

        if let Some(depth) = env.get("XML_AXI_MAX_PROXY_DEPTH") {
            config.model.max_proxy_depth = depth.parse().map_err(|_| {
                ConfigError::Environment(format!("Invalid XML_AXI_MAX_PROXY_DEPTH value: {}", depth))
            })?;
        }

        if let Some(verify) = env.get("XML_AXI_VERIFY_AFTER_SYNC") {
            config.model.verify_after_sync = verify.parse().map_err(|_| {
                ConfigError::Environment(format!(
                    "Invalid XML_AXI_VERIFY_AFTER_SYNC value: {}",
                    verify
                ))
            })?;
        }

        Ok(config)
    }

    /// Merge two configurations (second takes precedence for non-None values)
    pub fn merge_configs(mut base: AxiConfig, override_config: AxiConfig) -> AxiConfig {
        if override_config.generator.default_pattern.is_some() {
            base.generator.default_pattern = override_config.generator.default_pattern;
        }
        if !override_config.generator.type_suffix.is_empty() {
            base.generator.type_suffix = override_config.generator.type_suffix;
        }

        base.model.max_proxy_depth = override_config.model.max_proxy_depth;
        base.model.verify_after_sync = override_config.model.verify_after_sync;

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &AxiConfig) -> Result<()> {
        let suffix = &config.generator.type_suffix;
        if suffix.is_empty() {
            return Err(ConfigError::Validation(
                "Type suffix must not be empty".to_string(),
            ));
        }
        // The suffix is appended to an element name, so it only has to be a valid name tail
        if !is_ncname(&format!("a{}", suffix)) {
            return Err(ConfigError::Validation(format!(
                "Type suffix is not a valid XML name fragment: {}",
                suffix
            )));
        }

        if config.model.max_proxy_depth == 0 {
            return Err(ConfigError::Validation(
                "Maximum proxy depth must be greater than 0".to_string(),
            ));
        }
        if config.model.max_proxy_depth > 1024 {
            return Err(ConfigError::Validation(
                "Maximum proxy depth cannot exceed 1024".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Mock environment variable provider for testing
    #[derive(Default)]
    struct MockEnvProvider {
        vars: HashMap<String, String>,
    }

    impl MockEnvProvider {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
            }
        }

        fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
            self.vars.insert(key.into(), value.into());
        }
    }

    impl EnvProvider for MockEnvProvider {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AxiConfig::default();

        assert_eq!(config.generator.default_pattern, None);
        assert_eq!(config.generator.type_suffix, "Type");
        assert_eq!(config.model.max_proxy_depth, 16);
        assert!(config.model.verify_after_sync);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let toml_content = r#"
[generator]
default_pattern = "garden-of-eden"
type_suffix = "_T"

[model]
max_proxy_depth = 4
verify_after_sync = false
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert_eq!(
            config.generator.default_pattern,
            Some(DesignPattern::GardenOfEden)
        );
        assert_eq!(config.generator.type_suffix, "_T");
        assert_eq!(config.model.max_proxy_depth, 4);
        assert!(!config.model.verify_after_sync);
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let json_content = r#"{
            "generator": { "default_pattern": "venetian-blind" },
            "model": { "max_proxy_depth": 32 }
        }"#;
        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert_eq!(
            config.generator.default_pattern,
            Some(DesignPattern::VenetianBlind)
        );
        // Missing fields fall back to defaults
        assert_eq!(config.generator.type_suffix, "Type");
        assert_eq!(config.model.max_proxy_depth, 32);
        assert!(config.model.verify_after_sync);
    }

    #[test]
    fn test_load_config_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("axirc");
        fs::write(&config_path, "[model]\nmax_proxy_depth = 8\n").unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();
        assert_eq!(config.model.max_proxy_depth, 8);
    }

    #[test]
    fn test_unsupported_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "generator: {}").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[generator\ntype_suffix = ").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
    }

    #[test]
    fn test_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{ \"generator\": ").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::JsonParsing(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let mut mock_env = MockEnvProvider::new();
        mock_env.set("XML_AXI_DESIGN_PATTERN", "salami-slice");
        mock_env.set("XML_AXI_TYPE_SUFFIX", "Kind");
        mock_env.set("XML_AXI_MAX_PROXY_DEPTH", "3");
        mock_env.set("XML_AXI_VERIFY_AFTER_SYNC", "false");

        let config =
            ConfigManager::apply_environment_overrides_with(&mock_env, AxiConfig::default())
                .unwrap();

        assert_eq!(
            config.generator.default_pattern,
            Some(DesignPattern::SalamiSlice)
        );
        assert_eq!(config.generator.type_suffix, "Kind");
        assert_eq!(config.model.max_proxy_depth, 3);
        assert!(!config.model.verify_after_sync);
    }

    #[test]
    fn test_invalid_environment_values() {
        let mut mock_env = MockEnvProvider::new();
        mock_env.set("XML_AXI_DESIGN_PATTERN", "matryoshka");

        let result =
            ConfigManager::apply_environment_overrides_with(&mock_env, AxiConfig::default());
        assert!(matches!(result, Err(ConfigError::Environment(msg)) if msg.contains("matryoshka")));

        let mut mock_env = MockEnvProvider::new();
        mock_env.set("XML_AXI_MAX_PROXY_DEPTH", "deep");
        let result =
            ConfigManager::apply_environment_overrides_with(&mock_env, AxiConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_configs() {
        let base = AxiConfig::default();
        let mut override_config = AxiConfig::default();
        override_config.generator.default_pattern = Some(DesignPattern::RussianDoll);
        override_config.model.max_proxy_depth = 2;

        let merged = ConfigManager::merge_configs(base, override_config);
        assert_eq!(
            merged.generator.default_pattern,
            Some(DesignPattern::RussianDoll)
        );
        assert_eq!(merged.generator.type_suffix, "Type");
        assert_eq!(merged.model.max_proxy_depth, 2);

        // An unset pattern in the override keeps the base value
        let mut base = AxiConfig::default();
        base.generator.default_pattern = Some(DesignPattern::VenetianBlind);
        let merged = ConfigManager::merge_configs(base, AxiConfig::default());
        assert_eq!(
            merged.generator.default_pattern,
            Some(DesignPattern::VenetianBlind)
        );
    }

    #[test]
    fn test_validate_config() {
        let mut config = AxiConfig::default();
        config.generator.type_suffix = String::new();
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AxiConfig::default();
        config.generator.type_suffix = "Type Def".to_string();
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AxiConfig::default();
        config.generator.type_suffix = "-v2".to_string();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut config = AxiConfig::default();
        config.model.max_proxy_depth = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AxiConfig::default();
        config.model.max_proxy_depth = 4096;
        assert!(ConfigManager::validate_config(&config).is_err());
    }
}
