//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GeoSwitchConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Yaml(serde_yaml::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Toml(e) => write!(f, "Parse error: {}", e),
            ConfigError::Yaml(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Supported config file syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension; anything but `.yaml`/`.yml` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

/// Load and validate configuration from a TOML or YAML file.
pub fn load_config(path: &Path) -> Result<GeoSwitchConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

/// Parse, normalize and validate configuration text.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<GeoSwitchConfig, ConfigError> {
    let mut config: GeoSwitchConfig = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::Toml)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(ConfigError::Yaml)?,
    };

    config
        .routing
        .normalize()
        .map_err(|e| ConfigError::Validation(vec![e]))?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
