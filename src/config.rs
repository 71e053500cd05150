//! Configuration for the validator
//!
//! The schema root, document root and base authority URI are explicit
//! runtime configuration, layered from:
//! - Default values
//! - Config file (validator.toml)
//! - Environment variables (VALIDATOR_*)
//!
//! ## Example config file (validator.toml):
//! ```toml
//! schema_root = "./schema/X800/types"
//! document_root = "./examples"
//! base_uri = "http://roche.com/rmd/"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Runtime configuration for a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Directory scanned recursively for schema files
    #[serde(default = "default_schema_root")]
    pub schema_root: PathBuf,

    /// Directory scanned recursively for documents to validate
    #[serde(default = "default_document_root")]
    pub document_root: PathBuf,

    /// Base authority every schema URI must fall under
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
}

fn default_schema_root() -> PathBuf {
    PathBuf::from("schema")
}

fn default_document_root() -> PathBuf {
    PathBuf::from("examples")
}

fn default_base_uri() -> String {
    "http://roche.com/rmd/".to_string()
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            schema_root: default_schema_root(),
            document_root: default_document_root(),
            base_uri: default_base_uri(),
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["validator.toml", ".validator.toml", "config/validator.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("com", "roche", "json-validator") {
            let xdg_config = config_dir.config_dir().join("validator.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("VALIDATOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Parse the configured base URI
    ///
    /// The base must parse as an absolute URL; schema resolution and the
    /// containment policy are both anchored on it.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_uri)
    }

    /// Schema root resolved against the current directory
    pub fn schema_root_path(&self) -> PathBuf {
        resolve_path(&self.schema_root)
    }

    /// Document root resolved against the current directory
    pub fn document_root_path(&self) -> PathBuf {
        resolve_path(&self.document_root)
    }
}

fn resolve_path(path: &PathBuf) -> PathBuf {
    if path.is_absolute() {
        path.clone()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidatorConfig::default();
        assert_eq!(config.base_uri, "http://roche.com/rmd/");
        assert!(config.base_url().is_ok());
    }

    #[test]
    fn test_serialize_config() {
        let config = ValidatorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("schema_root"));
        assert!(toml_str.contains("base_uri"));
    }

    #[test]
    fn test_invalid_base_uri_rejected() {
        let config = ValidatorConfig {
            base_uri: "not a uri".to_string(),
            ..Default::default()
        };
        assert!(config.base_url().is_err());
    }
}
