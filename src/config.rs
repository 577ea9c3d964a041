use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dbconn::DbVersion;
use crate::logging::LogLevel;
use crate::operating;

fn default_db_name() -> String {
    "testdb".to_string()
}

fn default_role() -> String {
    "testrole".to_string()
}

fn default_server_version() -> String {
    "5.1.0".to_string()
}

fn default_program_name() -> String {
    "testProgram".to_string()
}

/// Values the test helpers use when building mock connections and loggers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Database name given to the mock connection
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Role the mock driver connects as
    #[serde(default = "default_role")]
    pub role: String,

    /// Version the mock connection reports
    #[serde(default = "default_server_version")]
    pub server_version: String,

    /// Program name shown in captured log lines
    #[serde(default = "default_program_name")]
    pub program_name: String,

    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            db_name: default_db_name(),
            role: default_role(),
            server_version: default_server_version(),
            program_name: default_program_name(),
            log_level: LogLevel::default(),
        }
    }
}

impl HarnessConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HarnessConfig =
            toml::from_str(content).context("Failed to parse harness config")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: HarnessConfig =
            serde_json::from_str(content).context("Failed to parse harness config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json` or `.toml` file, read through [`operating`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = operating::read_to_string(path)
            .with_context(|| format!("Failed to read harness config: {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize harness config")
    }

    /// Check that the server version is a full semantic version
    pub fn validate(&self) -> Result<()> {
        DbVersion::parse(&self.server_version)
            .context("Invalid server_version in harness config")?;
        Ok(())
    }
}
