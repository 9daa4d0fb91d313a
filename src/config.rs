//! File and environment configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::database::{DatabaseConfig, DatabaseType};
use crate::error::ConfigError;

/// Overrides `database.database` (path or database name)
pub const ENV_DATABASE: &str = "AIODB_DATABASE";
/// Overrides `database.db_type`
pub const ENV_DB_TYPE: &str = "AIODB_DB_TYPE";

/// Transaction policy copied into every connection an adapter opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Each statement commits on its own. When false, a transaction opens
    /// before the first statement and stays open until commit/rollback.
    pub autocommit: bool,
    /// Roll an open transaction back as soon as a statement inside it fails
    pub autorollback: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            autocommit: true,
            autorollback: false,
        }
    }
}

/// Everything needed to build and connect an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub adapter: AdapterOptions,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load settings from a TOML file, then apply environment overrides
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConfigError::Invalid(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut settings = Self::from_toml_str(&content)?;
        settings.apply_env_overrides()?;
        tracing::debug!(
            path = %path.display(),
            db_type = %settings.database.db_type,
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Apply `AIODB_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_type) = lookup(ENV_DB_TYPE) {
            self.database.db_type =
                db_type
                    .parse::<DatabaseType>()
                    .map_err(|e| ConfigError::InvalidEnvVar {
                        name: ENV_DB_TYPE.to_string(),
                        reason: e.to_string(),
                    })?;
        }

        if let Some(database) = lookup(ENV_DATABASE) {
            if database.trim().is_empty() {
                return Err(ConfigError::InvalidEnvVar {
                    name: ENV_DATABASE.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            self.database.database = database;
        }

        Ok(())
    }
}
