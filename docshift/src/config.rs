use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_LEDGER_COLLECTION;

/// Project context for docshift commands
pub struct ProjectContext {
    /// Root directory of the project (where Cargo.toml is)
    pub project_root: PathBuf,
    /// Path to config file
    pub config_path: PathBuf,
    /// Loaded configuration, or defaults when no config file exists
    pub config: DocshiftConfig,
}

/// Configuration stored in .docshift/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocshiftConfig {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Key prefix every document lives under
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_ledger_collection")]
    pub ledger_collection: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            ledger_collection: default_ledger_collection(),
        }
    }
}

fn default_prefix() -> String {
    "docshift".to_string()
}

fn default_ledger_collection() -> String {
    DEFAULT_LEDGER_COLLECTION.to_string()
}

impl ProjectContext {
    /// Find and load project context from current directory or ancestors
    pub fn find() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::find_from(&current_dir)
    }

    /// Find project context starting from the given directory.
    ///
    /// Outside a Cargo project the start directory is used as the root, so the binary also
    /// works from a deployment directory that only carries `.docshift/config.toml`.
    pub fn find_from(start: &Path) -> Result<Self> {
        let project_root = Self::find_project_root(start).unwrap_or_else(|| start.to_path_buf());
        Self::from_root(project_root)
    }

    /// Create context from a known project root
    pub fn from_root(project_root: PathBuf) -> Result<Self> {
        let config_path = project_root.join(".docshift").join("config.toml");

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).context("Failed to read config.toml")?;
            toml::from_str(&content).context("Failed to parse config.toml")?
        } else {
            DocshiftConfig::default()
        };

        Ok(Self {
            project_root,
            config_path,
            config,
        })
    }

    fn find_project_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join("Cargo.toml").exists() || dir.join(".docshift").is_dir())
            .map(Path::to_path_buf)
    }

    pub fn has_config_file(&self) -> bool {
        self.config_path.exists()
    }

    /// Get the Redis URL, expanding environment variables
    pub fn redis_url(&self) -> Result<String> {
        expand_env(&self.config.redis.url)
    }

    pub fn prefix(&self) -> &str {
        &self.config.store.prefix
    }

    pub fn ledger_collection(&self) -> &str {
        &self.config.store.ledger_collection
    }
}

/// Expands a whole-value `${VAR}` reference; anything else is returned unchanged.
fn expand_env(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => {
            std::env::var(var_name).with_context(|| format!("Environment variable {var_name} not set"))
        }
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DocshiftConfig::default();
        assert_eq!(config.redis.url, "${REDIS_URL}");
        assert_eq!(config.store.prefix, "docshift");
        assert_eq!(config.store.ledger_collection, "_migrations");
    }

    #[test]
    fn test_config_serialization() {
        let config = DocshiftConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("prefix"));
        assert!(toml_str.contains("ledger_collection"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DocshiftConfig = toml::from_str("[store]\nprefix = \"app\"\n").unwrap();
        assert_eq!(config.store.prefix, "app");
        assert_eq!(config.store.ledger_collection, "_migrations");
        assert_eq!(config.redis.url, "${REDIS_URL}");
    }

    #[test]
    fn test_loads_config_from_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"app\"\n").unwrap();
        std::fs::create_dir(dir.path().join(".docshift")).unwrap();
        std::fs::write(
            dir.path().join(".docshift/config.toml"),
            "[redis]\nurl = \"redis://db:6379\"\n\n[store]\nledger_collection = \"history\"\n",
        )
        .unwrap();
        let nested = dir.path().join("src/migrations");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = ProjectContext::find_from(&nested).unwrap();
        assert!(ctx.has_config_file());
        assert_eq!(ctx.project_root, dir.path());
        assert_eq!(ctx.redis_url().unwrap(), "redis://db:6379");
        assert_eq!(ctx.ledger_collection(), "history");
        assert_eq!(ctx.prefix(), "docshift");
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProjectContext::from_root(dir.path().to_path_buf()).unwrap();
        assert!(!ctx.has_config_file());
        assert_eq!(ctx.ledger_collection(), "_migrations");
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".docshift")).unwrap();
        std::fs::write(dir.path().join(".docshift/config.toml"), "[store\nprefix =").unwrap();
        assert!(ProjectContext::from_root(dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_expand_env() {
        assert_eq!(expand_env("redis://localhost").unwrap(), "redis://localhost");
        assert!(expand_env("${DOCSHIFT_TEST_SURELY_UNSET_VAR}").is_err());
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env("${PATH}").unwrap(), path);
    }
}
