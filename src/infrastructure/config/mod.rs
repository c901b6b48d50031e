//! Configuration management

pub mod overrides;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::application::errors::ConfigError;

pub use overrides::ConfigOverrides;

/// Userbot configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub userbot: UserbotConfig,
    pub account: AccountConfig,
    pub modules: ModulesConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserbotConfig {
    pub name: String,
    pub version: String,
    pub emoji: String,
    pub prefix: String,
}

/// Identity of the session account when no network transport supplies one
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AccountConfig {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ModulesConfig {
    pub directory: PathBuf,
    pub auto_load: bool,
    pub load_on_startup: Vec<String>,
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    pub min_principal_id: i64,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for UserbotConfig {
    fn default() -> Self {
        Self {
            name: "Argent UserBot".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            emoji: "⚗️".to_string(),
            prefix: ".".to_string(),
        }
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./modules"),
            auto_load: true,
            load_on_startup: Vec::new(),
            builtin: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_principal_id: 1000,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_seconds: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".argent_data"),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `ARGENT_*` environment overrides applied
    pub fn load_env() -> Self {
        Config::default().with_env()
    }

    /// Apply `ARGENT_*` environment overrides on top of this config
    pub fn with_env(mut self) -> Self {
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    pub(crate) fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("ARGENT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        if let Some(prefix) = var("ARGENT_PREFIX") {
            if !prefix.is_empty() {
                self.userbot.prefix = prefix;
            }
        }

        if let Some(id) = var("ARGENT_ACCOUNT_ID") {
            match id.trim().parse() {
                Ok(id) => self.account.id = id,
                Err(_) => tracing::warn!("Ignoring non-numeric ARGENT_ACCOUNT_ID: {}", id),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.userbot.prefix.is_empty() {
            return Err(ConfigError::MissingField("userbot.prefix".to_string()));
        }
        if self.userbot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(
                "userbot.prefix must not contain whitespace".to_string(),
            ));
        }
        if self.security.min_principal_id < 1 {
            return Err(ConfigError::InvalidValue(
                "security.min-principal-id must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Write a default config file, refusing to clobber an existing one.
    pub fn init_config(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::InvalidValue(format!(
                "{} already exists",
                path.display()
            )));
        }
        let content = serde_yaml::to_string(&Config::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::Parse(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "userbot:\n  prefix: \"!\"\nmodules:\n  auto-load: false\n  load-on-startup: [hello]\n",
        )
        .unwrap();

        assert_eq!(config.userbot.prefix, "!");
        assert_eq!(config.userbot.name, "Argent UserBot");
        assert!(!config.modules.auto_load);
        assert_eq!(config.modules.load_on_startup, vec!["hello".to_string()]);
        assert_eq!(config.security.min_principal_id, 1000);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "ARGENT_PREFIX" => Some("/".to_string()),
            "ARGENT_ACCOUNT_ID" => Some("4242".to_string()),
            _ => None,
        });

        assert_eq!(config.userbot.prefix, "/");
        assert_eq!(config.account.id, 4242);
        assert_eq!(config.storage.data_dir, PathBuf::from(".argent_data"));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let mut config = Config::default();
        config.userbot.prefix.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn init_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        Config::init_config(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        assert!(Config::init_config(&path).is_err());
    }
}
