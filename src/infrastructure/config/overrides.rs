//! Runtime config overrides kept in the key-value store

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Config;
use crate::application::errors::{BotError, ConfigError, StorageError};
use crate::domain::traits::Store;

const SECTION: &str = "config";
const KEY: &str = "overrides";

/// `.config get/set/reset/list` backend.
///
/// Overrides form one nested JSON object addressed by dotted paths such as
/// `userbot.prefix`. Reads fall back to the file config.
pub struct ConfigOverrides {
    store: Arc<dyn Store>,
    base: Config,
}

impl ConfigOverrides {
    pub fn new(store: Arc<dyn Store>, base: Config) -> Self {
        Self { store, base }
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        Ok(match self.store.get(SECTION, KEY).await? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        })
    }

    fn defaults(&self) -> Value {
        serde_json::to_value(&self.base).unwrap_or(Value::Null)
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let overrides = Value::Object(self.load().await?);
        let defaults = self.defaults();
        Ok(lookup(&overrides, path)
            .or_else(|| lookup(&defaults, path))
            .cloned())
    }

    /// Store `raw` at `path`, parsed as JSON when possible and as a string otherwise.
    pub async fn set(&self, path: &str, raw: &str) -> Result<Value, StorageError> {
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        let mut overrides = self.load().await?;
        insert(&mut overrides, path, value.clone());
        self.store.set(SECTION, KEY, Value::Object(overrides)).await?;

        tracing::info!("Config override set: {}", path);
        Ok(value)
    }

    /// Drop the override at `path`; returns the file value now in effect.
    pub async fn reset(&self, path: &str) -> Result<Option<Value>, StorageError> {
        let mut overrides = self.load().await?;
        if remove(&mut overrides, path) {
            self.store.set(SECTION, KEY, Value::Object(overrides)).await?;
            tracing::info!("Config override reset: {}", path);
        }
        Ok(lookup(&self.defaults(), path).cloned())
    }

    /// Flattened view of file config with overrides merged on top
    pub async fn list(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let mut merged = self.defaults();
        merge(&mut merged, &Value::Object(self.load().await?));

        let mut out = BTreeMap::new();
        flatten("", &merged, &mut out);
        Ok(out)
    }

    /// File config with stored overrides applied
    pub async fn effective(&self) -> Result<Config, BotError> {
        let overrides = self.load().await?;
        Ok(apply(&self.base, &Value::Object(overrides))?)
    }
}

/// Merge `overrides` into `base`, rejecting results that no longer form a valid config.
pub fn apply(base: &Config, overrides: &Value) -> Result<Config, ConfigError> {
    let mut merged =
        serde_json::to_value(base).map_err(|e| ConfigError::Parse(e.to_string()))?;
    merge(&mut merged, overrides);
    let config: Config = serde_json::from_value(merged)
        .map_err(|e| ConfigError::InvalidValue(format!("override does not fit config: {}", e)))?;
    config.validate()?;
    Ok(config)
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, part| node.as_object()?.get(part))
}

fn insert(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut node = root;
    for part in parts {
        let slot = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        node = next;
    }
    node.insert(last.to_string(), value);
}

fn remove(root: &mut Map<String, Value>, path: &str) -> bool {
    match path.split_once('.') {
        None => root.remove(path).is_some(),
        Some((head, rest)) => {
            let Some(Value::Object(child)) = root.get_mut(head) else {
                return false;
            };
            let removed = remove(child, rest);
            if child.is_empty() {
                root.remove(head);
            }
            removed
        }
    }
}

fn merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        _ => {
            out.insert(prefix.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::JsonStore;
    use serde_json::json;

    async fn overrides(dir: &tempfile::TempDir) -> ConfigOverrides {
        let store = JsonStore::open(dir.path()).await.unwrap();
        ConfigOverrides::new(Arc::new(store), Config::default())
    }

    #[tokio::test]
    async fn get_falls_back_to_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = overrides(&dir).await;

        assert_eq!(overrides.get("userbot.prefix").await.unwrap(), Some(json!(".")));
        assert_eq!(overrides.get("no.such.key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_parses_json_then_falls_back_to_string() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = overrides(&dir).await;

        assert_eq!(overrides.set("security.rate-limit.max-requests", "5").await.unwrap(), json!(5));
        assert_eq!(overrides.set("userbot.name", "my bot").await.unwrap(), json!("my bot"));

        let config = overrides.effective().await.unwrap();
        assert_eq!(config.security.rate_limit.max_requests, 5);
        assert_eq!(config.userbot.name, "my bot");
    }

    #[tokio::test]
    async fn reset_restores_default() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = overrides(&dir).await;

        overrides.set("userbot.prefix", "!").await.unwrap();
        assert_eq!(overrides.get("userbot.prefix").await.unwrap(), Some(json!("!")));

        assert_eq!(overrides.reset("userbot.prefix").await.unwrap(), Some(json!(".")));
        assert_eq!(overrides.get("userbot.prefix").await.unwrap(), Some(json!(".")));
    }

    #[tokio::test]
    async fn list_shows_merged_view() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = overrides(&dir).await;
        overrides.set("userbot.emoji", "x").await.unwrap();

        let all = overrides.list().await.unwrap();
        assert_eq!(all.get("userbot.emoji"), Some(&json!("x")));
        assert_eq!(all.get("security.min-principal-id"), Some(&json!(1000)));
    }

    #[test]
    fn ill_typed_override_is_rejected() {
        let result = apply(&Config::default(), &json!({"security": {"min-principal-id": "lots"}}));
        assert!(result.is_err());
    }
}
