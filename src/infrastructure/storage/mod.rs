//! File-based storage implementation

pub mod json_file;
pub mod sessions;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::traits::Store;

pub use json_file::{read_json_tolerant, write_json_atomic};
pub use sessions::{SessionInfo, SessionStorage};

const DEFAULT_SECTIONS: [&str; 5] = ["config", "modules", "users", "chats", "misc"];

/// Counters reported by `.stats` / `.sysinfo`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sections: usize,
    pub file_size: u64,
    pub module_records: usize,
    pub user_records: usize,
    pub chat_records: usize,
}

/// JSON file-backed key-value store.
///
/// The whole document sits in memory behind one lock and is rewritten on
/// every mutation.
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonStore {
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join("database.json");

        let (data, fresh) = match read_json_tolerant::<Map<String, Value>>(&path).await {
            Ok(Some(data)) => (data, false),
            Ok(None) => (default_document(), true),
            Err(e) => {
                tracing::error!("JSON store unreadable, starting empty: {}", e);
                (default_document(), false)
            }
        };

        if fresh {
            write_json_atomic(&path, &data).await?;
        }

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &Map<String, Value>) -> Result<(), StorageError> {
        write_json_atomic(&self.path, data).await.map_err(|e| {
            tracing::error!("JSON store save failed: {}", e);
            e
        })
    }

    async fn get_nested(&self, section: &str, entry: &str, key: &str) -> Option<Value> {
        let data = self.data.lock().await;
        data.get(section)?.get(entry)?.get(key).cloned()
    }

    async fn set_nested(&self, section: &str, entry: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut data = self.data.lock().await;
        let section = object_entry(&mut data, section)?;
        object_entry(section, entry)?.insert(key.to_string(), value);
        self.persist(&data).await
    }

    pub async fn get_user_data(&self, user_id: i64, key: &str) -> Option<Value> {
        self.get_nested("users", &user_id.to_string(), key).await
    }

    pub async fn set_user_data(&self, user_id: i64, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_nested("users", &user_id.to_string(), key, value).await
    }

    pub async fn get_chat_data(&self, chat_id: i64, key: &str) -> Option<Value> {
        self.get_nested("chats", &chat_id.to_string(), key).await
    }

    pub async fn set_chat_data(&self, chat_id: i64, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_nested("chats", &chat_id.to_string(), key, value).await
    }

    pub async fn stats(&self) -> StoreStats {
        let data = self.data.lock().await;
        let file_size = tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let count_nested = |section: &str| -> usize {
            data.get(section)
                .and_then(Value::as_object)
                .map(|entries| {
                    entries
                        .values()
                        .map(|v| v.as_object().map(|o| o.len()).unwrap_or(0))
                        .sum()
                })
                .unwrap_or(0)
        };

        StoreStats {
            sections: data.len(),
            file_size,
            module_records: data
                .get("modules")
                .and_then(Value::as_object)
                .map(|m| m.len())
                .unwrap_or(0),
            user_records: count_nested("users"),
            chat_records: count_nested("chats"),
        }
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn get(&self, section: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let data = self.data.lock().await;
        Ok(data.get(section).and_then(|s| s.get(key)).cloned())
    }

    async fn set(&self, section: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut data = self.data.lock().await;
        object_entry(&mut data, section)?.insert(key.to_string(), value);
        self.persist(&data).await
    }

    async fn delete(&self, section: &str, key: &str) -> Result<bool, StorageError> {
        let mut data = self.data.lock().await;
        let removed = data
            .get_mut(section)
            .and_then(Value::as_object_mut)
            .and_then(|s| s.remove(key))
            .is_some();
        if removed {
            self.persist(&data).await?;
        }
        Ok(removed)
    }

    async fn section(&self, section: &str) -> Result<BTreeMap<String, Value>, StorageError> {
        let data = self.data.lock().await;
        Ok(data
            .get(section)
            .and_then(Value::as_object)
            .map(|s| s.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

fn default_document() -> Map<String, Value> {
    DEFAULT_SECTIONS
        .iter()
        .map(|s| (s.to_string(), Value::Object(Map::new())))
        .collect()
}

/// Object under `key`, created (or replaced if it holds a non-object) on demand.
fn object_entry<'a>(
    data: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>, StorageError> {
    let slot = data
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        tracing::warn!("Replacing non-object value under {}", key);
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
        .ok_or_else(|| StorageError::Corrupt(format!("{} is not an object", key)))
}
