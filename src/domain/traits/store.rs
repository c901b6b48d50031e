use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::application::errors::StorageError;

/// Store trait - durable `(section, key) -> JSON value` mapping
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, section: &str, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, section: &str, key: &str, value: Value) -> Result<(), StorageError>;
    async fn delete(&self, section: &str, key: &str) -> Result<bool, StorageError>;
    async fn section(&self, section: &str) -> Result<BTreeMap<String, Value>, StorageError>;

    // Per-module state lives under the `modules` section as `<module>.<key>`.
    async fn get_module_value(&self, module: &str, key: &str) -> Result<Option<Value>, StorageError> {
        self.get("modules", &format!("{}.{}", module, key)).await
    }

    async fn set_module_value(&self, module: &str, key: &str, value: Value) -> Result<(), StorageError> {
        self.set("modules", &format!("{}.{}", module, key), value).await
    }
}
