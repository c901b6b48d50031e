//! Compiled-in module catalog

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;

use crate::application::errors::PluginError;
use crate::plugins::{Module, ModuleFactory, ModuleSource};

/// Table of modules built into the binary, keyed by identifier
pub struct BuiltinCatalog {
    factories: RwLock<BTreeMap<String, ModuleFactory>>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with(self, identifier: &str, factory: ModuleFactory) -> Self {
        self.register(identifier, factory);
        self
    }

    /// Add or replace a factory
    pub fn register(&self, identifier: &str, factory: ModuleFactory) {
        match self.factories.write() {
            Ok(mut factories) => {
                factories.insert(identifier.to_string(), factory);
            }
            Err(_) => tracing::error!("Catalog lock poisoned; dropping {}", identifier),
        }
    }

    fn factory(&self, identifier: &str) -> Option<ModuleFactory> {
        self.factories.read().ok()?.get(identifier).copied()
    }

    pub fn len(&self) -> usize {
        self.factories.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BuiltinCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleSource for BuiltinCatalog {
    fn name(&self) -> &str {
        "builtin"
    }

    fn list_units(&self) -> Vec<String> {
        self.factories
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn contains(&self, identifier: &str) -> bool {
        self.factory(identifier).is_some()
    }

    fn instantiate(&self, identifier: &str) -> Result<Box<dyn Module>, PluginError> {
        let factory = self
            .factory(identifier)
            .ok_or_else(|| PluginError::NotFound(identifier.to_string()))?;

        catch_unwind(AssertUnwindSafe(factory))
            .map_err(|_| PluginError::Load(format!("{} panicked during construction", identifier)))
    }
}
