//! Module registry - owns loaded modules and the global command table

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

use crate::application::errors::{BotError, PluginError, PluginResult};
use crate::domain::entities::{Category, CommandEntry, CommandTable, Message, ModuleDescriptor};
use crate::infrastructure::utils::Utils;
use crate::plugins::trait_def::{Invocation, Module, ModuleContext, ModuleSource};

/// Which units a startup pass should try
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// Every unit visible to any source
    Discover,
    /// Exactly these identifiers, in order
    Explicit(Vec<String>),
}

struct LoadedModule {
    descriptor: ModuleDescriptor,
    instance: Arc<dyn Module>,
}

#[derive(Default)]
struct RegistryState {
    modules: BTreeMap<String, LoadedModule>,
    commands: CommandTable,
}

/// Process-wide module registry.
///
/// `lifecycle` serializes load/unload/reload end to end, including the
/// hooks. `state` is only held for short synchronous sections and never
/// across an await.
pub struct ModuleRegistry {
    // Dropped first: instances before the sources that produced them.
    state: RwLock<RegistryState>,
    sources: Vec<Arc<dyn ModuleSource>>,
    context: ModuleContext,
    prefix: String,
    lifecycle: tokio::sync::Mutex<()>,
}

impl ModuleRegistry {
    pub fn new(context: ModuleContext, prefix: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            sources: Vec::new(),
            context,
            prefix: prefix.into(),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Add a source; earlier sources win when identifiers collide.
    pub fn with_source(mut self, source: Arc<dyn ModuleSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn read_state(&self) -> PluginResult<std::sync::RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|_| PluginError::Internal("Registry lock poisoned".to_string()))
    }

    fn write_state(&self) -> PluginResult<std::sync::RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|_| PluginError::Internal("Registry lock poisoned".to_string()))
    }

    fn is_loaded(&self, identifier: &str) -> bool {
        self.read_state()
            .map(|s| s.modules.contains_key(identifier))
            .unwrap_or(false)
    }

    /// Load every unit the plan names. Individual failures are logged and skipped.
    ///
    /// Returns how many modules were loaded by this pass.
    pub async fn discover_and_load_all(&self, plan: &LoadPlan) -> usize {
        let candidates: Vec<String> = match plan {
            LoadPlan::Discover => {
                let mut seen = HashSet::new();
                self.sources
                    .iter()
                    .flat_map(|source| source.list_units())
                    .filter(|id| seen.insert(id.clone()))
                    .collect()
            }
            LoadPlan::Explicit(list) => list.clone(),
        };

        let mut loaded = 0;
        for identifier in candidates {
            if identifier.starts_with('_') {
                debug!("Skipping private unit {}", identifier);
                continue;
            }
            if self.is_loaded(&identifier) {
                continue;
            }
            match self.load(&identifier).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Skipping module {}: {}", identifier, e),
            }
        }

        info!("Module pass finished: {} loaded, {} total", loaded, self.list_all().len());
        loaded
    }

    pub async fn load(&self, identifier: &str) -> PluginResult<ModuleDescriptor> {
        let _guard = self.lifecycle.lock().await;
        self.load_locked(identifier).await
    }

    pub async fn unload(&self, identifier: &str) -> PluginResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked(identifier).await
    }

    /// Unload (when present) then load again. A failed load leaves the module absent.
    pub async fn reload(&self, identifier: &str) -> PluginResult<ModuleDescriptor> {
        let _guard = self.lifecycle.lock().await;
        if self.is_loaded(identifier) {
            self.unload_locked(identifier).await?;
        }
        self.load_locked(identifier).await
    }

    fn instantiate(&self, identifier: &str) -> PluginResult<Box<dyn Module>> {
        let source = self
            .sources
            .iter()
            .find(|source| source.contains(identifier))
            .ok_or_else(|| PluginError::NotFound(identifier.to_string()))?;

        debug!("Instantiating {} from {} source", identifier, source.name());
        source.instantiate(identifier)
    }

    async fn load_locked(&self, identifier: &str) -> PluginResult<ModuleDescriptor> {
        if self.is_loaded(identifier) {
            return Err(PluginError::AlreadyLoaded(identifier.to_string()));
        }

        let mut instance = self.instantiate(identifier)?;
        instance.base_mut().inject(self.context.clone());
        let instance: Arc<dyn Module> = Arc::from(instance);

        let entries: Vec<CommandEntry> = instance
            .base()
            .commands()
            .iter()
            .map(|declared| CommandEntry {
                qualified_name: format!("{}{}", self.prefix, declared.name),
                description: declared.description.clone(),
                owner_module: identifier.to_string(),
                handler: declared.handler.clone(),
            })
            .collect();
        let names: Vec<String> = entries.iter().map(|e| e.qualified_name.clone()).collect();
        let descriptor = ModuleDescriptor::new(identifier, instance.meta(), names.clone());

        {
            let mut state = self.write_state()?;
            if let Some((command, owner)) = state.commands.find_conflict(&names, identifier) {
                return Err(PluginError::CommandConflict { command, owner });
            }
            for entry in entries {
                state.commands.insert(entry);
            }
            state.modules.insert(
                identifier.to_string(),
                LoadedModule {
                    descriptor: descriptor.clone(),
                    instance: instance.clone(),
                },
            );
        }

        let hook = {
            let instance = instance.clone();
            tokio::spawn(async move { instance.on_load().await })
        };
        let failure = match hook.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) if e.is_panic() => Some("on_load panicked".to_string()),
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            let mut state = self.write_state()?;
            state.commands.remove_owned_by(identifier);
            state.modules.remove(identifier);
            error!("on_load failed for {}, rolled back: {}", identifier, reason);
            return Err(PluginError::Load(format!("{}: {}", identifier, reason)));
        }

        info!(
            "Loaded module {} v{} ({} commands)",
            descriptor.name,
            descriptor.version,
            descriptor.commands.len()
        );
        Ok(descriptor)
    }

    async fn unload_locked(&self, identifier: &str) -> PluginResult<()> {
        let instance = self
            .read_state()?
            .modules
            .get(identifier)
            .map(|m| m.instance.clone())
            .ok_or_else(|| PluginError::NotFound(identifier.to_string()))?;

        let hook = tokio::spawn(async move { instance.on_unload().await });
        match hook.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("on_unload failed for {}: {}", identifier, e),
            Err(e) => warn!("on_unload aborted for {}: {}", identifier, e),
        }

        let mut state = self.write_state()?;
        let removed = state.commands.remove_owned_by(identifier);
        state.modules.remove(identifier);
        info!("Unloaded module {} ({} commands removed)", identifier, removed.len());
        Ok(())
    }

    /// Run the handler for `command`. Returns false only when no module owns it.
    ///
    /// Handler failures and panics are reported on the triggering message and
    /// still count as handled.
    pub async fn execute(&self, command: &str, event: Message, args: Vec<String>) -> bool {
        let entry = match self.read_state() {
            Ok(state) => state.commands.get(command).cloned(),
            Err(e) => {
                error!("{}", e);
                None
            }
        };
        let Some(entry) = entry else {
            return false;
        };

        debug!("Routing {} to module {}", command, entry.owner_module);
        let invocation = Invocation {
            event: event.clone(),
            args,
            module: entry.owner_module.clone(),
            ctx: self.context.clone(),
        };

        let outcome = tokio::spawn((entry.handler)(invocation)).await;
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) if e.is_panic() => Some("handler panicked".to_string()),
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            error!("Command {} from {} failed: {}", command, entry.owner_module, reason);
            if let Err(e) = self.report_failure(&event, command, &reason).await {
                error!("Could not report failure of {}: {}", command, e);
            }
        }
        true
    }

    async fn report_failure(&self, event: &Message, command: &str, reason: &str) -> Result<(), BotError> {
        let text = format!(
            "❌ <b>Error in {}</b>\n<code>{}</code>",
            Utils::escape_html(command),
            Utils::escape_html(reason)
        );
        self.context
            .transport
            .edit_message(event.chat_id, event.id, &text)
            .await
    }

    pub fn get(&self, identifier: &str) -> Option<ModuleDescriptor> {
        self.read_state()
            .ok()?
            .modules
            .get(identifier)
            .map(|m| m.descriptor.clone())
    }

    /// Every loaded module, ordered by identifier
    pub fn list_all(&self) -> Vec<ModuleDescriptor> {
        self.read_state()
            .map(|s| s.modules.values().map(|m| m.descriptor.clone()).collect())
            .unwrap_or_default()
    }

    pub fn commands_by_category(&self) -> BTreeMap<Category, Vec<String>> {
        let mut grouped: BTreeMap<Category, Vec<String>> = BTreeMap::new();
        for descriptor in self.list_all() {
            grouped
                .entry(descriptor.category)
                .or_default()
                .extend(descriptor.commands);
        }
        for names in grouped.values_mut() {
            names.sort();
        }
        grouped
    }

    /// `(qualified name, description)` for one module's commands
    pub fn describe_commands(&self, identifier: &str) -> Vec<(String, String)> {
        let Ok(state) = self.read_state() else {
            return Vec::new();
        };
        let Some(module) = state.modules.get(identifier) else {
            return Vec::new();
        };
        module
            .descriptor
            .commands
            .iter()
            .filter_map(|name| state.commands.get(name))
            .map(|entry| (entry.qualified_name.clone(), entry.description.clone()))
            .collect()
    }

    /// Sorted names in the command table
    pub fn command_names(&self) -> Vec<String> {
        self.read_state()
            .map(|s| s.commands.names())
            .unwrap_or_default()
    }

    pub fn has_command(&self, qualified: &str) -> bool {
        self.read_state()
            .map(|s| s.commands.contains(qualified))
            .unwrap_or(false)
    }

    pub fn command_count(&self) -> usize {
        self.read_state().map(|s| s.commands.len()).unwrap_or(0)
    }

    /// Identifiers any source can load, whether or not they are loaded
    pub fn available_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .sources
            .iter()
            .flat_map(|s| s.list_units())
            .filter(|id| !id.starts_with('_'))
            .collect();
        units.sort();
        units.dedup();
        units
    }
}
