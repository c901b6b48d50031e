use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::application::errors::{BotError, CommandError, PluginError};
use crate::domain::entities::{Category, ModuleMeta};
use crate::domain::traits::AccountInfo;
use crate::infrastructure::adapters::MemoryTransport;
use crate::infrastructure::plugins::BuiltinCatalog;
use crate::infrastructure::storage::JsonStore;
use crate::infrastructure::utils::Utils;

static PING_CALLS: AtomicUsize = AtomicUsize::new(0);

struct PingModule {
    base: ModuleBase,
}

impl Module for PingModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }
}

fn ping_module() -> Box<dyn Module> {
    let mut base = ModuleBase::new(ModuleMeta::new("Ping").with_category(Category::Utils));
    base.register_command("ping", "pong", |inv| async move {
        PING_CALLS.fetch_add(1, Ordering::SeqCst);
        inv.edit("pong").await
    });
    Box::new(PingModule { base })
}

struct BrokenHook {
    base: ModuleBase,
}

#[async_trait]
impl Module for BrokenHook {
    fn base(&self) -> &ModuleBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }
    async fn on_load(&self) -> Result<(), BotError> {
        Err(BotError::Internal("refusing to start".to_string()))
    }
}

fn broken_hook() -> Box<dyn Module> {
    let mut base = ModuleBase::new(ModuleMeta::new("Broken"));
    base.register_command("broken", "never reachable", |inv| async move { inv.edit("x").await });
    Box::new(BrokenHook { base })
}

fn info_module(label: &'static str) -> Box<dyn Module> {
    let mut base = ModuleBase::new(ModuleMeta::new(label));
    base.register_command("info", "who am i", move |inv| async move { inv.edit(label).await });
    Box::new(PingModule { base })
}

fn info_one() -> Box<dyn Module> {
    info_module("one")
}

fn info_two() -> Box<dyn Module> {
    info_module("two")
}

fn failing_module() -> Box<dyn Module> {
    let mut base = ModuleBase::new(ModuleMeta::new("Failing"));
    base.register_command("fail", "always fails", |_inv| async move {
        Err(CommandError::ExecutionFailed("boom".to_string()))
    });
    base.register_command("panic", "always panics", |inv| async move {
        if inv.args.is_empty() {
            panic!("handler exploded");
        }
        Ok(())
    });
    Box::new(PingModule { base })
}

fn panicking_constructor() -> Box<dyn Module> {
    panic!("constructor exploded")
}

struct Harness {
    _dir: tempfile::TempDir,
    transport: Arc<MemoryTransport>,
    registry: ModuleRegistry,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new(AccountInfo {
        id: 1001,
        name: "me".to_string(),
        username: None,
    }));
    let store = Arc::new(JsonStore::open(dir.path()).await.unwrap());
    let context = ModuleContext {
        transport: transport.clone(),
        store,
        utils: Arc::new(Utils::new(".")),
    };

    let catalog = BuiltinCatalog::new()
        .with("ping", ping_module)
        .with("broken_hook", broken_hook)
        .with("p1", info_one)
        .with("p2", info_two)
        .with("failing", failing_module)
        .with("exploding", panicking_constructor)
        .with("_private", ping_module);

    let registry = ModuleRegistry::new(context, ".").with_source(Arc::new(catalog));
    Harness {
        _dir: dir,
        transport,
        registry,
    }
}

#[tokio::test]
async fn load_execute_unload_ping() {
    let h = harness().await;
    let before = PING_CALLS.load(Ordering::SeqCst);

    let descriptor = h.registry.load("ping").await.unwrap();
    assert_eq!(descriptor.commands, vec![".ping".to_string()]);

    let event = h.transport.post(1, 1001, ".ping");
    assert!(h.registry.execute(".ping", event.clone(), vec![]).await);
    assert_eq!(PING_CALLS.load(Ordering::SeqCst), before + 1);
    assert_eq!(h.transport.edits_of(event.id), vec!["pong".to_string()]);

    h.registry.unload("ping").await.unwrap();
    assert!(!h.registry.execute(".ping", event, vec![]).await);
    assert_eq!(h.registry.command_count(), 0);
}

#[tokio::test]
async fn failing_on_load_rolls_back() {
    let h = harness().await;

    let result = h.registry.load("broken_hook").await;
    assert!(matches!(result, Err(PluginError::Load(_))));
    assert!(h.registry.list_all().is_empty());
    assert!(h.registry.command_names().is_empty());
}

#[tokio::test]
async fn colliding_command_is_rejected() {
    let h = harness().await;

    h.registry.load("p1").await.unwrap();
    let second = h.registry.load("p2").await;
    assert!(matches!(
        second,
        Err(PluginError::CommandConflict { ref command, ref owner }) if command == ".info" && owner == "p1"
    ));
    assert!(h.registry.get("p2").is_none());

    let event = h.transport.post(1, 1001, ".info");
    assert!(h.registry.execute(".info", event.clone(), vec![]).await);
    assert_eq!(h.transport.edits_of(event.id), vec!["one".to_string()]);
}

#[tokio::test]
async fn unknown_command_is_not_handled() {
    let h = harness().await;
    let event = h.transport.post(1, 1001, ".nope");

    assert!(!h.registry.execute(".nope", event, vec![]).await);
    assert!(h.transport.edits().is_empty());
}

#[tokio::test]
async fn handler_error_and_panic_are_reported_once() {
    let h = harness().await;
    h.registry.load("failing").await.unwrap();

    let event = h.transport.post(1, 1001, ".fail");
    assert!(h.registry.execute(".fail", event.clone(), vec![]).await);
    let edits = h.transport.edits_of(event.id);
    assert_eq!(edits.len(), 1);
    assert!(edits[0].contains("boom"));

    let event = h.transport.post(1, 1001, ".panic");
    assert!(h.registry.execute(".panic", event.clone(), vec![]).await);
    assert_eq!(h.transport.edits_of(event.id).len(), 1);

    assert!(h.registry.get("failing").is_some());
}

#[tokio::test]
async fn load_errors_are_classified() {
    let h = harness().await;

    assert!(matches!(h.registry.load("ghost").await, Err(PluginError::NotFound(_))));
    assert!(matches!(h.registry.load("exploding").await, Err(PluginError::Load(_))));

    h.registry.load("ping").await.unwrap();
    assert!(matches!(h.registry.load("ping").await, Err(PluginError::AlreadyLoaded(_))));
}

#[tokio::test]
async fn reload_replaces_instance() {
    let h = harness().await;
    h.registry.load("ping").await.unwrap();

    let descriptor = h.registry.reload("ping").await.unwrap();
    assert_eq!(descriptor.identifier, "ping");
    assert_eq!(h.registry.list_all().len(), 1);
    assert_eq!(h.registry.command_names(), vec![".ping".to_string()]);

    // Reload of an absent module is just a load.
    h.registry.unload("ping").await.unwrap();
    assert!(h.registry.reload("ping").await.is_ok());
}

#[tokio::test]
async fn discovery_skips_private_and_broken_units() {
    let h = harness().await;

    let loaded = h.registry.discover_and_load_all(&LoadPlan::Discover).await;

    let ids: Vec<String> = h.registry.list_all().into_iter().map(|d| d.identifier).collect();
    assert_eq!(loaded, ids.len());
    assert!(ids.contains(&"ping".to_string()));
    assert!(ids.contains(&"p1".to_string()));
    assert!(!ids.contains(&"p2".to_string()));
    assert!(!ids.contains(&"_private".to_string()));
    assert!(!ids.contains(&"broken_hook".to_string()));
    assert!(!ids.contains(&"exploding".to_string()));
}

#[tokio::test]
async fn explicit_plan_loads_only_listed_units() {
    let h = harness().await;
    let plan = LoadPlan::Explicit(vec!["ping".to_string(), "ghost".to_string()]);

    assert_eq!(h.registry.discover_and_load_all(&plan).await, 1);
    assert_eq!(h.registry.list_all().len(), 1);
}

#[tokio::test]
async fn table_matches_loaded_modules() {
    let h = harness().await;
    h.registry.load("ping").await.unwrap();
    h.registry.load("p1").await.unwrap();
    h.registry.load("failing").await.unwrap();
    h.registry.unload("p1").await.unwrap();

    let mut expected: Vec<String> = h
        .registry
        .list_all()
        .into_iter()
        .flat_map(|d| d.commands)
        .collect();
    expected.sort();
    assert_eq!(h.registry.command_names(), expected);

    let grouped = h.registry.commands_by_category();
    assert_eq!(grouped.get(&Category::Utils), Some(&vec![".ping".to_string()]));
}
