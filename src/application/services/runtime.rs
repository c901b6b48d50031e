//! Wiring: builds every collaborator of a running agent from a config

use std::sync::Arc;
use tokio::sync::Notify;

use super::command_service::BuiltinCommands;
use super::message_service::MessageService;
use crate::application::errors::BotError;
use crate::application::messaging::{
    CommandDispatcher, DispatchStats, LoggingMiddleware, MiddlewareChain, OwnerGateMiddleware,
    RateLimitMiddleware,
};
use crate::domain::traits::Transport;
use crate::infrastructure::config::{Config, ConfigOverrides};
use crate::infrastructure::plugins::DylibSource;
use crate::infrastructure::security::OwnerRegistry;
use crate::infrastructure::storage::{JsonStore, SessionStorage};
use crate::infrastructure::utils::Utils;
use crate::plugins::{builtin, LoadPlan, ModuleContext, ModuleRegistry};

/// A fully wired agent
pub struct Runtime {
    /// File config with stored overrides applied
    pub config: Config,
    pub store: Arc<JsonStore>,
    pub owners: Arc<OwnerRegistry>,
    pub sessions: Arc<SessionStorage>,
    pub overrides: Arc<ConfigOverrides>,
    pub registry: Arc<ModuleRegistry>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub service: MessageService,
}

impl Runtime {
    pub async fn build(file_config: Config, transport: Arc<dyn Transport>) -> Result<Self, BotError> {
        let data_dir = file_config.storage.data_dir.clone();
        let store = Arc::new(JsonStore::open(&data_dir).await?);

        let overrides = Arc::new(ConfigOverrides::new(store.clone(), file_config.clone()));
        let config = match overrides.effective().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring stored config overrides: {}", e);
                file_config
            }
        };

        let owners = Arc::new(OwnerRegistry::open(&data_dir, config.security.min_principal_id).await?);
        let sessions = Arc::new(SessionStorage::open(&data_dir).await?);
        let utils = Arc::new(Utils::new(config.userbot.prefix.clone()));

        let context = ModuleContext {
            transport: transport.clone(),
            store: store.clone(),
            utils: utils.clone(),
        };
        let mut registry = ModuleRegistry::new(context, config.userbot.prefix.clone());
        if config.modules.builtin {
            registry = registry.with_source(Arc::new(builtin::catalog()));
        }
        let registry = Arc::new(
            registry.with_source(Arc::new(DylibSource::new(config.modules.directory.clone()))),
        );

        let stats = Arc::new(DispatchStats::default());
        let restart = Arc::new(Notify::new());

        let builtins = Arc::new(BuiltinCommands {
            identity: config.userbot.clone(),
            registry: registry.clone(),
            owners: owners.clone(),
            store: store.clone(),
            sessions: sessions.clone(),
            overrides: overrides.clone(),
            transport: transport.clone(),
            utils,
            stats: stats.clone(),
            restart: restart.clone(),
        });

        let middleware = MiddlewareChain::new()
            .add(LoggingMiddleware)
            .add(OwnerGateMiddleware::new(owners.clone()))
            .add(RateLimitMiddleware::new(
                config.security.rate_limit.max_requests,
                config.security.rate_limit.window_seconds,
            ))
            .build();

        let dispatcher = Arc::new(
            CommandDispatcher::new(
                config.userbot.prefix.clone(),
                registry.clone(),
                builtins,
                transport.clone(),
                stats,
            )
            .with_middleware(middleware),
        );

        let service = MessageService::new(
            transport,
            dispatcher.clone(),
            store.clone(),
            restart,
            config.userbot.name.clone(),
        );

        Ok(Self {
            config,
            store,
            owners,
            sessions,
            overrides,
            registry,
            dispatcher,
            service,
        })
    }

    pub fn load_plan(&self) -> LoadPlan {
        if self.config.modules.auto_load {
            LoadPlan::Discover
        } else {
            LoadPlan::Explicit(self.config.modules.load_on_startup.clone())
        }
    }

    /// Initial module pass
    pub async fn start_modules(&self) -> usize {
        self.registry.discover_and_load_all(&self.load_plan()).await
    }
}
