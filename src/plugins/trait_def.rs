//! Module contract: what every loadable unit provides to the registry

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::application::errors::{BotError, CommandError, PluginError};
use crate::domain::entities::{CommandHandler, Message, ModuleMeta};
use crate::domain::traits::{Store, Transport};
use crate::infrastructure::utils::Utils;

/// Collaborators injected into a module after construction
#[derive(Clone)]
pub struct ModuleContext {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn Store>,
    pub utils: Arc<Utils>,
}

/// One command invocation as seen by a handler
#[derive(Clone)]
pub struct Invocation {
    pub event: Message,
    pub args: Vec<String>,
    /// Identifier of the module that owns the command
    pub module: String,
    pub ctx: ModuleContext,
}

impl Invocation {
    /// Replace the text of the triggering message
    pub async fn edit(&self, text: impl AsRef<str>) -> Result<(), CommandError> {
        self.ctx
            .transport
            .edit_message(self.event.chat_id, self.event.id, text.as_ref())
            .await
            .map_err(|e| CommandError::Transport(e.to_string()))
    }

    pub async fn reply_context(&self) -> Result<Option<Message>, CommandError> {
        self.ctx
            .transport
            .reply_context(&self.event)
            .await
            .map_err(|e| CommandError::Transport(e.to_string()))
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments re-joined with single spaces
    pub fn args_text(&self) -> String {
        self.args.join(" ")
    }
}

/// Command declared by a module during construction
#[derive(Clone)]
pub struct DeclaredCommand {
    pub name: String,
    pub description: String,
    pub handler: CommandHandler,
}

/// State every module embeds: metadata, declared commands, injected context
pub struct ModuleBase {
    meta: ModuleMeta,
    commands: Vec<DeclaredCommand>,
    context: Option<ModuleContext>,
}

impl ModuleBase {
    pub fn new(meta: ModuleMeta) -> Self {
        Self {
            meta,
            commands: Vec::new(),
            context: None,
        }
    }

    pub fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    /// Declare a command. Names are matched case-insensitively and without the sentinel.
    ///
    /// Registering the same name twice keeps the later handler.
    pub fn register_command<F, Fut>(&mut self, name: &str, description: &str, handler: F)
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        let name = name.trim().to_lowercase();
        let handler: CommandHandler = Arc::new(move |inv| Box::pin(handler(inv)));

        self.commands.retain(|c| c.name != name);
        self.commands.push(DeclaredCommand {
            name,
            description: description.to_string(),
            handler,
        });
    }

    pub fn commands(&self) -> &[DeclaredCommand] {
        &self.commands
    }

    pub(crate) fn inject(&mut self, context: ModuleContext) {
        self.context = Some(context);
    }

    /// Injected collaborators; present once the registry has accepted the module.
    pub fn context(&self) -> Result<&ModuleContext, BotError> {
        self.context
            .as_ref()
            .ok_or_else(|| BotError::Internal(format!("{} has no context yet", self.meta.name)))
    }
}

/// Module trait that every loadable unit must implement
#[async_trait]
pub trait Module: Send + Sync {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    fn meta(&self) -> &ModuleMeta {
        self.base().meta()
    }

    /// Runs after the module's commands are registered
    async fn on_load(&self) -> Result<(), BotError> {
        Ok(())
    }

    /// Runs before the module's commands are removed; failures are logged only
    async fn on_unload(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// Zero-argument constructor for a module
pub type ModuleFactory = fn() -> Box<dyn Module>;

/// Where module units come from
pub trait ModuleSource: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    /// Identifiers of every unit this source can currently see
    fn list_units(&self) -> Vec<String>;

    fn contains(&self, identifier: &str) -> bool;

    /// Construct a fresh instance of `identifier`
    fn instantiate(&self, identifier: &str) -> Result<Box<dyn Module>, PluginError>;
}
