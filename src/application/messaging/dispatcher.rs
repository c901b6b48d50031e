//! Command dispatcher - routes outgoing text to modules or built-ins

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::middleware::{Context, Middleware, MiddlewareError, Next};
use super::parser::{CommandParser, ParsedCommand};
use crate::application::services::BuiltinCommands;
use crate::domain::entities::Message;
use crate::domain::traits::Transport;
use crate::infrastructure::utils::Utils;
use crate::plugins::ModuleRegistry;

/// Shown for every owner-gate denial, whatever the command
pub const DENIED_TEXT: &str = "🚫 Access denied";
pub const SLOW_DOWN_TEXT: &str = "⏳ Slow down";

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a command
    Ignored,
    /// Stopped by a guard
    Denied,
    Module,
    Builtin,
    /// Looked like a command but nothing claimed it
    Unknown,
}

/// Counters shared with the built-in commands
#[derive(Debug, Default)]
pub struct DispatchStats {
    invocations: AtomicU64,
}

impl DispatchStats {
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    fn record(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct CommandDispatcher {
    parser: CommandParser,
    middleware: Vec<Arc<dyn Middleware>>,
    registry: Arc<ModuleRegistry>,
    builtins: Arc<BuiltinCommands>,
    transport: Arc<dyn Transport>,
    stats: Arc<DispatchStats>,
}

impl CommandDispatcher {
    pub fn new(
        prefix: impl Into<String>,
        registry: Arc<ModuleRegistry>,
        builtins: Arc<BuiltinCommands>,
        transport: Arc<dyn Transport>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            parser: CommandParser::new(prefix),
            middleware: Vec::new(),
            registry,
            builtins,
            transport,
            stats,
        }
    }

    pub fn with_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    async fn reply(&self, event: &Message, text: &str) {
        if let Err(e) = self
            .transport
            .edit_message(event.chat_id, event.id, text)
            .await
        {
            tracing::error!("Failed to edit message {}: {}", event.id, e);
        }
    }

    fn is_known(&self, command: &ParsedCommand) -> bool {
        self.registry.has_command(&command.key)
            || BuiltinCommands::names().contains(&command.name(self.parser.prefix()))
    }

    /// Route one event. Never fails; problems are logged or shown on the message.
    pub async fn dispatch(&self, event: Message) -> Dispatch {
        let Some(command) = self.parser.parse(&event.text) else {
            return Dispatch::Ignored;
        };
        // Prose that merely starts with the prefix must never be touched.
        if !self.is_known(&command) {
            tracing::debug!("Unknown command {}", command.key);
            return Dispatch::Unknown;
        }
        self.stats.record();

        let ctx = Context::new(event, command);
        let ctx = match Next::new(self.middleware.clone()).run(ctx.clone()) {
            Ok(ctx) => ctx,
            Err(e) => {
                let text = match e {
                    MiddlewareError::PermissionDenied => DENIED_TEXT.to_string(),
                    MiddlewareError::RateLimited { .. } => SLOW_DOWN_TEXT.to_string(),
                    MiddlewareError::Blocked(text) => text,
                    MiddlewareError::Internal(reason) => {
                        tracing::error!("Middleware failure: {}", reason);
                        DENIED_TEXT.to_string()
                    }
                };
                self.reply(&ctx.message, &text).await;
                return Dispatch::Denied;
            }
        };

        let Context { message, command, .. } = ctx;

        if self
            .registry
            .execute(&command.key, message.clone(), command.args.clone())
            .await
        {
            return Dispatch::Module;
        }

        let name = command.name(self.parser.prefix());
        match self.builtins.handle(name, &message, &command.args).await {
            Ok(true) => Dispatch::Builtin,
            Ok(false) => {
                tracing::debug!("Unknown command {}", command.key);
                Dispatch::Unknown
            }
            Err(e) => {
                tracing::error!("Built-in {} failed: {}", command.key, e);
                let text = format!(
                    "❌ <b>Error in {}</b>\n<code>{}</code>",
                    Utils::escape_html(&command.key),
                    Utils::escape_html(&e.to_string())
                );
                self.reply(&message, &text).await;
                Dispatch::Builtin
            }
        }
    }
}
