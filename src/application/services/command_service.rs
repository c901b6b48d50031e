//! Built-in commands handled when no module claims a command

use chrono::Utc;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::Notify;

use super::message_service::{RestartMarker, RESTART_MARKER_KEY, RESTART_MARKER_SECTION};
use crate::application::errors::CommandError;
use crate::application::messaging::DispatchStats;
use crate::domain::entities::{Category, Message, ModuleDescriptor};
use crate::domain::traits::{Store, Transport};
use crate::infrastructure::config::{ConfigOverrides, UserbotConfig};
use crate::infrastructure::security::OwnerRegistry;
use crate::infrastructure::storage::{JsonStore, SessionStorage};
use crate::infrastructure::utils::Utils;
use crate::plugins::ModuleRegistry;

/// Longest text a single edit carries before truncation
const MAX_TEXT: usize = 4000;

/// The fixed built-in command table.
///
/// Every handler edits the triggering message with its result. Returns
/// `Ok(false)` from `handle` for names it does not know.
pub struct BuiltinCommands {
    pub identity: UserbotConfig,
    pub registry: Arc<ModuleRegistry>,
    pub owners: Arc<OwnerRegistry>,
    pub store: Arc<JsonStore>,
    pub sessions: Arc<SessionStorage>,
    pub overrides: Arc<ConfigOverrides>,
    pub transport: Arc<dyn Transport>,
    pub utils: Arc<Utils>,
    pub stats: Arc<DispatchStats>,
    pub restart: Arc<Notify>,
}

fn command_error(e: impl std::fmt::Display) -> CommandError {
    CommandError::ExecutionFailed(e.to_string())
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_TEXT {
        let mut cut = MAX_TEXT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n\n... (truncated)");
    }
    text
}

impl BuiltinCommands {
    pub fn names() -> &'static [&'static str] {
        &[
            "help", "info", "sysinfo", "ping", "modules", "load", "unload", "reload", "stats",
            "config", "sessions", "owners", "restart",
        ]
    }

    pub async fn handle(&self, name: &str, event: &Message, args: &[String]) -> Result<bool, CommandError> {
        match name {
            "help" => self.help(event, args).await?,
            "info" => self.info(event).await?,
            "sysinfo" => self.sysinfo(event).await?,
            "ping" => self.ping(event).await?,
            "modules" => self.modules(event).await?,
            "load" => self.load(event, args).await?,
            "unload" => self.unload(event, args).await?,
            "reload" => self.reload(event, args).await?,
            "stats" => self.stats(event).await?,
            "config" => self.config(event, args).await?,
            "sessions" => self.sessions(event, args).await?,
            "owners" => self.owners(event, args).await?,
            "restart" => self.restart(event).await?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn edit(&self, event: &Message, text: impl Into<String>) -> Result<(), CommandError> {
        self.transport
            .edit_message(event.chat_id, event.id, &truncate(text.into()))
            .await
            .map_err(|e| CommandError::Transport(e.to_string()))
    }

    async fn usage(&self, event: &Message, usage: &str) -> Result<(), CommandError> {
        self.edit(
            event,
            format!("❌ <b>Usage:</b> <code>{}{}</code>", self.utils.prefix(), Utils::escape_html(usage)),
        )
        .await
    }

    fn find_module(&self, query: &str) -> Option<ModuleDescriptor> {
        self.registry.get(query).or_else(|| {
            self.registry
                .list_all()
                .into_iter()
                .find(|d| d.name.eq_ignore_ascii_case(query))
        })
    }

    async fn help(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let p = self.utils.prefix();

        if let Some(query) = args.first() {
            let Some(module) = self.find_module(query) else {
                return self
                    .edit(event, format!("❌ <b>Module not found:</b> <code>{}</code>", Utils::escape_html(query)))
                    .await;
            };
            let mut text = format!(
                "{} <b>{}</b> v{}\n<i>{}</i>\n👤 {}\n<blockquote>",
                module.category.emoji(),
                Utils::escape_html(&module.name),
                Utils::escape_html(&module.version),
                Utils::escape_html(&module.description),
                Utils::escape_html(&module.author)
            );
            for (name, description) in self.registry.describe_commands(&module.identifier) {
                let _ = writeln!(text, "<code>{}</code> - {}", name, Utils::escape_html(&description));
            }
            text.push_str("</blockquote>");
            return self.edit(event, text).await;
        }

        let mut text = format!(
            "<b>{} {} - Help</b>\n<blockquote><b>🧪 Core commands:</b>\n",
            self.identity.emoji,
            Utils::escape_html(&self.identity.name)
        );
        for (cmd, what) in [
            ("help [module]", "this menu"),
            ("info", "short bot info"),
            ("sysinfo", "detailed system info"),
            ("ping", "latency check"),
            ("stats", "usage statistics"),
            ("config", "configuration"),
            ("sessions", "session management"),
            ("owners", "owner management"),
            ("restart", "restart the userbot"),
        ] {
            let _ = writeln!(text, "<code>{}{}</code> - {}", p, Utils::escape_html(cmd), what);
        }
        text.push_str("\n<b>⚙️ Modules:</b>\n");
        for (cmd, what) in [
            ("modules", "list modules"),
            ("load <module>", "load a module"),
            ("unload <module>", "unload a module"),
            ("reload <module>", "reload a module"),
        ] {
            let _ = writeln!(text, "<code>{}{}</code> - {}", p, Utils::escape_html(cmd), what);
        }

        let categories = self.registry.commands_by_category();
        if !categories.is_empty() {
            text.push_str("\n<b>📚 Module categories:</b>\n");
            for (category, commands) in &categories {
                let _ = writeln!(
                    text,
                    "{} <b>{}:</b> {}",
                    category.emoji(),
                    category,
                    commands.join(" ")
                );
            }
        }
        let _ = write!(
            text,
            "\n<b>🔬 Module commands:</b> <code>{}</code></blockquote>",
            self.registry.command_count()
        );
        self.edit(event, text).await
    }

    async fn info(&self, event: &Message) -> Result<(), CommandError> {
        let text = format!(
            "<b>{} {} v{}</b>\n<blockquote><b>Modules:</b> {}\n<b>Commands:</b> {}\n<b>Uptime:</b> {}\n<b>Prefix:</b> <code>{}</code>\n<b>Platform:</b> {}</blockquote>",
            self.identity.emoji,
            Utils::escape_html(&self.identity.name),
            Utils::escape_html(&self.identity.version),
            self.registry.list_all().len(),
            self.registry.command_count(),
            Utils::format_duration(self.utils.uptime()),
            Utils::escape_html(self.utils.prefix()),
            event.platform
        );
        self.edit(event, text).await
    }

    async fn sysinfo(&self, event: &Message) -> Result<(), CommandError> {
        let db = self.store.stats().await;
        let sessions = self.sessions.list_sessions().await.len();
        let text = format!(
            "<b>🖥️ {} - System</b>\n<blockquote><b>💾 Storage:</b>\n• <b>Sections:</b> <code>{}</code>\n• <b>Module records:</b> <code>{}</code>\n• <b>User records:</b> <code>{}</code>\n• <b>Size:</b> <code>{}</code>\n• <b>Sessions:</b> <code>{}</code>\n\n<b>🖥️ Host:</b>\n• <b>OS:</b> <code>{}</code>\n• <b>Arch:</b> <code>{}</code>\n• <b>PID:</b> <code>{}</code>\n\n<b>📊 Runtime:</b>\n• <b>Uptime:</b> <code>{}</code>\n• <b>Version:</b> <code>{}</code>\n• <b>Commands run:</b> <code>{}</code>\n• <b>Modules loaded:</b> <code>{}</code></blockquote>",
            Utils::escape_html(&self.identity.name),
            db.sections,
            db.module_records,
            db.user_records,
            Utils::format_bytes(db.file_size),
            sessions,
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::process::id(),
            Utils::format_duration(self.utils.uptime()),
            Utils::escape_html(&self.identity.version),
            self.stats.invocations(),
            self.registry.list_all().len()
        );
        self.edit(event, text).await
    }

    async fn ping(&self, event: &Message) -> Result<(), CommandError> {
        let started = std::time::Instant::now();
        self.edit(event, "🌙").await?;
        let ms = started.elapsed().as_secs_f64() * 1000.0;

        let (emoji, status) = match ms {
            ms if ms < 100.0 => ("🚀", "⚡ <b>Lightning</b>"),
            ms if ms < 300.0 => ("⚗️", "✅ <b>Great</b>"),
            ms if ms < 500.0 => ("🧪", "⚠️ <b>Fine</b>"),
            _ => ("🔬", "🐌 <b>Slow</b>"),
        };
        self.edit(
            event,
            format!(
                "{} <b>Ping:</b> <code>{:.2} ms</code>\n⏳ <b>Uptime:</b> {}\n📊 <b>Status:</b> {}",
                emoji,
                ms,
                Utils::format_duration(self.utils.uptime()),
                status
            ),
        )
        .await
    }

    async fn modules(&self, event: &Message) -> Result<(), CommandError> {
        let modules = self.registry.list_all();
        if modules.is_empty() {
            return self
                .edit(event, "📦 <b>No modules loaded</b>\n\n🔬 Put module libraries in the modules directory")
                .await;
        }

        let mut grouped: std::collections::BTreeMap<Category, Vec<&ModuleDescriptor>> =
            std::collections::BTreeMap::new();
        for module in &modules {
            grouped.entry(module.category).or_default().push(module);
        }

        let mut text = format!("<b>🧪 Loaded modules ({}):</b>\n<blockquote>", modules.len());
        for (category, list) in grouped {
            let _ = writeln!(text, "<b>{} {}:</b>", category.emoji(), category);
            for module in list {
                let _ = writeln!(
                    text,
                    "• {} <code>{}</code> v{} - {} commands",
                    if module.loaded { "✅" } else { "❌" },
                    Utils::escape_html(&module.identifier),
                    Utils::escape_html(&module.version),
                    module.commands.len()
                );
            }
            text.push('\n');
        }

        let idle: Vec<String> = self
            .registry
            .available_units()
            .into_iter()
            .filter(|id| self.registry.get(id).is_none())
            .collect();
        if !idle.is_empty() {
            let _ = writeln!(text, "<b>💤 Available:</b> {}", Utils::escape_html(&idle.join(", ")));
        }
        text.push_str("</blockquote>");
        self.edit(event, text).await
    }

    async fn load(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let Some(id) = args.first() else {
            return self.usage(event, "load <module>").await;
        };
        self.edit(event, format!("🔄 <b>Loading</b> <code>{}</code>...", Utils::escape_html(id)))
            .await?;

        match self.registry.load(id).await {
            Ok(module) => {
                self.edit(
                    event,
                    format!(
                        "✅ <b>Module loaded:</b> <code>{}</code> v{}\n🔧 <b>Commands:</b> {}",
                        Utils::escape_html(&module.name),
                        Utils::escape_html(&module.version),
                        module.commands.len()
                    ),
                )
                .await
            }
            Err(e) => {
                self.edit(
                    event,
                    format!(
                        "❌ <b>Failed to load</b> <code>{}</code>\n<code>{}</code>",
                        Utils::escape_html(id),
                        Utils::escape_html(&e.to_string())
                    ),
                )
                .await
            }
        }
    }

    async fn unload(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let Some(id) = args.first() else {
            return self.usage(event, "unload <module>").await;
        };

        let before = self.registry.get(id);
        let text = match self.registry.unload(id).await {
            Ok(()) => {
                let (version, removed) = before
                    .map(|m| (m.version, m.commands.len()))
                    .unwrap_or_default();
                format!(
                    "✅ <b>Module unloaded:</b> <code>{}</code> v{}\n🔧 <b>Commands removed:</b> {}",
                    Utils::escape_html(id),
                    Utils::escape_html(&version),
                    removed
                )
            }
            Err(e) => format!(
                "❌ <b>Failed to unload</b> <code>{}</code>\n<code>{}</code>",
                Utils::escape_html(id),
                Utils::escape_html(&e.to_string())
            ),
        };
        self.edit(event, text).await
    }

    async fn reload(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let Some(id) = args.first() else {
            return self.usage(event, "reload <module>").await;
        };
        self.edit(event, format!("🔄 <b>Reloading</b> <code>{}</code>...", Utils::escape_html(id)))
            .await?;

        let text = match self.registry.reload(id).await {
            Ok(module) => format!(
                "✅ <b>Module reloaded:</b> <code>{}</code> v{}\n🔧 <b>Commands:</b> {}",
                Utils::escape_html(&module.name),
                Utils::escape_html(&module.version),
                module.commands.len()
            ),
            Err(e) => format!(
                "❌ <b>Failed to reload</b> <code>{}</code>\n<code>{}</code>",
                Utils::escape_html(id),
                Utils::escape_html(&e.to_string())
            ),
        };
        self.edit(event, text).await
    }

    async fn stats(&self, event: &Message) -> Result<(), CommandError> {
        let db = self.store.stats().await;
        let text = format!(
            "<b>📊 {} - Statistics</b>\n\n<b>⏱️ Runtime:</b>\n• <b>Started:</b> {}\n• <b>Uptime:</b> {}\n• <b>Commands run:</b> <code>{}</code>\n\n<b>🧪 Modules:</b>\n• <b>Loaded:</b> <code>{}</code>\n• <b>Commands:</b> <code>{}</code>\n\n<b>💾 Storage:</b>\n• <b>Sections:</b> <code>{}</code>\n• <b>Module records:</b> <code>{}</code>\n• <b>User records:</b> <code>{}</code>\n• <b>Chat records:</b> <code>{}</code>\n• <b>Size:</b> <code>{}</code>",
            Utils::escape_html(&self.identity.name),
            Utils::format_timestamp(self.utils.started_at()),
            Utils::format_duration(self.utils.uptime()),
            self.stats.invocations(),
            self.registry.list_all().len(),
            self.registry.command_count(),
            db.sections,
            db.module_records,
            db.user_records,
            db.chat_records,
            Utils::format_bytes(db.file_size)
        );
        self.edit(event, text).await
    }

    async fn config(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let p = self.utils.prefix();
        let action = args.first().map(|a| a.to_lowercase());

        match (action.as_deref(), args.len()) {
            (Some("get"), n) if n >= 2 => {
                let path = &args[1];
                let value = self.overrides.get(path).await.map_err(command_error)?;
                let shown = value.map(|v| v.to_string()).unwrap_or_else(|| "not set".to_string());
                self.edit(
                    event,
                    format!(
                        "<b>⚙️ Config</b>\n\n<b>Path:</b> <code>{}</code>\n<b>Value:</b> <code>{}</code>",
                        Utils::escape_html(path),
                        Utils::escape_html(&shown)
                    ),
                )
                .await
            }
            (Some("set"), n) if n >= 3 => {
                let path = &args[1];
                let value = self
                    .overrides
                    .set(path, &args[2..].join(" "))
                    .await
                    .map_err(command_error)?;
                self.edit(
                    event,
                    format!(
                        "✅ <b>Config updated</b>\n\n<b>Path:</b> <code>{}</code>\n<b>New value:</b> <code>{}</code>\n<i>Applied on next restart</i>",
                        Utils::escape_html(path),
                        Utils::escape_html(&value.to_string())
                    ),
                )
                .await
            }
            (Some("reset"), n) if n >= 2 => {
                let path = &args[1];
                let value = self.overrides.reset(path).await.map_err(command_error)?;
                let shown = value.map(|v| v.to_string()).unwrap_or_else(|| "not set".to_string());
                self.edit(
                    event,
                    format!(
                        "🔄 <b>Config reset</b>\n\n<b>Path:</b> <code>{}</code>\n<b>Default:</b> <code>{}</code>",
                        Utils::escape_html(path),
                        Utils::escape_html(&shown)
                    ),
                )
                .await
            }
            (Some("list"), _) => {
                let all = self.overrides.list().await.map_err(command_error)?;
                let mut text = "<b>📋 Configuration:</b>\n\n".to_string();
                for (path, value) in all {
                    let _ = writeln!(
                        text,
                        "• <code>{}</code>: <code>{}</code>",
                        Utils::escape_html(&path),
                        Utils::escape_html(&value.to_string())
                    );
                }
                self.edit(event, text).await
            }
            _ => {
                self.edit(
                    event,
                    format!(
                        "<b>⚙️ {} - Config</b>\n<blockquote><code>{p}config get &lt;path&gt;</code> - read a value\n<code>{p}config set &lt;path&gt; &lt;value&gt;</code> - set a value\n<code>{p}config reset &lt;path&gt;</code> - restore the default\n<code>{p}config list</code> - show everything\n\n<b>Example:</b> <code>{p}config set userbot.emoji 🧪</code></blockquote>",
                        Utils::escape_html(&self.identity.name),
                        p = Utils::escape_html(p)
                    ),
                )
                .await
            }
        }
    }

    async fn sessions(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let p = Utils::escape_html(self.utils.prefix());
        let action = args.first().map(|a| a.to_lowercase());
        let current = self.sessions.default_session().await;

        match (action.as_deref(), args.get(1)) {
            (None, _) | (Some("list"), _) => {
                let sessions = self.sessions.list_sessions().await;
                if sessions.is_empty() {
                    return self.edit(event, "📱 <b>No sessions stored</b>").await;
                }
                let mut text = format!("<b>📱 Sessions ({})</b>\n\n", sessions.len());
                for info in sessions {
                    let active = current.as_deref() == Some(info.session_id.as_str());
                    let _ = write!(
                        text,
                        "<b>{}</b>\n• <b>ID:</b> <code>{}</code>\n• <b>Name:</b> <code>{}</code>\n• <b>Username:</b> <code>@{}</code>\n• <b>Created:</b> <code>{}</code>\n\n",
                        if active { "🟢 Active" } else { "⚪ Inactive" },
                        info.session_id,
                        Utils::escape_html(info.first_name.as_deref().unwrap_or("unknown")),
                        Utils::escape_html(info.username.as_deref().unwrap_or("unknown")),
                        Utils::format_timestamp(info.created_at)
                    );
                }
                let _ = write!(
                    text,
                    "<b>📋 Commands:</b>\n• <code>{p}sessions switch &lt;id&gt;</code>\n• <code>{p}sessions delete &lt;id&gt;</code>\n• <code>{p}sessions backup</code>"
                );
                self.edit(event, text).await
            }
            (Some("switch"), Some(id)) => {
                let text = if self.sessions.set_default_session(id).await.map_err(command_error)? {
                    format!("✅ <b>Default session:</b> <code>{}</code>\n<i>Used from next restart</i>", Utils::escape_html(id))
                } else {
                    format!("❌ <b>Unknown session:</b> <code>{}</code>", Utils::escape_html(id))
                };
                self.edit(event, text).await
            }
            (Some("delete"), Some(id)) => {
                if current.as_deref() == Some(id.as_str()) {
                    return self.edit(event, "❌ <b>Cannot delete the active session</b>").await;
                }
                let text = if self.sessions.delete_session(id).await.map_err(command_error)? {
                    format!("✅ <b>Session deleted:</b> <code>{}</code>", Utils::escape_html(id))
                } else {
                    format!("❌ <b>Unknown session:</b> <code>{}</code>", Utils::escape_html(id))
                };
                self.edit(event, text).await
            }
            (Some("backup"), _) => {
                let path = self.sessions.backup_sessions(None).await.map_err(command_error)?;
                self.edit(
                    event,
                    format!("✅ <b>Backup written:</b>\n<code>{}</code>", Utils::escape_html(&path.display().to_string())),
                )
                .await
            }
            _ => {
                self.edit(
                    event,
                    format!("❌ <b>Bad usage</b>\n\nSend <code>{p}sessions</code> for help"),
                )
                .await
            }
        }
    }

    async fn owners(&self, event: &Message, args: &[String]) -> Result<(), CommandError> {
        let action = args.first().map(|a| a.to_lowercase());
        let target = args.get(1).map(|raw| raw.parse::<i64>());
        let acting = event.sender_id;

        match (action.as_deref(), target) {
            (None, _) | (Some("list"), _) => {
                let primary = self.owners.get_primary_owner();
                let mut text = "<b>👑 Owners</b>\n\n".to_string();
                for id in self.owners.get_all_owners() {
                    let marker = if Some(id) == primary { " (primary)" } else { "" };
                    let _ = writeln!(text, "• <code>{}</code>{}", id, marker);
                }
                self.edit(event, text).await
            }
            (Some("add"), Some(Ok(id))) => {
                let text = if self.owners.add_owner(id, acting).await {
                    format!("✅ <b>Owner added:</b> <code>{}</code>", id)
                } else {
                    format!("❌ <b>Could not add</b> <code>{}</code>", id)
                };
                self.edit(event, text).await
            }
            (Some("remove"), Some(Ok(id))) => {
                let text = if self.owners.remove_owner(id, acting).await {
                    format!("✅ <b>Owner removed:</b> <code>{}</code>", id)
                } else {
                    format!("❌ <b>Could not remove</b> <code>{}</code>", id)
                };
                self.edit(event, text).await
            }
            _ => self.usage(event, "owners [list | add <id> | remove <id>]").await,
        }
    }

    async fn restart(&self, event: &Message) -> Result<(), CommandError> {
        let marker = RestartMarker {
            chat_id: event.chat_id,
            message_id: event.id,
            started_at: Utc::now(),
        };
        self.edit(event, "🔄 <b>Restarting...</b>").await?;

        match serde_json::to_value(&marker) {
            Ok(value) => {
                if let Err(e) = self
                    .store
                    .set(RESTART_MARKER_SECTION, RESTART_MARKER_KEY, value)
                    .await
                {
                    tracing::warn!("Could not store restart marker: {}", e);
                }
            }
            Err(e) => tracing::warn!("Could not encode restart marker: {}", e),
        }

        tracing::info!("Restart requested from chat {}", event.chat_id);
        self.restart.notify_one();
        Ok(())
    }
}
