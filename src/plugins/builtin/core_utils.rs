//! Everyday utilities: test, echo, time, uptime

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use crate::application::errors::{BotError, CommandError};
use crate::domain::entities::{Category, ModuleMeta};
use crate::infrastructure::utils::Utils;
use crate::plugins::{Module, ModuleBase};

pub struct CoreUtilsModule {
    base: ModuleBase,
    started_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl CoreUtilsModule {
    pub fn new() -> Self {
        let started_at = Arc::new(Mutex::new(None));
        let mut base = ModuleBase::new(
            ModuleMeta::new("Core Utils")
                .with_author("argent")
                .with_description("🧪 Basic utilities for everyday use")
                .with_category(Category::Core),
        );

        base.register_command("test", "🧪 Test command", |inv| async move {
            inv.edit("⚗️ <b>Test passed!</b>\n🔬 All systems nominal").await
        });

        base.register_command("echo", "📢 Repeat the message", |inv| async move {
            if inv.args.is_empty() {
                let usage = format!("❌ <b>Usage:</b> <code>{}echo &lt;text&gt;</code>", inv.ctx.utils.prefix());
                return inv.edit(usage).await;
            }
            inv.edit(format!("📢 <b>Echo:</b> {}", Utils::escape_html(&inv.args_text())))
                .await
        });

        base.register_command("time", "🕐 Current time", |inv| async move {
            let now = Utc::now();
            inv.edit(format!(
                "🕐 <b>Time</b>\n\n<b>📅 Date and time:</b> <code>{}</code>\n<b>⏰ Unix timestamp:</b> <code>{}</code>",
                Utils::format_timestamp(now),
                now.timestamp()
            ))
            .await
        });

        let since = started_at.clone();
        base.register_command("uptime", "⏱️ Module uptime", move |inv| {
            let since = since.clone();
            async move {
                let started = since
                    .lock()
                    .map_err(|_| CommandError::ExecutionFailed("uptime state poisoned".to_string()))?
                    .get_or_insert_with(Utc::now)
                    .to_owned();
                let running = (Utc::now() - started).to_std().unwrap_or_default();
                inv.edit(format!(
                    "⏱️ <b>Module uptime</b>\n\n<b>🚀 Started:</b> {}\n<b>⏰ Running:</b> <code>{}</code>",
                    Utils::format_timestamp(started),
                    Utils::format_duration(running)
                ))
                .await
            }
        });

        Self { base, started_at }
    }
}

impl Default for CoreUtilsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for CoreUtilsModule {
    fn base(&self) -> &ModuleBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModuleBase {
        &mut self.base
    }

    async fn on_load(&self) -> Result<(), BotError> {
        let mut started = self
            .started_at
            .lock()
            .map_err(|_| BotError::Internal("uptime state poisoned".to_string()))?;
        *started = Some(Utc::now());
        Ok(())
    }
}

pub fn create() -> Box<dyn Module> {
    Box::new(CoreUtilsModule::new())
}
