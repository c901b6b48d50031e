//! Agent event loop: subscribe, dispatch each event on its own task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::application::errors::BotError;
use crate::application::messaging::CommandDispatcher;
use crate::domain::traits::{Store, Transport};
use crate::infrastructure::utils::Utils;

pub const RESTART_MARKER_SECTION: &str = "misc";
pub const RESTART_MARKER_KEY: &str = "restart_marker";

/// Left behind by `.restart` so the next start can report how long it took
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartMarker {
    pub chat_id: i64,
    pub message_id: i64,
    pub started_at: DateTime<Utc>,
}

/// Why the event loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Event stream ended or the process was interrupted
    Shutdown,
    /// `.restart` was requested; the caller should re-execute itself
    Restart,
}

pub struct MessageService {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<CommandDispatcher>,
    store: Arc<dyn Store>,
    restart: Arc<Notify>,
    name: String,
}

impl MessageService {
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<CommandDispatcher>,
        store: Arc<dyn Store>,
        restart: Arc<Notify>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            store,
            restart,
            name: name.into(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    /// Report a completed restart on the message that requested it.
    pub async fn finish_pending_restart(&self) -> Option<RestartMarker> {
        let value = match self.store.get(RESTART_MARKER_SECTION, RESTART_MARKER_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Restart marker unreadable: {}", e);
                return None;
            }
        };
        if let Err(e) = self.store.delete(RESTART_MARKER_SECTION, RESTART_MARKER_KEY).await {
            tracing::warn!("Could not clear restart marker: {}", e);
        }

        let marker: RestartMarker = match serde_json::from_value(value) {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!("Discarding malformed restart marker: {}", e);
                return None;
            }
        };

        let elapsed = (Utc::now() - marker.started_at).to_std().unwrap_or_default();
        let text = format!(
            "✅ <b>{} restarted</b>\n⏱️ <b>Took:</b> {}",
            Utils::escape_html(&self.name),
            Utils::format_duration(elapsed)
        );

        if let Err(e) = self
            .transport
            .edit_message(marker.chat_id, marker.message_id, &text)
            .await
        {
            tracing::debug!("Restart message not editable ({}), sending instead", e);
            if let Err(e) = self.transport.send_message(marker.chat_id, &text).await {
                tracing::warn!("Could not report restart: {}", e);
            }
        }
        Some(marker)
    }

    /// Run until the stream ends, Ctrl-C, or a restart request.
    pub async fn run(&self) -> Result<RunOutcome, BotError> {
        self.finish_pending_restart().await;

        let mut events = self.transport.subscribe().await?;
        tracing::info!("Listening for commands as {}", self.transport.account().name);

        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Event stream closed");
                        return Ok(RunOutcome::Shutdown);
                    };
                    if !event.outgoing {
                        continue;
                    }
                    let dispatcher = self.dispatcher.clone();
                    tokio::spawn(async move {
                        dispatcher.dispatch(event).await;
                    });
                }
                _ = self.restart.notified() => {
                    tracing::info!("Restart requested");
                    return Ok(RunOutcome::Restart);
                }
                _ = &mut interrupted => {
                    tracing::info!("Interrupted, shutting down");
                    return Ok(RunOutcome::Shutdown);
                }
            }
        }
    }
}
