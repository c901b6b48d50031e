//! In-process transport: events are injected by the host, edits are recorded

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::Message;
use crate::domain::traits::{AccountInfo, EventStream, Transport};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdit {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
}

/// Transport backed by memory, for embedding the agent and for tests
pub struct MemoryTransport {
    account: AccountInfo,
    injector: mpsc::Sender<Message>,
    inbox: Mutex<Option<mpsc::Receiver<Message>>>,
    messages: Mutex<HashMap<i64, Message>>,
    edits: Mutex<Vec<RecordedEdit>>,
    next_id: AtomicI64,
}

impl MemoryTransport {
    pub fn new(account: AccountInfo) -> Self {
        let (injector, inbox) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            account,
            injector,
            inbox: Mutex::new(Some(inbox)),
            messages: Mutex::new(HashMap::new()),
            edits: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Create and remember a message without delivering it.
    pub fn post(&self, chat_id: i64, sender_id: i64, text: &str) -> Message {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message::new(id, chat_id, sender_id, text).with_platform("memory");
        if let Ok(mut messages) = self.messages.lock() {
            messages.insert(id, message.clone());
        }
        message
    }

    /// Deliver a message to the subscriber.
    pub async fn inject(&self, message: Message) -> Result<(), BotError> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.insert(message.id, message.clone());
        }
        self.injector
            .send(message)
            .await
            .map_err(|_| BotError::Transport("event stream closed".to_string()))
    }

    pub fn edits(&self) -> Vec<RecordedEdit> {
        self.edits.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Edits applied to one message, oldest first
    pub fn edits_of(&self, message_id: i64) -> Vec<String> {
        self.edits()
            .into_iter()
            .filter(|e| e.message_id == message_id)
            .map(|e| e.text)
            .collect()
    }

    pub fn message(&self, message_id: i64) -> Option<Message> {
        self.messages.lock().ok()?.get(&message_id).cloned()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(&self) -> Result<EventStream, BotError> {
        self.inbox
            .lock()
            .map_err(|_| BotError::Internal("inbox lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| BotError::Transport("already subscribed".to_string()))
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), BotError> {
        if let Ok(mut messages) = self.messages.lock() {
            if let Some(message) = messages.get_mut(&message_id) {
                message.text = text.to_string();
            }
        }
        if let Ok(mut edits) = self.edits.lock() {
            edits.push(RecordedEdit {
                chat_id,
                message_id,
                text: text.to_string(),
            });
        }
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotError> {
        Ok(self.post(chat_id, self.account.id, text).id)
    }

    async fn reply_context(&self, event: &Message) -> Result<Option<Message>, BotError> {
        Ok(event.reply_to.and_then(|id| self.message(id)))
    }

    fn account(&self) -> AccountInfo {
        self.account.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountInfo {
        AccountInfo {
            id: 1001,
            name: "me".to_string(),
            username: None,
        }
    }

    #[tokio::test]
    async fn injected_events_reach_the_single_subscriber() {
        let transport = MemoryTransport::new(account());
        let mut events = transport.subscribe().await.unwrap();
        assert!(transport.subscribe().await.is_err());

        let message = transport.post(1, 1001, ".ping");
        transport.inject(message.clone()).await.unwrap();
        assert_eq!(events.recv().await, Some(message));
    }

    #[tokio::test]
    async fn edits_are_recorded_and_applied() {
        let transport = MemoryTransport::new(account());
        let original = transport.post(1, 1001, "hi");
        let reply = transport.post(1, 1001, "re").with_reply_to(original.id);

        transport.edit_message(1, original.id, "edited").await.unwrap();

        assert_eq!(transport.edits_of(original.id), vec!["edited".to_string()]);
        let context = transport.reply_context(&reply).await.unwrap().unwrap();
        assert_eq!(context.text, "edited");
    }
}
