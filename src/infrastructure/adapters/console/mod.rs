//! Console adapter for development/testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::Message;
use crate::domain::traits::{AccountInfo, EventStream, Transport};

const CHANNEL_CAPACITY: usize = 64;

/// Console transport for local development.
///
/// Every stdin line becomes an outgoing message from the configured account
/// in a single chat whose id equals the account id. Edits are printed.
pub struct ConsoleAdapter {
    account: AccountInfo,
    messages: Arc<Mutex<HashMap<i64, Message>>>,
    next_id: Arc<AtomicI64>,
}

impl ConsoleAdapter {
    pub fn new(account: AccountInfo) -> Self {
        Self {
            account,
            messages: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    fn remember(messages: &Mutex<HashMap<i64, Message>>, message: &Message) {
        if let Ok(mut messages) = messages.lock() {
            messages.insert(message.id, message.clone());
        }
    }
}

#[async_trait]
impl Transport for ConsoleAdapter {
    async fn subscribe(&self) -> Result<EventStream, BotError> {
        tracing::info!("Starting console transport (dev mode)");
        println!("Type commands (e.g. .help). Ctrl-D to quit.");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let account_id = self.account.id;
        let messages = self.messages.clone();
        let next_id = self.next_id.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let id = next_id.fetch_add(1, Ordering::SeqCst);
                        let message =
                            Message::new(id, account_id, account_id, line).with_platform("console");
                        Self::remember(&messages, &message);
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Console input closed");
        });

        Ok(rx)
    }

    async fn edit_message(&self, _chat_id: i64, message_id: i64, text: &str) -> Result<(), BotError> {
        if let Ok(mut messages) = self.messages.lock() {
            if let Some(message) = messages.get_mut(&message_id) {
                message.text = text.to_string();
            }
        }
        println!("[#{}] {}", message_id, text);
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message::new(id, chat_id, self.account.id, text).with_platform("console");
        Self::remember(&self.messages, &message);
        println!("[#{}] {}", id, text);
        Ok(id)
    }

    async fn reply_context(&self, event: &Message) -> Result<Option<Message>, BotError> {
        let Some(reply_to) = event.reply_to else {
            return Ok(None);
        };
        Ok(self
            .messages
            .lock()
            .ok()
            .and_then(|messages| messages.get(&reply_to).cloned()))
    }

    fn account(&self) -> AccountInfo {
        self.account.clone()
    }
}
