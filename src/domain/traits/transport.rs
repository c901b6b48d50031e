use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::domain::entities::Message;

/// Stream of messages observed on the session
pub type EventStream = mpsc::Receiver<Message>;

/// Transport trait - abstraction for the messaging-platform session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the session and hand back the event stream.
    ///
    /// Events arrive in the order the transport observed them.
    async fn subscribe(&self) -> Result<EventStream, BotError>;

    /// Replace the text of an existing message
    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), BotError>;

    /// Send a new message to a chat, returning its id
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64, BotError>;

    /// Fetch the message `event` replies to, if any
    async fn reply_context(&self, event: &Message) -> Result<Option<Message>, BotError>;

    /// Account the session is logged in as
    fn account(&self) -> AccountInfo;
}

/// Session account information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
}
