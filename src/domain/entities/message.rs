use chrono::{DateTime, Utc};

/// A message observed on the account's session.
///
/// The dispatcher only ever sees the account's own outgoing messages, so
/// `sender_id` is normally the session principal; it is still carried so
/// the owner gate has something to check.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub outgoing: bool,
    pub timestamp: DateTime<Utc>,
    pub platform: String,
}

impl Message {
    pub fn new(id: i64, chat_id: i64, sender_id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            chat_id,
            sender_id,
            text: text.into(),
            reply_to: None,
            outgoing: true,
            timestamp: Utc::now(),
            platform: "unknown".to_string(),
        }
    }

    pub fn with_reply_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn incoming(mut self) -> Self {
        self.outgoing = false;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
