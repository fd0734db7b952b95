//! JSON payloads exchanged with the chat service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ThreadId, UserId};
use crate::types::{Sender, ThreadRecord, TranscriptRecord, deserialize_timestamp};

#[derive(Debug, Serialize)]
pub(crate) struct NewChatRequest<'a> {
    pub user_id: &'a UserId,
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewChatResponse {
    pub chat_id: ThreadId,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub user_id: &'a UserId,
    pub chat_id: &'a ThreadId,
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenameRequest<'a> {
    pub new_title: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatSummary {
    pub chat_id: ThreadId,
    pub title: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<ChatSummary> for ThreadRecord {
    fn from(summary: ChatSummary) -> Self {
        Self {
            thread_id: summary.chat_id,
            title: summary.title,
            created_at: summary.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessage {
    pub sender: Sender,
    pub message: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl From<ChatMessage> for TranscriptRecord {
    fn from(message: ChatMessage) -> Self {
        Self {
            sender: message.sender,
            body: message.message,
            timestamp: message.timestamp,
        }
    }
}

/// FastAPI error envelope. `detail` is a string for handled errors and a
/// list of field errors for request validation failures.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
