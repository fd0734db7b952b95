use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::ids::{ThreadId, UserId};

/// Title the server assigns when a thread is created without one.
pub const DEFAULT_THREAD_TITLE: &str = "New Chat";

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "bot", alias = "assistant")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRecord {
    pub sender: Sender,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parses server timestamps.
///
/// The server writes naive UTC (`2024-05-01T12:00:00.123456`); RFC 3339 is
/// accepted as well so other deployments with explicit offsets still decode.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{raw}'")))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn naive_server_timestamps_are_read_as_utc() {
        let parsed = parse_timestamp("2024-05-01T12:30:05.123456").expect("naive timestamp");
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 5, 1));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (12, 30, 5));
    }

    #[test]
    fn offset_timestamps_are_normalized_to_utc() {
        let parsed = parse_timestamp("2024-05-01T14:30:00+02:00").expect("rfc3339 timestamp");
        assert_eq!(parsed.hour(), 12);
    }

    #[test]
    fn garbage_timestamps_are_rejected() {
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn bot_and_assistant_both_decode_to_assistant() {
        let bot: Sender = serde_json::from_str("\"bot\"").expect("bot sender");
        let assistant: Sender = serde_json::from_str("\"assistant\"").expect("assistant sender");
        assert_eq!(bot, Sender::Assistant);
        assert_eq!(assistant, Sender::Assistant);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("ada", "hunter2"));
        assert!(rendered.contains("ada"));
        assert!(!rendered.contains("hunter2"));
    }
}
