use chrono::{DateTime, Utc};
use palaver_remote::{Sender, ThreadId, ThreadRecord, TranscriptRecord};

/// One conversation as the thread list shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Thread {
    /// Creates a thread summary.
    pub fn new(id: ThreadId, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            created_at,
        }
    }
}

impl From<ThreadRecord> for Thread {
    fn from(record: ThreadRecord) -> Self {
        Self::new(record.thread_id, record.title, record.created_at)
    }
}

/// Position of one entry within its transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Whether the server has acknowledged an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub state: DeliveryState,
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.state == DeliveryState::Pending
    }
}

/// Ordered message log of the active thread.
///
/// Entries are only ever appended; the one mutation allowed afterwards is
/// settling a pending entry to `Confirmed` or `Failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    /// Builds a transcript from server history, every entry confirmed.
    pub fn from_records(records: Vec<TranscriptRecord>) -> Self {
        let mut transcript = Self::default();
        for record in records {
            transcript.push(
                record.sender,
                record.body,
                record.timestamp,
                DeliveryState::Confirmed,
            );
        }
        transcript
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(Message::is_pending)
    }

    pub(crate) fn append(
        &mut self,
        sender: Sender,
        body: impl Into<String>,
        state: DeliveryState,
    ) -> MessageId {
        self.push(sender, body.into(), Utc::now(), state)
    }

    /// Moves a pending entry to its final state. Returns `false` when the
    /// entry is missing or was already settled.
    pub(crate) fn settle(&mut self, id: MessageId, state: DeliveryState) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) if entry.is_pending() && state != DeliveryState::Pending => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    fn push(
        &mut self,
        sender: Sender,
        body: String,
        timestamp: DateTime<Utc>,
        state: DeliveryState,
    ) -> MessageId {
        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        self.entries.push(Message {
            id,
            sender,
            body,
            timestamp,
            state,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_history_is_confirmed_in_order() {
        let now = Utc::now();
        let transcript = Transcript::from_records(vec![
            TranscriptRecord {
                sender: Sender::User,
                body: "Hello".to_string(),
                timestamp: now,
            },
            TranscriptRecord {
                sender: Sender::Assistant,
                body: "Hi there!".to_string(),
                timestamp: now,
            },
        ]);

        let bodies = transcript
            .entries()
            .iter()
            .map(|entry| (entry.id, entry.body.as_str(), entry.state))
            .collect::<Vec<_>>();
        assert_eq!(
            bodies,
            vec![
                (MessageId::new(0), "Hello", DeliveryState::Confirmed),
                (MessageId::new(1), "Hi there!", DeliveryState::Confirmed),
            ]
        );
    }

    #[test]
    fn settle_only_applies_once() {
        let mut transcript = Transcript::default();
        let id = transcript.append(Sender::User, "Hello", DeliveryState::Pending);

        assert!(transcript.settle(id, DeliveryState::Failed));
        assert!(!transcript.settle(id, DeliveryState::Confirmed));
        assert_eq!(
            transcript.get(id).map(|entry| entry.state),
            Some(DeliveryState::Failed)
        );
    }

    #[test]
    fn settle_ignores_unknown_entries() {
        let mut transcript = Transcript::default();
        assert!(!transcript.settle(MessageId::new(7), DeliveryState::Confirmed));
    }

    #[test]
    fn ids_keep_increasing_after_appends() {
        let mut transcript = Transcript::default();
        let first = transcript.append(Sender::User, "one", DeliveryState::Pending);
        let second = transcript.append(Sender::Assistant, "two", DeliveryState::Confirmed);
        assert!(first < second);
        assert!(transcript.has_pending());
    }
}
