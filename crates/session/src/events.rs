use palaver_remote::ThreadId;

use crate::error::ChatError;

/// Change notifications for a presentation layer.
///
/// Events carry identifiers only; read the new state through
/// [`crate::ChatSession::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    ThreadsChanged,
    ThreadSelected { thread_id: Option<ThreadId> },
    TranscriptChanged { thread_id: ThreadId },
    ExchangeStarted { thread_id: ThreadId },
    ExchangeFinished { thread_id: ThreadId, succeeded: bool },
    ErrorRaised { error: ChatError },
    SessionReset,
}
