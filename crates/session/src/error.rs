use palaver_remote::{RemoteError, RemoteErrorKind, ThreadId};
use snafu::Snafu;

/// Failures surfaced by the chat-session core.
///
/// Remote failures are converted into this taxonomy at the component
/// boundary, so no transport error leaks past the core. Local precondition
/// failures are reported without contacting the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("remote store unavailable while trying to {operation}: {message}"))]
    RemoteUnavailable {
        stage: &'static str,
        operation: &'static str,
        message: String,
    },
    #[snafu(display("timed out while trying to {operation}"))]
    Timeout {
        stage: &'static str,
        operation: &'static str,
    },
    #[snafu(display("thread '{thread_id}' no longer exists on the server"))]
    NotFound {
        stage: &'static str,
        thread_id: ThreadId,
    },
    #[snafu(display("a message is already being exchanged in thread '{thread_id}'"))]
    Busy {
        stage: &'static str,
        thread_id: ThreadId,
    },
    #[snafu(display("no signed-in session; log in again"))]
    Unauthenticated { stage: &'static str },
    #[snafu(display("the request finished after its session ended and was discarded"))]
    SessionEnded { stage: &'static str },
    #[snafu(display("message body is empty"))]
    EmptyMessage { stage: &'static str },
    #[snafu(display("thread title is empty"))]
    EmptyTitle { stage: &'static str },
    #[snafu(display("no thread is selected"))]
    NoActiveThread { stage: &'static str },
    #[snafu(display("thread '{thread_id}' is not the selected thread"))]
    NotActiveThread {
        stage: &'static str,
        thread_id: ThreadId,
    },
    #[snafu(display("thread '{thread_id}' is not in the thread list"))]
    UnknownThread {
        stage: &'static str,
        thread_id: ThreadId,
    },
    #[snafu(display("transcript of thread '{thread_id}' is still loading"))]
    TranscriptLoading {
        stage: &'static str,
        thread_id: ThreadId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RemoteUnavailable,
    Timeout,
    NotFound,
    Busy,
    Unauthenticated,
    SessionEnded,
    InvalidRequest,
}

impl ChatError {
    /// Converts a remote failure for `operation`.
    ///
    /// A remote `NotFound` without a thread to attribute it to is reported
    /// as unavailability; the server only returns 404 for thread routes.
    pub fn from_remote(
        stage: &'static str,
        operation: &'static str,
        thread_id: Option<&ThreadId>,
        error: &RemoteError,
    ) -> Self {
        match (error.kind(), thread_id) {
            (RemoteErrorKind::Timeout, _) => Self::Timeout { stage, operation },
            (RemoteErrorKind::Unauthorized, _) => Self::Unauthenticated { stage },
            (RemoteErrorKind::NotFound, Some(thread_id)) => Self::NotFound {
                stage,
                thread_id: thread_id.clone(),
            },
            (RemoteErrorKind::NotFound | RemoteErrorKind::Unavailable, _) => {
                Self::RemoteUnavailable {
                    stage,
                    operation,
                    message: error.to_string(),
                }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::SessionEnded { .. } => ErrorKind::SessionEnded,
            Self::EmptyMessage { .. }
            | Self::EmptyTitle { .. }
            | Self::NoActiveThread { .. }
            | Self::NotActiveThread { .. }
            | Self::UnknownThread { .. }
            | Self::TranscriptLoading { .. } => ErrorKind::InvalidRequest,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::NotFound { stage, .. }
            | Self::Busy { stage, .. }
            | Self::Unauthenticated { stage }
            | Self::SessionEnded { stage }
            | Self::EmptyMessage { stage }
            | Self::EmptyTitle { stage }
            | Self::NoActiveThread { stage }
            | Self::NotActiveThread { stage, .. }
            | Self::UnknownThread { stage, .. }
            | Self::TranscriptLoading { stage, .. } => stage,
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
