use palaver_remote::ThreadId;

use crate::active::ActiveState;
use crate::error::ChatError;
use crate::session::Identity;
use crate::thread::{Message, Thread};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveView {
    pub thread: Thread,
    pub state: ActiveState,
}

/// Read-only copy of everything a presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSnapshot {
    pub identity: Option<Identity>,
    pub threads: Vec<Thread>,
    pub active: Option<ActiveView>,
    pub transcript: Vec<Message>,
    /// A send is awaiting its reply in the active thread.
    pub busy: bool,
    pub last_error: Option<ChatError>,
}

impl ChatSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn active_thread_id(&self) -> Option<&ThreadId> {
        self.active.as_ref().map(|view| &view.thread.id)
    }

    pub fn active_state(&self) -> ActiveState {
        self.active
            .as_ref()
            .map(|view| view.state.clone())
            .unwrap_or_default()
    }

    /// Position of the active thread in the list, counting from zero.
    pub fn active_index(&self) -> Option<usize> {
        let active = self.active_thread_id()?;
        self.threads.iter().position(|thread| &thread.id == active)
    }
}
