use std::sync::Arc;

use palaver_remote::ThreadId;

use crate::error::{ChatError, ChatResult};
use crate::events::ChatEvent;
use crate::state::{ChatState, Shared, Ticket};
use crate::thread::{Message, Thread, Transcript};

/// Lifecycle of the selected thread's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveState {
    #[default]
    None,
    Loading,
    Ready,
    Error(ChatError),
}

/// How a selection request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The thread was already selected; nothing was fetched.
    Unchanged,
    Loaded,
    /// A newer selection started before the fetch returned; its result was dropped.
    Superseded,
}

/// Routing key for one transcript fetch.
///
/// The generation changes on every selection so stale fetches can be rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TranscriptLoad {
    pub thread_id: ThreadId,
    pub generation: u64,
}

pub(crate) enum FallbackLoad {
    Cleared,
    Loading(TranscriptLoad),
}

#[derive(Debug, Clone)]
struct Selection {
    thread: Thread,
    state: ActiveState,
    transcript: Transcript,
}

/// Selected thread plus its transcript.
#[derive(Debug, Default)]
pub(crate) struct ActiveThread {
    generation: u64,
    selection: Option<Selection>,
}

impl ActiveThread {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn thread(&self) -> Option<&Thread> {
        self.selection.as_ref().map(|selection| &selection.thread)
    }

    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread().map(|thread| &thread.id)
    }

    pub fn is_thread(&self, thread_id: &ThreadId) -> bool {
        self.thread_id() == Some(thread_id)
    }

    pub fn state(&self) -> ActiveState {
        self.selection
            .as_ref()
            .map(|selection| selection.state.clone())
            .unwrap_or_default()
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.selection.as_ref().map(|selection| &selection.transcript)
    }

    /// Returns the transcript only while `generation` is still current.
    pub fn transcript_mut(&mut self, generation: u64) -> Option<&mut Transcript> {
        if generation != self.generation {
            return None;
        }
        self.selection
            .as_mut()
            .map(|selection| &mut selection.transcript)
    }

    pub fn accepts(&self, load: &TranscriptLoad) -> bool {
        load.generation == self.generation && self.is_thread(&load.thread_id)
    }

    /// Selects `thread` with an empty transcript pending a fetch.
    pub fn begin_loading(&mut self, thread: Thread) -> TranscriptLoad {
        let thread_id = thread.id.clone();
        self.replace(thread, ActiveState::Loading);
        TranscriptLoad {
            thread_id,
            generation: self.generation,
        }
    }

    /// Selects a thread that is known to have no history yet.
    pub fn adopt(&mut self, thread: Thread) {
        self.replace(thread, ActiveState::Ready);
    }

    pub fn finish_loading(&mut self, load: &TranscriptLoad, transcript: Transcript) -> bool {
        if !self.accepts(load) {
            return false;
        }
        if let Some(selection) = self.selection.as_mut() {
            selection.transcript = transcript;
            selection.state = ActiveState::Ready;
        }
        true
    }

    pub fn fail_loading(&mut self, load: &TranscriptLoad, error: ChatError) -> bool {
        if !self.accepts(load) {
            return false;
        }
        if let Some(selection) = self.selection.as_mut() {
            selection.state = ActiveState::Error(error);
        }
        true
    }

    pub fn retitle(&mut self, thread_id: &ThreadId, title: &str) -> bool {
        match self.selection.as_mut() {
            Some(selection) if &selection.thread.id == thread_id => {
                selection.thread.title = title.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.selection = None;
    }

    fn replace(&mut self, thread: Thread, state: ActiveState) {
        self.generation = self.generation.wrapping_add(1);
        self.selection = Some(Selection {
            thread,
            state,
            transcript: Transcript::default(),
        });
    }
}

/// Switches the active thread and keeps its transcript in sync.
#[derive(Clone)]
pub struct ActiveThreadController {
    shared: Arc<Shared>,
}

impl ActiveThreadController {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn active_thread_id(&self) -> Option<ThreadId> {
        self.shared.lock().active.thread_id().cloned()
    }

    pub fn state(&self) -> ActiveState {
        self.shared.lock().active.state()
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.shared
            .lock()
            .active
            .transcript()
            .map(|transcript| transcript.entries().to_vec())
            .unwrap_or_default()
    }

    /// Makes `thread_id` active and fetches its transcript.
    ///
    /// Selecting the thread that is already active is a no-op. A fetch that
    /// returns after another selection started is discarded and reported as
    /// [`SelectOutcome::Superseded`].
    pub async fn select(&self, thread_id: &ThreadId) -> ChatResult<SelectOutcome> {
        let stage = "active-select";
        let ticket = self.shared.begin(stage)?;
        let load = {
            let mut state = self.shared.lock();
            if state.active.is_thread(thread_id) {
                tracing::debug!(%thread_id, "thread already active");
                return Ok(SelectOutcome::Unchanged);
            }
            let Some(thread) = state.threads.get(thread_id).cloned() else {
                return Err(self.shared.fail(
                    &mut state,
                    ChatError::UnknownThread {
                        stage,
                        thread_id: thread_id.clone(),
                    },
                ));
            };
            let load = state.active.begin_loading(thread);
            tracing::info!(%thread_id, "thread selected");
            self.shared.emit(ChatEvent::ThreadSelected {
                thread_id: Some(thread_id.clone()),
            });
            load
        };

        self.fetch(&ticket, load).await
    }

    /// Fetches the active thread's transcript again, replacing the local copy.
    pub async fn reload(&self) -> ChatResult<SelectOutcome> {
        let stage = "active-reload";
        let ticket = self.shared.begin(stage)?;
        let load = {
            let mut state = self.shared.lock();
            let Some(thread) = state.active.thread().cloned() else {
                return Err(self
                    .shared
                    .fail(&mut state, ChatError::NoActiveThread { stage }));
            };
            if state.exchanges.contains(&thread.id) {
                return Err(self.shared.fail(
                    &mut state,
                    ChatError::Busy {
                        stage,
                        thread_id: thread.id,
                    },
                ));
            }
            tracing::debug!(thread_id = %thread.id, "reloading transcript");
            state.active.begin_loading(thread)
        };

        self.fetch(&ticket, load).await
    }

    /// Selects the first listed thread, or clears the selection when the
    /// list is empty. The caller fetches the returned load.
    pub(crate) fn begin_fallback(shared: &Shared, state: &mut ChatState) -> FallbackLoad {
        match state.threads.first().cloned() {
            Some(thread) => {
                let thread_id = thread.id.clone();
                let load = state.active.begin_loading(thread);
                tracing::info!(%thread_id, "fell back to first thread");
                shared.emit(ChatEvent::ThreadSelected {
                    thread_id: Some(thread_id),
                });
                FallbackLoad::Loading(load)
            }
            None => {
                state.active.clear();
                tracing::info!("no thread left to select");
                shared.emit(ChatEvent::ThreadSelected { thread_id: None });
                FallbackLoad::Cleared
            }
        }
    }

    pub(crate) async fn fetch(
        &self,
        ticket: &Ticket,
        load: TranscriptLoad,
    ) -> ChatResult<SelectOutcome> {
        let stage = "active-fetch-transcript";
        let result = self
            .shared
            .remote
            .get_transcript(&ticket.identity.user_id, &load.thread_id)
            .await;

        let mut state = self.shared.lock();
        self.shared.ensure_current(&mut state, ticket, stage)?;
        if !state.active.accepts(&load) {
            tracing::debug!(thread_id = %load.thread_id, "discarding superseded transcript");
            return Ok(SelectOutcome::Superseded);
        }

        match result {
            Ok(records) => {
                let transcript = Transcript::from_records(records);
                tracing::debug!(
                    thread_id = %load.thread_id,
                    entries = transcript.len(),
                    "transcript loaded"
                );
                state.active.finish_loading(&load, transcript);
                self.shared.emit(ChatEvent::TranscriptChanged {
                    thread_id: load.thread_id,
                });
                Ok(SelectOutcome::Loaded)
            }
            Err(error) => {
                let error = ChatError::from_remote(
                    stage,
                    "load a transcript",
                    Some(&load.thread_id),
                    &error,
                );
                state.active.fail_loading(&load, error.clone());
                Err(self.shared.fail(&mut state, error))
            }
        }
    }
}
