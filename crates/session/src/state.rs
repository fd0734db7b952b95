use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use palaver_remote::RemoteStore;
use tokio::sync::broadcast;

use crate::active::ActiveThread;
use crate::error::{ChatError, ChatResult, ErrorKind};
use crate::events::ChatEvent;
use crate::exchange::InFlight;
use crate::registry::ThreadList;
use crate::session::{Identity, IdentityProvider};

const EVENT_CAPACITY: usize = 64;

/// Everything the components mutate, guarded by one lock.
///
/// The lock is only taken between awaits, never across one.
#[derive(Debug, Default)]
pub(crate) struct ChatState {
    pub threads: ThreadList,
    pub active: ActiveThread,
    pub exchanges: InFlight,
    pub last_error: Option<ChatError>,
    /// Bumped on every session reset; completions from an older epoch are dropped.
    pub epoch: u64,
    /// Set when the session ended under the lock; `IdentityProvider::forget`
    /// runs once the lock is released.
    pub forget_identity: bool,
}

impl ChatState {
    pub fn reset(&mut self) {
        self.threads.clear();
        self.active.clear();
        self.exchanges.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Identity and epoch captured when an operation starts.
pub(crate) struct Ticket {
    pub identity: Arc<Identity>,
    pub epoch: u64,
}

pub(crate) struct Shared {
    pub remote: Arc<dyn RemoteStore>,
    pub identity: Arc<dyn IdentityProvider>,
    state: Mutex<ChatState>,
    events: broadcast::Sender<ChatEvent>,
}

impl Shared {
    pub fn new(remote: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            remote,
            identity,
            state: Mutex::new(ChatState::default()),
            events,
        }
    }

    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            state: self.lock_state(),
            _after: AfterUnlock { shared: self },
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: ChatEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    pub fn begin(&self, stage: &'static str) -> ChatResult<Ticket> {
        let mut state = self.lock();
        match self.identity.current() {
            Some(identity) => Ok(Ticket {
                identity,
                epoch: state.epoch,
            }),
            None => Err(self.fail(&mut state, ChatError::Unauthenticated { stage })),
        }
    }

    /// Rejects a completion whose session ended while it was in flight.
    pub fn ensure_current(
        &self,
        state: &mut ChatState,
        ticket: &Ticket,
        stage: &'static str,
    ) -> ChatResult<()> {
        if state.epoch == ticket.epoch {
            return Ok(());
        }
        tracing::debug!(stage, "dropping result from an ended session");
        Err(ChatError::SessionEnded { stage })
    }

    /// Records `error` as the last error and returns it.
    ///
    /// An authentication failure also ends the session.
    pub fn fail(&self, state: &mut ChatState, error: ChatError) -> ChatError {
        match error.kind() {
            ErrorKind::InvalidRequest | ErrorKind::Busy | ErrorKind::SessionEnded => {
                tracing::debug!(stage = error.stage(), error = %error, "chat request rejected");
            }
            ErrorKind::RemoteUnavailable
            | ErrorKind::Timeout
            | ErrorKind::NotFound
            | ErrorKind::Unauthenticated => {
                tracing::warn!(stage = error.stage(), error = %error, "chat operation failed");
            }
        }

        if error.kind() == ErrorKind::Unauthenticated {
            state.reset();
            state.forget_identity = true;
            self.identity.clear();
            tracing::info!("session reset after authentication failure");
            self.emit(ChatEvent::SessionReset);
        }

        state.last_error = Some(error.clone());
        self.emit(ChatEvent::ErrorRaised {
            error: error.clone(),
        });
        error
    }
}

/// Lock on [`ChatState`] that runs deferred identity cleanup after release.
pub(crate) struct StateGuard<'a> {
    // Fields drop in order: the mutex is released before `_after` runs.
    state: MutexGuard<'a, ChatState>,
    _after: AfterUnlock<'a>,
}

impl Deref for StateGuard<'_> {
    type Target = ChatState;

    fn deref(&self) -> &ChatState {
        &self.state
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }
}

struct AfterUnlock<'a> {
    shared: &'a Shared,
}

impl Drop for AfterUnlock<'_> {
    fn drop(&mut self) {
        let forget = std::mem::take(&mut self.shared.lock_state().forget_identity);
        if forget {
            self.shared.identity.forget();
        }
    }
}
