use std::sync::Arc;

use palaver_remote::{RemoteStore, ThreadId};
use tokio::sync::broadcast;

use crate::active::{ActiveThreadController, FallbackLoad, SelectOutcome};
use crate::error::{ChatError, ChatResult};
use crate::events::ChatEvent;
use crate::exchange::MessageExchangeCoordinator;
use crate::registry::ThreadRegistry;
use crate::session::{Identity, IdentityProvider};
use crate::snapshot::{ActiveView, ChatSnapshot};
use crate::state::Shared;
use crate::thread::Thread;

/// Entry point for a presentation layer.
///
/// Cloning is cheap; every clone drives the same state. All methods take
/// `&self`, so a send can be awaited while the user keeps browsing threads.
#[derive(Clone)]
pub struct ChatSession {
    shared: Arc<Shared>,
    registry: ThreadRegistry,
    controller: ActiveThreadController,
    exchange: MessageExchangeCoordinator,
}

impl ChatSession {
    pub fn new(remote: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        let shared = Arc::new(Shared::new(remote, identity));
        let controller = ActiveThreadController::new(Arc::clone(&shared));
        Self {
            registry: ThreadRegistry::new(Arc::clone(&shared), controller.clone()),
            exchange: MessageExchangeCoordinator::new(Arc::clone(&shared)),
            controller,
            shared,
        }
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    pub fn controller(&self) -> &ActiveThreadController {
        &self.controller
    }

    pub fn exchange(&self) -> &MessageExchangeCoordinator {
        &self.exchange
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.shared.identity.current()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.subscribe()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let identity = self.shared.identity.current().map(|identity| (*identity).clone());
        let state = self.shared.lock();
        let active = state.active.thread().map(|thread| ActiveView {
            thread: thread.clone(),
            state: state.active.state(),
        });
        let busy = state
            .active
            .thread_id()
            .is_some_and(|thread_id| state.exchanges.contains(thread_id));

        ChatSnapshot {
            identity,
            threads: state.threads.to_vec(),
            active,
            transcript: state
                .active
                .transcript()
                .map(|transcript| transcript.entries().to_vec())
                .unwrap_or_default(),
            busy,
            last_error: state.last_error.clone(),
        }
    }

    /// Starts a fresh session for `identity` and loads its threads.
    pub async fn sign_in(&self, identity: Identity) -> ChatResult<Vec<Thread>> {
        {
            let mut state = self.shared.lock();
            state.reset();
            state.last_error = None;
        }
        tracing::info!(user_id = %identity.user_id, "signed in");
        self.shared.identity.sign_in(identity);
        self.shared.emit(ChatEvent::SessionReset);
        self.load_threads().await
    }

    /// Ends the session and drops all local state.
    pub fn sign_out(&self) {
        self.shared.identity.clear();
        {
            let mut state = self.shared.lock();
            state.reset();
            state.last_error = None;
        }
        self.shared.identity.forget();
        tracing::info!("signed out");
        self.shared.emit(ChatEvent::SessionReset);
    }

    /// Loads the thread list and reconciles the selection with it.
    ///
    /// The first thread is selected when the list was empty before. If the
    /// active thread is missing from the new listing, the first remaining
    /// thread replaces it.
    pub async fn load_threads(&self) -> ChatResult<Vec<Thread>> {
        let stage = "chat-load-threads";
        let ticket = self.shared.begin(stage)?;
        let previously_empty = self.shared.lock().threads.is_empty();

        let threads = self.registry.load().await?;

        let follow_up = {
            let mut state = self.shared.lock();
            self.shared.ensure_current(&mut state, &ticket, stage)?;
            match state.active.thread_id().cloned() {
                Some(thread_id) if state.threads.contains(&thread_id) => None,
                Some(thread_id) => {
                    tracing::info!(%thread_id, "active thread missing from refreshed list");
                    Some(ActiveThreadController::begin_fallback(
                        &self.shared,
                        &mut state,
                    ))
                }
                None if previously_empty && !state.threads.is_empty() => Some(
                    ActiveThreadController::begin_fallback(&self.shared, &mut state),
                ),
                None => None,
            }
        };

        if let Some(FallbackLoad::Loading(load)) = follow_up {
            let thread_id = load.thread_id.clone();
            if let Err(error) = self.controller.fetch(&ticket, load).await {
                tracing::debug!(%thread_id, error = %error, "initial transcript not loaded");
            }
        }
        Ok(threads)
    }

    pub async fn create_thread(&self, title: &str) -> ChatResult<Thread> {
        self.registry.create(title).await
    }

    pub async fn rename_thread(&self, thread_id: &ThreadId, new_title: &str) -> ChatResult<()> {
        self.registry.rename(thread_id, new_title).await
    }

    pub async fn delete_thread(&self, thread_id: &ThreadId) -> ChatResult<Option<ThreadId>> {
        self.registry.delete(thread_id).await
    }

    pub async fn select_thread(&self, thread_id: &ThreadId) -> ChatResult<SelectOutcome> {
        self.controller.select(thread_id).await
    }

    pub async fn reload_transcript(&self) -> ChatResult<SelectOutcome> {
        self.controller.reload().await
    }

    /// Sends `body` to whichever thread is active.
    pub async fn send(&self, body: &str) -> ChatResult<String> {
        let stage = "chat-send";
        self.shared.begin(stage)?;
        let active = {
            let mut state = self.shared.lock();
            match state.active.thread_id().cloned() {
                Some(thread_id) => thread_id,
                None => {
                    return Err(self
                        .shared
                        .fail(&mut state, ChatError::NoActiveThread { stage }));
                }
            }
        };
        self.exchange.send(&active, body).await
    }

    pub fn clear_error(&self) {
        self.shared.lock().last_error = None;
    }
}
