use std::collections::HashSet;
use std::sync::Arc;

use palaver_remote::{Sender, ThreadId};

use crate::active::ActiveState;
use crate::error::{ChatError, ChatResult};
use crate::events::ChatEvent;
use crate::state::Shared;
use crate::thread::DeliveryState;

/// Threads with a send awaiting its reply.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    threads: HashSet<ThreadId>,
}

impl InFlight {
    /// Claims the thread's single send slot. Returns `false` when taken.
    pub fn try_begin(&mut self, thread_id: &ThreadId) -> bool {
        self.threads.insert(thread_id.clone())
    }

    pub fn finish(&mut self, thread_id: &ThreadId) {
        self.threads.remove(thread_id);
    }

    pub fn contains(&self, thread_id: &ThreadId) -> bool {
        self.threads.contains(thread_id)
    }

    pub fn clear(&mut self) {
        self.threads.clear();
    }
}

/// Runs one user-message/assistant-reply round trip at a time per thread.
#[derive(Clone)]
pub struct MessageExchangeCoordinator {
    shared: Arc<Shared>,
}

impl MessageExchangeCoordinator {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn is_busy(&self, thread_id: &ThreadId) -> bool {
        self.shared.lock().exchanges.contains(thread_id)
    }

    /// Sends `body` to the active thread and returns the assistant's reply.
    ///
    /// The user message is appended as pending before the request goes out
    /// and settles to confirmed or failed when it returns. The reply is only
    /// appended while the same selection is still active.
    pub async fn send(&self, thread_id: &ThreadId, body: &str) -> ChatResult<String> {
        let stage = "exchange-send";
        let ticket = self.shared.begin(stage)?;

        let (generation, message_id) = {
            let mut state = self.shared.lock();
            if body.trim().is_empty() {
                return Err(self
                    .shared
                    .fail(&mut state, ChatError::EmptyMessage { stage }));
            }

            let rejection = match state.active.thread_id() {
                None => Some(ChatError::NoActiveThread { stage }),
                Some(active) if active != thread_id => Some(ChatError::NotActiveThread {
                    stage,
                    thread_id: thread_id.clone(),
                }),
                Some(_) if state.active.state() == ActiveState::Loading => {
                    Some(ChatError::TranscriptLoading {
                        stage,
                        thread_id: thread_id.clone(),
                    })
                }
                Some(_) => None,
            };
            if let Some(error) = rejection {
                return Err(self.shared.fail(&mut state, error));
            }
            if !state.exchanges.try_begin(thread_id) {
                return Err(self.shared.fail(
                    &mut state,
                    ChatError::Busy {
                        stage,
                        thread_id: thread_id.clone(),
                    },
                ));
            }

            let generation = state.active.generation();
            let Some(transcript) = state.active.transcript_mut(generation) else {
                state.exchanges.finish(thread_id);
                return Err(self
                    .shared
                    .fail(&mut state, ChatError::NoActiveThread { stage }));
            };
            let message_id = transcript.append(Sender::User, body, DeliveryState::Pending);
            tracing::info!(%thread_id, "message exchange started");
            self.shared.emit(ChatEvent::ExchangeStarted {
                thread_id: thread_id.clone(),
            });
            self.shared.emit(ChatEvent::TranscriptChanged {
                thread_id: thread_id.clone(),
            });
            (generation, message_id)
        };

        let result = self
            .shared
            .remote
            .send_message(&ticket.identity.user_id, thread_id, body)
            .await;

        let mut state = self.shared.lock();
        self.shared.ensure_current(&mut state, &ticket, stage)?;
        state.exchanges.finish(thread_id);
        let succeeded = result.is_ok();
        self.shared.emit(ChatEvent::ExchangeFinished {
            thread_id: thread_id.clone(),
            succeeded,
        });

        let transcript = state.active.transcript_mut(generation);
        if transcript.is_none() {
            tracing::debug!(%thread_id, "thread no longer active; exchange result not applied");
        }

        match result {
            Ok(reply) => {
                if let Some(transcript) = transcript {
                    transcript.settle(message_id, DeliveryState::Confirmed);
                    transcript.append(Sender::Assistant, reply.as_str(), DeliveryState::Confirmed);
                    self.shared.emit(ChatEvent::TranscriptChanged {
                        thread_id: thread_id.clone(),
                    });
                }
                tracing::info!(%thread_id, "message exchange completed");
                Ok(reply)
            }
            Err(error) => {
                if let Some(transcript) = transcript {
                    transcript.settle(message_id, DeliveryState::Failed);
                    self.shared.emit(ChatEvent::TranscriptChanged {
                        thread_id: thread_id.clone(),
                    });
                }
                Err(self.shared.fail(
                    &mut state,
                    ChatError::from_remote(stage, "send a message", Some(thread_id), &error),
                ))
            }
        }
    }
}
