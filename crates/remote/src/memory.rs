use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use snafu::{OptionExt, ensure};
use uuid::Uuid;

use super::error::{NotFoundSnafu, RejectedSnafu, RemoteResult, UnauthorizedSnafu};
use super::ids::{ThreadId, UserId};
use super::types::{
    AccountRecord, Credentials, DEFAULT_THREAD_TITLE, Sender, ThreadRecord, TranscriptRecord,
};
use super::{AuthService, BoxFuture, RemoteStore};

/// Produces the assistant reply for one submitted message.
pub type ReplyFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub fn echo_reply() -> ReplyFn {
    Arc::new(|body: &str| format!("You said: {body}"))
}

#[derive(Debug, Clone)]
struct StoredThread {
    record: ThreadRecord,
    transcript: Vec<TranscriptRecord>,
}

#[derive(Debug, Clone)]
struct StoredAccount {
    password: String,
    record: AccountRecord,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, StoredAccount>,
    threads: HashMap<UserId, Vec<StoredThread>>,
}

/// In-process store with the chat service's validation rules.
///
/// Threads are stored and listed in creation order, as the chat service
/// lists them.
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
    reply: ReplyFn,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryRemoteStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MemoryRemoteStore")
            .finish_non_exhaustive()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_reply(echo_reply())
    }

    pub fn with_reply(reply: ReplyFn) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            reply,
        }
    }

    /// Registers a thread directly, bypassing `create_thread`.
    pub fn seed_thread(&self, user_id: &UserId, record: ThreadRecord) {
        self.lock()
            .threads
            .entry(user_id.clone())
            .or_default()
            .push(StoredThread {
                record,
                transcript: Vec::new(),
            });
    }

    pub fn thread_titles(&self, user_id: &UserId) -> Vec<String> {
        self.lock()
            .threads
            .get(user_id)
            .map(|threads| {
                threads
                    .iter()
                    .map(|thread| thread.record.title.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_thread<T>(
        &self,
        stage: &'static str,
        user_id: &UserId,
        thread_id: &ThreadId,
        apply: impl FnOnce(&mut StoredThread) -> T,
    ) -> RemoteResult<T> {
        let mut state = self.lock();
        let thread = state
            .threads
            .get_mut(user_id)
            .and_then(|threads| {
                threads
                    .iter_mut()
                    .find(|thread| &thread.record.thread_id == thread_id)
            })
            .context(NotFoundSnafu {
                stage,
                entity: "thread",
                id: thread_id.to_string(),
            })?;
        Ok(apply(thread))
    }
}

fn mint_id<T: std::str::FromStr>() -> Option<T> {
    Uuid::new_v4().to_string().parse().ok()
}

impl RemoteStore for MemoryRemoteStore {
    fn list_threads<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, RemoteResult<Vec<ThreadRecord>>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .threads
                .get(user_id)
                .map(|threads| {
                    threads
                        .iter()
                        .map(|thread| thread.record.clone())
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn create_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<ThreadId>> {
        Box::pin(async move {
            let thread_id: ThreadId = mint_id().context(RejectedSnafu {
                stage: "memory-create-thread-mint-id",
                status: 500_u16,
                message: "failed to mint thread id".to_string(),
            })?;
            let title = if title.trim().is_empty() {
                DEFAULT_THREAD_TITLE.to_string()
            } else {
                title.to_string()
            };

            self.seed_thread(
                user_id,
                ThreadRecord {
                    thread_id: thread_id.clone(),
                    title,
                    created_at: Utc::now(),
                },
            );
            Ok(thread_id)
        })
    }

    fn get_transcript<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<Vec<TranscriptRecord>>> {
        Box::pin(async move {
            self.with_thread("memory-get-transcript", user_id, thread_id, |thread| {
                thread.transcript.clone()
            })
        })
    }

    fn send_message<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        body: &'a str,
    ) -> BoxFuture<'a, RemoteResult<String>> {
        Box::pin(async move {
            ensure!(
                !body.trim().is_empty(),
                RejectedSnafu {
                    stage: "memory-send-message-validate",
                    status: 400_u16,
                    message: "Message cannot be empty".to_string(),
                }
            );

            let reply = (self.reply)(body);
            self.with_thread("memory-send-message", user_id, thread_id, |thread| {
                let now = Utc::now();
                thread.transcript.push(TranscriptRecord {
                    sender: Sender::User,
                    body: body.to_string(),
                    timestamp: now,
                });
                thread.transcript.push(TranscriptRecord {
                    sender: Sender::Assistant,
                    body: reply.clone(),
                    timestamp: now,
                });
            })?;
            Ok(reply)
        })
    }

    fn delete_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            let threads = state.threads.entry(user_id.clone()).or_default();
            let before = threads.len();
            threads.retain(|thread| &thread.record.thread_id != thread_id);
            ensure!(
                threads.len() < before,
                NotFoundSnafu {
                    stage: "memory-delete-thread",
                    entity: "thread",
                    id: thread_id.to_string(),
                }
            );
            Ok(())
        })
    }

    fn rename_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            ensure!(
                !title.trim().is_empty(),
                RejectedSnafu {
                    stage: "memory-rename-thread-validate",
                    status: 400_u16,
                    message: "New title is required".to_string(),
                }
            );
            self.with_thread("memory-rename-thread", user_id, thread_id, |thread| {
                thread.record.title = title.to_string();
            })
        })
    }
}

impl AuthService for MemoryRemoteStore {
    fn login<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, RemoteResult<AccountRecord>> {
        Box::pin(async move {
            let state = self.lock();
            state
                .accounts
                .get(&credentials.username)
                .filter(|account| account.password == credentials.password)
                .map(|account| account.record.clone())
                .context(UnauthorizedSnafu {
                    stage: "memory-login",
                    message: "Invalid credentials".to_string(),
                })
        })
    }

    fn signup<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, RemoteResult<AccountRecord>> {
        Box::pin(async move {
            ensure!(
                !credentials.username.trim().is_empty() && !credentials.password.is_empty(),
                RejectedSnafu {
                    stage: "memory-signup-validate",
                    status: 400_u16,
                    message: "Username and password are required".to_string(),
                }
            );

            let mut state = self.lock();
            ensure!(
                !state.accounts.contains_key(&credentials.username),
                RejectedSnafu {
                    stage: "memory-signup-duplicate",
                    status: 400_u16,
                    message: "Username already exists".to_string(),
                }
            );

            let user_id: UserId = mint_id().context(RejectedSnafu {
                stage: "memory-signup-mint-id",
                status: 500_u16,
                message: "failed to mint user id".to_string(),
            })?;
            let record = AccountRecord {
                user_id,
                username: credentials.username.clone(),
            };
            state.accounts.insert(
                credentials.username.clone(),
                StoredAccount {
                    password: credentials.password.clone(),
                    record: record.clone(),
                },
            );
            Ok(record)
        })
    }

    fn health(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
