#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{TimeDelta, Utc};
use palaver_remote::{
    BoxFuture, MemoryRemoteStore, RemoteError, RemoteResult, RemoteStore, ThreadRecord,
    TranscriptRecord, UserId,
};
use palaver_session::{ChatSession, Identity, IdentityProvider, Session, ThreadId};
use tokio::sync::{Notify, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListThreads,
    CreateThread,
    GetTranscript,
    SendMessage,
    DeleteThread,
    RenameThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unavailable,
    Timeout,
    NotFound,
    Unauthorized,
}

impl Failure {
    fn into_error(self, thread_id: Option<&ThreadId>) -> RemoteError {
        let stage = "scripted-store";
        match self {
            Self::Unavailable => RemoteError::Unavailable {
                stage,
                status: 503,
                message: "AI service unavailable".to_string(),
            },
            Self::Timeout => RemoteError::Timeout { stage },
            Self::NotFound => RemoteError::NotFound {
                stage,
                entity: "thread",
                id: thread_id.map(ThreadId::to_string).unwrap_or_default(),
            },
            Self::Unauthorized => RemoteError::Unauthorized {
                stage,
                message: "session expired".to_string(),
            },
        }
    }
}

struct Hold {
    reached: Arc<Notify>,
    release: oneshot::Receiver<()>,
}

/// Test handle for a held remote call.
pub struct Gate {
    reached: Arc<Notify>,
    release: oneshot::Sender<()>,
}

impl Gate {
    /// Resolves once the held call has arrived at the store.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Default)]
struct Script {
    calls: Vec<(Op, Option<ThreadId>)>,
    failures: HashMap<Op, VecDeque<Failure>>,
    holds: HashMap<(Op, Option<ThreadId>), Hold>,
}

/// Memory store wrapper that counts calls, injects failures and holds
/// calls until the test releases them.
pub struct ScriptedStore {
    inner: MemoryRemoteStore,
    script: Mutex<Script>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::with_inner(MemoryRemoteStore::with_reply(Arc::new(|_: &str| {
            "Hi there!".to_string()
        })))
    }

    pub fn with_inner(inner: MemoryRemoteStore) -> Self {
        Self {
            inner,
            script: Mutex::new(Script::default()),
        }
    }

    pub fn inner(&self) -> &MemoryRemoteStore {
        &self.inner
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|(called, _)| *called == op).count()
    }

    pub fn count_for(&self, op: Op, thread_id: &ThreadId) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(called, target)| *called == op && target.as_ref() == Some(thread_id))
            .count()
    }

    pub fn fail_next(&self, op: Op, failure: Failure) {
        self.lock().failures.entry(op).or_default().push_back(failure);
    }

    /// Holds the next `op` call on `thread_id` until the gate is released.
    pub fn hold(&self, op: Op, thread_id: Option<&ThreadId>) -> Gate {
        let reached = Arc::new(Notify::new());
        let (release, receiver) = oneshot::channel();
        self.lock().holds.insert(
            (op, thread_id.cloned()),
            Hold {
                reached: Arc::clone(&reached),
                release: receiver,
            },
        );
        Gate { reached, release }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, op: Op, thread_id: Option<&ThreadId>) -> RemoteResult<()> {
        let hold = {
            let mut script = self.lock();
            script.calls.push((op, thread_id.cloned()));
            script.holds.remove(&(op, thread_id.cloned()))
        };
        if let Some(hold) = hold {
            hold.reached.notify_one();
            let _ = hold.release.await;
        }

        let failure = self
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(failure) => Err(failure.into_error(thread_id)),
            None => Ok(()),
        }
    }
}

impl RemoteStore for ScriptedStore {
    fn list_threads<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, RemoteResult<Vec<ThreadRecord>>> {
        Box::pin(async move {
            self.enter(Op::ListThreads, None).await?;
            self.inner.list_threads(user_id).await
        })
    }

    fn create_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<ThreadId>> {
        Box::pin(async move {
            self.enter(Op::CreateThread, None).await?;
            self.inner.create_thread(user_id, title).await
        })
    }

    fn get_transcript<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<Vec<TranscriptRecord>>> {
        Box::pin(async move {
            self.enter(Op::GetTranscript, Some(thread_id)).await?;
            self.inner.get_transcript(user_id, thread_id).await
        })
    }

    fn send_message<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        body: &'a str,
    ) -> BoxFuture<'a, RemoteResult<String>> {
        Box::pin(async move {
            self.enter(Op::SendMessage, Some(thread_id)).await?;
            self.inner.send_message(user_id, thread_id, body).await
        })
    }

    fn delete_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            self.enter(Op::DeleteThread, Some(thread_id)).await?;
            self.inner.delete_thread(user_id, thread_id).await
        })
    }

    fn rename_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            self.enter(Op::RenameThread, Some(thread_id)).await?;
            self.inner.rename_thread(user_id, thread_id, title).await
        })
    }
}

pub fn user() -> UserId {
    UserId::parse("u-42").expect("user id")
}

pub fn identity() -> Identity {
    Identity::new(user(), "ada")
}

pub struct Harness {
    pub store: Arc<ScriptedStore>,
    pub session: Arc<Session>,
    pub chat: ChatSession,
}

impl Harness {
    /// Signed-in harness over an empty store. No calls have been made yet.
    pub fn new() -> Self {
        Self::over(ScriptedStore::new())
    }

    pub fn over(store: ScriptedStore) -> Self {
        let store = Arc::new(store);
        let session = Arc::new(Session::signed_in(identity()));
        let chat = ChatSession::new(
            Arc::clone(&store) as Arc<dyn RemoteStore>,
            Arc::clone(&session) as Arc<dyn IdentityProvider>,
        );
        Self {
            store,
            session,
            chat,
        }
    }

    /// Seeds server-side threads, oldest first, and returns their ids.
    pub fn seed(&self, titles: &[&str]) -> Vec<ThreadId> {
        let oldest = Utc::now() - TimeDelta::seconds(titles.len() as i64 + 60);
        titles
            .iter()
            .enumerate()
            .map(|(index, title)| {
                let thread_id = ThreadId::parse(&format!("t-{}", index + 1)).expect("thread id");
                self.store.inner().seed_thread(
                    &user(),
                    ThreadRecord {
                        thread_id: thread_id.clone(),
                        title: (*title).to_string(),
                        created_at: oldest + TimeDelta::seconds(index as i64),
                    },
                );
                thread_id
            })
            .collect()
    }
}
