use std::sync::Arc;

use chrono::Utc;
use palaver_remote::{DEFAULT_THREAD_TITLE, ThreadId};

use crate::active::{ActiveThreadController, FallbackLoad};
use crate::error::{ChatError, ChatResult};
use crate::events::ChatEvent;
use crate::state::{ChatState, Shared};
use crate::thread::Thread;

/// Ordered thread summaries, most recently created first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadList {
    threads: Vec<Thread>,
}

impl ThreadList {
    pub fn as_slice(&self) -> &[Thread] {
        &self.threads
    }

    pub fn to_vec(&self) -> Vec<Thread> {
        self.threads.clone()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn first(&self) -> Option<&Thread> {
        self.threads.first()
    }

    pub fn get(&self, thread_id: &ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|thread| &thread.id == thread_id)
    }

    pub fn contains(&self, thread_id: &ThreadId) -> bool {
        self.get(thread_id).is_some()
    }

    /// Replaces the whole list with a server listing, newest first.
    ///
    /// The chat service lists threads in creation order, so entries with the
    /// same `created_at` put the later listing entry first. Repeated
    /// identifiers keep their first occurrence.
    pub(crate) fn replace(&mut self, threads: Vec<Thread>) {
        let mut unique: Vec<Thread> = Vec::with_capacity(threads.len());
        for thread in threads {
            if unique.iter().any(|kept| kept.id == thread.id) {
                tracing::warn!(thread_id = %thread.id, "server listed a thread twice");
                continue;
            }
            unique.push(thread);
        }
        unique.reverse();
        unique.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        self.threads = unique;
    }

    /// Inserts at the front. An entry with the same identifier is replaced.
    pub(crate) fn prepend(&mut self, thread: Thread) {
        if let Some(index) = self.position(&thread.id) {
            tracing::warn!(thread_id = %thread.id, "server reused a thread id on create");
            self.threads.remove(index);
        }
        self.threads.insert(0, thread);
    }

    pub(crate) fn rename(&mut self, thread_id: &ThreadId, title: &str) -> bool {
        match self.threads.iter_mut().find(|thread| &thread.id == thread_id) {
            Some(thread) => {
                thread.title = title.to_string();
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, thread_id: &ThreadId) -> Option<Thread> {
        self.position(thread_id)
            .map(|index| self.threads.remove(index))
    }

    pub(crate) fn clear(&mut self) {
        self.threads.clear();
    }

    fn position(&self, thread_id: &ThreadId) -> Option<usize> {
        self.threads.iter().position(|thread| &thread.id == thread_id)
    }
}

/// Owns the thread list and mirrors every change to the remote store.
///
/// Local state changes only after the remote store confirms the operation.
#[derive(Clone)]
pub struct ThreadRegistry {
    shared: Arc<Shared>,
    controller: ActiveThreadController,
}

impl ThreadRegistry {
    pub(crate) fn new(shared: Arc<Shared>, controller: ActiveThreadController) -> Self {
        Self { shared, controller }
    }

    pub fn threads(&self) -> Vec<Thread> {
        self.shared.lock().threads.to_vec()
    }

    /// Replaces the list with the server's listing.
    ///
    /// On failure the previous list is kept.
    pub async fn load(&self) -> ChatResult<Vec<Thread>> {
        let stage = "registry-load";
        let ticket = self.shared.begin(stage)?;

        let result = self
            .shared
            .remote
            .list_threads(&ticket.identity.user_id)
            .await;

        let mut state = self.shared.lock();
        self.shared.ensure_current(&mut state, &ticket, stage)?;
        match result {
            Ok(records) => {
                state
                    .threads
                    .replace(records.into_iter().map(Thread::from).collect());
                tracing::info!(count = state.threads.len(), "thread list loaded");
                self.shared.emit(ChatEvent::ThreadsChanged);
                Ok(state.threads.to_vec())
            }
            Err(error) => Err(self.shared.fail(
                &mut state,
                ChatError::from_remote(stage, "list threads", None, &error),
            )),
        }
    }

    /// Creates a thread and makes it the active one with an empty transcript.
    ///
    /// A blank title falls back to the server default.
    pub async fn create(&self, title: &str) -> ChatResult<Thread> {
        let stage = "registry-create";
        let ticket = self.shared.begin(stage)?;
        let title = match title.trim() {
            "" => DEFAULT_THREAD_TITLE,
            trimmed => trimmed,
        };

        let result = self
            .shared
            .remote
            .create_thread(&ticket.identity.user_id, title)
            .await;

        let mut state = self.shared.lock();
        self.shared.ensure_current(&mut state, &ticket, stage)?;
        match result {
            Ok(thread_id) => {
                let thread = Thread::new(thread_id, title, Utc::now());
                state.threads.prepend(thread.clone());
                state.active.adopt(thread.clone());
                tracing::info!(thread_id = %thread.id, title = %thread.title, "thread created");
                self.shared.emit(ChatEvent::ThreadsChanged);
                self.shared.emit(ChatEvent::ThreadSelected {
                    thread_id: Some(thread.id.clone()),
                });
                Ok(thread)
            }
            Err(error) => Err(self.shared.fail(
                &mut state,
                ChatError::from_remote(stage, "create a thread", None, &error),
            )),
        }
    }

    /// Renames a listed thread in place; its position does not change.
    pub async fn rename(&self, thread_id: &ThreadId, new_title: &str) -> ChatResult<()> {
        let stage = "registry-rename";
        let ticket = self.shared.begin(stage)?;
        let title = new_title.trim();
        {
            let mut state = self.shared.lock();
            if title.is_empty() {
                return Err(self
                    .shared
                    .fail(&mut state, ChatError::EmptyTitle { stage }));
            }
            self.ensure_listed(&mut state, thread_id, stage)?;
        }

        let result = self
            .shared
            .remote
            .rename_thread(&ticket.identity.user_id, thread_id, title)
            .await;

        let mut state = self.shared.lock();
        self.shared.ensure_current(&mut state, &ticket, stage)?;
        match result {
            Ok(()) => {
                state.threads.rename(thread_id, title);
                state.active.retitle(thread_id, title);
                tracing::info!(%thread_id, title, "thread renamed");
                self.shared.emit(ChatEvent::ThreadsChanged);
                Ok(())
            }
            Err(error) => Err(self.shared.fail(
                &mut state,
                ChatError::from_remote(stage, "rename a thread", Some(thread_id), &error),
            )),
        }
    }

    /// Deletes a listed thread.
    ///
    /// Deleting the active thread selects the first remaining one, or
    /// leaves nothing selected. Returns the thread that is active afterwards.
    pub async fn delete(&self, thread_id: &ThreadId) -> ChatResult<Option<ThreadId>> {
        let stage = "registry-delete";
        let ticket = self.shared.begin(stage)?;
        {
            let mut state = self.shared.lock();
            self.ensure_listed(&mut state, thread_id, stage)?;
        }

        let result = self
            .shared
            .remote
            .delete_thread(&ticket.identity.user_id, thread_id)
            .await;

        let fallback = {
            let mut state = self.shared.lock();
            self.shared.ensure_current(&mut state, &ticket, stage)?;
            if let Err(error) = result {
                return Err(self.shared.fail(
                    &mut state,
                    ChatError::from_remote(stage, "delete a thread", Some(thread_id), &error),
                ));
            }

            state.threads.remove(thread_id);
            tracing::info!(%thread_id, "thread deleted");
            self.shared.emit(ChatEvent::ThreadsChanged);
            if !state.active.is_thread(thread_id) {
                return Ok(state.active.thread_id().cloned());
            }
            ActiveThreadController::begin_fallback(&self.shared, &mut state)
        };

        match fallback {
            FallbackLoad::Cleared => Ok(None),
            FallbackLoad::Loading(load) => {
                let thread_id = load.thread_id.clone();
                if let Err(error) = self.controller.fetch(&ticket, load).await {
                    tracing::debug!(%thread_id, error = %error, "fallback transcript not loaded");
                }
                Ok(Some(thread_id))
            }
        }
    }

    fn ensure_listed(
        &self,
        state: &mut ChatState,
        thread_id: &ThreadId,
        stage: &'static str,
    ) -> ChatResult<()> {
        if state.threads.contains(thread_id) {
            return Ok(());
        }
        Err(self.shared.fail(
            state,
            ChatError::UnknownThread {
                stage,
                thread_id: thread_id.clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta};

    use super::*;

    fn thread(raw: &str, title: &str) -> Thread {
        Thread::new(ThreadId::parse(raw).expect("thread id"), title, Utc::now())
    }

    fn thread_at(raw: &str, title: &str, offset_secs: i64) -> Thread {
        let created_at = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(offset_secs);
        Thread::new(ThreadId::parse(raw).expect("thread id"), title, created_at)
    }

    fn ids(list: &ThreadList) -> Vec<&str> {
        list.as_slice().iter().map(|thread| thread.id.as_str()).collect()
    }

    #[test]
    fn prepend_puts_newest_first() {
        let mut list = ThreadList::default();
        list.prepend(thread("t-1", "Greeting"));
        list.prepend(thread("t-2", "Trip planning"));
        assert_eq!(ids(&list), vec!["t-2", "t-1"]);
    }

    #[test]
    fn prepend_replaces_reused_id() {
        let mut list = ThreadList::default();
        list.prepend(thread("t-1", "Greeting"));
        list.prepend(thread("t-2", "Trip planning"));
        list.prepend(thread("t-1", "Again"));

        assert_eq!(ids(&list), vec!["t-1", "t-2"]);
        assert_eq!(list.first().map(|thread| thread.title.as_str()), Some("Again"));
    }

    #[test]
    fn replace_orders_creation_listing_newest_first() {
        let mut list = ThreadList::default();
        list.replace(vec![
            thread_at("t-1", "Greeting", 0),
            thread_at("t-2", "Trip planning", 1),
            thread_at("t-3", "Recipes", 2),
        ]);
        assert_eq!(ids(&list), vec!["t-3", "t-2", "t-1"]);

        list.replace(vec![
            thread_at("t-3", "Recipes", 2),
            thread_at("t-1", "Greeting", 0),
            thread_at("t-2", "Trip planning", 1),
        ]);
        assert_eq!(ids(&list), vec!["t-3", "t-2", "t-1"]);
    }

    #[test]
    fn replace_breaks_timestamp_ties_by_listing_position() {
        let mut list = ThreadList::default();
        list.replace(vec![
            thread_at("t-1", "Greeting", 5),
            thread_at("t-2", "Trip planning", 5),
        ]);
        assert_eq!(ids(&list), vec!["t-2", "t-1"]);
    }

    #[test]
    fn replace_drops_repeats() {
        let mut list = ThreadList::default();
        list.replace(vec![
            thread_at("a", "first", 0),
            thread_at("b", "second", 1),
            thread_at("a", "shadow", 2),
        ]);
        assert_eq!(ids(&list), vec!["b", "a"]);
        assert_eq!(
            list.get(&ThreadId::parse("a").expect("id")).map(|t| t.title.as_str()),
            Some("first")
        );
    }

    #[test]
    fn rename_keeps_position() {
        let mut list = ThreadList::default();
        list.replace(vec![
            thread_at("t-1", "Greeting", 0),
            thread_at("t-2", "Trip planning", 1),
        ]);

        assert!(list.rename(&ThreadId::parse("t-1").expect("id"), "Intro"));
        let titles = list
            .as_slice()
            .iter()
            .map(|thread| thread.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Trip planning", "Intro"]);
    }

    #[test]
    fn remove_unknown_is_a_no_op() {
        let mut list = ThreadList::default();
        list.prepend(thread("t-1", "Greeting"));
        assert!(list.remove(&ThreadId::parse("t-9").expect("id")).is_none());
        assert_eq!(list.len(), 1);
    }
}
