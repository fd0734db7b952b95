use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod http;
pub mod ids;
pub mod memory;
pub mod types;

pub use error::{RemoteError, RemoteErrorKind, RemoteResult};
pub use http::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, HttpRemoteStore};
pub use ids::{ThreadId, UserId};
pub use memory::{MemoryRemoteStore, ReplyFn, echo_reply};
pub use types::{
    AccountRecord, Credentials, DEFAULT_THREAD_TITLE, Sender, ThreadRecord, TranscriptRecord,
    parse_timestamp,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Thread CRUD and message exchange against the conversational service.
pub trait RemoteStore: Send + Sync {
    /// Lists the user's threads in the server's order. The chat service
    /// returns them in creation order.
    fn list_threads<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, RemoteResult<Vec<ThreadRecord>>>;

    /// Allocates a thread server-side and returns its identifier.
    fn create_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<ThreadId>>;

    fn get_transcript<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<Vec<TranscriptRecord>>>;

    /// Submits one user message and resolves with the assistant's reply text.
    fn send_message<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        body: &'a str,
    ) -> BoxFuture<'a, RemoteResult<String>>;

    fn delete_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
    ) -> BoxFuture<'a, RemoteResult<()>>;

    fn rename_thread<'a>(
        &'a self,
        user_id: &'a UserId,
        thread_id: &'a ThreadId,
        title: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>>;
}

/// Account endpoints used before a session exists.
pub trait AuthService: Send + Sync {
    fn login<'a>(&'a self, credentials: &'a Credentials)
    -> BoxFuture<'a, RemoteResult<AccountRecord>>;

    fn signup<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, RemoteResult<AccountRecord>>;

    fn health(&self) -> BoxFuture<'_, RemoteResult<()>>;
}
