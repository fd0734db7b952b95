//! Client-side chat session state.
//!
//! [`ChatSession`] keeps the user's thread list, the selected thread and its
//! transcript consistent with a [`palaver_remote::RemoteStore`] under
//! concurrent requests.

mod active;
mod chat;
pub mod error;
mod events;
mod exchange;
mod registry;
mod session;
mod snapshot;
mod state;
mod thread;

pub use active::{ActiveState, ActiveThreadController, SelectOutcome};
pub use chat::ChatSession;
pub use error::{ChatError, ChatResult, ErrorKind};
pub use events::ChatEvent;
pub use exchange::MessageExchangeCoordinator;
pub use registry::{ThreadList, ThreadRegistry};
pub use session::{Identity, IdentityProvider, Session};
pub use snapshot::{ActiveView, ChatSnapshot};
pub use thread::{DeliveryState, Message, MessageId, Thread, Transcript};

pub use palaver_remote::{Sender, ThreadId, UserId};
