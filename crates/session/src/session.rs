use std::sync::Arc;

use arc_swap::ArcSwapOption;
use palaver_remote::{AccountRecord, UserId};

/// Who the core acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

impl From<AccountRecord> for Identity {
    fn from(account: AccountRecord) -> Self {
        Self::new(account.user_id, account.username)
    }
}

/// Source of the signed-in identity.
///
/// The core reads it at the start of every operation and clears it when the
/// remote store rejects the session. `current` and `clear` may run while the
/// core holds its state lock, so they must not block.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Arc<Identity>>;

    fn sign_in(&self, identity: Identity);

    fn clear(&self);

    /// Drops persisted state for a cleared identity. Runs after the core
    /// releases its state lock.
    fn forget(&self) {}
}

/// Process-local identity holder.
#[derive(Debug, Default)]
pub struct Session {
    identity: ArcSwapOption<Identity>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: ArcSwapOption::from_pointee(identity),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.load().is_some()
    }
}

impl IdentityProvider for Session {
    fn current(&self) -> Option<Arc<Identity>> {
        self.identity.load_full()
    }

    fn sign_in(&self, identity: Identity) {
        self.identity.store(Some(Arc::new(identity)));
    }

    fn clear(&self) {
        self.identity.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(UserId::parse("u-1").expect("user id"), "ada")
    }

    #[test]
    fn sign_in_then_clear() {
        let session = Session::new();
        assert!(session.current().is_none());

        session.sign_in(identity());
        assert_eq!(session.current().as_deref(), Some(&identity()));

        session.clear();
        assert!(!session.is_signed_in());
    }

    #[test]
    fn handed_out_identity_survives_clear() {
        let session = Session::signed_in(identity());
        let held = session.current();
        session.clear();
        assert_eq!(held.as_deref().map(|id| id.display_name.as_str()), Some("ada"));
    }
}
