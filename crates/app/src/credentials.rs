use std::path::{Path, PathBuf};
use std::sync::Arc;

use palaver_remote::AccountRecord;
use palaver_session::{Identity, IdentityProvider, Session};
use snafu::{ResultExt, Snafu};

use crate::settings::SettingsStore;

pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Last signed-in account. Only the identifier and name are kept, never
/// the password.
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> PathBuf {
        SettingsStore::default_config_dir().join(CREDENTIALS_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<AccountRecord>, CredentialError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CredentialError::ReadFile {
                    stage: "read-credentials-file",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .context(ParseSnafu {
                stage: "parse-credentials-json",
                path: self.path.clone(),
            })
    }

    pub fn save(&self, account: &AccountRecord) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-credentials-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(account).context(SerializeSnafu {
            stage: "serialize-credentials-json",
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-credentials-file",
            path: temp_path.clone(),
        })?;
        std::fs::rename(&temp_path, &self.path).context(RenameTempFileSnafu {
            stage: "rename-temporary-credentials-file",
            from: temp_path,
            to: self.path.clone(),
        })?;

        tracing::debug!(path = %self.path.display(), "saved credentials");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::RemoveFile {
                stage: "remove-credentials-file",
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CredentialError {
    #[snafu(display("failed to read credentials at {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse credentials at {path:?} on `{stage}`: {source}"))]
    Parse {
        stage: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("failed to create credentials directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize credentials on `{stage}`: {source}"))]
    Serialize {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write credentials at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace credentials from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to remove credentials at {path:?} on `{stage}`: {source}"))]
    RemoveFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Identity provider that mirrors the signed-in account to a
/// [`CredentialFile`], so the next start resumes the session.
pub struct RememberedIdentity {
    session: Session,
    file: CredentialFile,
}

impl RememberedIdentity {
    /// Restores the saved account, if any. An unreadable file is treated as
    /// signed out.
    pub fn restore(file: CredentialFile) -> Self {
        let session = match file.load() {
            Ok(Some(account)) => {
                tracing::info!(username = %account.username, "restored saved session");
                Session::signed_in(Identity::from(account))
            }
            Ok(None) => Session::new(),
            Err(error) => {
                tracing::warn!(error = %error, "ignoring unreadable credentials");
                Session::new()
            }
        };
        Self { session, file }
    }
}

impl IdentityProvider for RememberedIdentity {
    fn current(&self) -> Option<Arc<Identity>> {
        self.session.current()
    }

    fn sign_in(&self, identity: Identity) {
        let account = AccountRecord {
            user_id: identity.user_id.clone(),
            username: identity.display_name.clone(),
        };
        if let Err(error) = self.file.save(&account) {
            tracing::warn!(error = %error, "failed to remember session");
        }
        self.session.sign_in(identity);
    }

    fn clear(&self) {
        self.session.clear();
    }

    fn forget(&self) {
        // A sign-in may have landed since the clear.
        if self.session.current().is_some() {
            return;
        }
        if let Err(error) = self.file.clear() {
            tracing::warn!(error = %error, "failed to forget session");
        }
    }
}
