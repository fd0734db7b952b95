//! Terminal client for the chat service: settings, the remembered session
//! and a line-oriented console over `palaver_session::ChatSession`.

pub mod command;
pub mod console;
pub mod credentials;
pub mod error;
pub mod settings;

pub use command::{Command, CommandError, ThreadRef};
pub use console::{Console, Flow};
pub use credentials::{CredentialFile, RememberedIdentity};
pub use error::{AppError, AppResult};
pub use settings::{ClientSettings, Mode, SettingsStore};
