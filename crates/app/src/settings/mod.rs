pub mod state;

pub use state::{ClientSettings, Mode, SettingsError, SettingsStore};
