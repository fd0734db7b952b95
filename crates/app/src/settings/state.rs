use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use palaver_remote::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "palaver";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "PALAVER_";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Which remote store the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Remote,
    /// In-process store; nothing leaves the machine.
    Offline,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub mode: Mode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            log_filter: default_log_filter(),
            mode: Mode::default(),
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn normalized(mut self) -> Self {
        self.base_url = match self.base_url.trim() {
            "" => default_base_url(),
            trimmed => trimmed.to_string(),
        };
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        self.log_filter = match self.log_filter.trim() {
            "" => default_log_filter(),
            trimmed => trimmed.to_string(),
        };
        self
    }

    /// Returns a copy with one field replaced from its textual form.
    pub fn with_value(&self, key: &str, value: &str) -> Result<Self, SettingsError> {
        let mut updated = self.clone();
        let value = value.trim();
        match key.trim() {
            "base_url" => updated.base_url = value.to_string(),
            "request_timeout_secs" => {
                let secs = value.parse::<u64>().ok().filter(|secs| *secs > 0);
                updated.request_timeout_secs = secs.context(InvalidValueSnafu {
                    stage: "parse-request-timeout",
                    key: "request_timeout_secs",
                    value: value.to_string(),
                })?;
            }
            "log_filter" => updated.log_filter = value.to_string(),
            "mode" => {
                updated.mode = match value.to_ascii_lowercase().as_str() {
                    "remote" => Mode::Remote,
                    "offline" => Mode::Offline,
                    _ => {
                        return InvalidValueSnafu {
                            stage: "parse-mode",
                            key: "mode",
                            value: value.to_string(),
                        }
                        .fail();
                    }
                }
            }
            other => {
                return UnknownKeySnafu {
                    stage: "select-settings-key",
                    key: other.to_string(),
                }
                .fail();
            }
        }
        Ok(updated.normalized())
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ClientSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".palaver"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Layers defaults, the JSON file at `config_path` and `PALAVER_*`
    /// environment variables, later layers winning.
    pub fn new(config_path: PathBuf) -> Self {
        Self::with_env_prefix(config_path, ENV_PREFIX)
    }

    pub fn with_env_prefix(config_path: PathBuf, env_prefix: &str) -> Self {
        let settings = Self::load_layered(&config_path, env_prefix);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ClientSettings> {
        self.settings.load_full()
    }

    /// Persists `settings` and makes them current. Running clients pick up
    /// connection changes on their next start.
    pub fn update(&self, settings: ClientSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_layered(path: &Path, env_prefix: &str) -> ClientSettings {
        if !path.exists() {
            tracing::info!(path = %path.display(), "settings file not found, using defaults");
        }

        let figment = Figment::from(Serialized::defaults(ClientSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(env_prefix));

        match figment.extract::<ClientSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "failed to parse settings, using defaults"
                );
                ClientSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ClientSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!(path = %self.config_path.display(), "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("unknown setting '{key}' on `{stage}`"))]
    UnknownKey { stage: &'static str, key: String },
    #[snafu(display("invalid value '{value}' for `{key}` on `{stage}`"))]
    InvalidValue {
        stage: &'static str,
        key: &'static str,
        value: String,
    },
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
