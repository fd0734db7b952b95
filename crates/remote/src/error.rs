use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RemoteError {
    #[snafu(display("remote base URL '{raw}' is invalid"))]
    InvalidBaseUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("remote base URL '{raw}' cannot carry path segments"))]
    OpaqueBaseUrl { stage: &'static str, raw: String },
    #[snafu(display("failed to build HTTP client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("remote id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
    },
    #[snafu(display("request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request timed out on `{stage}`"))]
    Timeout { stage: &'static str },
    #[snafu(display("remote rejected credentials on `{stage}`: {message}"))]
    Unauthorized {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("remote {entity} '{id}' was not found"))]
    NotFound {
        stage: &'static str,
        entity: &'static str,
        id: String,
    },
    #[snafu(display("remote rejected request on `{stage}` ({status}): {message}"))]
    Rejected {
        stage: &'static str,
        status: u16,
        message: String,
    },
    #[snafu(display("remote unavailable on `{stage}` ({status}): {message}"))]
    Unavailable {
        stage: &'static str,
        status: u16,
        message: String,
    },
    #[snafu(display("failed to decode response on `{stage}`: {details}"))]
    Decode {
        stage: &'static str,
        details: String,
    },
}

/// Coarse failure classes that callers reconcile against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    Unavailable,
    Timeout,
    NotFound,
    Unauthorized,
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::Timeout { .. } => RemoteErrorKind::Timeout,
            Self::NotFound { .. } => RemoteErrorKind::NotFound,
            Self::Unauthorized { .. } => RemoteErrorKind::Unauthorized,
            Self::InvalidBaseUrl { .. }
            | Self::OpaqueBaseUrl { .. }
            | Self::BuildClient { .. }
            | Self::InvalidId { .. }
            | Self::Transport { .. }
            | Self::Rejected { .. }
            | Self::Unavailable { .. }
            | Self::Decode { .. } => RemoteErrorKind::Unavailable,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidBaseUrl { stage, .. }
            | Self::OpaqueBaseUrl { stage, .. }
            | Self::BuildClient { stage, .. }
            | Self::InvalidId { stage, .. }
            | Self::Transport { stage, .. }
            | Self::Timeout { stage }
            | Self::Unauthorized { stage, .. }
            | Self::NotFound { stage, .. }
            | Self::Rejected { stage, .. }
            | Self::Unavailable { stage, .. }
            | Self::Decode { stage, .. } => stage,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
