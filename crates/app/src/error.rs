use palaver_remote::RemoteError;
use snafu::Snafu;

/// Failures that end the console. Chat and command errors are printed and
/// the loop keeps going.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("failed to set up the remote store on `{stage}`: {source}"))]
    Connect {
        stage: &'static str,
        source: RemoteError,
    },
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    ReadInput {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to write output on `{stage}`: {source}"))]
    WriteOutput {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;
