use std::process::ExitCode;
use std::sync::Arc;

use palaver::error::{ConnectSnafu, ReadInputSnafu};
use palaver::{
    AppResult, ClientSettings, Console, CredentialFile, Flow, Mode, RememberedIdentity,
    SettingsStore,
};
use palaver_remote::{AuthService, HttpRemoteStore, MemoryRemoteStore, RemoteStore};
use palaver_session::ChatSession;
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Arc::new(SettingsStore::load());
    init_tracing(&settings.settings());

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("palaver: {error}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr so they
/// never interleave with the transcript.
fn init_tracing(settings: &ClientSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(palaver::settings::state::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(settings: Arc<SettingsStore>) -> AppResult<()> {
    let current = settings.settings();
    let (remote, auth): (Arc<dyn RemoteStore>, Arc<dyn AuthService>) = match current.mode {
        Mode::Offline => {
            tracing::info!("offline mode, using the in-process store");
            let store = Arc::new(MemoryRemoteStore::new());
            (store.clone() as Arc<dyn RemoteStore>, store as Arc<dyn AuthService>)
        }
        Mode::Remote => {
            let store = HttpRemoteStore::new(&current.base_url, current.request_timeout())
                .context(ConnectSnafu {
                    stage: "build-http-store",
                })?;
            tracing::info!(base_url = %store.base_url(), "using chat service");
            let store = Arc::new(store);
            (store.clone() as Arc<dyn RemoteStore>, store as Arc<dyn AuthService>)
        }
    };

    let identity = RememberedIdentity::restore(CredentialFile::new(CredentialFile::default_path()));
    let chat = ChatSession::new(remote, Arc::new(identity));
    let mut console = Console::new(chat, auth, settings, std::io::stdout());
    console.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        console.prompt()?;
        let Some(line) = lines.next_line().await.context(ReadInputSnafu {
            stage: "read-stdin-line",
        })?
        else {
            break;
        };
        if console.handle_line(&line).await? == Flow::Quit {
            break;
        }
    }
    Ok(())
}
