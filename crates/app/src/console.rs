use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use palaver_remote::{AccountRecord, AuthService, Credentials, RemoteResult, Sender, ThreadId};
use palaver_session::{
    ActiveState, ChatError, ChatSession, ChatSnapshot, DeliveryState, Identity, Message,
};
use snafu::ResultExt;

use crate::command::{self, Command, HELP, ThreadRef};
use crate::error::{AppResult, WriteOutputSnafu};
use crate::settings::SettingsStore;

/// Messages shown when a transcript is printed.
pub const TRANSCRIPT_TAIL: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Turns parsed commands into `ChatSession` calls and prints the result.
pub struct Console<W> {
    chat: ChatSession,
    auth: Arc<dyn AuthService>,
    settings: Arc<SettingsStore>,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(
        chat: ChatSession,
        auth: Arc<dyn AuthService>,
        settings: Arc<SettingsStore>,
        out: W,
    ) -> Self {
        Self {
            chat,
            auth,
            settings,
            out,
        }
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Greets the user and, for a remembered session, loads its threads.
    pub async fn start(&mut self) -> AppResult<()> {
        if let Err(error) = self.auth.health().await {
            tracing::warn!(error = %error, "chat service health check failed");
            self.line(format!("warning: chat service is not reachable: {error}"))?;
        }

        let Some(identity) = self.chat.identity() else {
            return self.line("not signed in; use /login or /signup (see /help)");
        };
        self.line(format!("welcome back, {}", identity.display_name))?;
        match self.chat.load_threads().await {
            Ok(_) => self.show_overview(),
            Err(error) => self.report(&error),
        }
    }

    pub fn prompt(&mut self) -> AppResult<()> {
        let snapshot = self.chat.snapshot();
        let prompt = match (&snapshot.identity, &snapshot.active) {
            (None, _) => "(signed out)> ".to_string(),
            (Some(_), None) => "> ".to_string(),
            (Some(_), Some(view)) => format!("{}> ", view.thread.title),
        };
        write!(self.out, "{prompt}").context(WriteOutputSnafu {
            stage: "write-prompt",
        })?;
        self.out.flush().context(WriteOutputSnafu {
            stage: "flush-prompt",
        })
    }

    /// Parses and runs one input line.
    pub async fn handle_line(&mut self, line: &str) -> AppResult<Flow> {
        match command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(Flow::Continue),
            Err(error) => {
                self.line(format!("error: {error}"))?;
                Ok(Flow::Continue)
            }
        }
    }

    pub async fn execute(&mut self, command: Command) -> AppResult<Flow> {
        match command {
            Command::Login { username, password } => {
                let credentials = Credentials::new(username, password);
                let result = self.auth.login(&credentials).await;
                self.enter(result).await?;
            }
            Command::Signup { username, password } => {
                let credentials = Credentials::new(username, password);
                let result = self.auth.signup(&credentials).await;
                self.enter(result).await?;
            }
            Command::Logout => {
                self.chat.sign_out();
                self.line("signed out")?;
            }
            Command::Threads => match self.chat.load_threads().await {
                Ok(_) => self.show_threads()?,
                Err(error) => self.report(&error)?,
            },
            Command::New { title } => {
                match self.chat.create_thread(title.as_deref().unwrap_or_default()).await {
                    Ok(thread) => {
                        self.line(format!("started '{}'", thread.title))?;
                        self.show_threads()?;
                    }
                    Err(error) => self.report(&error)?,
                }
            }
            Command::Select(target) => {
                if let Some(thread_id) = self.resolve(&target)? {
                    match self.chat.select_thread(&thread_id).await {
                        Ok(_) => self.show_transcript()?,
                        Err(error) => self.report(&error)?,
                    }
                }
            }
            Command::Rename { thread, title } => {
                if let Some(thread_id) = self.resolve(&thread)? {
                    match self.chat.rename_thread(&thread_id, &title).await {
                        Ok(()) => self.show_threads()?,
                        Err(error) => self.report(&error)?,
                    }
                }
            }
            Command::Delete(target) => {
                if let Some(thread_id) = self.resolve(&target)? {
                    match self.chat.delete_thread(&thread_id).await {
                        Ok(_) => {
                            self.line("deleted")?;
                            self.show_overview()?;
                        }
                        Err(error) => self.report(&error)?,
                    }
                }
            }
            Command::Reload => match self.chat.reload_transcript().await {
                Ok(_) => self.show_transcript()?,
                Err(error) => self.report(&error)?,
            },
            Command::Config(None) => {
                let text = render_settings(&self.settings);
                self.line(text)?;
            }
            Command::Config(Some((key, value))) => {
                let updated = self
                    .settings
                    .settings()
                    .with_value(&key, &value)
                    .and_then(|updated| self.settings.update(updated));
                match updated {
                    Ok(()) => self.line(format!("saved {key}; takes effect on next start"))?,
                    Err(error) => self.line(format!("error: {error}"))?,
                }
            }
            Command::Clear => {
                self.chat.clear_error();
            }
            Command::Help => self.line(HELP)?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Send(body) => match self.chat.send(&body).await {
                Ok(reply) => self.line(format!("bot: {reply}"))?,
                Err(error) => self.report(&error)?,
            },
        }
        Ok(Flow::Continue)
    }

    async fn enter(&mut self, account: RemoteResult<AccountRecord>) -> AppResult<()> {
        let account = match account {
            Ok(account) => account,
            Err(error) => return self.line(format!("error: {error}")),
        };
        self.line(format!("signed in as {}", account.username))?;
        match self.chat.sign_in(Identity::from(account)).await {
            Ok(_) => self.show_overview(),
            Err(error) => self.report(&error),
        }
    }

    /// Maps a user-facing thread reference onto a listed thread id.
    fn resolve(&mut self, target: &ThreadRef) -> AppResult<Option<ThreadId>> {
        let snapshot = self.chat.snapshot();
        match target {
            ThreadRef::Position(position) => match position
                .checked_sub(1)
                .and_then(|index| snapshot.threads.get(index))
            {
                Some(thread) => Ok(Some(thread.id.clone())),
                None => {
                    self.line(format!(
                        "error: no thread at position {position}; /threads lists them"
                    ))?;
                    Ok(None)
                }
            },
            ThreadRef::Id(raw) => match ThreadId::parse(raw) {
                Ok(thread_id) => Ok(Some(thread_id)),
                Err(error) => {
                    self.line(format!("error: {error}"))?;
                    Ok(None)
                }
            },
        }
    }

    fn show_overview(&mut self) -> AppResult<()> {
        self.show_threads()?;
        if self.chat.snapshot().active.is_some() {
            self.show_transcript()?;
        }
        Ok(())
    }

    fn show_threads(&mut self) -> AppResult<()> {
        let text = render_threads(&self.chat.snapshot());
        self.line(text)
    }

    fn show_transcript(&mut self) -> AppResult<()> {
        let text = render_transcript(&self.chat.snapshot(), TRANSCRIPT_TAIL);
        self.line(text)
    }

    fn report(&mut self, error: &ChatError) -> AppResult<()> {
        self.line(format!("error: {error}"))
    }

    fn line(&mut self, text: impl Display) -> AppResult<()> {
        writeln!(self.out, "{text}").context(WriteOutputSnafu {
            stage: "write-console-line",
        })
    }
}

/// Numbered thread list, the active one marked with `*`.
pub fn render_threads(snapshot: &ChatSnapshot) -> String {
    if snapshot.threads.is_empty() {
        return "no threads yet; /new starts one".to_string();
    }
    let active = snapshot.active_index();
    snapshot
        .threads
        .iter()
        .enumerate()
        .map(|(index, thread)| {
            let marker = if active == Some(index) { '*' } else { ' ' };
            format!("{marker} {}. {}  [{}]", index + 1, thread.title, thread.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The last `tail` messages of the active thread, or its loading state.
pub fn render_transcript(snapshot: &ChatSnapshot, tail: usize) -> String {
    let Some(view) = &snapshot.active else {
        return "no thread selected".to_string();
    };
    let mut lines = vec![format!("== {} ==", view.thread.title)];
    match &view.state {
        ActiveState::Loading => lines.push("loading...".to_string()),
        ActiveState::Error(error) => {
            lines.push(format!("could not load messages: {error}; /reload retries"));
        }
        ActiveState::None | ActiveState::Ready => {
            let skipped = snapshot.transcript.len().saturating_sub(tail);
            if skipped > 0 {
                lines.push(format!("({skipped} earlier messages)"));
            }
            if snapshot.transcript.is_empty() {
                lines.push("(no messages yet)".to_string());
            }
            lines.extend(snapshot.transcript[skipped..].iter().map(render_message));
        }
    }
    lines.join("\n")
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "bot",
    };
    let suffix = match message.state {
        DeliveryState::Confirmed => "",
        DeliveryState::Pending => "  (sending...)",
        DeliveryState::Failed => "  (not delivered)",
    };
    format!("{speaker}: {}{suffix}", message.body)
}

fn render_settings(store: &SettingsStore) -> String {
    let settings = store.settings();
    [
        format!("config file: {}", store.config_path().display()),
        format!("base_url = {}", settings.base_url),
        format!("request_timeout_secs = {}", settings.request_timeout_secs),
        format!("log_filter = {}", settings.log_filter),
        format!("mode = {}", settings.mode.as_str()),
    ]
    .join("\n")
}
