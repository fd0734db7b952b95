//! Line-oriented command grammar for the console.

use snafu::{OptionExt, Snafu, ensure};

pub const HELP: &str = "\
commands:
  /login <username> <password>   sign in
  /signup <username> <password>  create an account and sign in
  /logout                        sign out and forget the saved session
  /threads                       list threads (alias /list)
  /new [title]                   start a thread
  /select <n|id>                 switch to a thread
  /rename <n|id> <title>         rename a thread
  /delete <n|id>                 delete a thread
  /reload                        fetch the current transcript again
  /config [key value]            show or change settings
  /clear                         dismiss the last error
  /help                          show this help
  /quit                          exit
anything else is sent to the selected thread; start with // to send a leading slash";

/// A thread as the user names it: its 1-based list position or its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRef {
    Position(usize),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Signup { username: String, password: String },
    Logout,
    Threads,
    New { title: Option<String> },
    Select(ThreadRef),
    Rename { thread: ThreadRef, title: String },
    Delete(ThreadRef),
    Reload,
    Config(Option<(String, String)>),
    Clear,
    Help,
    Quit,
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("unknown command '/{name}'; try /help"))]
    UnknownCommand { stage: &'static str, name: String },
    #[snafu(display("/{command} needs {argument}"))]
    MissingArgument {
        stage: &'static str,
        command: &'static str,
        argument: &'static str,
    },
    #[snafu(display("thread positions start at 1"))]
    ZeroPosition { stage: &'static str },
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let trimmed = line.trim_start();
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Ok(Some(Command::Send(format!("/{escaped}"))));
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "login" => {
            let (username, password) = credentials("login", args)?;
            Command::Login { username, password }
        }
        "signup" => {
            let (username, password) = credentials("signup", args)?;
            Command::Signup { username, password }
        }
        "logout" => Command::Logout,
        "threads" | "list" => Command::Threads,
        "new" => Command::New {
            title: (!args.is_empty()).then(|| args.to_string()),
        },
        "select" => Command::Select(thread_ref("select", args)?),
        "rename" => {
            let (target, title) = split_first(args);
            let thread = thread_ref("rename", target)?;
            ensure!(
                !title.is_empty(),
                MissingArgumentSnafu {
                    stage: "parse-rename-title",
                    command: "rename",
                    argument: "a new title",
                }
            );
            Command::Rename {
                thread,
                title: title.to_string(),
            }
        }
        "delete" => Command::Delete(thread_ref("delete", args)?),
        "reload" => Command::Reload,
        "config" => match split_first(args) {
            ("", _) => Command::Config(None),
            (key, value) => {
                ensure!(
                    !value.is_empty(),
                    MissingArgumentSnafu {
                        stage: "parse-config-value",
                        command: "config",
                        argument: "a value",
                    }
                );
                Command::Config(Some((key.to_string(), value.to_string())))
            }
        },
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return UnknownCommandSnafu {
                stage: "parse-command-name",
                name: other.to_string(),
            }
            .fail();
        }
    };
    Ok(Some(command))
}

fn split_first(args: &str) -> (&str, &str) {
    match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (args, ""),
    }
}

fn credentials(command: &'static str, args: &str) -> Result<(String, String), CommandError> {
    let (username, password) = split_first(args);
    ensure!(
        !username.is_empty() && !password.is_empty(),
        MissingArgumentSnafu {
            stage: "parse-credentials",
            command,
            argument: "a username and a password",
        }
    );
    Ok((username.to_string(), password.to_string()))
}

fn thread_ref(command: &'static str, raw: &str) -> Result<ThreadRef, CommandError> {
    let raw = Some(raw.trim())
        .filter(|raw| !raw.is_empty())
        .context(MissingArgumentSnafu {
            stage: "parse-thread-ref",
            command,
            argument: "a thread number or id",
        })?;

    match raw.parse::<usize>() {
        Ok(0) => ZeroPositionSnafu {
            stage: "parse-thread-position",
        }
        .fail(),
        Ok(position) => Ok(ThreadRef::Position(position)),
        Err(_) => Ok(ThreadRef::Id(raw.to_string())),
    }
}
