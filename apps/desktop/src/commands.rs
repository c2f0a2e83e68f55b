//! Line commands of the terminal front-end. Each command maps to one
//! controller operation.

use std::fmt;

use client_core::{ActionOutcome, ControllerError, CrmController};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignUp { email: String, password: String },
    SignIn { email: String, password: String },
    SignOut,
    Add { name: String },
    /// 1-based position in the rendered list.
    Delete { position: usize },
    List,
    Refresh,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    TooManyArguments(&'static str),
    BadPosition(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(verb) => write!(f, "unknown command '{verb}' (try 'help')"),
            Self::TooManyArguments(usage) => write!(f, "too many arguments; usage: {usage}"),
            Self::BadPosition(raw) => {
                write!(f, "'{raw}' is not a list position; usage: delete <number>")
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    /// Whether the command belongs to the screen shown for this session state.
    pub fn available_when(&self, signed_in: bool) -> bool {
        match self {
            Self::SignUp { .. } | Self::SignIn { .. } => !signed_in,
            Self::SignOut | Self::Add { .. } | Self::Delete { .. } | Self::List | Self::Refresh => {
                signed_in
            }
            Self::Help | Self::Quit => true,
        }
    }
}

/// Parses one input line. Blank lines parse to `None`.
///
/// The name given to `add` is everything after the first separator, kept
/// verbatim.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim_start();
    if line.trim().is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "signup" | "sign-up" | "register" => {
            let (email, password) = credentials(rest, "signup <email> <password>")?;
            Command::SignUp { email, password }
        }
        "login" | "signin" | "sign-in" => {
            let (email, password) = credentials(rest, "login <email> <password>")?;
            Command::SignIn { email, password }
        }
        "logout" | "signout" | "sign-out" => Command::SignOut,
        "add" => Command::Add {
            name: rest.to_string(),
        },
        "delete" | "del" | "rm" => {
            let raw = rest.trim();
            let position = raw
                .parse::<usize>()
                .ok()
                .filter(|position| *position > 0)
                .ok_or_else(|| CommandError::BadPosition(raw.to_string()))?;
            Command::Delete { position }
        }
        "list" | "ls" => Command::List,
        "refresh" => Command::Refresh,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Missing fields are passed on empty; the auth provider reports them.
fn credentials(rest: &str, usage: &'static str) -> Result<(String, String), CommandError> {
    let mut parts = rest.split_whitespace();
    let email = parts.next().unwrap_or_default().to_string();
    let password = parts.next().unwrap_or_default().to_string();
    if parts.next().is_some() {
        return Err(CommandError::TooManyArguments(usage));
    }
    Ok((email, password))
}

#[derive(Debug)]
pub enum Execution {
    Ran(Result<ActionOutcome, ControllerError>),
    /// Nothing to call; the caller re-renders the current screen.
    Show,
    Unavailable,
    NoSuchPosition(usize),
    Quit,
}

pub async fn execute(controller: &mut CrmController, command: Command) -> Execution {
    if !command.available_when(controller.identity().is_some()) {
        return Execution::Unavailable;
    }

    let result = match command {
        Command::SignUp { email, password } => {
            controller.set_email(email);
            controller.set_password(password);
            controller.sign_up().await
        }
        Command::SignIn { email, password } => {
            controller.set_email(email);
            controller.set_password(password);
            controller.sign_in().await
        }
        Command::SignOut => controller.sign_out().await,
        Command::Add { name } => {
            controller.set_customer_name(name);
            controller.add_customer().await
        }
        Command::Delete { position } => {
            let Some(id) = controller
                .customers()
                .get(position - 1)
                .map(|customer| customer.id.clone())
            else {
                return Execution::NoSuchPosition(position);
            };
            controller.delete_customer(&id).await
        }
        Command::Refresh => controller
            .refresh()
            .await
            .map(|()| ActionOutcome::Completed),
        Command::List | Command::Help => return Execution::Show,
        Command::Quit => return Execution::Quit,
    };
    Execution::Ran(result)
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
