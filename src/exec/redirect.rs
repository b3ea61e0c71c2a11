//! Stream redirection and the cleanup of control tokens.
//!
//! A command line carries three kinds of tokens the command itself must never
//! see: a trailing `&`, and `<`/`>` operators with their file operands. The
//! functions here wire up the file descriptors those tokens describe and
//! produce the stripped argument vector that is actually executed.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io,
    os::fd::OwnedFd,
    os::unix::fs::OpenOptionsExt,
};

use crate::log::dev_warn;
use crate::system::{dup, dup2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Input,
    Output,
}

impl Direction {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Self::Input),
            ">" => Some(Self::Output),
            _ => None,
        }
    }

    fn target_fd(self) -> libc::c_int {
        match self {
            Self::Input => libc::STDIN_FILENO,
            Self::Output => libc::STDOUT_FILENO,
        }
    }

    fn open(self, path: &str) -> io::Result<File> {
        match self {
            Self::Input => File::open(path),
            Self::Output => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path),
        }
    }
}

/// A redirection that could not be wired up, reported exactly as the user
/// must see it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RedirectError {
    path: String,
    direction: Direction,
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Input => "input",
            Direction::Output => "output",
        };
        write!(f, "cannot open {} for {}", self.path, direction)
    }
}

fn redirect_stream(direction: Direction, path: &str) -> Result<(), RedirectError> {
    let report = |_| RedirectError {
        path: path.to_string(),
        direction,
    };

    let file = direction.open(path).map_err(report)?;
    dup2(&file, direction.target_fd()).map_err(report)
}

/// Wire up stdin and stdout as the command line dictates.
///
/// Detached commands first point both streams at `/dev/null`; explicit
/// operators then override that. The scan runs rear to front so that when
/// several tokens aim at the same stream, the one nearest the front is
/// applied last and wins; every named file is still opened and any open
/// failure aborts the whole application. Index 0 is the command name and is
/// never treated as an operator, and an operator with nothing after it is
/// left for the command to puzzle over.
pub(crate) fn apply_redirections(words: &[String], background: bool) -> Result<(), RedirectError> {
    if background {
        redirect_stream(Direction::Input, "/dev/null")?;
        redirect_stream(Direction::Output, "/dev/null")?;
    }

    for index in (1..words.len()).rev() {
        let Some(direction) = Direction::from_token(&words[index]) else {
            continue;
        };

        if let Some(path) = words.get(index + 1) {
            redirect_stream(direction, path)?;
        }
    }

    Ok(())
}

/// Rebuild the argument vector without the control tokens: one trailing `&`,
/// and every `<`/`>` at index 1 or later together with its operand. The
/// command name at index 0 always survives, whatever it looks like.
pub(crate) fn strip_control_tokens(words: &[String]) -> Vec<String> {
    let trimmed = match words {
        [rest @ .., last] if last == "&" && !rest.is_empty() => rest,
        _ => words,
    };

    let mut command = Vec::with_capacity(trimmed.len());
    command.push(trimmed[0].clone());

    let mut index = 1;
    while index < trimmed.len() {
        match trimmed[index].as_str() {
            "<" | ">" if index + 1 < trimmed.len() => index += 1,
            word => command.push(word.to_string()),
        }
        index += 1;
    }

    command
}

/// Redirections for a command that runs inside the interpreter itself.
/// Dropping the guard puts the original stdin and stdout back.
pub(crate) struct RedirectGuard {
    saved_stdin: OwnedFd,
    saved_stdout: OwnedFd,
}

impl RedirectGuard {
    pub(crate) fn save() -> io::Result<Self> {
        Ok(Self {
            saved_stdin: dup(&io::stdin())?,
            saved_stdout: dup(&io::stdout())?,
        })
    }
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        if let Err(err) = dup2(&self.saved_stdin, libc::STDIN_FILENO) {
            dev_warn!("cannot restore stdin: {err}");
        }
        if let Err(err) = dup2(&self.saved_stdout, libc::STDOUT_FILENO) {
            dev_warn!("cannot restore stdout: {err}");
        }
    }
}
