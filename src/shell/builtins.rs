use std::path::PathBuf;

use crate::common::Error;
use crate::exec::redirect::{apply_redirections, strip_control_tokens, RedirectGuard};
use crate::exec::CommandStatus;
use crate::log::dev_warn;

use super::Flow;

/// The commands the interpreter runs itself, without forking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Cd,
    Status,
    Exit,
}

impl Builtin {
    /// Recognize a built-in by exact name in the command position.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Self::Cd),
            "status" => Some(Self::Status),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }

    /// Run the built-in inside the interpreter. Redirections apply for the
    /// duration of the call and the original streams come back afterwards,
    /// whichever way this returns.
    pub(crate) fn run(self, words: &[String], record: &CommandStatus) -> Result<Flow, Error> {
        let _guard = RedirectGuard::save()?;

        if let Err(err) = apply_redirections(words, false) {
            eprintln_ignore_io_error!("{err}");
            return Ok(Flow::Continue);
        }

        let arguments = strip_control_tokens(words);

        match self {
            Builtin::Cd => change_directory(arguments.get(1).map(String::as_str)),
            Builtin::Status => println_ignore_io_error!("{record}"),
            Builtin::Exit => return Ok(Flow::Exit),
        }

        Ok(Flow::Continue)
    }
}

/// `cd` prints nothing, even on failure; where the interpreter ended up is
/// observable through the next command.
fn change_directory(argument: Option<&str>) {
    let target = match argument {
        Some(path) => PathBuf::from(path),
        None => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                dev_warn!("cd: HOME is not set");
                return;
            }
        },
    };

    if let Err(err) = std::env::set_current_dir(&target) {
        dev_warn!("cd: cannot change to {}: {err}", target.display());
    }
}
