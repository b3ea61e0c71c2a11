#![deny(unsafe_code)]

pub(crate) mod reap;
pub(crate) mod redirect;

use std::{fmt, os::unix::process::CommandExt, process::Command};

use libc::c_int;

use crate::{
    common::Error,
    cutils::was_interrupted,
    log::{dev_info, dev_warn},
    system::{
        _exit, fork,
        signal::{foreground_only, install_profile, ProcessRole, SignalNumber},
        wait::{Wait, WaitError, WaitOptions, WaitStatus},
        ForkResult, ProcessId,
    },
};

use self::redirect::{apply_redirections, strip_control_tokens};

/// How the most recent foreground command ended. This is what the `status`
/// built-in reports and what job completion reports are rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Exited(c_int),
    Signaled(SignalNumber),
}

impl Default for CommandStatus {
    /// The record before any foreground command has run.
    fn default() -> Self {
        CommandStatus::Exited(0)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CommandStatus::Exited(code) => write!(f, "exit value {code}"),
            CommandStatus::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Launch an external command. A trailing `&` detaches it unless
/// foreground-only mode is in force; otherwise the interpreter blocks until
/// the command finishes and `record` is updated with how it ended.
pub(crate) fn run_external(words: &[String], record: &mut CommandStatus) -> Result<(), Error> {
    let background = words.last().map(String::as_str) == Some("&") && !foreground_only();

    let role = if background {
        ProcessRole::BackgroundChild
    } else {
        ProcessRole::ForegroundChild
    };

    match fork().map_err(Error::Spawn)? {
        ForkResult::Child => exec_command(words, role),
        ForkResult::Parent(pid) if background => {
            dev_info!("detached background child {pid}");
            println_ignore_io_error!("background pid is {pid}");
            Ok(())
        }
        ForkResult::Parent(pid) => {
            dev_info!("waiting on foreground child {pid}");
            wait_foreground(pid, record)
        }
    }
}

/// Child-side half of [`run_external`]: install the role's signal profile,
/// wire up the streams, and replace this process with the command image.
fn exec_command(words: &[String], role: ProcessRole) -> ! {
    if let Err(err) = install_profile(role) {
        eprintln_ignore_io_error!("minish: cannot set signal dispositions: {err}");
        _exit(1);
    }

    if let Err(err) = apply_redirections(words, role == ProcessRole::BackgroundChild) {
        eprintln_ignore_io_error!("{err}");
        _exit(1);
    }

    let command = strip_control_tokens(words);

    // Only returns on failure. The failure report goes to stdout and the
    // child exits with status 1, which is what `status` then reports.
    let err = Command::new(&command[0]).args(&command[1..]).exec();
    dev_info!("cannot execute {}: {err}", command[0]);
    println_ignore_io_error!("{}: no such file or directory", command[0]);
    _exit(1);
}

/// Block until the foreground child finishes and write how it ended into the
/// termination record. Signal terminations are reported right away; normal
/// exits are only visible through `status`.
fn wait_foreground(pid: ProcessId, record: &mut CommandStatus) -> Result<(), Error> {
    let status = loop {
        match pid.wait(WaitOptions::new()) {
            Ok((_, status)) => break status,
            // SIGTSTP and SIGCHLD interrupt the wait; the child is still ours
            // to collect.
            Err(WaitError::Io(err)) if was_interrupted(&err) => {}
            Err(WaitError::Io(err)) => return Err(Error::Io(err)),
            Err(WaitError::NotReady) => {}
        }
    };

    *record = classify(pid, &status)?;
    dev_info!("foreground child {pid} finished: {record}");

    if let CommandStatus::Signaled(_) = record {
        println_ignore_io_error!("{record}");
    }

    Ok(())
}

/// Reduce a wait status to the two endings the interpreter understands.
/// Anything else means process bookkeeping is broken beyond repair.
fn classify(pid: ProcessId, status: &WaitStatus) -> Result<CommandStatus, Error> {
    if let Some(code) = status.exit_status() {
        Ok(CommandStatus::Exited(code))
    } else if let Some(signal) = status.term_signal() {
        Ok(CommandStatus::Signaled(signal))
    } else {
        dev_warn!("child {pid} reported {status:?}");
        Err(Error::UnclassifiedChildStatus(pid))
    }
}
