use std::{fmt, io};

use crate::system::ProcessId;

/// Conditions the interpreter cannot recover from.
///
/// Everything user-recoverable (a failed `cd`, an unknown program name, an
/// unopenable redirection target) is reported where it happens and the loop
/// continues; the variants here end the controller through the single exit
/// point in `shell::main`.
#[derive(Debug)]
pub enum Error {
    /// No child process could be created at all.
    Spawn(io::Error),
    /// A wait reported a child state that is neither a normal exit nor a
    /// termination by signal. The wait protocol never asks for stop/continue
    /// reports, so observing one means a process-control assumption broke.
    UnclassifiedChildStatus(ProcessId),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spawn(err) => write!(f, "cannot create child process: {err}"),
            Error::UnclassifiedChildStatus(pid) => {
                write!(f, "child {pid} neither exited nor was terminated by a signal")
            }
            Error::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
