use std::{
    fmt, io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
};

use crate::cutils::cerr;

use self::signal::SignalNumber;

pub mod signal;

pub mod wait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(libc::pid_t);

impl ProcessId {
    pub const fn new(id: libc::pid_t) -> Self {
        Self(id)
    }

    pub const fn id(self) -> libc::pid_t {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The process ID of the calling process.
pub fn process_id() -> ProcessId {
    ProcessId::new(std::process::id() as libc::pid_t)
}

pub(crate) fn _exit(status: libc::c_int) -> ! {
    unsafe { libc::_exit(status) }
}

pub(crate) enum ForkResult {
    // Parent process branch with the child process' PID.
    Parent(ProcessId),
    // Child process branch.
    Child,
}

/// Create a new process.
pub(crate) fn fork() -> io::Result<ForkResult> {
    // SAFETY: the interpreter runs single threaded, so the child branch may
    // keep executing arbitrary code up to its `exec` or `_exit` call.
    let pid = cerr(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId::new(pid)))
    }
}

/// Send a signal to a process with the specified ID.
pub fn kill(pid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::kill(pid.id(), signal) }).map(|_| ())
}

/// Send a signal to a process group with the specified ID.
pub fn killpg(pgid: ProcessId, signal: SignalNumber) -> io::Result<()> {
    // SAFETY: This function cannot cause UB even if `pgid` is not a valid process group ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::killpg(pgid.id(), signal) }).map(|_| ())
}

/// Get the process group ID of the current process.
pub fn getpgrp() -> ProcessId {
    // SAFETY: this function is always successful.
    ProcessId::new(unsafe { libc::getpgrp() })
}

/// Duplicate a file descriptor into a freshly allocated one.
pub(crate) fn dup<F: AsRawFd>(fd: &F) -> io::Result<OwnedFd> {
    let duplicate = cerr(unsafe { libc::dup(fd.as_raw_fd()) })?;
    // SAFETY: `dup` returned a fresh descriptor not owned by anything else.
    Ok(unsafe { OwnedFd::from_raw_fd(duplicate) })
}

/// Make `target` refer to the same open file as `source`, closing whatever
/// `target` referred to before. `source` itself stays open.
pub(crate) fn dup2<F: AsRawFd>(source: &F, target: RawFd) -> io::Result<()> {
    cerr(unsafe { libc::dup2(source.as_raw_fd(), target) }).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Read, Write},
        os::unix::net::UnixStream,
    };

    use libc::SIGKILL;

    use super::{
        fork, getpgrp, kill, killpg, process_id,
        wait::{Wait, WaitOptions},
        ForkResult, ProcessId, _exit,
    };
    use crate::cutils::cerr;

    fn setpgid(pid: ProcessId, pgid: ProcessId) -> io::Result<()> {
        cerr(unsafe { libc::setpgid(pid.id(), pgid.id()) }).map(|_| ())
    }

    #[test]
    fn process_id_matches_std() {
        assert_eq!(process_id().id(), std::process::id() as libc::pid_t);
        assert_eq!(ProcessId::new(1234).to_string(), "1234");
    }

    #[test]
    fn fork_returns_the_child_pid_to_the_parent() {
        let ForkResult::Parent(child_pid) = fork().unwrap() else {
            _exit(42);
        };

        let (pid, status) = child_pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(pid, child_pid);
        assert_eq!(status.exit_status(), Some(42));
    }

    #[test]
    fn kill_test() {
        let mut child = std::process::Command::new("/bin/sleep")
            .arg("1")
            .spawn()
            .unwrap();
        kill(ProcessId::new(child.id() as libc::pid_t), SIGKILL).unwrap();
        assert!(!child.wait().unwrap().success());
    }

    #[test]
    fn killpg_test() {
        // Create a socket so the children write to it if they aren't terminated by `killpg`.
        let (mut rx, mut tx) = UnixStream::pair().unwrap();

        let ForkResult::Parent(pid1) = fork().unwrap() else {
            std::thread::sleep(std::time::Duration::from_secs(1));
            tx.write_all(&[42]).unwrap();
            _exit(0);
        };

        let ForkResult::Parent(pid2) = fork().unwrap() else {
            std::thread::sleep(std::time::Duration::from_secs(1));
            tx.write_all(&[42]).unwrap();
            _exit(0);
        };

        drop(tx);

        let pgid = pid1;
        // Move the children to their own process group so the broadcast
        // cannot reach the test runner.
        setpgid(pid1, pgid).unwrap();
        setpgid(pid2, pgid).unwrap();
        // Send `SIGKILL` to the children process group.
        killpg(pgid, SIGKILL).unwrap();
        // Ensure that the children were terminated before writing.
        assert_eq!(
            rx.read_exact(&mut [0; 2]).unwrap_err().kind(),
            std::io::ErrorKind::UnexpectedEof
        );

        // The test runner's own process group is untouched.
        assert_ne!(getpgrp(), pgid);
    }
}
