//! Collection of finished background children.

use std::{thread::sleep, time::Duration};

use crate::{
    common::Error,
    log::{dev_info, user_warn},
    system::{
        getpgrp, killpg,
        wait::{Wait, WaitError, WaitOptions, ANY_CHILD},
    },
};

use super::classify;

/// Collect every background child that finished since the last call and
/// report each one. Runs after each dispatched line, before the next prompt,
/// so completion reports never interleave with a running built-in.
pub(crate) fn announce_finished_jobs() -> Result<(), Error> {
    sweep(true)
}

/// Shutdown path: broadcast SIGTERM to the interpreter's own process group,
/// give the children time to die, then collect them without reporting. The
/// interpreter ignores its own broadcast per its disposition profile.
pub(crate) fn terminate_all_children() -> Result<(), Error> {
    if let Err(err) = killpg(getpgrp(), libc::SIGTERM) {
        user_warn!("could not signal background jobs: {err}");
    }

    sleep(Duration::from_secs(2));
    sweep(false)
}

fn sweep(announce: bool) -> Result<(), Error> {
    loop {
        match ANY_CHILD.wait(WaitOptions::new().no_hang()) {
            Ok((pid, status)) => {
                let ending = classify(pid, &status)?;
                dev_info!("collected background child {pid}: {ending}");
                if announce {
                    println_ignore_io_error!("background pid {pid} is done: {ending}");
                }
            }
            // Nothing waitable right now, or no children at all (ECHILD).
            Err(WaitError::NotReady) => break,
            Err(WaitError::Io(_)) => break,
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use std::io;

    use pretty_assertions::assert_eq;

    use super::{announce_finished_jobs, terminate_all_children};
    use crate::cutils::cerr;
    use crate::exec::redirect::apply_redirections;
    use crate::system::{
        fork, kill,
        signal::{install_profile, ProcessRole},
        wait::{Wait, WaitError, WaitOptions, ANY_CHILD},
        ForkResult, _exit,
    };

    fn scratch_path(tag: &str) -> std::path::PathBuf {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::path::PathBuf::from(format!(
            "/tmp/minish_test_{}_{}_{tag}",
            std::process::id(),
            timestamp
        ))
    }

    fn redirect_stdout_to(path: &std::path::Path) -> Result<(), ()> {
        let line = format!("cmd > {}", path.display());
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        apply_redirections(&words, false).map_err(drop)
    }

    fn own_process_group() -> io::Result<()> {
        cerr(unsafe { libc::setpgid(0, 0) }).map(|_| ())
    }

    // The sweeps wait on any child at all, so each scenario runs inside a
    // forked orchestrator that owns exactly the children it creates.

    #[test]
    fn finished_jobs_are_announced_exactly_once() {
        let report = scratch_path("report");

        let ForkResult::Parent(orchestrator) = fork().unwrap() else {
            if redirect_stdout_to(&report).is_err() {
                _exit(1);
            }

            let ForkResult::Parent(_job) = fork().unwrap() else {
                _exit(7);
            };
            std::thread::sleep(std::time::Duration::from_millis(300));

            if announce_finished_jobs().is_err() {
                _exit(2);
            }
            // A second pass has nothing left to collect.
            if announce_finished_jobs().is_err() {
                _exit(3);
            }
            _exit(0);
        };

        let (_, status) = orchestrator.wait(WaitOptions::new()).unwrap();
        assert_eq!(status.exit_status(), Some(0));

        let reported = std::fs::read_to_string(&report).unwrap();
        let lines: Vec<&str> = reported.lines().collect();
        assert_eq!(lines.len(), 1, "{reported:?}");
        assert!(lines[0].starts_with("background pid "), "{reported:?}");
        assert!(lines[0].ends_with(" is done: exit value 7"), "{reported:?}");

        std::fs::remove_file(&report).unwrap();
    }

    #[test]
    fn signaled_jobs_report_the_signal_number() {
        let report = scratch_path("signaled");

        let ForkResult::Parent(orchestrator) = fork().unwrap() else {
            if redirect_stdout_to(&report).is_err() {
                _exit(1);
            }

            let ForkResult::Parent(job) = fork().unwrap() else {
                std::thread::sleep(std::time::Duration::from_secs(10));
                _exit(0);
            };

            if kill(job, libc::SIGKILL).is_err() {
                _exit(2);
            }
            std::thread::sleep(std::time::Duration::from_millis(300));

            if announce_finished_jobs().is_err() {
                _exit(3);
            }
            _exit(0);
        };

        let (_, status) = orchestrator.wait(WaitOptions::new()).unwrap();
        assert_eq!(status.exit_status(), Some(0));

        let reported = std::fs::read_to_string(&report).unwrap();
        assert!(
            reported.ends_with(&format!(" is done: terminated by signal {}\n", libc::SIGKILL)),
            "{reported:?}"
        );

        std::fs::remove_file(&report).unwrap();
    }

    #[test]
    fn shutdown_kills_and_collects_quietly() {
        let report = scratch_path("quiet");

        let ForkResult::Parent(orchestrator) = fork().unwrap() else {
            // The broadcast goes to the whole process group; this orchestrator
            // must be in its own group with the controller's dispositions, or
            // it would take down the test run with it.
            if own_process_group().is_err() {
                _exit(1);
            }
            if install_profile(ProcessRole::Controller).is_err() {
                _exit(2);
            }
            if redirect_stdout_to(&report).is_err() {
                _exit(3);
            }

            // The job takes the background profile like any detached child,
            // otherwise it would inherit the controller's SIGTERM ignore.
            let ForkResult::Parent(_job) = fork().unwrap() else {
                if install_profile(ProcessRole::BackgroundChild).is_err() {
                    _exit(9);
                }
                loop {
                    std::thread::sleep(std::time::Duration::from_secs(1));
                }
            };

            if terminate_all_children().is_err() {
                _exit(4);
            }

            // Nothing may remain waitable after the sweep.
            match ANY_CHILD.wait(WaitOptions::new().no_hang()) {
                Err(WaitError::Io(err)) if err.raw_os_error() == Some(libc::ECHILD) => {}
                _ => _exit(5),
            }
            _exit(0);
        };

        let (_, status) = orchestrator.wait(WaitOptions::new()).unwrap();
        assert_eq!(status.exit_status(), Some(0));

        // The shutdown sweep reports nothing.
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "");

        std::fs::remove_file(&report).unwrap();
    }

    #[test]
    fn sweep_with_no_children_is_a_no_op() {
        let ForkResult::Parent(orchestrator) = fork().unwrap() else {
            if announce_finished_jobs().is_err() {
                _exit(1);
            }
            _exit(0);
        };

        let (_, status) = orchestrator.wait(WaitOptions::new()).unwrap();
        assert_eq!(status.exit_status(), Some(0));
    }
}
