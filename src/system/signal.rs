//! Signal dispositions for the interpreter and the processes it spawns.

use std::{
    io,
    mem::MaybeUninit,
    sync::atomic::{AtomicBool, Ordering},
};

use libc::c_int;

use crate::cutils::cerr;

pub(crate) type SignalNumber = c_int;

/// The signals whose dispositions are managed explicitly. Everything else
/// keeps whatever the process inherited.
pub(crate) const MANAGED_SIGNALS: [SignalNumber; 5] = [
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTSTP,
    libc::SIGTERM,
    libc::SIGCHLD,
];

/// Which of the three process kinds a disposition profile is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// The interpreter process itself.
    Controller,
    /// A forked child about to run a foreground command.
    ForegroundChild,
    /// A forked child about to run a background command.
    BackgroundChild,
}

/// What a managed signal does to a process once its profile is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Default,
    Ignore,
    /// Flip foreground-only mode and report the change. Only the controller
    /// handles SIGTSTP this way.
    ToggleMode,
    /// Interrupt blocking calls and do nothing else. Only the controller
    /// handles SIGCHLD this way.
    Wake,
}

/// The full disposition table, as a pure function of role and signal.
///
/// Ignored dispositions survive `exec`, so a child profile installed between
/// `fork` and `exec` keeps protecting the command image; the entries a child
/// sets to `Default` are reset by `exec` anyway.
pub(crate) fn disposition(role: ProcessRole, signal: SignalNumber) -> Disposition {
    use Disposition::*;
    use ProcessRole::*;

    match (role, signal) {
        (Controller, libc::SIGQUIT) => Default,
        (Controller, libc::SIGTSTP) => ToggleMode,
        (Controller, libc::SIGCHLD) => Wake,
        (Controller, _) => Ignore,

        (ForegroundChild, libc::SIGINT) => Default,
        (BackgroundChild, libc::SIGTERM) => Default,
        (ForegroundChild | BackgroundChild, _) => Ignore,
    }
}

static FOREGROUND_ONLY: AtomicBool = AtomicBool::new(false);

/// Whether a trailing `&` is currently ignored when launching commands.
pub fn foreground_only() -> bool {
    FOREGROUND_ONLY.load(Ordering::SeqCst)
}

extern "C" fn toggle_foreground_only(_signal: SignalNumber) {
    // Async-signal-safe only: one atomic flip, one raw write of a fixed
    // message. No allocation, no locks, no stdio buffering.
    let report: &[u8] = if !FOREGROUND_ONLY.fetch_xor(true, Ordering::SeqCst) {
        b"\nEntering foreground-only mode (& is now ignored)\n"
    } else {
        b"\nExiting foreground-only mode\n"
    };

    // SAFETY: `write` is async-signal-safe and the buffer outlives the call.
    unsafe {
        libc::write(libc::STDOUT_FILENO, report.as_ptr().cast(), report.len());
    }
}

extern "C" fn wake(_signal: SignalNumber) {
    // A handled SIGCHLD interrupts blocking calls with `EINTR` while keeping
    // exited children waitable; an ignored SIGCHLD would make the kernel
    // discard their termination state before `waitpid` could classify it.
}

enum SignalActionBehavior {
    Default,
    Ignore,
    Handler(extern "C" fn(SignalNumber)),
}

struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    fn new(behavior: SignalActionBehavior) -> io::Result<Self> {
        let sa_mask = full_signal_set()?;
        // No SA_RESTART: the prompt read and the foreground wait must come
        // back with `EINTR` when a managed signal arrives.
        let sa_flags = 0;

        let sa_sigaction = match behavior {
            SignalActionBehavior::Default => libc::SIG_DFL,
            SignalActionBehavior::Ignore => libc::SIG_IGN,
            SignalActionBehavior::Handler(handler) => handler as libc::sighandler_t,
        };

        Ok(Self {
            raw: libc::sigaction {
                sa_sigaction,
                sa_mask,
                sa_flags,
                sa_restorer: None,
            },
        })
    }

    fn register(&self, signal: SignalNumber) -> io::Result<()> {
        // SAFETY: the action is fully initialized and outlives the call; a
        // null pointer means the previous action is not requested.
        cerr(unsafe { libc::sigaction(signal, &self.raw, std::ptr::null_mut()) }).map(|_| ())
    }
}

fn full_signal_set() -> io::Result<libc::sigset_t> {
    let mut raw = MaybeUninit::<libc::sigset_t>::uninit();

    cerr(unsafe { libc::sigfillset(raw.as_mut_ptr()) })?;

    // SAFETY: `sigfillset` initialized the set.
    Ok(unsafe { raw.assume_init() })
}

/// Install the complete disposition profile for `role`, replacing whatever
/// was in force for the managed signals.
pub fn install_profile(role: ProcessRole) -> io::Result<()> {
    for signal in MANAGED_SIGNALS {
        let behavior = match disposition(role, signal) {
            Disposition::Default => SignalActionBehavior::Default,
            Disposition::Ignore => SignalActionBehavior::Ignore,
            Disposition::ToggleMode => SignalActionBehavior::Handler(toggle_foreground_only),
            Disposition::Wake => SignalActionBehavior::Handler(wake),
        };

        SignalAction::new(behavior)?.register(signal)?;
    }

    Ok(())
}
