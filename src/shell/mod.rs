#![forbid(unsafe_code)]

use crate::common::Error;
use crate::exec::{self, reap, CommandStatus};
use crate::log::dev_info;
use crate::system::{
    process_id,
    signal::{install_profile, ProcessRole},
    ProcessId,
};

mod builtins;
mod diagnostic;
mod input;

use builtins::Builtin;

/// What the interpreter loop does after dispatching a line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Exit,
}

/// The controller process: the one long-lived process that owns the loop,
/// the termination record, and its own PID for `$$` expansion.
struct Shell {
    own_pid: ProcessId,
    last_status: CommandStatus,
}

impl Shell {
    fn new() -> Self {
        Self {
            own_pid: process_id(),
            last_status: CommandStatus::default(),
        }
    }

    /// Prompt, dispatch, collect finished background children, repeat. Both
    /// `exit` and exhausted input leave through the shutdown sweep.
    fn run(&mut self) -> Result<(), Error> {
        loop {
            let Some(line) = input::read_command_line()? else {
                dev_info!("input exhausted, shutting down");
                break;
            };

            if self.dispatch(&line)? == Flow::Exit {
                break;
            }

            // Runs whatever the line was, so a session of blank lines still
            // collects its background children.
            reap::announce_finished_jobs()?;
        }

        reap::terminate_all_children()
    }

    fn dispatch(&mut self, line: &str) -> Result<Flow, Error> {
        let words = input::parse(line, self.own_pid);

        let Some(first) = words.first() else {
            return Ok(Flow::Continue);
        };
        if first.starts_with('#') {
            return Ok(Flow::Continue);
        }

        if let Some(builtin) = Builtin::from_name(first) {
            builtin.run(&words, &self.last_status)
        } else {
            exec::run_external(&words, &mut self.last_status)?;
            Ok(Flow::Continue)
        }
    }
}

fn shell_process() -> Result<(), Error> {
    crate::log::ShellLogger::new("minish: ").into_global_logger();

    install_profile(ProcessRole::Controller)?;

    let mut shell = Shell::new();
    dev_info!("interpreter loop starting as pid {}", shell.own_pid);
    shell.run()
}

pub fn main() {
    match shell_process() {
        Ok(()) => (),
        Err(error) => {
            diagnostic::diagnostic!("{error}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Flow, Shell};
    use crate::exec::CommandStatus;
    use crate::system::ProcessId;

    fn quiet_shell() -> Shell {
        Shell {
            own_pid: ProcessId::new(4242),
            last_status: CommandStatus::default(),
        }
    }

    #[test]
    fn blank_and_comment_lines_do_nothing() {
        let mut shell = quiet_shell();

        for line in ["", "\n", "   \t \n", "# a note\n", "#note\n", "# $$ \n"] {
            assert_eq!(shell.dispatch(line).unwrap(), Flow::Continue, "{line:?}");
            assert_eq!(shell.last_status, CommandStatus::Exited(0));
        }
    }

    #[test]
    fn exit_line_produces_the_sentinel() {
        let mut shell = quiet_shell();
        assert_eq!(shell.dispatch("exit\n").unwrap(), Flow::Exit);
    }

    #[test]
    fn comment_check_applies_to_the_first_token_not_the_first_byte() {
        let mut shell = quiet_shell();
        // Leading whitespace does not stop a comment from being one.
        assert_eq!(shell.dispatch("   # indented\n").unwrap(), Flow::Continue);
        assert_eq!(shell.last_status, CommandStatus::Exited(0));
    }
}
