use std::io::{self, BufRead, Write};

use crate::system::ProcessId;

/// Show the prompt and read one raw command line. `None` means the input
/// stream is exhausted.
pub(crate) fn read_command_line() -> io::Result<Option<String>> {
    {
        let mut stdout = io::stdout().lock();
        // we ignore any errors in writing the prompt
        let _ = write!(stdout, ": ");
        let _ = stdout.flush();
    }

    let mut line = String::new();
    // `read_line` resumes after `EINTR` on its own, so a mode toggle during
    // the wait prints its banner and the read keeps going.
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }

    Ok(Some(line))
}

/// Expand every `$$` into the interpreter's own PID, then split on
/// whitespace. Expansion is textual and happens before tokenization, so a
/// `$$` glued to other characters still expands.
pub(crate) fn parse(line: &str, own_pid: ProcessId) -> Vec<String> {
    let expanded = line.replace("$$", &own_pid.to_string());
    expanded.split_whitespace().map(str::to_string).collect()
}
