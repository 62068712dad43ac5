//! Execution of trusted external programs.
//!
//! [`SystemProgramRunner`] spawns the whitelisted program with the request
//! argv appended to its fixed arguments, feeds the piped input to stdin and
//! captures stdout and stderr. Every handle is owned by the call and released
//! before it returns, including on failure.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use nerv_config::CliProgram;
use tracing::debug;

use super::DISPATCH_TARGET;

/// Captured outcome of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramOutput {
    /// Exit status; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl ProgramOutput {
    /// Returns `true` for a zero exit status.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Standard output as text without its trailing line terminator.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        let text = String::from_utf8_lossy(&self.stdout);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        text.strip_suffix('\r').unwrap_or(text).to_owned()
    }

    /// Standard error as text.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs trusted programs on behalf of the dispatcher.
pub trait ProgramRunner {
    /// Runs `program` with `argv` appended to its fixed arguments.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the program cannot be spawned or its
    /// output cannot be collected. An unsuccessful exit is not an error.
    fn run(
        &self,
        program: &CliProgram,
        argv: &[String],
        stdin: Option<&[u8]>,
    ) -> io::Result<ProgramOutput>;
}

/// Runs programs as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProgramRunner;

impl ProgramRunner for SystemProgramRunner {
    fn run(
        &self,
        program: &CliProgram,
        argv: &[String],
        stdin: Option<&[u8]>,
    ) -> io::Result<ProgramOutput> {
        debug!(
            target: DISPATCH_TARGET,
            program = %program.program.display(),
            args = program.args.len() + argv.len(),
            piped = stdin.is_some(),
            "spawning trusted program"
        );

        let mut child = Command::new(&program.program)
            .args(&program.args)
            .args(argv)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let input = stdin.zip(child.stdin.take());
        let output = thread::scope(|scope| {
            // Stdin is fed from a separate thread so a child that fills its
            // stdout pipe before reading all input cannot deadlock.
            let writer = input.map(|(bytes, mut pipe)| scope.spawn(move || pipe.write_all(bytes)));
            let output = child.wait_with_output();
            if let Some(Ok(Err(error))) = writer.map(thread::ScopedJoinHandle::join) {
                debug!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    "program did not consume all piped input"
                );
            }
            output
        })?;

        Ok(ProgramOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
