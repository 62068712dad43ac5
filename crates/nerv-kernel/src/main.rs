//! Stand-alone `nerv` binary serving the built-in modules.
//!
//! Applications normally embed [`nerv_kernel::run`] with their own registry;
//! this binary exposes the API listing and the CLI trust whitelist.

use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use nerv_kernel::IoStreams;

fn main() -> ExitCode {
    let registry = match nerv_kernel::builtin::registry() {
        Ok(registry) => registry,
        Err(error) => {
            writeln!(io::stderr().lock(), "nerv: {error}").ok();
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let stdin_is_terminal = stdin.is_terminal();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    let env = |key: &str| std::env::var(key).ok();
    nerv_kernel::run(
        &registry,
        std::env::args_os(),
        &env,
        IoStreams::new(stdin.lock(), stdin_is_terminal, &mut stdout, &mut stderr),
    )
}
