//! Command-line argument definitions for the `nerv` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::io::{Request, parse_data_arg};

/// Command-line interface of the request kernel.
#[derive(Parser, Debug)]
#[command(name = "nerv", version, about = "Routes commands to registered handlers.")]
pub(crate) struct Cli {
    /// Command to run, for example `a/B/c,a/B/d`.
    #[arg(short = 'c', long = "cmd", value_name = "COMMAND")]
    pub(crate) cmd: Option<String>,
    /// Request data as a JSON object or a query string.
    #[arg(short = 'd', long = "data", value_name = "DATA")]
    pub(crate) data: Option<String>,
    /// Return format (`json` or `text`).
    #[arg(short = 'r', long = "ret", value_name = "FORMAT")]
    pub(crate) ret: Option<String>,
    /// Configuration file overriding the default lookup.
    #[arg(long = "config-path", value_name = "PATH")]
    pub(crate) config_path: Option<PathBuf>,
    /// Prints the registered API and exits.
    #[arg(long = "list-api")]
    pub(crate) list_api: bool,
    /// Arguments forwarded to trusted programs.
    #[arg(last = true, value_name = "ARG")]
    pub(crate) argv: Vec<String>,
}

impl Cli {
    /// Builds the command-line request, attaching piped input when present.
    pub(crate) fn into_request(self, pipe: Option<Vec<u8>>) -> Request {
        let mut request = Request::cli(self.cmd.unwrap_or_default());
        request.ret = self.ret;
        if let Some(data) = self.data {
            match parse_data_arg(&data) {
                Ok(params) => request.params = params,
                Err(error) => request.rejected = Some(error),
            }
        }
        request.argv = self.argv;
        request.pipe = pipe;
        request
    }
}
