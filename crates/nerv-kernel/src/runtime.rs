//! Process entry point shared by the binary and embedding applications.
//!
//! The runtime detects whether it was started by a web server or from a
//! shell, builds the matching [`Request`], bootstraps configuration and
//! telemetry, serves the request and writes the response. Streams and the
//! environment are injected so the whole path can be driven from tests.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use nerv_config::CONFIG_PATH_ENV;
use tracing::warn;

use crate::apidoc;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::cli::Cli;
use crate::dispatch::SystemProgramRunner;
use crate::io::{
    CgiWriter, CliWriter, OutputSink, Request, Response, STATUS_INTERNAL_ERROR, detect_mode,
};
use crate::observer::Kernel;
use crate::registry::Registry;
use crate::reporter::{LIFECYCLE_TARGET, StructuredReporter};
use crate::state::ExecutionMode;

/// Environment lookup used for CGI variables and the configuration path.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Standard streams handed to [`run`].
pub struct IoStreams<'a, R: Read, W: Write, E: Write> {
    stdin: R,
    stdin_is_terminal: bool,
    stdout: &'a mut W,
    stderr: &'a mut E,
}

impl<'a, R: Read, W: Write, E: Write> IoStreams<'a, R, W, E> {
    /// Bundles the process streams.
    ///
    /// `stdin_is_terminal` suppresses reading piped input in command-line
    /// mode when standard input is attached to a terminal.
    #[must_use]
    pub fn new(stdin: R, stdin_is_terminal: bool, stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdin,
            stdin_is_terminal,
            stdout,
            stderr,
        }
    }
}

/// Serves one request against `registry`.
///
/// Returns [`ExitCode::SUCCESS`] when a CGI response was written or a
/// command-line request completed without an error payload.
pub fn run<I, R, W, E>(
    registry: &Registry,
    args: I,
    env: EnvLookup<'_>,
    io: IoStreams<'_, R, W, E>,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: Read,
    W: Write,
    E: Write,
{
    let IoStreams {
        stdin,
        stdin_is_terminal,
        stdout,
        stderr,
    } = io;

    match detect_mode(env) {
        ExecutionMode::Cgi => {
            let request = Request::from_cgi_env(env, stdin);
            let loader = SystemConfigLoader::new(config_path_from(env));
            serve(registry, &loader, request, CgiWriter::new(stdout), stderr)
        }
        ExecutionMode::Cli => {
            let cli = match Cli::try_parse_from(args) {
                Ok(cli) => cli,
                Err(error) => return report_usage(&error, stdout, stderr),
            };
            if cli.list_api {
                return list_api(registry, stdout, stderr);
            }
            let loader =
                SystemConfigLoader::new(cli.config_path.clone().or_else(|| config_path_from(env)));
            let pipe = read_pipe(stdin, stdin_is_terminal);
            let request = cli.into_request(pipe);
            serve(registry, &loader, request, CliWriter::new(stdout), stderr)
        }
    }
}

fn serve<S, E>(
    registry: &Registry,
    loader: &dyn ConfigLoader,
    request: Request,
    mut sink: S,
    stderr: &mut E,
) -> ExitCode
where
    S: OutputSink,
    E: Write,
{
    let mode = request.mode();
    let config = match bootstrap_with(loader, mode) {
        Ok(booted) => booted.into_config(),
        Err(error) => {
            writeln!(stderr, "nerv: {error}").ok();
            if mode == ExecutionMode::Cgi {
                sink.emit(&Response::status_only(STATUS_INTERNAL_ERROR)).ok();
            }
            return ExitCode::FAILURE;
        }
    };

    let runner = SystemProgramRunner;
    let reporter = StructuredReporter::new();
    let response = Kernel::new(&config, registry, &runner, &reporter).handle(request);

    if let Err(error) = sink.emit(&response) {
        writeln!(stderr, "nerv: {error}").ok();
        return ExitCode::FAILURE;
    }
    exit_code(mode, &response)
}

fn config_path_from(env: EnvLookup<'_>) -> Option<PathBuf> {
    env(CONFIG_PATH_ENV)
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn exit_code(mode: ExecutionMode, response: &Response) -> ExitCode {
    match mode {
        ExecutionMode::Cli if response.failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    let rendered = error.render().to_string();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            write!(stdout, "{rendered}").ok();
            ExitCode::SUCCESS
        }
        _ => {
            write!(stderr, "{rendered}").ok();
            ExitCode::from(2)
        }
    }
}

fn list_api<W: Write, E: Write>(registry: &Registry, stdout: &mut W, stderr: &mut E) -> ExitCode {
    let listing = apidoc::list(registry, None);
    let written = serde_json::to_string_pretty(&listing)
        .map_err(|error| error.to_string())
        .and_then(|text| writeln!(stdout, "{text}").map_err(|error| error.to_string()));
    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(stderr, "nerv: {error}").ok();
            ExitCode::FAILURE
        }
    }
}

fn read_pipe<R: Read>(mut stdin: R, stdin_is_terminal: bool) -> Option<Vec<u8>> {
    if stdin_is_terminal {
        return None;
    }
    let mut buffer = Vec::new();
    if let Err(error) = stdin.read_to_end(&mut buffer) {
        warn!(target: LIFECYCLE_TARGET, %error, "failed to read piped input");
        return None;
    }
    Some(buffer).filter(|bytes| !bytes.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::tests::support::sample_registry;

    struct Outcome {
        code: ExitCode,
        stdout: String,
        stderr: String,
    }

    fn invoke(args: &[&str], env: &[(&str, &str)], stdin: &[u8]) -> Outcome {
        let lookup = |key: &str| {
            env.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_owned())
        };
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let args = std::iter::once("nerv")
            .chain(args.iter().copied())
            .map(OsString::from);
        let code = run(
            &sample_registry(),
            args,
            &lookup,
            IoStreams::new(stdin, false, &mut stdout, &mut stderr),
        );
        Outcome {
            code,
            stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
            stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
        }
    }

    fn config_file(toml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(toml.as_bytes()).expect("write config");
        file
    }

    #[rstest]
    fn cli_request_writes_body_line() {
        let config = config_file("");
        let path = config.path().to_str().expect("utf-8 path");
        let outcome = invoke(&["--config-path", path, "-c", "a/B/c", "-d", "x=21"], &[], b"");
        assert_eq!(outcome.code, ExitCode::SUCCESS);
        assert_eq!(outcome.stdout, "42\n");
    }

    #[rstest]
    fn cli_error_payload_fails_the_process() {
        let config = config_file("");
        let path = config.path().to_str().expect("utf-8 path");
        let outcome = invoke(&["--config-path", path, "-c", "a/B/fail"], &[], b"");
        assert_eq!(outcome.code, ExitCode::FAILURE);
        assert_eq!(
            outcome.stdout,
            "{\"code\":500,\"message\":\"intentional failure\",\"data\":\"\"}\n"
        );
    }

    #[rstest]
    fn cgi_request_reads_gateway_environment() {
        let config = config_file("");
        let path = config.path().to_str().expect("utf-8 path");
        let body = br#"{"x": 4}"#;
        let length = body.len().to_string();
        let env = [
            ("GATEWAY_INTERFACE", "CGI/1.1"),
            ("NERV_CONFIG_PATH", path),
            ("PATH_INFO", "/a/B/c,a/B/d"),
            ("REQUEST_METHOD", "POST"),
            ("CONTENT_TYPE", "application/json"),
            ("CONTENT_LENGTH", length.as_str()),
        ];
        let outcome = invoke(&[], &env, body);
        assert_eq!(outcome.code, ExitCode::SUCCESS);
        assert_eq!(
            outcome.stdout,
            "Content-Type: application/json; charset=utf-8\r\n\r\n{\"a/B/c\":8,\"a/B/d\":2}"
        );
    }

    #[rstest]
    fn cgi_cors_denial_writes_status_only() {
        let config = config_file("[cors]\n\"https://app.example\" = \"Content-Type\"\n");
        let path = config.path().to_str().expect("utf-8 path");
        let env = [
            ("GATEWAY_INTERFACE", "CGI/1.1"),
            ("NERV_CONFIG_PATH", path),
            ("PATH_INFO", "/a/B/d"),
            ("HTTP_ORIGIN", "https://evil.example"),
            ("HTTP_HOST", "api.example"),
        ];
        let outcome = invoke(&[], &env, b"");
        assert_eq!(outcome.stdout, "Status: 406 Not Acceptable\r\n\r\n");
    }

    #[rstest]
    fn invalid_configuration_is_reported_on_stderr() {
        let config = config_file("timezone = \"Mars/Olympus\"\n");
        let path = config.path().to_str().expect("utf-8 path");
        let outcome = invoke(&["--config-path", path, "-c", "a/B/d"], &[], b"");
        assert_eq!(outcome.code, ExitCode::FAILURE);
        assert!(outcome.stdout.is_empty());
        assert!(outcome.stderr.starts_with("nerv: failed to load configuration"));
    }

    #[rstest]
    fn cgi_configuration_failure_still_answers_the_client() {
        let config = config_file("timezone = \"Mars/Olympus\"\n");
        let path = config.path().to_str().expect("utf-8 path");
        let env = [
            ("GATEWAY_INTERFACE", "CGI/1.1"),
            ("NERV_CONFIG_PATH", path),
            ("PATH_INFO", "/a/B/d"),
        ];
        let outcome = invoke(&[], &env, b"");
        assert_eq!(outcome.code, ExitCode::FAILURE);
        assert_eq!(outcome.stdout, "Status: 500 Internal Server Error\r\n\r\n");
        assert!(outcome.stderr.starts_with("nerv: failed to load configuration"));
    }

    #[rstest]
    fn cli_configuration_failure_writes_nothing_to_stdout() {
        let config = config_file("timezone = \"Mars/Olympus\"\n");
        let path = config.path().to_str().expect("utf-8 path");
        let outcome = invoke(&["-c", "a/B/d"], &[("NERV_CONFIG_PATH", path)], b"");
        assert_eq!(outcome.code, ExitCode::FAILURE);
        assert!(outcome.stdout.is_empty());
    }

    #[rstest]
    fn list_api_prints_registry_metadata() {
        let outcome = invoke(&["--list-api"], &[], b"");
        assert_eq!(outcome.code, ExitCode::SUCCESS);
        let listing: serde_json::Value =
            serde_json::from_str(&outcome.stdout).expect("json listing");
        assert_eq!(listing[0]["api"], "a/B/c");
    }

    #[rstest]
    fn unknown_flag_is_a_usage_error() {
        let outcome = invoke(&["--bogus"], &[], b"");
        assert_eq!(outcome.code, ExitCode::from(2));
        assert!(outcome.stderr.contains("--bogus"));
    }

    #[rstest]
    fn empty_pipe_is_not_forwarded() {
        assert_eq!(read_pipe(b"".as_slice(), false), None);
        assert_eq!(read_pipe(b"data".as_slice(), true), None);
        assert_eq!(read_pipe(b"data".as_slice(), false), Some(b"data".to_vec()));
    }
}
