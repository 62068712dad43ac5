//! Shared configuration for the `nerv` request kernel.
//!
//! The configuration carries the settings an application ships in its TOML
//! file: logging, the request clock, response formatting, CORS origins, the
//! INIT command group and the CLI trust whitelist. Values are layered by
//! `ortho_config`: built-in defaults, then the configuration file, then
//! `NERV_*` environment variables, then command-line flags. The kernel only
//! ever reads a [`Config`]; it is loaded once per process and treated as
//! immutable afterwards.

mod defaults;
mod logging;
mod timezone;

use std::collections::BTreeMap;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    CONFIG_PATH_ENV, CONFIG_PATH_FLAG, DEFAULT_LOG_FILTER, LOG_FILTER_ENV, LOG_FORMAT_ENV,
    TIMEZONE_ENV, default_log_filter, default_log_filter_string, default_log_format,
    default_timezone,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use timezone::{Timezone, TimezoneParseError};

/// Origin key matching any cross-origin request.
pub const CORS_WILDCARD: &str = "*";

/// Resolved configuration for the kernel and its binary.
///
/// Load it with `Config::load()` for the process environment and arguments,
/// or `Config::load_from_iter(args)` when the arguments are supplied by the
/// caller. The configuration file is named by `--config-path` or
/// `NERV_CONFIG_PATH`; otherwise the standard discovery locations are
/// searched and the defaults apply when nothing is found.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(prefix = "NERV")]
pub struct Config {
    /// `tracing` filter expression (for example `info` or `nerv_kernel=debug`).
    pub log_filter: String,
    /// Output format for log lines written to stderr.
    pub log_format: LogFormat,
    /// Timezone used for the clock exposed to handlers.
    pub timezone: Timezone,
    /// Emits pretty-printed JSON responses.
    #[ortho_config(skip_cli)]
    pub debug: bool,
    /// Stops the main command group at its first failed invocation.
    #[ortho_config(skip_cli)]
    pub strict_group: bool,
    /// Commands executed before every request, in order.
    #[ortho_config(skip_cli)]
    pub init: Vec<String>,
    /// Allowed cross-origin callers mapped to the headers they may send.
    #[ortho_config(skip_cli)]
    pub cors: BTreeMap<String, String>,
    /// Trusted CLI programs keyed by the command name that selects them.
    #[ortho_config(skip_cli)]
    pub cli: BTreeMap<String, CliProgram>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            timezone: default_timezone(),
            debug: false,
            strict_group: false,
            init: Vec::new(),
            cors: BTreeMap::new(),
            cli: BTreeMap::new(),
        }
    }
}

/// Executable registered in the CLI trust whitelist.
///
/// Accepts either a bare path (`sync = "/usr/bin/rsync"`) or a table with
/// fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "CliProgramRepr")]
pub struct CliProgram {
    /// Path to the executable.
    pub program: PathBuf,
    /// Arguments placed before the request's own argv.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl CliProgram {
    /// Creates a program entry without fixed arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends fixed leading arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CliProgramRepr {
    Path(PathBuf),
    Table {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl From<CliProgramRepr> for CliProgram {
    fn from(value: CliProgramRepr) -> Self {
        match value {
            CliProgramRepr::Path(program) => Self::new(program),
            CliProgramRepr::Table { program, args } => Self { program, args },
        }
    }
}

impl Config {
    /// Parses a TOML document on its own, without consulting files, the
    /// environment or command-line flags.
    ///
    /// # Errors
    ///
    /// Returns the TOML error when the document is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Returns the log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the request clock timezone.
    #[must_use]
    pub const fn timezone(&self) -> Timezone {
        self.timezone
    }

    /// Looks up the headers allowed for a cross-origin caller, falling back
    /// to the wildcard entry.
    #[must_use]
    pub fn cors_headers(&self, origin: &str) -> Option<&str> {
        self.cors
            .get(origin)
            .or_else(|| self.cors.get(CORS_WILDCARD))
            .map(String::as_str)
    }

    /// Returns the trusted CLI program registered under `name`.
    #[must_use]
    pub fn cli_program(&self, name: &str) -> Option<&CliProgram> {
        self.cli.get(name)
    }
}
