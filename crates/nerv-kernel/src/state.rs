//! Per-request mutable state shared by every lifecycle stage.
//!
//! A [`RequestState`] is created when a request arrives and dropped once the
//! response has been produced. It is passed by mutable reference through the
//! stages; nothing in the kernel keeps request data in process-global storage.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::router::{CliTarget, InvocationTarget};

/// Smallest signal code raised on behalf of a handler-requested stop.
pub const HANDLER_SIGNAL_BASE: u16 = 16;

/// How the current process was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// HTTP request delivered through the CGI environment.
    Cgi,
    /// Command-line invocation.
    Cli,
}

/// Abort/continue code checked at every pipeline checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Signal {
    /// Keep running.
    #[default]
    Continue,
    /// Cross-origin request rejected.
    CorsDenied,
    /// Cross-origin preflight answered with headers only.
    Preflight,
    /// A command in the INIT group failed.
    InitAborted,
    /// A handler asked the pipeline to stop with its own reason code.
    Halt(u16),
}

impl Signal {
    /// Numeric code for the signal; `0` means continue.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Continue => 0,
            Self::CorsDenied => 1,
            Self::Preflight => 2,
            Self::InitAborted => 3,
            Self::Halt(reason) => HANDLER_SIGNAL_BASE.saturating_add(reason),
        }
    }

    /// Returns `true` for every signal other than [`Signal::Continue`].
    #[must_use]
    pub const fn is_stop(self) -> bool {
        !matches!(self, Self::Continue)
    }

    /// Whether a response body is produced after halting with this signal.
    ///
    /// CORS outcomes are answered with status and headers only.
    #[must_use]
    pub const fn emits_body(self) -> bool {
        !matches!(self, Self::CorsDenied | Self::Preflight)
    }

    /// Human-readable description handed to the logging collaborator.
    #[must_use]
    pub fn message(self) -> Cow<'static, str> {
        match self {
            Self::Continue => Cow::Borrowed("continue"),
            Self::CorsDenied => Cow::Borrowed("cross-origin request denied"),
            Self::Preflight => Cow::Borrowed("cross-origin preflight answered"),
            Self::InitAborted => Cow::Borrowed("INIT command failed"),
            Self::Halt(reason) => Cow::Owned(format!("process terminated by handler ({reason})")),
        }
    }
}

/// Structured error reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Application error code.
    pub code: i32,
    /// Human-readable description.
    pub message: String,
}

impl ErrorPayload {
    /// Builds a payload from its parts.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Mutable record threaded through one request.
#[derive(Debug)]
pub struct RequestState {
    mode: ExecutionMode,
    signal: Signal,
    /// Raw command string.
    pub cmd: String,
    /// Requested return format tag.
    pub ret: String,
    /// Request parameters as received, before input preparation.
    pub input: Map<String, Value>,
    /// Input parameters keyed by name.
    pub data: Map<String, Value>,
    /// Resolved CGI invocation targets for the main command.
    pub cgi_stack: Vec<InvocationTarget>,
    /// Resolved trusted CLI programs for the main command.
    pub cli_stack: Vec<CliTarget>,
    /// Arguments forwarded to CLI programs.
    pub argv: Vec<String>,
    /// Piped input forwarded to CLI programs.
    pub pipe: Option<Vec<u8>>,
    result: Map<String, Value>,
    error: Option<ErrorPayload>,
}

impl RequestState {
    /// Creates an empty state for a request in the given mode.
    #[must_use]
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            signal: Signal::Continue,
            cmd: String::new(),
            ret: String::new(),
            input: Map::new(),
            data: Map::new(),
            cgi_stack: Vec::new(),
            cli_stack: Vec::new(),
            argv: Vec::new(),
            pipe: None,
            result: Map::new(),
            error: None,
        }
    }

    /// Execution mode fixed at request start.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns `true` for command-line invocations.
    #[must_use]
    pub const fn is_cli(&self) -> bool {
        matches!(self.mode, ExecutionMode::Cli)
    }

    /// Current signal.
    #[must_use]
    pub const fn signal(&self) -> Signal {
        self.signal
    }

    /// Returns `true` once any stop signal has been raised.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.signal.is_stop()
    }

    /// Raises `signal` unless a stop is already in effect.
    ///
    /// Returns `true` when the signal was recorded. Raising
    /// [`Signal::Continue`] never clears an earlier stop.
    pub fn raise(&mut self, signal: Signal) -> bool {
        if self.signal.is_stop() || !signal.is_stop() {
            return false;
        }
        self.signal = signal;
        true
    }

    /// Merges entries into `data`; later keys overwrite earlier ones.
    pub fn merge_data(&mut self, entries: Map<String, Value>) {
        for (key, value) in entries {
            self.data.insert(key, value);
        }
    }

    /// Stores a result, replacing any earlier value under the same key.
    pub fn record_result(&mut self, key: impl Into<String>, value: Value) {
        self.result.insert(key.into(), value);
    }

    /// Accumulated results in invocation order.
    #[must_use]
    pub const fn results(&self) -> &Map<String, Value> {
        &self.result
    }

    /// Records the error reported to the client; the latest failure wins.
    pub fn record_error(&mut self, payload: ErrorPayload) {
        self.error = Some(payload);
    }

    /// Error reported to the client, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorPayload> {
        self.error.as_ref()
    }
}
