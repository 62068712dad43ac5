//! Error types for handler invocation failures.
//!
//! Every failure raised while invoking a target is converted into an
//! [`ErrorPayload`] at the dispatch boundary, so nothing propagates to the
//! client as anything other than a well-formed response.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::binder::BindError;
use crate::state::ErrorPayload;

/// Code reported when request data cannot be bound.
pub const BAD_REQUEST: i32 = 400;

/// Code reported when the only requested work did not resolve.
pub const NOT_FOUND: i32 = 404;

/// Code reported for handler faults without their own code.
pub const INTERNAL_ERROR: i32 = 500;

/// Failure returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    code: i32,
    message: String,
}

impl HandlerError {
    /// Creates an error with an application-chosen code.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a generic handler fault (500).
    #[must_use]
    pub fn fault(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Creates an error for an unusable argument (400).
    #[must_use]
    pub fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        Self::new(
            BAD_REQUEST,
            format!("invalid argument '{name}': {}", message.into()),
        )
    }

    /// Code reported to the client.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced while invoking handlers or trusted programs.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Request data could not be bound to the handler's parameters.
    #[error("{target}: {source}")]
    Bind {
        target: String,
        #[source]
        source: BindError,
    },

    /// The handler returned an error.
    #[error("{target}: {source}")]
    Handler {
        target: String,
        #[source]
        source: HandlerError,
    },

    /// The handler panicked.
    #[error("{target}: handler panicked: {message}")]
    Panic { target: String, message: String },

    /// The command resolved to nothing although it was the only work.
    #[error("command '{command}' did not resolve to any handler")]
    Unresolved { command: String },

    /// A trusted program exited unsuccessfully.
    #[error("{name}: {}", program_failure(.status, .stderr))]
    Program {
        name: String,
        status: Option<i32>,
        stderr: String,
    },

    /// A trusted program could not be spawned.
    #[error("{name}: failed to run program: {source}")]
    Spawn {
        name: String,
        #[source]
        source: Arc<io::Error>,
    },
}

fn program_failure(status: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim_end();
    match (status, stderr.is_empty()) {
        (Some(code), true) => format!("exited with status {code}"),
        (None, true) => String::from("terminated by signal"),
        (_, false) => stderr.to_owned(),
    }
}

impl DispatchError {
    /// Creates a binding error.
    #[must_use]
    pub fn bind(target: impl Into<String>, source: BindError) -> Self {
        Self::Bind {
            target: target.into(),
            source,
        }
    }

    /// Creates a handler error.
    #[must_use]
    pub fn handler(target: impl Into<String>, source: HandlerError) -> Self {
        Self::Handler {
            target: target.into(),
            source,
        }
    }

    /// Creates a panic error.
    #[must_use]
    pub fn panic(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Panic {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an unresolved command error.
    #[must_use]
    pub fn unresolved(command: impl Into<String>) -> Self {
        Self::Unresolved {
            command: command.into(),
        }
    }

    /// Creates a program failure error.
    #[must_use]
    pub fn program(name: impl Into<String>, status: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Program {
            name: name.into(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Creates a spawn failure error.
    #[must_use]
    pub fn spawn(name: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    /// Code reported to the client.
    ///
    /// Binding failures map to 400 and unresolved commands to 404. Handlers
    /// choose their own code; program failures report the exit status. Panics,
    /// spawn failures and killed programs map to 500.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Bind { .. } => BAD_REQUEST,
            Self::Unresolved { .. } => NOT_FOUND,
            Self::Handler { source, .. } => source.code(),
            Self::Program {
                status: Some(code), ..
            } => *code,
            Self::Program { status: None, .. } | Self::Panic { .. } | Self::Spawn { .. } => {
                INTERNAL_ERROR
            }
        }
    }

    /// Converts the error into the payload reported to the client.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        let message = match self {
            Self::Handler { source, .. } => source.message().to_owned(),
            other => other.to_string(),
        };
        ErrorPayload::new(self.code(), message)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        DispatchError::bind("a/B/c", BindError::Missing { name: "x".to_owned() }),
        400
    )]
    #[case(DispatchError::unresolved("a/B/zz"), 404)]
    #[case(DispatchError::handler("a/B/c", HandlerError::new(409, "conflict")), 409)]
    #[case(DispatchError::handler("a/B/c", HandlerError::fault("boom")), 500)]
    #[case(DispatchError::panic("a/B/c", "oops"), 500)]
    #[case(DispatchError::program("sync", Some(3), "bad flag"), 3)]
    #[case(DispatchError::program("sync", None, ""), 500)]
    #[case(DispatchError::spawn("sync", io::Error::from(io::ErrorKind::NotFound)), 500)]
    fn maps_failures_to_codes(#[case] error: DispatchError, #[case] code: i32) {
        assert_eq!(error.code(), code);
        assert_eq!(error.payload().code, code);
    }

    #[test]
    fn handler_payload_carries_handler_message() {
        let error = DispatchError::handler("a/B/c", HandlerError::new(401, "not signed in"));
        assert_eq!(error.payload(), ErrorPayload::new(401, "not signed in"));
    }

    #[rstest]
    #[case(DispatchError::program("sync", Some(2), "usage: sync\n"), "sync: usage: sync")]
    #[case(DispatchError::program("sync", Some(2), ""), "sync: exited with status 2")]
    #[case(DispatchError::program("sync", None, ""), "sync: terminated by signal")]
    fn program_failures_prefer_stderr(#[case] error: DispatchError, #[case] message: &str) {
        assert_eq!(error.to_string(), message);
    }

    #[test]
    fn bind_errors_name_the_target() {
        let error = DispatchError::bind("a/B/c", BindError::Missing { name: "x".to_owned() });
        assert_eq!(
            error.payload().message,
            "a/B/c: missing required parameter 'x'"
        );
    }
}
