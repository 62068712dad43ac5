//! Response delivery for CGI and command-line invocations.

use std::io::{self, Write};

use thiserror::Error;

/// Status reported when nothing overrides it.
pub const STATUS_OK: u16 = 200;

/// Status reported for a denied cross-origin request.
pub const STATUS_NOT_ACCEPTABLE: u16 = 406;

/// Status reported when the kernel cannot serve the request at all.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Errors raised while writing a response.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The output stream rejected the write.
    #[error("failed to write response: {0}")]
    Write(#[from] io::Error),
}

/// A fully formatted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status.
    pub status: u16,
    /// Extra headers in emission order.
    pub headers: Vec<(String, String)>,
    /// Content type of the body.
    pub content_type: &'static str,
    /// Formatted body; `None` when the response carries headers only.
    pub body: Option<String>,
    /// Whether an error payload was reported.
    pub failed: bool,
}

impl Response {
    /// Builds a headers-only failure response.
    #[must_use]
    pub const fn status_only(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            content_type: "text/plain; charset=utf-8",
            body: None,
            failed: true,
        }
    }

    /// Returns the value of the first header named `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body text, empty when absent.
    #[must_use]
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// Destination of formatted responses.
pub trait OutputSink {
    /// Writes `response`.
    ///
    /// # Errors
    ///
    /// Returns an [`OutputError`] when the underlying stream fails.
    fn emit(&mut self, response: &Response) -> Result<(), OutputError>;
}

/// Writes CGI responses: status line, headers, blank line, body.
#[derive(Debug)]
pub struct CgiWriter<W> {
    out: W,
}

impl<W: Write> CgiWriter<W> {
    /// Wraps `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped stream.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputSink for CgiWriter<W> {
    fn emit(&mut self, response: &Response) -> Result<(), OutputError> {
        if response.status != STATUS_OK {
            write!(
                self.out,
                "Status: {} {}\r\n",
                response.status,
                reason_phrase(response.status)
            )?;
        }
        for (name, value) in &response.headers {
            write!(self.out, "{name}: {value}\r\n")?;
        }
        if let Some(body) = &response.body {
            write!(self.out, "Content-Type: {}\r\n\r\n", response.content_type)?;
            self.out.write_all(body.as_bytes())?;
        } else {
            self.out.write_all(b"\r\n")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Writes command-line responses: the body followed by a line terminator.
#[derive(Debug)]
pub struct CliWriter<W> {
    out: W,
}

impl<W: Write> CliWriter<W> {
    /// Wraps `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped stream.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputSink for CliWriter<W> {
    fn emit(&mut self, response: &Response) -> Result<(), OutputError> {
        let body = response.body_text();
        if !body.is_empty() {
            writeln!(self.out, "{body}")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        406 => "Not Acceptable",
        500 => "Internal Server Error",
        _ => "",
    }
}
