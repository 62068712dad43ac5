//! Process-wide `tracing` subscriber for the kernel.
//!
//! A kernel process serves a single request. Standard output belongs to the
//! response in both transports, so every log line goes to standard error.
//! Colour is only used for command-line runs attached to a terminal; in CGI
//! mode standard error lands in the web server's error log.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

use nerv_config::{Config, LogFormat};

use crate::state::ExecutionMode;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    installed: bool,
}

impl TelemetryHandle {
    /// Whether this call installed the subscriber, as opposed to finding one
    /// installed by an earlier request in the same process.
    #[must_use]
    pub const fn installed(&self) -> bool {
        self.installed
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Subscriber options derived from the configuration and the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SubscriberSettings<'a> {
    filter: &'a str,
    format: LogFormat,
    ansi: bool,
}

impl<'a> SubscriberSettings<'a> {
    fn new(config: &'a Config, mode: ExecutionMode, stderr_is_terminal: bool) -> Self {
        Self {
            filter: config.log_filter(),
            format: config.log_format(),
            ansi: mode == ExecutionMode::Cli && stderr_is_terminal,
        }
    }
}

/// Installs the global subscriber on first use.
///
/// Embedding applications that serve several requests from one process call
/// this once per request; only the first call installs anything.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the configured filter does not
/// parse and [`TelemetryError::Subscriber`] when another subscriber already
/// owns the global default.
pub fn initialise(config: &Config, mode: ExecutionMode) -> Result<TelemetryHandle, TelemetryError> {
    let mut installed = false;
    TELEMETRY_GUARD.get_or_try_init(|| {
        let settings = SubscriberSettings::new(config, mode, io::stderr().is_terminal());
        install_subscriber(&settings, io::stderr)?;
        installed = true;
        Ok::<(), TelemetryError>(())
    })?;
    Ok(TelemetryHandle { installed })
}

fn build_subscriber<W>(
    settings: &SubscriberSettings<'_>,
    writer: W,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(settings.filter)
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .with_ansi(settings.ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match settings.format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

fn install_subscriber<W>(settings: &SubscriberSettings<'_>, writer: W) -> Result<(), TelemetryError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = build_subscriber(settings, writer)?;
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
