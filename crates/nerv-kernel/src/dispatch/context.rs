//! Execution context handed to handlers.

use nerv_config::Timezone;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::registry::Registry;
use crate::state::{ExecutionMode, RequestState, Signal};

/// View of the request a handler runs against.
///
/// Handlers share `data` and `result` with every other target of the same
/// request, so a target sees the writes of the targets that ran before it.
pub struct HandlerContext<'a> {
    state: &'a mut RequestState,
    registry: &'a Registry,
    timezone: Timezone,
    target: &'a str,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        state: &'a mut RequestState,
        registry: &'a Registry,
        timezone: Timezone,
        target: &'a str,
    ) -> Self {
        Self {
            state,
            registry,
            timezone,
            target,
        }
    }

    /// Canonical path of the target being invoked.
    #[must_use]
    pub fn target(&self) -> &str {
        self.target
    }

    /// Request parameters as received.
    ///
    /// Until input preparation has run (for example while INIT commands
    /// execute) these are the only view of the client's parameters.
    #[must_use]
    pub fn input(&self) -> &Map<String, Value> {
        &self.state.input
    }

    /// Request data.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.state.data
    }

    /// Mutable request data, visible to later targets.
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.state.data
    }

    /// Results recorded by earlier targets.
    #[must_use]
    pub fn results(&self) -> &Map<String, Value> {
        self.state.results()
    }

    /// Execution mode of the request.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.state.mode()
    }

    /// Returns `true` for command-line invocations.
    #[must_use]
    pub fn is_cli(&self) -> bool {
        self.state.is_cli()
    }

    /// Configured timezone.
    #[must_use]
    pub const fn timezone(&self) -> Timezone {
        self.timezone
    }

    /// Current time in the configured timezone.
    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.timezone.offset())
    }

    /// Registry the request is served from.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        self.registry
    }

    /// Asks the pipeline to stop after this handler returns.
    ///
    /// The remaining targets and stages are skipped; results recorded so far
    /// are still collected. Returns `false` when a stop was already in effect.
    pub fn stop(&mut self, reason: u16) -> bool {
        self.state.raise(Signal::Halt(reason))
    }
}
