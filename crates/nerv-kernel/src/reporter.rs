//! Structured reporting of request lifecycle events.

use std::sync::Arc;

use crate::dispatch::DispatchError;
use crate::observer::Stage;
use crate::state::Signal;

/// Tracing target for lifecycle events.
pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::observer");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked when a stage starts running.
    fn stage_entered(&self, stage: Stage);

    /// Invoked when a stage is skipped because a stop signal is in effect.
    fn stage_skipped(&self, stage: Stage, signal: Signal);

    /// Invoked when a cross-origin request is rejected.
    fn cors_denied(&self, origin: &str, client_ip: Option<&str>);

    /// Invoked when a checkpoint halts the pipeline.
    fn halted(&self, stage: Stage, signal: Signal);

    /// Invoked when a handler or program invocation fails.
    fn invocation_failed(&self, error: &DispatchError);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter,
{
    fn stage_entered(&self, stage: Stage) {
        (**self).stage_entered(stage);
    }

    fn stage_skipped(&self, stage: Stage, signal: Signal) {
        (**self).stage_skipped(stage, signal);
    }

    fn cors_denied(&self, origin: &str, client_ip: Option<&str>) {
        (**self).cors_denied(origin, client_ip);
    }

    fn halted(&self, stage: Stage, signal: Signal) {
        (**self).halted(stage, signal);
    }

    fn invocation_failed(&self, error: &DispatchError) {
        (**self).invocation_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl StructuredReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredReporter {
    fn stage_entered(&self, stage: Stage) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "stage_entered",
            stage = %stage,
            "entering lifecycle stage"
        );
    }

    fn stage_skipped(&self, stage: Stage, signal: Signal) {
        tracing::trace!(
            target: LIFECYCLE_TARGET,
            event = "stage_skipped",
            stage = %stage,
            signal = signal.code(),
            "skipping lifecycle stage"
        );
    }

    fn cors_denied(&self, origin: &str, client_ip: Option<&str>) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "cors_denied",
            origin,
            client_ip = client_ip.unwrap_or("unknown"),
            "cross-origin request denied"
        );
    }

    fn halted(&self, stage: Stage, signal: Signal) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "halted",
            stage = %stage,
            signal = signal.code(),
            reason = %signal.message(),
            "request pipeline halted"
        );
    }

    fn invocation_failed(&self, error: &DispatchError) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "invocation_failed",
            code = error.code(),
            error = %error,
            "invocation failed"
        );
    }
}
