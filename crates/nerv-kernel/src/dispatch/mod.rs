//! Invocation of resolved targets.
//!
//! The [`Dispatcher`] runs handler targets strictly in order against the
//! shared [`RequestState`]. For each target it binds the request data,
//! calls the handler and stores the returned value under the target's
//! canonical path. Returned errors and panics are caught here and recorded as
//! the request's error payload; under [`FailurePolicy::Continue`] the
//! remaining targets still run, under [`FailurePolicy::Abort`] the first
//! failure ends the group.
//!
//! Trusted CLI programs are executed through a [`ProgramRunner`] and their
//! output is recorded under the whitelisted name.

mod cli;
mod context;
mod errors;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use nerv_config::Timezone;
use serde_json::Value;
use tracing::debug;

pub use self::cli::{ProgramOutput, ProgramRunner, SystemProgramRunner};
pub use self::context::HandlerContext;
pub use self::errors::{BAD_REQUEST, DispatchError, HandlerError, INTERNAL_ERROR, NOT_FOUND};

use crate::binder;
use crate::registry::Registry;
use crate::reporter::LifecycleReporter;
use crate::router::{CliTarget, InvocationTarget};
use crate::state::RequestState;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// How a group reacts to a failed invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and keep invoking the remaining targets.
    #[default]
    Continue,
    /// Record the failure and stop the group.
    Abort,
}

/// Invokes handler targets and trusted programs for one request.
pub struct Dispatcher<'a> {
    registry: &'a Registry,
    timezone: Timezone,
    runner: &'a dyn ProgramRunner,
    reporter: &'a dyn LifecycleReporter,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        registry: &'a Registry,
        timezone: Timezone,
        runner: &'a dyn ProgramRunner,
        reporter: &'a dyn LifecycleReporter,
    ) -> Self {
        Self {
            registry,
            timezone,
            runner,
            reporter,
        }
    }

    /// Invokes `targets` in order.
    ///
    /// Invocation stops early when a handler raises a stop signal.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`] returns the first failure after it has
    /// been recorded in `state`. Under [`FailurePolicy::Continue`] always
    /// returns `Ok`.
    pub fn invoke(
        &self,
        targets: &[InvocationTarget],
        state: &mut RequestState,
        policy: FailurePolicy,
    ) -> Result<(), DispatchError> {
        for target in targets {
            if state.is_stopped() {
                debug!(
                    target: DISPATCH_TARGET,
                    skipped = target.path(),
                    signal = state.signal().code(),
                    "stop signal raised, skipping remaining targets"
                );
                break;
            }

            match self.invoke_target(target, state) {
                Ok(value) => state.record_result(target.path(), value),
                Err(error) => {
                    self.reporter.invocation_failed(&error);
                    state.record_error(error.payload());
                    if policy == FailurePolicy::Abort {
                        return Err(error);
                    }
                }
            }
        }
        Ok(())
    }

    fn invoke_target(
        &self,
        target: &InvocationTarget,
        state: &mut RequestState,
    ) -> Result<Value, DispatchError> {
        let method = target.entry();
        let args = binder::bind(method.params(), &state.data)
            .map_err(|source| DispatchError::bind(target.path(), source))?;

        debug!(
            target: DISPATCH_TARGET,
            invocation = target.path(),
            args = args.len(),
            "invoking handler"
        );

        let handler = method.handler();
        let mut context = HandlerContext::new(state, self.registry, self.timezone, target.path());
        match catch_unwind(AssertUnwindSafe(|| handler(&mut context, &args))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(DispatchError::handler(target.path(), source)),
            Err(panic) => Err(DispatchError::panic(target.path(), panic_message(&*panic))),
        }
    }

    /// Runs trusted programs in order, recording each outcome.
    ///
    /// Programs are independent: a failing program is recorded and the next
    /// one still runs.
    pub fn invoke_programs(&self, targets: &[CliTarget], state: &mut RequestState) {
        for target in targets {
            if state.is_stopped() {
                break;
            }
            let outcome = self
                .runner
                .run(target.program(), &state.argv, state.pipe.as_deref())
                .map_err(|source| DispatchError::spawn(target.name(), source))
                .and_then(|output| {
                    if output.success() {
                        Ok(output.stdout_text())
                    } else {
                        Err(DispatchError::program(
                            target.name(),
                            output.status,
                            output.stderr_text(),
                        ))
                    }
                });

            match outcome {
                Ok(stdout) => state.record_result(target.name(), Value::String(stdout)),
                Err(error) => {
                    self.reporter.invocation_failed(&error);
                    state.record_error(error.payload());
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic payload"))
}
