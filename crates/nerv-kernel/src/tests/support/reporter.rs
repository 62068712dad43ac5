//! Test double for [`LifecycleReporter`] that records events for assertions.

use std::sync::Mutex;

use crate::dispatch::DispatchError;
use crate::observer::Stage;
use crate::reporter::LifecycleReporter;
use crate::state::Signal;

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A stage started running.
    Entered(Stage),
    /// A stage was skipped under a stop signal.
    Skipped(Stage),
    /// A cross-origin request was denied.
    CorsDenied {
        origin: String,
        client_ip: Option<String>,
    },
    /// The pipeline halted at a checkpoint.
    Halted { stage: Stage, signal: Signal },
    /// An invocation failed with the given code.
    InvocationFailed(i32),
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    /// Stages that actually ran, in order.
    #[must_use]
    pub fn entered_stages(&self) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::Entered(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn stage_entered(&self, stage: Stage) {
        self.record(LifecycleEvent::Entered(stage));
    }

    fn stage_skipped(&self, stage: Stage, _signal: Signal) {
        self.record(LifecycleEvent::Skipped(stage));
    }

    fn cors_denied(&self, origin: &str, client_ip: Option<&str>) {
        self.record(LifecycleEvent::CorsDenied {
            origin: origin.to_owned(),
            client_ip: client_ip.map(str::to_owned),
        });
    }

    fn halted(&self, stage: Stage, signal: Signal) {
        self.record(LifecycleEvent::Halted { stage, signal });
    }

    fn invocation_failed(&self, error: &DispatchError) {
        self.record(LifecycleEvent::InvocationFailed(error.code()));
    }
}
