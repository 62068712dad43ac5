//! Request kernel for the `nerv` micro-framework.
//!
//! A single entry point accepts a command string such as `a/B/c,a/B/d`,
//! resolves every group to a registered handler method, binds request data to
//! the declared parameters, invokes the handlers in order and collects their
//! results into one response. The same kernel serves CGI requests from a web
//! server and command-line invocations; in command-line mode it can also run
//! whitelisted external programs.
//!
//! Requests flow through the lifecycle in [`observer`]: configuration is
//! bound, cross-origin callers are checked, the configured INIT group runs,
//! input is prepared, the command is parsed and dispatched, and the
//! [`collector`] shapes the response. Any stage may raise a stop signal, after
//! which the remaining stages are skipped.
//!
//! Applications embed the kernel by registering their handler modules in a
//! [`Registry`] and calling [`run`] with the process streams.

pub mod apidoc;
pub mod binder;
mod bootstrap;
pub mod builtin;
mod cli;
pub mod collector;
pub mod dispatch;
pub mod io;
pub mod observer;
pub mod registry;
mod reporter;
pub mod router;
mod runtime;
pub mod state;
mod telemetry;

pub use binder::{Arguments, BindError};
pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use dispatch::{DispatchError, HandlerContext, HandlerError};
pub use io::{Request, Response};
pub use observer::{Kernel, Stage};
pub use registry::{
    HandlerModule, MethodSpec, ModuleSpec, ParamDescriptor, ParamType, Registry, RegistryError,
};
pub use reporter::{LifecycleReporter, StructuredReporter};
pub use runtime::{EnvLookup, IoStreams, run};
pub use state::{ExecutionMode, RequestState, Signal};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
