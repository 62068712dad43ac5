//! Scenario world shared across lifecycle BDD steps.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use nerv_config::{CliProgram, Config};
use serde_json::Value;

use crate::dispatch::{ProgramOutput, ProgramRunner};
use crate::io::{Request, Response};
use crate::observer::Kernel;
use crate::registry::Registry;

use super::handlers::sample_registry;
use super::reporter::RecordingReporter;

/// Program runner returning canned outputs keyed by program path.
#[derive(Debug, Default)]
pub struct StubRunner {
    outputs: Mutex<HashMap<String, ProgramOutput>>,
    calls: Mutex<Vec<(String, Vec<String>, Option<Vec<u8>>)>>,
}

impl StubRunner {
    /// Makes `program` succeed with `stdout`.
    pub fn succeed(&self, program: &str, stdout: &str) {
        self.outputs.lock().expect("stub runner mutex poisoned").insert(
            program.to_owned(),
            ProgramOutput {
                status: Some(0),
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            },
        );
    }

    /// Makes `program` exit with `status` and `stderr`.
    pub fn fail(&self, program: &str, status: i32, stderr: &str) {
        self.outputs.lock().expect("stub runner mutex poisoned").insert(
            program.to_owned(),
            ProgramOutput {
                status: Some(status),
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
            },
        );
    }

    /// Programs run so far with their argv and piped input.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Vec<String>, Option<Vec<u8>>)> {
        self.calls.lock().expect("stub runner mutex poisoned").clone()
    }
}

impl ProgramRunner for StubRunner {
    fn run(
        &self,
        program: &CliProgram,
        argv: &[String],
        stdin: Option<&[u8]>,
    ) -> io::Result<ProgramOutput> {
        let path = program.program.display().to_string();
        let mut args = program.args.clone();
        args.extend_from_slice(argv);
        self.calls
            .lock()
            .expect("stub runner mutex poisoned")
            .push((path.clone(), args, stdin.map(<[u8]>::to_vec)));
        self.outputs
            .lock()
            .expect("stub runner mutex poisoned")
            .get(&path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

/// Scenario world: configuration, request under construction and outcome.
pub struct KernelWorld {
    pub config: Config,
    pub registry: Registry,
    pub runner: StubRunner,
    pub reporter: Arc<RecordingReporter>,
    pub request: Request,
    pub response: Option<Response>,
}

impl KernelWorld {
    /// Builds a world serving the sample registry with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            registry: sample_registry(),
            runner: StubRunner::default(),
            reporter: Arc::new(RecordingReporter::default()),
            request: Request::cgi(""),
            response: None,
        }
    }

    /// Replaces the configuration with a parsed TOML document.
    pub fn configure(&mut self, toml: &str) {
        self.config = Config::from_toml_str(toml).expect("scenario config parses");
    }

    /// Adds a request parameter.
    pub fn param(&mut self, key: &str, value: Value) {
        self.request.params.insert(key.to_owned(), value);
    }

    /// Serves the current request.
    pub fn serve(&mut self) {
        let request = self.request.clone();
        let kernel = Kernel::new(&self.config, &self.registry, &self.runner, &self.reporter);
        self.response = Some(kernel.handle(request));
    }

    /// Serves the current request with a fresh reporter and returns the
    /// response without storing it.
    #[must_use]
    pub fn serve_again(&self) -> Response {
        let reporter = RecordingReporter::default();
        let kernel = Kernel::new(&self.config, &self.registry, &self.runner, &reporter);
        kernel.handle(self.request.clone())
    }

    /// Response produced by [`KernelWorld::serve`].
    #[must_use]
    pub fn response(&self) -> &Response {
        self.response.as_ref().expect("request has been served")
    }
}

impl Default for KernelWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default kernel world fixture.
pub fn world() -> RefCell<KernelWorld> {
    RefCell::new(KernelWorld::new())
}
