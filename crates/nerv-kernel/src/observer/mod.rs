//! Request lifecycle.
//!
//! The [`Kernel`] drives a request through a fixed sequence of stages:
//!
//! ```text
//! LOAD_CONFIG -> CHECK_CORS -> RUN_INIT -> PREP_INPUT -> PARSE_CMD
//!             -> RUN_CGI -> RUN_CLI -> COLLECT
//! ```
//!
//! Before each stage the request signal is checked; once a stop signal is
//! raised every later stage is skipped and the request goes straight to
//! collection. `CHECK_CORS` only applies to CGI requests and `RUN_CLI` only to
//! command-line requests.

pub mod cors;

use nerv_config::Config;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::collector::{self, ReturnFormat};
use crate::dispatch::{BAD_REQUEST, DispatchError, Dispatcher, FailurePolicy, ProgramRunner};
use crate::io::{Request, Response, STATUS_NOT_ACCEPTABLE, STATUS_OK};
use crate::registry::Registry;
use crate::reporter::{LIFECYCLE_TARGET, LifecycleReporter};
use crate::router::{CommandRouter, cli_get_trust, grammar};
use crate::state::{ErrorPayload, ExecutionMode, RequestState, Signal};

use self::cors::CorsDecision;

/// Data keys naming the command.
const COMMAND_KEYS: &[&str] = &["c", "cmd"];

/// Data keys naming the return format.
const RETURN_KEYS: &[&str] = &["r", "ret"];

/// Lifecycle stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// Bind the loaded configuration and request to a fresh state.
    LoadConfig,
    /// Admit or reject cross-origin callers.
    CheckCors,
    /// Run the configured INIT commands.
    RunInit,
    /// Move request parameters into the request data.
    PrepInput,
    /// Resolve the main command.
    ParseCmd,
    /// Invoke the resolved handlers.
    RunCgi,
    /// Run trusted programs.
    RunCli,
    /// Shape and format the response.
    Collect,
}

impl Stage {
    /// Stages run before collection, in order.
    pub const PIPELINE: [Self; 7] = [
        Self::LoadConfig,
        Self::CheckCors,
        Self::RunInit,
        Self::PrepInput,
        Self::ParseCmd,
        Self::RunCgi,
        Self::RunCli,
    ];

    /// Returns `true` when the stage runs for requests in `mode`.
    #[must_use]
    pub const fn applies_to(self, mode: ExecutionMode) -> bool {
        match self {
            Self::CheckCors => matches!(mode, ExecutionMode::Cgi),
            Self::RunCli => matches!(mode, ExecutionMode::Cli),
            _ => true,
        }
    }
}

/// A request in flight together with its response metadata.
#[derive(Debug)]
pub struct Exchange {
    request: Request,
    state: RequestState,
    status: u16,
    headers: Vec<(String, String)>,
}

impl Exchange {
    /// Starts an exchange for `request`.
    #[must_use]
    pub fn new(request: Request) -> Self {
        let state = RequestState::new(request.mode());
        Self {
            request,
            state,
            status: STATUS_OK,
            headers: Vec::new(),
        }
    }

    /// Request state.
    #[must_use]
    pub const fn state(&self) -> &RequestState {
        &self.state
    }

    /// Response status decided so far.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers decided so far.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Serves requests against a registry and configuration.
pub struct Kernel<'a> {
    config: &'a Config,
    registry: &'a Registry,
    runner: &'a dyn ProgramRunner,
    reporter: &'a dyn LifecycleReporter,
}

impl<'a> Kernel<'a> {
    /// Creates a kernel.
    #[must_use]
    pub fn new(
        config: &'a Config,
        registry: &'a Registry,
        runner: &'a dyn ProgramRunner,
        reporter: &'a dyn LifecycleReporter,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
            reporter,
        }
    }

    /// Serves `request` from start to finish.
    #[must_use]
    pub fn handle(&self, request: Request) -> Response {
        let mut exchange = Exchange::new(request);
        for stage in Stage::PIPELINE {
            self.run_stage(stage, &mut exchange);
        }
        self.collect(exchange)
    }

    /// Runs a single stage.
    ///
    /// Returns `false` when the stage was skipped, either because a stop
    /// signal is in effect or because it does not apply to the request mode.
    pub fn run_stage(&self, stage: Stage, exchange: &mut Exchange) -> bool {
        if !stage.applies_to(exchange.state.mode()) {
            return false;
        }
        if exchange.state.is_stopped() {
            self.reporter
                .stage_skipped(stage, exchange.state.signal());
            return false;
        }

        self.reporter.stage_entered(stage);
        match stage {
            Stage::LoadConfig => load_config(exchange),
            Stage::CheckCors => self.check_cors(exchange),
            Stage::RunInit => self.run_init(exchange),
            Stage::PrepInput => prep_input(exchange),
            Stage::ParseCmd => self.parse_cmd(exchange),
            Stage::RunCgi => self.run_cgi(exchange),
            Stage::RunCli => self.run_cli(exchange),
            Stage::Collect => {}
        }

        if exchange.state.is_stopped() {
            self.reporter.halted(stage, exchange.state.signal());
        }
        true
    }

    /// Shapes the exchange into a response.
    #[must_use]
    pub fn collect(&self, exchange: Exchange) -> Response {
        self.reporter.stage_entered(Stage::Collect);
        let Exchange {
            state,
            status,
            headers,
            ..
        } = exchange;

        let format = ReturnFormat::from_tag(&state.ret);
        let body = state.signal().emits_body().then(|| {
            let payload = collector::collect(&state);
            collector::render(payload.as_ref(), format, self.config.debug)
        });

        Response {
            status,
            headers,
            content_type: format.content_type(),
            body,
            failed: state.error().is_some(),
        }
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(
            self.registry,
            self.config.timezone(),
            self.runner,
            self.reporter,
        )
    }

    fn check_cors(&self, exchange: &mut Exchange) {
        match cors::check(self.config, &exchange.request) {
            CorsDecision::Pass => {}
            CorsDecision::Allow { headers, preflight } => {
                exchange.headers.extend(headers);
                if preflight {
                    exchange.state.raise(Signal::Preflight);
                }
            }
            CorsDecision::Deny { origin } => {
                self.reporter
                    .cors_denied(&origin, exchange.request.client_ip.as_deref());
                exchange.status = STATUS_NOT_ACCEPTABLE;
                exchange.state.raise(Signal::CorsDenied);
            }
        }
    }

    fn run_init(&self, exchange: &mut Exchange) {
        if self.config.init.is_empty() {
            return;
        }
        let command = self.config.init.join(&grammar::GROUP_DELIMITER.to_string());
        let targets = CommandRouter::new(self.registry).parse(&command);
        if self
            .dispatcher()
            .invoke(&targets, &mut exchange.state, FailurePolicy::Abort)
            .is_err()
        {
            exchange.state.raise(Signal::InitAborted);
        }
    }

    fn parse_cmd(&self, exchange: &mut Exchange) {
        let state = &mut exchange.state;
        state.cgi_stack = CommandRouter::new(self.registry).parse(&state.cmd);
        if state.is_cli() {
            state.cli_stack = cli_get_trust(&state.cmd, &self.config.cli);
        }

        let unresolved = state.cgi_stack.is_empty() && state.cli_stack.is_empty();
        if unresolved && !state.cmd.is_empty() && self.config.init.is_empty() {
            let error = DispatchError::unresolved(state.cmd.clone());
            self.reporter.invocation_failed(&error);
            state.record_error(error.payload());
        }
    }

    fn run_cgi(&self, exchange: &mut Exchange) {
        let policy = if self.config.strict_group {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        };
        let state = &mut exchange.state;
        let targets = std::mem::take(&mut state.cgi_stack);
        // Failures are already recorded in the state.
        if self.dispatcher().invoke(&targets, state, policy).is_err() {
            tracing::debug!(target: LIFECYCLE_TARGET, "main group aborted");
        }
        state.cgi_stack = targets;
    }

    fn run_cli(&self, exchange: &mut Exchange) {
        let state = &mut exchange.state;
        let targets = std::mem::take(&mut state.cli_stack);
        self.dispatcher().invoke_programs(&targets, state);
        state.cli_stack = targets;
    }
}

fn load_config(exchange: &mut Exchange) {
    let request = &mut exchange.request;
    let state = &mut exchange.state;
    state.input = std::mem::take(&mut request.params);
    state.argv = std::mem::take(&mut request.argv);
    state.pipe = request.pipe.take();
}

fn prep_input(exchange: &mut Exchange) {
    let state = &mut exchange.state;
    let mut data = state.input.clone();
    let command = take_control(&mut data, COMMAND_KEYS);
    let ret = take_control(&mut data, RETURN_KEYS);

    state.cmd = Some(exchange.request.command.trim())
        .filter(|command| !command.is_empty())
        .map(str::to_owned)
        .or(command)
        .unwrap_or_default();
    state.ret = exchange
        .request
        .ret
        .clone()
        .or(ret)
        .unwrap_or_else(|| ReturnFormat::default().to_string());

    if let Some(error) = exchange.request.rejected.take() {
        state.record_error(ErrorPayload::new(BAD_REQUEST, error.to_string()));
    }
    state.merge_data(data);
}

/// Removes every key in `keys` from `data`, returning the first string value.
fn take_control(data: &mut serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| data.shift_remove(*key))
        .filter_map(|value| match value {
            Value::String(text) => Some(text),
            _ => None,
        })
        .reduce(|first, _| first)
}
