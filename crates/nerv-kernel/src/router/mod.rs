//! Command resolution.
//!
//! The router turns a command string into the ordered list of handler
//! methods to invoke, and matches command groups against the CLI trust list.
//! Resolution never fails: anything that does not resolve is dropped and
//! logged, and callers treat an empty result as a no-op.

pub mod grammar;

use std::collections::BTreeMap;
use std::sync::Arc;

use nerv_config::CliProgram;
use tracing::debug;

use crate::registry::{MethodSpec, Registry};

/// Tracing target for routing operations.
pub(crate) const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

/// A resolved handler method.
#[derive(Debug, Clone)]
pub struct InvocationTarget {
    path: String,
    module: String,
    method: String,
    entry: Arc<MethodSpec>,
}

impl InvocationTarget {
    /// Canonical identifier `module/method`, used as the result key.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Module path.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Registered method descriptor.
    #[must_use]
    pub fn entry(&self) -> &MethodSpec {
        &self.entry
    }
}

impl PartialEq for InvocationTarget {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for InvocationTarget {}

/// A trusted external program selected by a CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliTarget {
    name: String,
    program: CliProgram,
}

impl CliTarget {
    /// Whitelisted name, used as the result key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program to execute.
    #[must_use]
    pub const fn program(&self) -> &CliProgram {
        &self.program
    }
}

/// Resolves command strings against a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct CommandRouter<'r> {
    registry: &'r Registry,
}

impl<'r> CommandRouter<'r> {
    /// Creates a router over `registry`.
    #[must_use]
    pub const fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Resolves every group of `command` in source order.
    ///
    /// Unresolvable groups are dropped without affecting their siblings, and
    /// duplicate targets are kept.
    #[must_use]
    pub fn parse(&self, command: &str) -> Vec<InvocationTarget> {
        let mut targets = Vec::new();
        for group in grammar::split_groups(command) {
            let Some(parsed) = grammar::parse_group(group) else {
                debug!(target: ROUTER_TARGET, group, "rejected malformed command group");
                continue;
            };
            for method in parsed.methods {
                match self.registry.lookup(parsed.module, method) {
                    Some(entry) => targets.push(InvocationTarget {
                        path: format!("{}{}{method}", parsed.module, grammar::PATH_SEPARATOR),
                        module: parsed.module.to_owned(),
                        method: method.to_owned(),
                        entry,
                    }),
                    None => debug!(
                        target: ROUTER_TARGET,
                        module = parsed.module,
                        method,
                        "command target is not registered"
                    ),
                }
            }
        }
        targets
    }
}

/// Matches each group of `command` against the CLI whitelist.
///
/// A group matches by its full text first and by its first path segment
/// otherwise. Groups failing the traversal rules never match.
#[must_use]
pub fn cli_get_trust(command: &str, whitelist: &BTreeMap<String, CliProgram>) -> Vec<CliTarget> {
    grammar::split_groups(command)
        .filter_map(|group| {
            if !grammar::is_cli_name(group) {
                debug!(target: ROUTER_TARGET, group, "rejected untrusted CLI name");
                return None;
            }
            let top_level = group
                .split(grammar::PATH_SEPARATOR)
                .next()
                .unwrap_or(group);
            let (name, program) = whitelist
                .get_key_value(group)
                .or_else(|| whitelist.get_key_value(top_level))?;
            Some(CliTarget {
                name: name.clone(),
                program: program.clone(),
            })
        })
        .collect()
}
