//! Kernel bootstrap orchestration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::debug;

use nerv_config::{CONFIG_PATH_FLAG, Config};

use crate::reporter::LIFECYCLE_TARGET;
use crate::state::ExecutionMode;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader {
    /// Loads the kernel configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a configuration layer is malformed.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load_from_iter`].
///
/// Only the configuration path is forwarded as a flag; request arguments
/// never reach the configuration parser.
#[derive(Debug, Default, Clone)]
pub struct SystemConfigLoader {
    config_path: Option<PathBuf>,
}

impl SystemConfigLoader {
    /// Builds a loader honouring an explicit configuration path.
    #[must_use]
    pub const fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    /// Explicit configuration path, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn arguments(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("nerv")];
        if let Some(path) = self.config_path() {
            args.push(OsString::from(CONFIG_PATH_FLAG));
            args.push(path.as_os_str().to_owned());
        }
        args
    }
}

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(self.arguments())
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
#[derive(Debug)]
pub struct Bootstrapped {
    config: Config,
    telemetry: TelemetryHandle,
}

impl Bootstrapped {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Consumes the bootstrap result, returning the configuration.
    #[must_use]
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Loads configuration and installs telemetry for a request served in `mode`.
///
/// # Errors
///
/// Returns [`BootstrapError::Configuration`] when the loader fails and
/// [`BootstrapError::Telemetry`] when the subscriber cannot be installed.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    mode: ExecutionMode,
) -> Result<Bootstrapped, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry = telemetry::initialise(&config, mode)
        .map_err(|source| BootstrapError::Telemetry { source })?;

    debug!(
        target: LIFECYCLE_TARGET,
        init = config.init.len(),
        cors = config.cors.len(),
        cli = config.cli.len(),
        timezone = %config.timezone,
        subscriber_installed = telemetry.installed(),
        "kernel bootstrapped"
    );
    Ok(Bootstrapped { config, telemetry })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    struct FailingConfigLoader;

    impl ConfigLoader for FailingConfigLoader {
        fn load(&self) -> Result<Config, Arc<OrthoError>> {
            let args = vec![
                OsString::from("nerv"),
                OsString::from("--timezone"),
                OsString::from("Mars/Olympus"),
            ];
            Config::load_from_iter(args)
        }
    }

    #[rstest]
    fn static_loader_round_trips_configuration() {
        let mut config = Config::default();
        config.init.push("boot/Auth/verify".to_owned());
        let loader = StaticConfigLoader::new(config.clone());
        let booted = bootstrap_with(&loader, ExecutionMode::Cli).expect("bootstrap succeeds");
        assert_eq!(booted.config(), &config);
    }

    #[rstest]
    fn loader_failure_is_reported_as_configuration_error() {
        let error =
            bootstrap_with(&FailingConfigLoader, ExecutionMode::Cli).expect_err("bootstrap fails");
        assert!(matches!(error, BootstrapError::Configuration { .. }));
        assert!(error.to_string().starts_with("failed to load configuration"));
    }

    #[rstest]
    fn system_loader_forwards_only_the_config_path() {
        assert_eq!(SystemConfigLoader::default().arguments(), vec![OsString::from("nerv")]);
        let loader = SystemConfigLoader::new(Some(PathBuf::from("/etc/nerv.toml")));
        assert_eq!(
            loader.arguments(),
            vec![
                OsString::from("nerv"),
                OsString::from("--config-path"),
                OsString::from("/etc/nerv.toml"),
            ]
        );
    }

    #[rstest]
    fn system_loader_reads_explicit_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "debug = true\ntimezone = \"+08:00\"").expect("write config");
        let loader = SystemConfigLoader::new(Some(file.path().to_path_buf()));
        let config = loader.load().expect("config loads");
        assert!(config.debug);
        assert_eq!(config.timezone.to_string(), "+08:00");
    }
}
