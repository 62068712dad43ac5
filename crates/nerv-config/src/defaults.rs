use crate::logging::LogFormat;
use crate::timezone::Timezone;

/// Command-line flag naming an explicit configuration file.
pub const CONFIG_PATH_FLAG: &str = "--config-path";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "NERV_CONFIG_PATH";

/// Environment variable overriding the log filter.
pub const LOG_FILTER_ENV: &str = "NERV_LOG_FILTER";

/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "NERV_LOG_FORMAT";

/// Environment variable overriding the request clock timezone.
pub const TIMEZONE_ENV: &str = "NERV_TIMEZONE";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default request clock timezone.
#[must_use]
pub const fn default_timezone() -> Timezone {
    Timezone::utc()
}
