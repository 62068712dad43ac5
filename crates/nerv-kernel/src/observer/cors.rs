//! Cross-origin admission for CGI requests.

use nerv_config::Config;

use crate::io::Request;

/// Outcome of the cross-origin check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    /// Same-origin request or one without an `Origin` header.
    Pass,
    /// Admitted cross-origin request.
    Allow {
        /// Response headers granting access.
        headers: Vec<(String, String)>,
        /// Whether the request is a preflight answered by headers alone.
        preflight: bool,
    },
    /// Rejected cross-origin request.
    Deny {
        /// Origin that was refused.
        origin: String,
    },
}

/// Decides whether `request` may proceed under the configured CORS table.
///
/// A cross-origin caller must match an entry by origin or through the `*`
/// wildcard; with no matching entry, including an empty table, it is denied.
#[must_use]
pub fn check(config: &Config, request: &Request) -> CorsDecision {
    let Some(origin) = request.origin.as_deref() else {
        return CorsDecision::Pass;
    };
    if is_same_origin(origin, request) {
        return CorsDecision::Pass;
    }

    match config.cors_headers(origin) {
        Some(allowed) => CorsDecision::Allow {
            headers: vec![
                ("Access-Control-Allow-Origin".to_owned(), origin.to_owned()),
                ("Access-Control-Allow-Headers".to_owned(), allowed.to_owned()),
                ("Access-Control-Allow-Credentials".to_owned(), "true".to_owned()),
            ],
            preflight: request.method.eq_ignore_ascii_case("OPTIONS"),
        },
        None => CorsDecision::Deny {
            origin: origin.to_owned(),
        },
    }
}

fn is_same_origin(origin: &str, request: &Request) -> bool {
    let scheme = if request.https { "https" } else { "http" };
    request
        .host
        .as_deref()
        .is_some_and(|host| origin == format!("{scheme}://{host}"))
}
