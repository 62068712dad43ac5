//! Request intake for CGI and command-line invocations.
//!
//! CGI requests are read from the gateway environment and the request body;
//! command-line requests are assembled from parsed arguments. Either way the
//! result is a [`Request`] the kernel can serve. Input that cannot be decoded
//! does not abort intake: the request carries the [`InputError`] and the
//! kernel reports it as a bad request.

use std::io::{self, Read};
use std::net::IpAddr;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::state::ExecutionMode;

/// Environment variable whose presence marks a CGI invocation.
pub const GATEWAY_INTERFACE: &str = "GATEWAY_INTERFACE";

/// Headers consulted, in order, for the client address.
const CLIENT_IP_CHAIN: &[&str] = &[
    "HTTP_CLIENT_IP",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_FORWARDED",
    "HTTP_FORWARDED_FOR",
    "HTTP_FORWARDED",
    "REMOTE_ADDR",
];

/// Errors raised while decoding request input.
#[derive(Debug, Clone, Error)]
pub enum InputError {
    /// The request body could not be read.
    #[error("failed to read request body: {0}")]
    Read(#[source] Arc<io::Error>),
    /// The JSON input is malformed.
    #[error("malformed JSON input: {0}")]
    Json(#[source] Arc<serde_json::Error>),
    /// The JSON input is valid but not an object.
    #[error("JSON input must be an object")]
    NotAnObject,
}

/// Detects the execution mode from the process environment.
#[must_use]
pub fn detect_mode(env: impl Fn(&str) -> Option<String>) -> ExecutionMode {
    if env(GATEWAY_INTERFACE).is_some() {
        ExecutionMode::Cgi
    } else {
        ExecutionMode::Cli
    }
}

/// A request ready to be served by the kernel.
#[derive(Debug, Clone)]
pub struct Request {
    mode: ExecutionMode,
    /// Command taken from the URL path or the command-line flag.
    pub command: String,
    /// Return format taken from the command-line flag.
    pub ret: Option<String>,
    /// Decoded parameters, including control keys.
    pub params: Map<String, Value>,
    /// `Origin` header.
    pub origin: Option<String>,
    /// `Host` header.
    pub host: Option<String>,
    /// Whether the request arrived over TLS.
    pub https: bool,
    /// HTTP method.
    pub method: String,
    /// Client address resolved from the forwarding chain.
    pub client_ip: Option<String>,
    /// Arguments forwarded to trusted programs.
    pub argv: Vec<String>,
    /// Piped input forwarded to trusted programs.
    pub pipe: Option<Vec<u8>>,
    /// Input that could not be decoded.
    pub rejected: Option<InputError>,
}

impl Request {
    /// Creates an empty CGI `GET` request for `command`.
    #[must_use]
    pub fn cgi(command: impl Into<String>) -> Self {
        Self::new(ExecutionMode::Cgi, command)
    }

    /// Creates an empty command-line request for `command`.
    #[must_use]
    pub fn cli(command: impl Into<String>) -> Self {
        Self::new(ExecutionMode::Cli, command)
    }

    fn new(mode: ExecutionMode, command: impl Into<String>) -> Self {
        Self {
            mode,
            command: command.into(),
            ret: None,
            params: Map::new(),
            origin: None,
            host: None,
            https: false,
            method: String::from("GET"),
            client_ip: None,
            argv: Vec::new(),
            pipe: None,
            rejected: None,
        }
    }

    /// Execution mode of the request.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Sets the `Origin` and `Host` headers.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>, host: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self.host = Some(host.into());
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Reads a CGI request from the gateway environment and `body`.
    #[must_use]
    pub fn from_cgi_env(env: impl Fn(&str) -> Option<String>, body: impl Read) -> Self {
        let command = env("PATH_INFO")
            .map(|path| path.trim_start_matches('/').to_owned())
            .unwrap_or_default();
        let mut request = Self::cgi(command);
        request.origin = env("HTTP_ORIGIN").filter(|origin| !origin.is_empty());
        request.host = env("HTTP_HOST");
        request.https = env("HTTPS")
            .is_some_and(|flag| !flag.is_empty() && !flag.eq_ignore_ascii_case("off"));
        if let Some(method) = env("REQUEST_METHOD") {
            request.method = method.to_ascii_uppercase();
        }
        request.client_ip = client_ip(&env);

        if let Some(query) = env("QUERY_STRING") {
            request.params.extend(parse_query(&query));
        }

        let length = env("CONTENT_LENGTH")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);
        if length > 0 {
            let content_type = env("CONTENT_TYPE").unwrap_or_default();
            match read_body(body, length, &content_type) {
                Ok(entries) => request.params.extend(entries),
                Err(error) => request.rejected = Some(error),
            }
        }
        request
    }
}

/// Decodes command-line `--data`: a JSON object or a query string.
///
/// # Errors
///
/// Returns an [`InputError`] for malformed JSON or JSON that is not an
/// object.
pub fn parse_data_arg(raw: &str) -> Result<Map<String, Value>, InputError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        parse_json_object(trimmed.as_bytes())
    } else {
        Ok(parse_query(raw))
    }
}

fn read_body(body: impl Read, length: u64, content_type: &str) -> Result<Map<String, Value>, InputError> {
    let mut bytes = Vec::new();
    body.take(length)
        .read_to_end(&mut bytes)
        .map_err(|error| InputError::Read(Arc::new(error)))?;

    if content_type
        .to_ascii_lowercase()
        .starts_with("application/json")
    {
        parse_json_object(&bytes)
    } else {
        Ok(parse_query(&String::from_utf8_lossy(&bytes)))
    }
}

fn parse_json_object(bytes: &[u8]) -> Result<Map<String, Value>, InputError> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(InputError::NotAnObject),
        Err(error) => Err(InputError::Json(Arc::new(error))),
    }
}

fn parse_query(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect()
}

fn client_ip(env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    CLIENT_IP_CHAIN.iter().copied().find_map(|key| {
        env(key)?
            .split(',')
            .find_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
            .map(|ip| ip.to_string())
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn detects_mode_from_gateway_interface() {
        assert_eq!(detect_mode(env_of(&[("GATEWAY_INTERFACE", "CGI/1.1")])), ExecutionMode::Cgi);
        assert_eq!(detect_mode(env_of(&[])), ExecutionMode::Cli);
    }

    #[test]
    fn merges_query_then_body() {
        let body = br#"{"x": 5, "y": [1]}"#;
        let env = env_of(&[
            ("PATH_INFO", "/a/B/c"),
            ("QUERY_STRING", "x=1&r=text"),
            ("REQUEST_METHOD", "post"),
            ("CONTENT_TYPE", "application/json"),
            ("CONTENT_LENGTH", body.len().to_string().as_str()),
        ]);
        let request = Request::from_cgi_env(env, &body[..]);
        assert_eq!(request.command, "a/B/c");
        assert_eq!(request.method, "POST");
        assert_eq!(request.params.get("x"), Some(&json!(5)));
        assert_eq!(request.params.get("r"), Some(&json!("text")));
        assert_eq!(request.params.get("y"), Some(&json!([1])));
        assert!(request.rejected.is_none());
    }

    #[test]
    fn form_bodies_are_bounded_by_content_length() {
        let env = env_of(&[
            ("CONTENT_TYPE", "application/x-www-form-urlencoded"),
            ("CONTENT_LENGTH", "7"),
        ]);
        let request = Request::from_cgi_env(env, &b"a=1&b=2&c=3"[..]);
        let keys: Vec<_> = request.params.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[rstest]
    #[case(b"{not json".as_slice())]
    #[case(b"[1, 2]".as_slice())]
    fn rejected_json_is_carried_not_raised(#[case] body: &[u8]) {
        let length = body.len().to_string();
        let env = env_of(&[("CONTENT_TYPE", "application/json"), ("CONTENT_LENGTH", length.as_str())]);
        let request = Request::from_cgi_env(env, body);
        assert!(request.rejected.is_some());
        assert!(request.params.is_empty());
    }

    #[rstest]
    #[case(&[("HTTPS", "on")], true)]
    #[case(&[("HTTPS", "OFF")], false)]
    #[case(&[], false)]
    fn reads_tls_flag(#[case] pairs: &[(&str, &str)], #[case] expected: bool) {
        assert_eq!(Request::from_cgi_env(env_of(pairs), io::empty()).https, expected);
    }

    #[rstest]
    #[case(&[("HTTP_X_FORWARDED_FOR", "bogus, 10.0.0.7, 10.0.0.8"), ("REMOTE_ADDR", "127.0.0.1")], Some("10.0.0.7"))]
    #[case(&[("HTTP_CLIENT_IP", "nope"), ("REMOTE_ADDR", "::1")], Some("::1"))]
    #[case(&[], None)]
    fn resolves_client_ip_from_forwarding_chain(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: Option<&str>,
    ) {
        let request = Request::from_cgi_env(env_of(pairs), io::empty());
        assert_eq!(request.client_ip.as_deref(), expected);
    }

    #[rstest]
    #[case(r#"{"x": "5"}"#, json!({"x": "5"}))]
    #[case("x=5&name=a%20b", json!({"x": "5", "name": "a b"}))]
    fn decodes_data_argument(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(Value::Object(parse_data_arg(raw).expect("valid data")), expected);
    }

    #[test]
    fn data_argument_must_be_an_object() {
        assert!(matches!(parse_data_arg("[1]"), Err(InputError::NotAnObject)));
        assert!(matches!(parse_data_arg("{x"), Err(InputError::Json(_))));
    }
}
