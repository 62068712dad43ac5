//! Result collection and response formatting.
//!
//! Results are shaped by count: nothing yields no payload, a single result is
//! returned bare and several results are returned as the ordered mapping of
//! canonical path to value. An error wraps whatever was collected as
//! `{code, message, data}`.

use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::state::RequestState;

/// Output encoding requested through the `ret` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReturnFormat {
    /// JSON document.
    #[default]
    Json,
    /// Plain text: strings are emitted raw, anything else as JSON.
    Text,
}

impl ReturnFormat {
    /// Resolves a requested tag, falling back to JSON for unknown tags.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        tag.trim().parse().unwrap_or_default()
    }

    /// Content type announced for the format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

/// Shapes the results and error of `state` into the response payload.
///
/// Returns `None` when there is nothing to report.
#[must_use]
pub fn collect(state: &RequestState) -> Option<Value> {
    let data = shape(state.results());
    let Some(error) = state.error() else {
        return data;
    };

    let mut payload = Map::new();
    payload.insert("code".to_owned(), Value::from(error.code));
    payload.insert("message".to_owned(), Value::String(error.message.clone()));
    payload.insert(
        "data".to_owned(),
        data.unwrap_or_else(|| Value::String(String::new())),
    );
    Some(Value::Object(payload))
}

fn shape(results: &Map<String, Value>) -> Option<Value> {
    let mut values = results.values();
    match (values.next(), values.next()) {
        (None, _) => None,
        (Some(single), None) => Some(single.clone()),
        (Some(_), Some(_)) => Some(Value::Object(results.clone())),
    }
}

/// Renders a collected payload.
///
/// `pretty` switches JSON output to the indented form.
#[must_use]
pub fn render(payload: Option<&Value>, format: ReturnFormat, pretty: bool) -> String {
    match (payload, format) {
        (None, _) => String::new(),
        (Some(Value::String(text)), ReturnFormat::Text) => text.clone(),
        (Some(value), _) if pretty => format!("{value:#}"),
        (Some(value), _) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::state::{ErrorPayload, ExecutionMode};

    fn state_with_results(results: &[(&str, Value)]) -> RequestState {
        let mut state = RequestState::new(ExecutionMode::Cgi);
        for (key, value) in results {
            state.record_result(*key, value.clone());
        }
        state
    }

    #[test]
    fn nothing_collected_renders_empty() {
        let state = state_with_results(&[]);
        assert_eq!(collect(&state), None);
        assert_eq!(render(None, ReturnFormat::Json, false), "");
    }

    #[test]
    fn single_result_is_bare() {
        let state = state_with_results(&[("a/B/c", json!(10))]);
        assert_eq!(collect(&state), Some(json!(10)));
    }

    #[test]
    fn several_results_keep_insertion_order() {
        let state = state_with_results(&[("a/B/d", json!(2)), ("a/B/c", json!(1))]);
        let rendered = render(collect(&state).as_ref(), ReturnFormat::Json, false);
        assert_eq!(rendered, r#"{"a/B/d":2,"a/B/c":1}"#);
    }

    #[test]
    fn error_wraps_collected_data() {
        let mut state = state_with_results(&[("a/B/d", json!(2))]);
        state.record_error(ErrorPayload::new(400, "bad x"));
        let rendered = render(collect(&state).as_ref(), ReturnFormat::Json, false);
        assert_eq!(rendered, r#"{"code":400,"message":"bad x","data":2}"#);
    }

    #[test]
    fn error_without_results_carries_empty_data() {
        let mut state = state_with_results(&[]);
        state.record_error(ErrorPayload::new(404, "nothing"));
        assert_eq!(
            collect(&state),
            Some(json!({"code": 404, "message": "nothing", "data": ""}))
        );
    }

    #[rstest]
    #[case("json", ReturnFormat::Json)]
    #[case("TEXT", ReturnFormat::Text)]
    #[case(" text ", ReturnFormat::Text)]
    #[case("xml", ReturnFormat::Json)]
    #[case("", ReturnFormat::Json)]
    fn unknown_tags_fall_back_to_json(#[case] tag: &str, #[case] expected: ReturnFormat) {
        assert_eq!(ReturnFormat::from_tag(tag), expected);
    }

    #[rstest]
    #[case(json!("hello"), ReturnFormat::Text, false, "hello")]
    #[case(json!("hello"), ReturnFormat::Json, false, "\"hello\"")]
    #[case(json!({"a": 1}), ReturnFormat::Text, false, r#"{"a":1}"#)]
    #[case(json!({"a": 1}), ReturnFormat::Json, true, "{\n  \"a\": 1\n}")]
    fn renders_by_format(
        #[case] value: Value,
        #[case] format: ReturnFormat,
        #[case] pretty: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(render(Some(&value), format, pretty), expected);
    }
}
