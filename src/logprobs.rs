//! Prompt logprob normalization
//!
//! SGLang's `input_token_logprobs` has shipped in more than one shape over time:
//! some versions already put a `null` in front for the first prompt token,
//! others do not, and individual entries may be `null`, a bare number, or a
//! record such as `[logprob, token_id, text]`. The two functions here turn any
//! of those into one flat list whose first element is always `None`.

use serde_json::Value;
use tracing::{debug, warn};

/// Flatten raw entries into one `Option<f64>` per entry.
///
/// Records keep only their first element. Anything that does not coerce to a
/// float becomes `None`.
pub fn normalize(entries: &[Value]) -> Vec<Option<f64>> {
    entries.iter().map(normalize_entry).collect()
}

fn normalize_entry(entry: &Value) -> Option<f64> {
    match entry {
        Value::Null => None,
        Value::Array(record) => record.first().and_then(coerce_f64),
        other => coerce_f64(other),
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| !v.is_nan())
}

/// Make sure the list starts with exactly one `None` for the first prompt token.
///
/// A list that already starts with `None` is returned unchanged; otherwise one
/// `None` is prepended. An empty list becomes `[None]`.
pub fn ensure_prefixed(mut normalized: Vec<Option<f64>>) -> Vec<Option<f64>> {
    if matches!(normalized.first(), Some(None)) {
        debug!("input_token_logprobs already has a leading null");
        normalized
    } else {
        debug!("Prepending null to input_token_logprobs");
        normalized.insert(0, None);
        normalized
    }
}

/// Read `meta_info.input_token_logprobs` leniently and return the prefixed list.
///
/// A missing or `null` field counts as empty. A field of any other non-list
/// type is logged and also treated as empty.
pub fn extract_prompt_logprobs(raw: Option<&Value>) -> Vec<Option<f64>> {
    let entries: &[Value] = match raw {
        None | Some(Value::Null) => &[],
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!(
                "Ignoring input_token_logprobs of unexpected type: {}",
                json_type_name(other)
            );
            &[]
        }
    };
    ensure_prefixed(normalize(entries))
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
