use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use super::sampling_params::{SamplingParams, WireSamplingParams};
use crate::{
    error::{ClientError, ClientResult},
    logprobs::{extract_prompt_logprobs, json_type_name},
};

// ============================================================================
// Request
// ============================================================================

/// One generation call as the caller describes it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub input_token_ids: Vec<u32>,
    pub sampling: SamplingParams,
    pub want_prompt_logprobs: bool,
}

impl GenerationRequest {
    pub fn new(
        input_token_ids: Vec<u32>,
        sampling: SamplingParams,
        want_prompt_logprobs: bool,
    ) -> Self {
        Self {
            input_token_ids,
            sampling,
            want_prompt_logprobs,
        }
    }

    /// Build the `/generate` payload
    pub fn to_wire(&self) -> GenerateReqInput {
        GenerateReqInput {
            input_ids: self.input_token_ids.clone(),
            sampling_params: self.sampling.resolve(),
            return_logprob: true,
            logprob_start_len: self.want_prompt_logprobs.then_some(0),
        }
    }
}

/// Body of a POST to SGLang's native `/generate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateReqInput {
    pub input_ids: Vec<u32>,
    pub sampling_params: WireSamplingParams,
    /// Always set; output token logprobs are how tokens come back
    pub return_logprob: bool,
    /// Start position in the prompt for prompt logprobs, only when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprob_start_len: Option<i32>,
}

// ============================================================================
// Result
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Stop,
    Length,
}

impl StopReason {
    /// Only the literal "stop" is distinguished; everything else is a length stop
    pub fn from_finish_reason(finish_reason: Option<&str>) -> Self {
        match finish_reason {
            Some("stop") => StopReason::Stop,
            _ => StopReason::Length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub tokens: Vec<u32>,
    /// `logprobs[i]` belongs to `tokens[i]`
    pub logprobs: Vec<f64>,
    pub text: Option<String>,
    pub stop_reason: StopReason,
    /// Present only when prompt logprobs were requested; element 0 is always `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_logprobs: Option<Vec<Option<f64>>>,
}

// ============================================================================
// Response decoding
// ============================================================================

/// Decode a success body from `/generate`.
///
/// The required fields fail loudly; `input_token_logprobs` goes through the
/// lenient path in [`crate::logprobs`].
pub fn decode_response(body: &str, want_prompt_logprobs: bool) -> ClientResult<GenerationResult> {
    let result = decode_response_inner(body, want_prompt_logprobs);
    if let Err(ClientError::ResponseFormat { field, reason, .. }) = &result {
        error!(
            field = %field,
            "Failed to parse SGLang response: {}",
            reason
        );
        error!("SGLang response: {}", body);
    }
    result
}

fn decode_response_inner(body: &str, want_prompt_logprobs: bool) -> ClientResult<GenerationResult> {
    let output: Value = serde_json::from_str(body)
        .map_err(|e| ClientError::format("$", format!("body is not valid JSON: {}", e), body))?;
    let output = output
        .as_object()
        .ok_or_else(|| type_mismatch("$", "object", &output, body))?;

    let meta_info = match output.get("meta_info") {
        Some(Value::Object(meta_info)) => meta_info,
        Some(other) => return Err(type_mismatch("meta_info", "object", other, body)),
        None => return Err(ClientError::format("meta_info", "missing", body)),
    };

    let (tokens, logprobs) = decode_output_token_logprobs(meta_info, body)?;

    let text = match output.get("text") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => return Err(type_mismatch("text", "string", other, body)),
    };

    let stop_reason =
        StopReason::from_finish_reason(output.get("finish_reason").and_then(Value::as_str));

    let prompt_logprobs = want_prompt_logprobs
        .then(|| extract_prompt_logprobs(meta_info.get("input_token_logprobs")));

    Ok(GenerationResult {
        tokens,
        logprobs,
        text,
        stop_reason,
        prompt_logprobs,
    })
}

/// Split `[[logprob, token_id(, text)], ...]` into aligned token/logprob lists
fn decode_output_token_logprobs(
    meta_info: &Map<String, Value>,
    body: &str,
) -> ClientResult<(Vec<u32>, Vec<f64>)> {
    const FIELD: &str = "meta_info.output_token_logprobs";

    let entries = match meta_info.get("output_token_logprobs") {
        Some(Value::Array(entries)) => entries,
        Some(other) => return Err(type_mismatch(FIELD, "array", other, body)),
        None => return Err(ClientError::format(FIELD, "missing", body)),
    };

    let mut tokens = Vec::with_capacity(entries.len());
    let mut logprobs = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let path = format!("{}[{}]", FIELD, i);
        let pair = entry
            .as_array()
            .ok_or_else(|| type_mismatch(&path, "array", entry, body))?;
        if !(2..=3).contains(&pair.len()) {
            return Err(ClientError::format(
                &path,
                format!("expected [logprob, token_id], got {} elements", pair.len()),
                body,
            ));
        }

        let logprob = pair[0]
            .as_f64()
            .ok_or_else(|| type_mismatch(&format!("{}[0]", path), "number", &pair[0], body))?;
        let token_id = pair[1]
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| {
                type_mismatch(&format!("{}[1]", path), "token id (u32)", &pair[1], body)
            })?;

        logprobs.push(logprob);
        tokens.push(token_id);
    }

    Ok((tokens, logprobs))
}

fn type_mismatch(field: &str, expected: &str, found: &Value, body: &str) -> ClientError {
    ClientError::format(
        field,
        format!("expected {}, found {}", expected, json_type_name(found)),
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value, want_prompt_logprobs: bool) -> ClientResult<GenerationResult> {
        decode_response(&value.to_string(), want_prompt_logprobs)
    }

    fn format_field(err: ClientError) -> String {
        match err {
            ClientError::ResponseFormat { field, .. } => field,
            other => panic!("expected ResponseFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_to_wire_without_prompt_logprobs() {
        let req = GenerationRequest::new(
            vec![1, 2, 3],
            SamplingParams::new().with_temperature(0.2).with_max_tokens(5),
            false,
        );
        let value = serde_json::to_value(req.to_wire()).unwrap();
        assert_eq!(
            value,
            json!({
                "input_ids": [1, 2, 3],
                "sampling_params": {"temperature": 0.2, "top_p": 0.9, "max_new_tokens": 5},
                "return_logprob": true
            })
        );
    }

    #[test]
    fn test_to_wire_with_prompt_logprobs() {
        let req = GenerationRequest::new(vec![4], SamplingParams::default(), true);
        let value = serde_json::to_value(req.to_wire()).unwrap();
        assert_eq!(value["logprob_start_len"], json!(0));
        assert_eq!(value["return_logprob"], json!(true));
    }

    #[test]
    fn test_to_wire_passes_empty_input_through() {
        let req = GenerationRequest::default();
        let value = serde_json::to_value(req.to_wire()).unwrap();
        assert_eq!(value["input_ids"], json!([]));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(StopReason::from_finish_reason(Some("stop")), StopReason::Stop);
        assert_eq!(StopReason::from_finish_reason(Some("length")), StopReason::Length);
        assert_eq!(StopReason::from_finish_reason(Some("abort")), StopReason::Length);
        assert_eq!(StopReason::from_finish_reason(Some("STOP")), StopReason::Length);
        assert_eq!(StopReason::from_finish_reason(None), StopReason::Length);
    }

    #[test]
    fn test_decode_basic() {
        let result = decode(
            json!({
                "text": " hello",
                "finish_reason": "stop",
                "meta_info": {"output_token_logprobs": [[-0.1, 10], [-0.2, 11]]}
            }),
            false,
        )
        .unwrap();

        assert_eq!(result.tokens, vec![10, 11]);
        assert_eq!(result.logprobs, vec![-0.1, -0.2]);
        assert_eq!(result.text.as_deref(), Some(" hello"));
        assert_eq!(result.stop_reason, StopReason::Stop);
        assert_eq!(result.prompt_logprobs, None);
    }

    #[test]
    fn test_decode_accepts_triples_and_empty_output() {
        let result = decode(
            json!({"meta_info": {"output_token_logprobs": [[-0.5, 3, "a"], [-1, 4, null]]}}),
            false,
        )
        .unwrap();
        assert_eq!(result.tokens, vec![3, 4]);
        assert_eq!(result.logprobs, vec![-0.5, -1.0]);
        assert_eq!(result.text, None);
        assert_eq!(result.stop_reason, StopReason::Length);

        let result = decode(json!({"meta_info": {"output_token_logprobs": []}}), false).unwrap();
        assert!(result.tokens.is_empty());
        assert!(result.logprobs.is_empty());
    }

    #[test]
    fn test_decode_non_string_finish_reason_is_length() {
        let result = decode(
            json!({
                "finish_reason": {"type": "stop"},
                "meta_info": {"output_token_logprobs": []}
            }),
            false,
        )
        .unwrap();
        assert_eq!(result.stop_reason, StopReason::Length);
    }

    #[test]
    fn test_decode_prompt_logprobs_only_when_requested() {
        let body = json!({
            "meta_info": {
                "output_token_logprobs": [[-0.1, 10]],
                "input_token_logprobs": [[-0.05, 1], [-0.3, 2]]
            }
        });
        let result = decode(body.clone(), false).unwrap();
        assert_eq!(result.prompt_logprobs, None);

        let result = decode(body, true).unwrap();
        assert_eq!(
            result.prompt_logprobs,
            Some(vec![None, Some(-0.05), Some(-0.3)])
        );
    }

    #[test]
    fn test_decode_prompt_logprobs_missing_is_prefix_only() {
        let result = decode(json!({"meta_info": {"output_token_logprobs": []}}), true).unwrap();
        assert_eq!(result.prompt_logprobs, Some(vec![None]));
    }

    #[test]
    fn test_decode_missing_output_token_logprobs() {
        let err = decode(json!({"text": "x", "meta_info": {}}), false).unwrap_err();
        assert_eq!(format_field(err), "meta_info.output_token_logprobs");
    }

    #[test]
    fn test_decode_null_output_token_logprobs() {
        let err = decode(
            json!({"meta_info": {"output_token_logprobs": null}}),
            false,
        )
        .unwrap_err();
        assert_eq!(format_field(err), "meta_info.output_token_logprobs");
    }

    #[test]
    fn test_decode_missing_meta_info() {
        let err = decode(json!({"text": "x"}), false).unwrap_err();
        assert_eq!(format_field(err), "meta_info");
    }

    #[test]
    fn test_decode_wrong_arity() {
        let err = decode(
            json!({"meta_info": {"output_token_logprobs": [[-0.1, 10], [-0.2]]}}),
            false,
        )
        .unwrap_err();
        assert_eq!(format_field(err), "meta_info.output_token_logprobs[1]");
    }

    #[test]
    fn test_decode_non_numeric_logprob() {
        let err = decode(
            json!({"meta_info": {"output_token_logprobs": [["x", 10]]}}),
            false,
        )
        .unwrap_err();
        assert_eq!(format_field(err), "meta_info.output_token_logprobs[0][0]");

        let err = decode(
            json!({"meta_info": {"output_token_logprobs": [[null, 10]]}}),
            false,
        )
        .unwrap_err();
        assert_eq!(format_field(err), "meta_info.output_token_logprobs[0][0]");
    }

    #[test]
    fn test_decode_bad_token_id() {
        for bad in [json!(-1), json!(1.5), json!("10"), json!(u64::MAX)] {
            let err = decode(
                json!({"meta_info": {"output_token_logprobs": [[-0.1, bad]]}}),
                false,
            )
            .unwrap_err();
            assert_eq!(format_field(err), "meta_info.output_token_logprobs[0][1]");
        }
    }

    #[test]
    fn test_decode_bad_text_type() {
        let err = decode(
            json!({"text": 5, "meta_info": {"output_token_logprobs": []}}),
            false,
        )
        .unwrap_err();
        assert_eq!(format_field(err), "text");
    }

    #[test]
    fn test_decode_invalid_json_keeps_raw() {
        let err = decode_response("<html>oops</html>", false).unwrap_err();
        match err {
            ClientError::ResponseFormat { field, raw, .. } => {
                assert_eq!(field, "$");
                assert_eq!(raw, "<html>oops</html>");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = decode_response("[1, 2]", false).unwrap_err();
        assert_eq!(format_field(err), "$");
    }

    #[test]
    fn test_result_serialization() {
        let result = GenerationResult {
            tokens: vec![1],
            logprobs: vec![-0.5],
            text: None,
            stop_reason: StopReason::Stop,
            prompt_logprobs: Some(vec![None, Some(-1.0)]),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["stop_reason"], json!("stop"));
        assert_eq!(value["prompt_logprobs"], json!([null, -1.0]));
    }
}
