// These modules are shared between integration test binaries
#![allow(dead_code)]

pub mod mock_sglang;

use serde_json::{json, Value};

/// A well-formed `/generate` reply
pub fn generate_response(output: &[(f64, u32)], finish_reason: &str) -> Value {
    json!({
        "text": "generated",
        "finish_reason": finish_reason,
        "meta_info": {
            "prompt_tokens": 3,
            "completion_tokens": output.len(),
            "output_token_logprobs": output
                .iter()
                .map(|(logprob, token_id)| json!([logprob, token_id]))
                .collect::<Vec<_>>(),
        }
    })
}
