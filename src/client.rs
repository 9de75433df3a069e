//! HTTP client for SGLang's native `/generate` endpoint
//!
//! Encodes a generation request, issues exactly one POST, and decodes the
//! response into tokens and aligned logprobs. No retries happen here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, warn};

use crate::{
    config::ClientConfig,
    error::{ClientError, ClientResult, TransportErrorKind},
    protocols::{decode_response, GenerationRequest, GenerationResult, SamplingParams},
};

/// Something that can turn token IDs into a generation result
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        input_ids: &[u32],
        sampling_params: &SamplingParams,
        prompt_logprobs: bool,
    ) -> ClientResult<GenerationResult>;

    /// One `generate` per input, in order, one at a time.
    ///
    /// The first failure is returned as-is and later inputs are never sent.
    async fn batch_generate(
        &self,
        input_ids_list: &[Vec<u32>],
        sampling_params: &SamplingParams,
        prompt_logprobs: bool,
    ) -> ClientResult<Vec<GenerationResult>> {
        let mut results = Vec::with_capacity(input_ids_list.len());
        for input_ids in input_ids_list {
            let result = self
                .generate(input_ids, sampling_params, prompt_logprobs)
                .await?;
            results.push(result);
        }
        Ok(results)
    }
}

/// Client for a single SGLang server
#[derive(Debug, Clone)]
pub struct SglangClient {
    client: Client,
    config: ClientConfig,
    generate_url: String,
}

impl SglangClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;

        // No idle connections are kept, so each call owns its connection and
        // releases it when the call finishes or its future is dropped.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(ClientError::Build)?;

        let generate_url = config.generate_url();
        debug!("Created SGLang client for {}", generate_url);

        Ok(Self {
            client,
            config,
            generate_url,
        })
    }

    /// Client with the default timeout
    pub fn with_base_url(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::new(ClientConfig::new(base_url))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    /// Send one generation request and decode the reply
    pub async fn generate_request(
        &self,
        request: &GenerationRequest,
    ) -> ClientResult<GenerationResult> {
        let payload = request.to_wire();
        if request.want_prompt_logprobs {
            debug!("Requesting prompt logprobs from SGLang");
        }

        let response = self
            .client
            .post(&self.generate_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    TransportErrorKind::Timeout
                } else if e.is_connect() {
                    TransportErrorKind::Connect
                } else {
                    TransportErrorKind::Request
                };
                self.transport_error(kind, &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            error!(
                status = status.as_u16(),
                url = %self.generate_url,
                "SGLang HTTP error {}: {}",
                status.as_u16(),
                body
            );
            return Err(ClientError::ServerStatus {
                endpoint: self.generate_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| {
            let kind = if e.is_timeout() {
                TransportErrorKind::Timeout
            } else {
                TransportErrorKind::Body
            };
            self.transport_error(kind, &e)
        })?;

        let result = decode_response(&body, request.want_prompt_logprobs)?;
        debug!("Generated {} tokens from SGLang", result.tokens.len());
        Ok(result)
    }

    fn transport_error(&self, kind: TransportErrorKind, err: &reqwest::Error) -> ClientError {
        if kind == TransportErrorKind::Timeout {
            warn!(
                url = %self.generate_url,
                "SGLang request timed out after {}s",
                self.config.request_timeout_secs
            );
        } else {
            error!(
                url = %self.generate_url,
                error = %err,
                "SGLang request error ({})",
                kind
            );
        }
        ClientError::transport(
            &self.generate_url,
            self.config.request_timeout_secs,
            kind,
            err,
        )
    }
}

#[async_trait]
impl Generator for SglangClient {
    async fn generate(
        &self,
        input_ids: &[u32],
        sampling_params: &SamplingParams,
        prompt_logprobs: bool,
    ) -> ClientResult<GenerationResult> {
        let request =
            GenerationRequest::new(input_ids.to_vec(), sampling_params.clone(), prompt_logprobs);
        self.generate_request(&request).await
    }
}
