//! Client adapter for SGLang's native `/generate` API.
//!
//! Turns token IDs plus sampling intent into a `/generate` call and returns
//! generated tokens with aligned logprobs, the stop reason, and optionally
//! normalized prompt logprobs.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod logprobs;
pub mod protocols;

pub use client::{Generator, SglangClient};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{ClientError, ClientResult, TransportErrorKind};
pub use protocols::{GenerationRequest, GenerationResult, SamplingParams, StopReason};
