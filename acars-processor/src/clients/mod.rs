//! HTTP clients for the language-model providers

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use acars_common::Error;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("acars-processor/", env!("CARGO_PKG_VERSION"));

/// Shared reqwest client builder
///
/// `timeout` is a transport-level ceiling; call sites still bound each
/// attempt through the retry harness.
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))
}

/// Strip trailing slashes so paths can be appended with `format!`
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
