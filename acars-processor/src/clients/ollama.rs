//! Ollama `/api/generate` client

use serde::{Deserialize, Serialize};

use super::{build_http_client, trim_base_url};
use crate::harness::{check_status, CallError};
use acars_common::Error;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    /// JSON schema the model output must follow
    format: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, Error> {
        if base_url.trim().is_empty() {
            return Err(Error::Config("ollama url is required".to_string()));
        }
        if model.trim().is_empty() {
            return Err(Error::Config("ollama model is required".to_string()));
        }
        Ok(Self {
            http: build_http_client(None)?,
            base_url: trim_base_url(base_url),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single non-streaming generation; returns the raw model text
    pub async fn generate(
        &self,
        system: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, CallError> {
        let request = GenerateRequest {
            model: &self.model,
            system,
            prompt,
            stream: false,
            format: schema,
        };

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}
