//! Language-model filters (Ollama and OpenAI)
//!
//! The system prompt is `prefix + criteria + suffix`; the model answers with
//! `{"verdict": bool, "reasoning": string}` where `verdict = true` keeps the
//! message. Blank text never reaches the model and never vetoes.
//!
//! When retries are exhausted the filter returns [`FilterError::Call`]; the
//! step's `filter_on_failure` then decides (the message passes exactly when
//! `filter_on_failure` is false).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{message_text, Filter, FilterError, FilterVerdict};
use crate::clients::{OllamaClient, OpenAiClient};
use crate::config::{OllamaFilterConfig, OpenAiFilterConfig};
use crate::harness::{call_with_retry, parse_last_json_object, RetryPolicy};
use crate::params;
use acars_common::db::{AiDecision, MessageStore};
use acars_common::{APMessage, Error};

pub const DEFAULT_SYSTEM_PROMPT_PREFIX: &str = "You screen aviation ACARS messages for a radio \
hobbyist. Decide whether the message provided by the user matches the following criteria: ";

pub const DEFAULT_SYSTEM_PROMPT_SUFFIX: &str = " Answer only with a JSON object of the form \
{\"verdict\": true, \"reasoning\": \"...\"}. Set verdict to true when the message matches the \
criteria and false otherwise, and keep the reasoning to one sentence.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AiVerdict {
    pub verdict: bool,
    #[serde(default)]
    pub reasoning: String,
}

/// JSON schema for [`AiVerdict`]
pub fn verdict_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "verdict": { "type": "boolean" },
            "reasoning": { "type": "string" }
        },
        "required": ["verdict", "reasoning"],
        "additionalProperties": false
    })
}

pub fn build_system_prompt(prefix: Option<&str>, criteria: &str, suffix: Option<&str>) -> String {
    format!(
        "{}{}{}",
        prefix.unwrap_or(DEFAULT_SYSTEM_PROMPT_PREFIX),
        criteria.trim(),
        suffix.unwrap_or(DEFAULT_SYSTEM_PROMPT_SUFFIX)
    )
}

fn verdict_to_filter(provider: &str, verdict: &AiVerdict) -> FilterVerdict {
    if verdict.verdict {
        FilterVerdict::pass()
    } else {
        FilterVerdict::veto(format!("{}: {}", provider, verdict.reasoning))
    }
}

/// Append the decision; a failed write is logged and does not change the verdict
async fn record_decision(store: Option<&MessageStore>, decision: AiDecision) {
    if let Some(store) = store {
        if let Err(e) = store.record_ai_decision(&decision).await {
            warn!(error = %e, "Failed to record AI filter decision");
        }
    }
}

pub struct OllamaFilter {
    client: OllamaClient,
    system_prompt: String,
    criteria: String,
    policy: RetryPolicy,
    store: Option<MessageStore>,
}

impl OllamaFilter {
    pub fn from_config(config: &OllamaFilterConfig, store: Option<MessageStore>) -> Result<Self, Error> {
        Ok(Self::new(
            OllamaClient::new(&config.url, &config.model)?,
            build_system_prompt(
                config.system_prompt_prefix.as_deref(),
                &config.user_prompt,
                config.system_prompt_suffix.as_deref(),
            ),
            config.user_prompt.clone(),
            params::retry_policy(&config.overrides),
            store,
        ))
    }

    pub fn new(
        client: OllamaClient,
        system_prompt: String,
        criteria: String,
        policy: RetryPolicy,
        store: Option<MessageStore>,
    ) -> Self {
        Self {
            client,
            system_prompt,
            criteria,
            policy,
            store,
        }
    }
}

#[async_trait]
impl Filter for OllamaFilter {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn evaluate(&self, message: &APMessage) -> Result<FilterVerdict, FilterError> {
        let text = message_text(message).unwrap_or_default();
        if text.trim().is_empty() {
            debug!("Skipping Ollama filter for blank message text");
            return Ok(FilterVerdict::pass());
        }

        let schema = &verdict_schema();
        let (client, system, input) = (&self.client, self.system_prompt.as_str(), text.as_str());
        let verdict: AiVerdict = call_with_retry("ollama filter", &self.policy, || async move {
            let raw = client.generate(system, input, schema).await?;
            parse_last_json_object::<AiVerdict>(&raw)
        })
        .await?;

        record_decision(
            self.store.as_ref(),
            AiDecision {
                created_at: acars_common::time::now(),
                model: self.client.model().to_string(),
                system_prompt: self.system_prompt.clone(),
                user_prompt: self.criteria.clone(),
                input_text: text,
                verdict: verdict.verdict,
                reasoning: verdict.reasoning.clone(),
            },
        )
        .await;

        Ok(verdict_to_filter("Ollama", &verdict))
    }
}

pub struct OpenAiFilter {
    client: OpenAiClient,
    system_prompt: String,
    criteria: String,
    policy: RetryPolicy,
    store: Option<MessageStore>,
}

impl OpenAiFilter {
    pub fn from_config(config: &OpenAiFilterConfig, store: Option<MessageStore>) -> Result<Self, Error> {
        Ok(Self {
            client: OpenAiClient::new(&config.base_url, &config.api_key, &config.model)?,
            system_prompt: build_system_prompt(
                config.system_prompt_prefix.as_deref(),
                &config.user_prompt,
                config.system_prompt_suffix.as_deref(),
            ),
            criteria: config.user_prompt.clone(),
            policy: params::retry_policy(&config.overrides),
            store,
        })
    }
}

#[async_trait]
impl Filter for OpenAiFilter {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn evaluate(&self, message: &APMessage) -> Result<FilterVerdict, FilterError> {
        let text = message_text(message).unwrap_or_default();
        if text.trim().is_empty() {
            debug!("Skipping OpenAI filter for blank message text");
            return Ok(FilterVerdict::pass());
        }

        let schema = &verdict_schema();
        let (client, system, input) = (&self.client, self.system_prompt.as_str(), text.as_str());
        let verdict: AiVerdict = call_with_retry("openai filter", &self.policy, || async move {
            let raw = client.complete(system, input, "filter_verdict", schema).await?;
            parse_last_json_object::<AiVerdict>(&raw)
        })
        .await?;

        record_decision(
            self.store.as_ref(),
            AiDecision {
                created_at: acars_common::time::now(),
                model: self.client.model().to_string(),
                system_prompt: self.system_prompt.clone(),
                user_prompt: self.criteria.clone(),
                input_text: text,
                verdict: verdict.verdict,
                reasoning: verdict.reasoning.clone(),
            },
        )
        .await;

        Ok(verdict_to_filter("OpenAI", &verdict))
    }
}
