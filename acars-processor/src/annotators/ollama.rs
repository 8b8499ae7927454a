//! Ollama text annotator
//!
//! Asks the model whether the message is a question and for a cleaned-up
//! rendition of the free text (expanded abbreviations, fixed spacing).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Annotator, AnnotatorError};
use crate::clients::OllamaClient;
use crate::config::OllamaAnnotatorConfig;
use crate::harness::{call_with_retry, parse_last_json_object, RetryPolicy};
use crate::params;
use acars_common::{APMessage, AcarsMessage, MessageRecord, Vdlm2Message};

const FIELDS: &[&str] = &["ollamaQuestion", "ollamaEditActions", "ollamaProcessedText"];

pub const DEFAULT_SYSTEM_PROMPT_PREFIX: &str = "You read aviation ACARS messages. Decide whether \
the message provided by the user asks a question, then rewrite it as plain English: expand \
abbreviations, fix spacing and keep every fact. Additional instructions: ";

pub const DEFAULT_SYSTEM_PROMPT_SUFFIX: &str = " Answer only with a JSON object of the form \
{\"question\": true, \"edit_actions\": \"...\", \"processed_text\": \"...\"} where edit_actions \
briefly lists what you changed.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextAnalysis {
    pub question: bool,
    #[serde(default)]
    pub edit_actions: String,
    pub processed_text: String,
}

pub fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "question": { "type": "boolean" },
            "edit_actions": { "type": "string" },
            "processed_text": { "type": "string" }
        },
        "required": ["question", "edit_actions", "processed_text"]
    })
}

pub struct OllamaAnnotator {
    client: OllamaClient,
    system_prompt: String,
    filter_with_question: bool,
    policy: RetryPolicy,
}

impl OllamaAnnotator {
    pub fn from_config(config: &OllamaAnnotatorConfig) -> Result<Self, AnnotatorError> {
        let client = OllamaClient::new(&config.url, &config.model)
            .map_err(|e| AnnotatorError::Config(e.to_string()))?;
        Ok(Self::new(
            client,
            format!(
                "{}{}{}",
                config
                    .system_prompt_prefix
                    .as_deref()
                    .unwrap_or(DEFAULT_SYSTEM_PROMPT_PREFIX),
                config.user_prompt.trim(),
                config
                    .system_prompt_suffix
                    .as_deref()
                    .unwrap_or(DEFAULT_SYSTEM_PROMPT_SUFFIX)
            ),
            config.filter_with_question,
            params::retry_policy(&config.overrides),
        ))
    }

    pub fn new(client: OllamaClient, system_prompt: String, filter_with_question: bool, policy: RetryPolicy) -> Self {
        Self {
            client,
            system_prompt,
            filter_with_question,
            policy,
        }
    }

    async fn annotate_text(&self, text: String) -> Result<APMessage, AnnotatorError> {
        if text.trim().is_empty() {
            return Ok(APMessage::new());
        }

        let schema = &analysis_schema();
        let (client, system, input) = (&self.client, self.system_prompt.as_str(), text.as_str());
        let analysis: TextAnalysis = call_with_retry("ollama annotator", &self.policy, || async move {
            let raw = client.generate(system, input, schema).await?;
            parse_last_json_object::<TextAnalysis>(&raw)
        })
        .await?;

        if self.filter_with_question && !analysis.question {
            return Ok(APMessage::new());
        }

        let mut out = APMessage::new();
        out.insert("ollamaQuestion", analysis.question);
        out.insert("ollamaEditActions", analysis.edit_actions);
        out.insert("ollamaProcessedText", analysis.processed_text);
        Ok(out)
    }
}

#[async_trait]
impl Annotator for OllamaAnnotator {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    fn default_fields(&self) -> Vec<String> {
        FIELDS.iter().map(|f| f.to_string()).collect()
    }

    async fn annotate_acars(&self, message: &AcarsMessage) -> Result<APMessage, AnnotatorError> {
        self.annotate_text(message.message_text()).await
    }

    async fn annotate_vdlm2(&self, message: &Vdlm2Message) -> Result<APMessage, AnnotatorError> {
        self.annotate_text(message.message_text()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::time::Duration;

    async fn serve(question: bool) -> String {
        let router = Router::new().route(
            "/api/generate",
            post(move || async move {
                let answer = json!({
                    "question": question,
                    "edit_actions": "expanded WX",
                    "processed_text": "Can we get the weather?"
                });
                Json(json!({ "response": answer.to_string() }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn annotator(url: &str, filter_with_question: bool) -> OllamaAnnotator {
        OllamaAnnotator::new(
            OllamaClient::new(url, "test-model").unwrap(),
            "prompt".to_string(),
            filter_with_question,
            RetryPolicy::once(Duration::from_secs(2)),
        )
    }

    fn message(text: &str) -> AcarsMessage {
        AcarsMessage {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_emits_analysis_fields() {
        let url = serve(true).await;
        let out = annotator(&url, false).annotate_acars(&message("CAN WE GET WX?")).await.unwrap();
        assert!(out.get_as_bool("ollamaQuestion"));
        assert_eq!(out.get_as_string("ollamaProcessedText"), "Can we get the weather?");
    }

    #[tokio::test]
    async fn test_filter_with_question_drops_statements() {
        let url = serve(false).await;
        let out = annotator(&url, true).annotate_acars(&message("WX OK")).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_blank_text_skips_model() {
        let out = annotator("http://127.0.0.1:9", false)
            .annotate_acars(&message(""))
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
