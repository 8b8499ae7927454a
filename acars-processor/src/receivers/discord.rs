//! Discord webhook receiver
//!
//! Posts one embed whose description lists every non-empty field as a
//! `**key**: value` line, sorted by key.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ensure_success, http_client, Receiver, ReceiverError};
use crate::config::DiscordConfig;
use acars_common::APMessage;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Discord rejects embed descriptions longer than this
pub const MAX_DESCRIPTION_CHARS: usize = 4096;

static TEXT_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r".*Text").expect("static regex is valid"));

pub struct DiscordReceiver {
    http: reqwest::Client,
    url: String,
    required_fields: Vec<String>,
    format_text: bool,
}

impl DiscordReceiver {
    pub fn from_config(config: &DiscordConfig) -> Result<Self, ReceiverError> {
        if config.url.trim().is_empty() {
            return Err(ReceiverError::Config("discord url is required".to_string()));
        }
        Ok(Self {
            http: http_client(TIMEOUT)?,
            url: config.url.trim().to_string(),
            required_fields: config.required_fields.clone(),
            format_text: config.format_text,
        })
    }

    pub fn render_description(&self, message: &APMessage) -> String {
        let mut lines = Vec::new();
        for (key, value) in message.iter() {
            let rendered = value.to_string();
            if rendered.is_empty() {
                continue;
            }
            if self.format_text && TEXT_KEY.is_match(key) {
                lines.push(format!("**{}**: ```{}```", key, rendered));
            } else {
                lines.push(format!("**{}**: {}", key, rendered));
            }
        }

        let description = lines.join("\n");
        if description.chars().count() <= MAX_DESCRIPTION_CHARS {
            description
        } else {
            let mut cut: String = description.chars().take(MAX_DESCRIPTION_CHARS - 1).collect();
            cut.push('…');
            cut
        }
    }

    fn missing_required(&self, message: &APMessage) -> Option<&str> {
        self.required_fields
            .iter()
            .find(|field| message.get_present(field).is_none())
            .map(String::as_str)
    }
}

#[async_trait]
impl Receiver for DiscordReceiver {
    fn name(&self) -> &'static str {
        "Discord"
    }

    async fn submit(&self, message: &APMessage) -> Result<(), ReceiverError> {
        if let Some(field) = self.missing_required(message) {
            debug!(field, "Skipping Discord delivery: required field missing");
            return Ok(());
        }

        let title = match message.alias("MessageType") {
            Some(kind) if !kind.is_null() => format!("{} message", kind),
            _ => "Message".to_string(),
        };
        let body = json!({
            "embeds": [{
                "title": title,
                "description": self.render_description(message),
            }]
        });

        let response = self.http.post(&self.url).json(&body).send().await?;
        ensure_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receivers::test_support::sink;
    use acars_common::Value;

    fn message() -> APMessage {
        let mut m = APMessage::new();
        m.set_alias("MessageType", "ACARS");
        m.set_alias("TailCode", "N123AB");
        m.set_alias("MessageText", "HELLO");
        m.set_alias("FlightNumber", Value::Null);
        m
    }

    fn receiver(url: String, required: Vec<&str>, format_text: bool) -> DiscordReceiver {
        DiscordReceiver::from_config(&DiscordConfig {
            url,
            required_fields: required.into_iter().map(String::from).collect(),
            format_text,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_description_sorted_and_skips_empty() {
        let r = receiver("http://localhost".to_string(), vec![], false);
        let description = r.render_description(&message());
        assert_eq!(
            description,
            "**ACARSProcessor.MessageText**: HELLO\n\
             **ACARSProcessor.MessageType**: ACARS\n\
             **ACARSProcessor.TailCode**: N123AB"
        );
    }

    #[test]
    fn test_format_text_wraps_text_keys() {
        let r = receiver("http://localhost".to_string(), vec![], true);
        let description = r.render_description(&message());
        assert!(description.contains("**ACARSProcessor.MessageText**: ```HELLO```"));
        assert!(description.contains("**ACARSProcessor.TailCode**: N123AB"));
    }

    #[test]
    fn test_description_truncated() {
        let mut m = APMessage::new();
        m.insert("long", "x".repeat(5000));
        let r = receiver("http://localhost".to_string(), vec![], false);
        assert_eq!(r.render_description(&m).chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[tokio::test]
    async fn test_posts_single_embed() {
        let (url, log) = sink(204).await;
        receiver(url, vec!["ACARSProcessor.TailCode"], false)
            .submit(&message())
            .await
            .unwrap();

        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body["embeds"].as_array().unwrap().len(), 1);
        assert_eq!(body["embeds"][0]["title"], "ACARS message");
        assert!(body["embeds"][0]["description"]
            .as_str()
            .unwrap()
            .contains("**ACARSProcessor.TailCode**: N123AB"));
    }

    #[tokio::test]
    async fn test_missing_required_field_skips_delivery() {
        let (url, log) = sink(204).await;
        receiver(url, vec!["ACARSProcessor.FlightNumber"], false)
            .submit(&message())
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }
}
