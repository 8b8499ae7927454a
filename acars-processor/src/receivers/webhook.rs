//! Generic webhook receiver

use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;

use super::{ensure_success, http_client, template, Receiver, ReceiverError};
use crate::config::WebhookConfig;
use acars_common::APMessage;

const TIMEOUT: Duration = Duration::from_secs(30);

pub struct WebhookReceiver {
    http: reqwest::Client,
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    template: String,
}

impl WebhookReceiver {
    pub fn from_config(config: &WebhookConfig) -> Result<Self, ReceiverError> {
        if config.url.trim().is_empty() {
            return Err(ReceiverError::Config("webhook url is required".to_string()));
        }
        let method = Method::from_bytes(config.method.trim().to_uppercase().as_bytes())
            .map_err(|_| ReceiverError::Config(format!("invalid webhook method {:?}", config.method)))?;
        Ok(Self {
            http: http_client(TIMEOUT)?,
            url: config.url.trim().to_string(),
            method,
            headers: config
                .headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            template: config.template.clone(),
        })
    }

    /// Rendered template, or the whole message as JSON when no template is set
    fn body(&self, message: &APMessage) -> Result<String, ReceiverError> {
        if self.template.trim().is_empty() {
            serde_json::to_string(message).map_err(|e| ReceiverError::Template(e.to_string()))
        } else {
            Ok(template::render(&self.template, message))
        }
    }
}

#[async_trait]
impl Receiver for WebhookReceiver {
    fn name(&self) -> &'static str {
        "Webhook"
    }

    async fn submit(&self, message: &APMessage) -> Result<(), ReceiverError> {
        let mut request = self.http.request(self.method.clone(), &self.url);
        if self.template.trim().is_empty() {
            request = request.header(reqwest::header::CONTENT_TYPE, "application/json");
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if self.method != Method::GET {
            request = request.body(self.body(message)?);
        }
        ensure_success(request.send().await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeaderConfig;
    use crate::receivers::test_support::sink;

    fn message() -> APMessage {
        let mut m = APMessage::new();
        m.set_alias("TailCode", "N123AB");
        m
    }

    #[tokio::test]
    async fn test_default_body_is_message_json() {
        let (url, log) = sink(200).await;
        let receiver = WebhookReceiver::from_config(&WebhookConfig {
            url: format!("{}/hook", url),
            headers: vec![HeaderConfig {
                name: "X-Token".to_string(),
                value: "abc".to_string(),
            }],
            ..Default::default()
        })
        .unwrap();

        receiver.submit(&message()).await.unwrap();

        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].path, "/hook");
        assert_eq!(seen[0].headers["x-token"], "abc");
        let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body["ACARSProcessor.TailCode"], "N123AB");
    }

    #[tokio::test]
    async fn test_template_and_method() {
        let (url, log) = sink(204).await;
        let receiver = WebhookReceiver::from_config(&WebhookConfig {
            url,
            method: "put".to_string(),
            template: "tail={{ ACARSProcessor.TailCode }}".to_string(),
            ..Default::default()
        })
        .unwrap();

        receiver.submit(&message()).await.unwrap();

        let seen = log.lock().unwrap();
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].body, "tail=N123AB");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _log) = sink(500).await;
        let receiver = WebhookReceiver::from_config(&WebhookConfig {
            url,
            ..Default::default()
        })
        .unwrap();

        let result = receiver.submit(&message()).await;
        assert!(matches!(result, Err(ReceiverError::Status { status: 500, .. })));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let result = WebhookReceiver::from_config(&WebhookConfig {
            url: "http://localhost".to_string(),
            method: "NOT A METHOD".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ReceiverError::Config(_))));
    }
}
