//! Mastodon status receiver

use async_trait::async_trait;
use std::time::Duration;

use super::{ensure_success, http_client, template, Receiver, ReceiverError};
use crate::clients::trim_base_url;
use crate::config::MastodonConfig;
use acars_common::APMessage;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Mastodon's default status length limit
pub const MAX_STATUS_CHARS: usize = 500;

pub const DEFAULT_TEMPLATE: &str = "{{ ACARSProcessor.MessageType }} from \
{{ ACARSProcessor.TailCode }} {{ ACARSProcessor.FlightNumber }}\n\n\
{{ ACARSProcessor.MessageText }}\n\n{{ ACARSProcessor.TrackingLink }}";

const VISIBILITIES: [&str; 4] = ["public", "unlisted", "private", "direct"];

pub struct MastodonReceiver {
    http: reqwest::Client,
    statuses_url: String,
    access_token: String,
    visibility: String,
    template: String,
}

impl MastodonReceiver {
    pub fn from_config(config: &MastodonConfig) -> Result<Self, ReceiverError> {
        if config.server_url.trim().is_empty() {
            return Err(ReceiverError::Config("mastodon server_url is required".to_string()));
        }
        if config.access_token.trim().is_empty() {
            return Err(ReceiverError::Config("mastodon access_token is required".to_string()));
        }
        let visibility = config.visibility.trim().to_lowercase();
        if !VISIBILITIES.contains(&visibility.as_str()) {
            return Err(ReceiverError::Config(format!(
                "invalid mastodon visibility {:?}",
                config.visibility
            )));
        }
        Ok(Self {
            http: http_client(TIMEOUT)?,
            statuses_url: format!("{}/api/v1/statuses", trim_base_url(&config.server_url)),
            access_token: config.access_token.clone(),
            visibility,
            template: if config.template.trim().is_empty() {
                DEFAULT_TEMPLATE.to_string()
            } else {
                config.template.clone()
            },
        })
    }

    pub fn status_text(&self, message: &APMessage) -> String {
        let rendered = template::render(&self.template, message);
        let text = rendered.trim();
        if text.chars().count() <= MAX_STATUS_CHARS {
            text.to_string()
        } else {
            let mut cut: String = text.chars().take(MAX_STATUS_CHARS - 1).collect();
            cut.push('…');
            cut
        }
    }
}

#[async_trait]
impl Receiver for MastodonReceiver {
    fn name(&self) -> &'static str {
        "Mastodon"
    }

    async fn submit(&self, message: &APMessage) -> Result<(), ReceiverError> {
        let status = self.status_text(message);
        let response = self
            .http
            .post(&self.statuses_url)
            .bearer_auth(&self.access_token)
            .form(&[("status", status.as_str()), ("visibility", self.visibility.as_str())])
            .send()
            .await?;
        ensure_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receivers::test_support::sink;

    fn config(server_url: String) -> MastodonConfig {
        MastodonConfig {
            server_url,
            access_token: "token".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_posts_status_form() {
        let (url, log) = sink(200).await;
        let receiver = MastodonReceiver::from_config(&config(format!("{}/", url))).unwrap();
        let mut message = APMessage::new();
        message.set_alias("MessageType", "ACARS");
        message.set_alias("TailCode", "N123AB");
        message.set_alias("MessageText", "HELLO");

        receiver.submit(&message).await.unwrap();

        let seen = log.lock().unwrap();
        assert_eq!(seen[0].path, "/api/v1/statuses");
        assert_eq!(seen[0].headers["authorization"], "Bearer token");
        assert!(seen[0].body.contains("visibility=unlisted"));
        assert!(seen[0].body.contains("status=ACARS+from+N123AB"));
    }

    #[test]
    fn test_status_truncated() {
        let receiver = MastodonReceiver::from_config(&MastodonConfig {
            template: "{{ long }}".to_string(),
            ..config("http://localhost".to_string())
        })
        .unwrap();
        let mut message = APMessage::new();
        message.insert("long", "y".repeat(800));
        assert_eq!(receiver.status_text(&message).chars().count(), MAX_STATUS_CHARS);
    }

    #[test]
    fn test_invalid_visibility_rejected() {
        let result = MastodonReceiver::from_config(&MastodonConfig {
            visibility: "everyone".to_string(),
            ..config("http://localhost".to_string())
        });
        assert!(matches!(result, Err(ReceiverError::Config(_))));
    }
}
