//! Receivers: deliver a finished message to an external destination
//!
//! Delivery is best effort: the chain logs a failed submit and moves on.

pub mod discord;
pub mod mastodon;
pub mod newrelic;
pub mod template;
pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SendConfig;
use acars_common::APMessage;

pub use discord::DiscordReceiver;
pub use mastodon::MastodonReceiver;
pub use newrelic::NewRelicReceiver;
pub use webhook::WebhookReceiver;

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("template error: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ReceiverError> for acars_common::Error {
    fn from(err: ReceiverError) -> Self {
        acars_common::Error::Config(err.to_string())
    }
}

#[async_trait]
pub trait Receiver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit(&self, message: &APMessage) -> Result<(), ReceiverError>;
}

/// Turn a non-2xx response into [`ReceiverError::Status`]
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<(), ReceiverError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ReceiverError::Status {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}

pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, ReceiverError> {
    crate::clients::build_http_client(Some(timeout)).map_err(|e| ReceiverError::Config(e.to_string()))
}

/// Build the receivers configured for one step
pub fn build_receivers(config: &SendConfig) -> acars_common::Result<Vec<Box<dyn Receiver>>> {
    let mut receivers: Vec<Box<dyn Receiver>> = Vec::new();

    if let Some(c) = config.webhook.as_ref().filter(|c| c.enabled) {
        receivers.push(Box::new(WebhookReceiver::from_config(c)?));
    }
    if let Some(c) = config.discord.as_ref().filter(|c| c.enabled) {
        receivers.push(Box::new(DiscordReceiver::from_config(c)?));
    }
    if let Some(c) = config.new_relic.as_ref().filter(|c| c.enabled) {
        receivers.push(Box::new(NewRelicReceiver::from_config(c)?));
    }
    if let Some(c) = config.mastodon.as_ref().filter(|c| c.enabled) {
        receivers.push(Box::new(MastodonReceiver::from_config(c)?));
    }

    Ok(receivers)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::Router;
    use std::sync::{Arc, Mutex};

    /// One request seen by [`sink`]
    #[derive(Debug, Clone)]
    pub struct Captured {
        pub method: String,
        pub path: String,
        pub headers: HeaderMap,
        pub body: String,
    }

    /// Local HTTP sink recording every request; returns (base url, log)
    pub async fn sink(status: u16) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let log: Arc<Mutex<Vec<Captured>>> = Arc::default();
        let seen = log.clone();
        let router = Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(Captured {
                        method: method.to_string(),
                        path: uri.path().to_string(),
                        headers,
                        body: String::from_utf8_lossy(&body).into_owned(),
                    });
                    StatusCode::from_u16(status).unwrap()
                }
            },
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}", addr), log)
    }
}
