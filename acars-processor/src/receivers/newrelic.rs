//! New Relic custom event receiver
//!
//! Each message becomes one custom event (default type `CustomACARS`) posted
//! to the Event API with a 10 second timeout. Null fields are omitted.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;

use super::{ensure_success, http_client, Receiver, ReceiverError};
use crate::config::NewRelicConfig;
use acars_common::{APMessage, Value};

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct NewRelicReceiver {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    event_type: String,
}

impl NewRelicReceiver {
    pub fn from_config(config: &NewRelicConfig) -> Result<Self, ReceiverError> {
        if config.api_key.trim().is_empty() {
            return Err(ReceiverError::Config("new_relic api_key is required".to_string()));
        }
        let event_type = if config.custom_event_type.trim().is_empty() {
            "CustomACARS".to_string()
        } else {
            config.custom_event_type.trim().to_string()
        };
        Ok(Self {
            http: http_client(TIMEOUT)?,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.api_key.clone(),
            event_type,
        })
    }

    pub fn event(&self, message: &APMessage) -> JsonValue {
        let mut event = Map::new();
        for (key, value) in message.iter() {
            let json = match value {
                Value::Null => continue,
                Value::Bool(b) => JsonValue::from(*b),
                Value::Int(i) => JsonValue::from(*i),
                Value::Float(x) => JsonValue::from(*x),
                Value::String(s) => JsonValue::from(s.as_str()),
            };
            event.insert(key.clone(), json);
        }
        event.insert("eventType".to_string(), JsonValue::from(self.event_type.as_str()));
        event.insert(
            "timestamp".to_string(),
            JsonValue::from(acars_common::time::now().timestamp_millis()),
        );
        JsonValue::Object(event)
    }
}

#[async_trait]
impl Receiver for NewRelicReceiver {
    fn name(&self) -> &'static str {
        "New Relic"
    }

    async fn submit(&self, message: &APMessage) -> Result<(), ReceiverError> {
        let body = JsonValue::Array(vec![self.event(message)]);
        let response = self
            .http
            .post(&self.endpoint)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await
    }
}
