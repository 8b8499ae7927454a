//! acarsdec-style ACARS record

use serde::{Deserialize, Serialize};

use super::{from_label, strip_tail, MessageKind, MessageRecord, Record};
use crate::apmessage::{join_path, APMessage, Flatten, Value};
use crate::links::LinkTemplates;

/// Acknowledge field: upstream sends either `false` or the ack character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Acknowledge {
    Flag(bool),
    Text(String),
}

impl Acknowledge {
    pub fn as_string(&self) -> String {
        match self {
            Acknowledge::Flag(b) => b.to_string(),
            Acknowledge::Text(s) => s.clone(),
        }
    }
}

impl Flatten for Acknowledge {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        out.insert(path, self.as_string());
    }
}

/// Decoder application block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcarsApp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

impl Flatten for AcarsApp {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.name.flatten_into(&join_path(path, "name"), out);
        self.ver.flatten_into(&join_path(path, "ver"), out);
    }
}

/// One ACARS message as forwarded by ACARSHub
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcarsMessage {
    /// Frequency in MHz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<i64>,
    /// Signal level in dBm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    /// Fractional unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AcarsApp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asstat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<Acknowledge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgno: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<String>,
    /// Last block of a multi-block message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
}

impl Flatten for AcarsMessage {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.freq.flatten_into(&join_path(path, "freq"), out);
        self.channel.flatten_into(&join_path(path, "channel"), out);
        self.error.flatten_into(&join_path(path, "error"), out);
        self.level.flatten_into(&join_path(path, "level"), out);
        self.timestamp.flatten_into(&join_path(path, "timestamp"), out);
        self.app.flatten_into(&join_path(path, "app"), out);
        self.station_id.flatten_into(&join_path(path, "station_id"), out);
        self.asstat.flatten_into(&join_path(path, "asstat"), out);
        self.mode.flatten_into(&join_path(path, "mode"), out);
        self.label.flatten_into(&join_path(path, "label"), out);
        self.block_id.flatten_into(&join_path(path, "block_id"), out);
        self.ack.flatten_into(&join_path(path, "ack"), out);
        self.tail.flatten_into(&join_path(path, "tail"), out);
        self.text.flatten_into(&join_path(path, "text"), out);
        self.msgno.flatten_into(&join_path(path, "msgno"), out);
        self.flight.flatten_into(&join_path(path, "flight"), out);
        self.end.flatten_into(&join_path(path, "end"), out);
    }
}

impl MessageRecord for AcarsMessage {
    const KIND: MessageKind = MessageKind::Acars;

    fn message_text(&self) -> String {
        self.text.clone().unwrap_or_default()
    }

    fn to_ap_message(&self, links: &LinkTemplates) -> APMessage {
        let mut out = APMessage::new();
        self.flatten_into("", &mut out);

        let tail = self.tail.as_deref().map(strip_tail);

        out.set_alias("MessageType", MessageKind::Acars.as_str());
        out.set_alias("TailCode", tail.clone());
        out.set_alias("FlightNumber", self.flight.as_deref().map(str::trim));
        out.set_alias("FrequencyMHz", self.freq);
        out.set_alias(
            "FrequencyHz",
            self.freq.map(|mhz| (mhz * 1_000_000.0).round() as i64),
        );
        out.set_alias("UnixTimestamp", self.timestamp);
        out.set_alias("SignalLeveldBm", self.level);
        out.set_alias("StationId", self.station_id.clone());
        out.set_alias("MessageText", self.text.clone());
        out.set_alias("Label", self.label.clone());
        out.set_alias("ASSStatus", self.asstat.clone());
        out.set_alias("More", self.end.map(|end| !end));
        out.set_alias("Acknowledge", self.ack.as_ref().map(Acknowledge::as_string));
        out.set_alias("From", Value::from(from_label(self.flight.as_deref())));

        links.apply(
            tail.as_deref().unwrap_or_default(),
            self.text.as_deref().unwrap_or_default(),
            &mut out,
        );

        out
    }

    fn into_record(self) -> Record {
        Record::Acars(self)
    }
}
