//! dumpvdl2-style VDL Mode 2 record (`vdl2.avlc.acars.*`)

use serde::{Deserialize, Serialize};

use super::{from_label, strip_tail, MessageKind, MessageRecord, Record};
use crate::apmessage::{join_path, APMessage, Flatten, Value};
use crate::links::LinkTemplates;

/// Top-level VDLM2 record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vdl2: Option<Vdlm2Body>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<Vdlm2App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avlc: Option<Vdlm2Avlc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst_len_octets: Option<i64>,
    /// Frequency in Hz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_skew: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdr_bits_fixed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idx: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub octets_corrected_by_fec: Option<i64>,
    /// Signal level in dBm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<Vdlm2Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2App {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2Timestamp {
    #[serde(default)]
    pub sec: i64,
    #[serde(default)]
    pub usec: i64,
}

impl Vdlm2Timestamp {
    pub fn as_unix_seconds(&self) -> f64 {
        self.sec as f64 + self.usec as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2Avlc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acars: Option<Vdlm2Acars>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst: Option<Vdlm2Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rseq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sseq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<Vdlm2Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// ACARS payload nested in an AVLC frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdlm2Acars {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<super::Acknowledge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_num: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_num_seq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_text: Option<String>,
}

impl Flatten for Vdlm2App {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.name.flatten_into(&join_path(path, "name"), out);
        self.ver.flatten_into(&join_path(path, "ver"), out);
    }
}

impl Flatten for Vdlm2Timestamp {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.sec.flatten_into(&join_path(path, "sec"), out);
        self.usec.flatten_into(&join_path(path, "usec"), out);
    }
}

impl Flatten for Vdlm2Address {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.addr.flatten_into(&join_path(path, "addr"), out);
        self.kind.flatten_into(&join_path(path, "type"), out);
        self.status.flatten_into(&join_path(path, "status"), out);
    }
}

impl Flatten for Vdlm2Acars {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.err.flatten_into(&join_path(path, "err"), out);
        self.crc_ok.flatten_into(&join_path(path, "crc_ok"), out);
        self.more.flatten_into(&join_path(path, "more"), out);
        self.reg.flatten_into(&join_path(path, "reg"), out);
        self.mode.flatten_into(&join_path(path, "mode"), out);
        self.label.flatten_into(&join_path(path, "label"), out);
        self.blk_id.flatten_into(&join_path(path, "blk_id"), out);
        self.ack.flatten_into(&join_path(path, "ack"), out);
        self.flight.flatten_into(&join_path(path, "flight"), out);
        self.msg_num.flatten_into(&join_path(path, "msg_num"), out);
        self.msg_num_seq.flatten_into(&join_path(path, "msg_num_seq"), out);
        self.msg_text.flatten_into(&join_path(path, "msg_text"), out);
    }
}

impl Flatten for Vdlm2Avlc {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.acars.flatten_into(&join_path(path, "acars"), out);
        self.cr.flatten_into(&join_path(path, "cr"), out);
        self.dst.flatten_into(&join_path(path, "dst"), out);
        self.frame_type.flatten_into(&join_path(path, "frame_type"), out);
        self.poll.flatten_into(&join_path(path, "poll"), out);
        self.rseq.flatten_into(&join_path(path, "rseq"), out);
        self.sseq.flatten_into(&join_path(path, "sseq"), out);
        self.src.flatten_into(&join_path(path, "src"), out);
    }
}

impl Flatten for Vdlm2Body {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.app.flatten_into(&join_path(path, "app"), out);
        self.avlc.flatten_into(&join_path(path, "avlc"), out);
        self.burst_len_octets.flatten_into(&join_path(path, "burst_len_octets"), out);
        self.freq.flatten_into(&join_path(path, "freq"), out);
        self.freq_skew.flatten_into(&join_path(path, "freq_skew"), out);
        self.hdr_bits_fixed.flatten_into(&join_path(path, "hdr_bits_fixed"), out);
        self.idx.flatten_into(&join_path(path, "idx"), out);
        self.noise_level.flatten_into(&join_path(path, "noise_level"), out);
        self.octets_corrected_by_fec
            .flatten_into(&join_path(path, "octets_corrected_by_fec"), out);
        self.sig_level.flatten_into(&join_path(path, "sig_level"), out);
        self.station.flatten_into(&join_path(path, "station"), out);
        self.t.flatten_into(&join_path(path, "t"), out);
    }
}

impl Flatten for Vdlm2Message {
    fn flatten_into(&self, path: &str, out: &mut APMessage) {
        self.vdl2.flatten_into(&join_path(path, "vdl2"), out);
    }
}

impl Vdlm2Message {
    pub fn body(&self) -> Option<&Vdlm2Body> {
        self.vdl2.as_ref()
    }

    pub fn acars(&self) -> Option<&Vdlm2Acars> {
        self.body()?.avlc.as_ref()?.acars.as_ref()
    }

    /// Registration as sent (may carry a leading `.`)
    pub fn registration(&self) -> Option<&str> {
        self.acars()?.reg.as_deref()
    }

    pub fn flight(&self) -> Option<&str> {
        self.acars()?.flight.as_deref()
    }

    pub fn frequency_hz(&self) -> Option<i64> {
        self.body()?.freq
    }

    pub fn signal_level(&self) -> Option<f64> {
        self.body()?.sig_level
    }

    pub fn station(&self) -> Option<&str> {
        self.body()?.station.as_deref()
    }

    pub fn unix_seconds(&self) -> Option<f64> {
        self.body()?.t.as_ref().map(Vdlm2Timestamp::as_unix_seconds)
    }

    pub fn source_status(&self) -> Option<&str> {
        self.body()?.avlc.as_ref()?.src.as_ref()?.status.as_deref()
    }
}

impl MessageRecord for Vdlm2Message {
    const KIND: MessageKind = MessageKind::Vdlm2;

    fn message_text(&self) -> String {
        self.acars()
            .and_then(|a| a.msg_text.clone())
            .unwrap_or_default()
    }

    fn to_ap_message(&self, links: &LinkTemplates) -> APMessage {
        let mut out = APMessage::new();
        self.flatten_into("", &mut out);

        let tail = self.registration().map(strip_tail);
        let text = self.acars().and_then(|a| a.msg_text.clone());

        out.set_alias("MessageType", MessageKind::Vdlm2.as_str());
        out.set_alias("TailCode", tail.clone());
        out.set_alias("FlightNumber", self.flight().map(str::trim));
        out.set_alias("FrequencyHz", self.frequency_hz());
        out.set_alias(
            "FrequencyMHz",
            self.frequency_hz().map(|hz| hz as f64 / 1_000_000.0),
        );
        out.set_alias("UnixTimestamp", self.unix_seconds());
        out.set_alias("SignalLeveldBm", self.signal_level());
        out.set_alias("StationId", self.station());
        out.set_alias("MessageText", text.clone());
        out.set_alias("Label", self.acars().and_then(|a| a.label.clone()));
        out.set_alias("ASSStatus", self.source_status());
        out.set_alias("More", self.acars().and_then(|a| a.more));
        out.set_alias(
            "Acknowledge",
            self.acars().and_then(|a| a.ack.as_ref()).map(super::Acknowledge::as_string),
        );
        out.set_alias("From", Value::from(from_label(self.flight())));

        links.apply(
            tail.as_deref().unwrap_or_default(),
            text.as_deref().unwrap_or_default(),
            &mut out,
        );

        out
    }

    fn into_record(self) -> Record {
        Record::Vdlm2(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{"vdl2":{"app":{"name":"dumpvdl2","ver":"2.3.0"},
            "avlc":{"acars":{"ack":"!","blk_id":"2","crc_ok":true,"err":false,"flight":"",
                "label":"H1","mode":"2","more":true,"msg_num":"D01","msg_num_seq":"A",
                "msg_text":"POS REPORT","reg":".N-99 9AB"},
                "cr":"Command","dst":{"addr":"10916D","type":"Ground station"},
                "frame_type":"I","poll":false,"rseq":1,"sseq":2,
                "src":{"addr":"A1B2C3","status":"Airborne","type":"Aircraft"}},
            "freq":136975000,"sig_level":-20.5,"noise_level":-48.0,"station":"XX-KSEA",
            "t":{"sec":1700000000,"usec":500000}}}"#
    }

    #[test]
    fn test_deserialize_nested() {
        let msg: Vdlm2Message = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(msg.registration(), Some(".N-99 9AB"));
        assert_eq!(msg.frequency_hz(), Some(136_975_000));
        assert_eq!(msg.message_text(), "POS REPORT");
        assert!(!msg.is_empty());
    }

    #[test]
    fn test_acars_shaped_json_is_empty_vdlm2() {
        let msg: Vdlm2Message = serde_json::from_str(r#"{"text":"HI","tail":"N1"}"#).unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_projection_paths_and_aliases() {
        let msg: Vdlm2Message = serde_json::from_str(sample_json()).unwrap();
        let ap = msg.to_ap_message(&LinkTemplates::default());

        assert_eq!(ap.get_as_string("vdl2.avlc.acars.reg"), ".N-99 9AB");
        assert_eq!(ap.get_as_string("vdl2.avlc.src.type"), "Aircraft");
        assert_eq!(ap.get_as_string("ACARSProcessor.TailCode"), "N-99 9AB");
        assert_eq!(ap.get_as_float("ACARSProcessor.FrequencyMHz"), 136.975);
        assert_eq!(ap.get_as_float("ACARSProcessor.UnixTimestamp"), 1_700_000_000.5);
        assert_eq!(ap.get_as_string("ACARSProcessor.From"), "Tower");
        assert_eq!(ap.get_as_string("ACARSProcessor.ASSStatus"), "Airborne");
        assert_eq!(ap.get_as_string("ACARSProcessor.Acknowledge"), "!");
        assert!(ap.get_as_bool("ACARSProcessor.More"));
    }
}
