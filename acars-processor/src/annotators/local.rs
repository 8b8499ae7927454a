//! Local echo annotators
//!
//! Re-export the record's own fields under stable `acars*` / `vdlm2*` keys so
//! receivers can address them without knowing the upstream JSON layout. Each
//! annotates its own kind only and returns nothing for the other.

use async_trait::async_trait;

use super::{Annotator, AnnotatorError};
use acars_common::time::from_unix_seconds;
use acars_common::{APMessage, AcarsMessage, Value, Vdlm2Message};

const ACARS_FIELDS: &[&str] = &[
    "acarsFrequencyMHz",
    "acarsChannel",
    "acarsErrorCode",
    "acarsSignalLeveldBm",
    "acarsTimestamp",
    "acarsTimestampISO",
    "acarsAppName",
    "acarsAppVersion",
    "acarsStationId",
    "acarsMode",
    "acarsLabel",
    "acarsBlockId",
    "acarsAcknowledge",
    "acarsTailCode",
    "acarsMessageText",
    "acarsMessageNumber",
    "acarsFlightNumber",
    "acarsLastBlock",
];

const VDLM2_FIELDS: &[&str] = &[
    "vdlm2AppName",
    "vdlm2AppVersion",
    "vdlm2FrequencyHz",
    "vdlm2SignalLeveldBm",
    "vdlm2NoiseLeveldBm",
    "vdlm2FrequencySkew",
    "vdlm2StationId",
    "vdlm2Timestamp",
    "vdlm2TimestampISO",
    "vdlm2SourceAddress",
    "vdlm2SourceType",
    "vdlm2SourceStatus",
    "vdlm2DestinationAddress",
    "vdlm2DestinationType",
    "vdlm2FrameType",
    "vdlm2Registration",
    "vdlm2FlightNumber",
    "vdlm2Mode",
    "vdlm2Label",
    "vdlm2BlockId",
    "vdlm2MessageNumber",
    "vdlm2MessageText",
    "vdlm2More",
    "vdlm2CrcOk",
];

fn iso_timestamp(seconds: Option<f64>) -> Value {
    seconds
        .and_then(from_unix_seconds)
        .map(|ts| Value::String(ts.to_rfc3339()))
        .unwrap_or(Value::Null)
}

pub struct AcarsAnnotator;

#[async_trait]
impl Annotator for AcarsAnnotator {
    fn name(&self) -> &'static str {
        "ACARS"
    }

    fn default_fields(&self) -> Vec<String> {
        ACARS_FIELDS.iter().map(|f| f.to_string()).collect()
    }

    async fn annotate_acars(&self, m: &AcarsMessage) -> Result<APMessage, AnnotatorError> {
        let mut out = APMessage::new();
        out.insert("acarsFrequencyMHz", m.freq);
        out.insert("acarsChannel", m.channel);
        out.insert("acarsErrorCode", m.error);
        out.insert("acarsSignalLeveldBm", m.level);
        out.insert("acarsTimestamp", m.timestamp);
        out.insert("acarsTimestampISO", iso_timestamp(m.timestamp));
        out.insert("acarsAppName", m.app.as_ref().and_then(|a| a.name.clone()));
        out.insert("acarsAppVersion", m.app.as_ref().and_then(|a| a.ver.clone()));
        out.insert("acarsStationId", m.station_id.clone());
        out.insert("acarsMode", m.mode.clone());
        out.insert("acarsLabel", m.label.clone());
        out.insert("acarsBlockId", m.block_id.clone());
        out.insert("acarsAcknowledge", m.ack.as_ref().map(|a| a.as_string()));
        out.insert(
            "acarsTailCode",
            m.tail.as_deref().map(|t| t.trim().trim_start_matches('.').to_string()),
        );
        out.insert("acarsMessageText", m.text.clone());
        out.insert("acarsMessageNumber", m.msgno.clone());
        out.insert("acarsFlightNumber", m.flight.as_deref().map(str::trim));
        out.insert("acarsLastBlock", m.end);
        Ok(out)
    }

    async fn annotate_vdlm2(&self, _message: &Vdlm2Message) -> Result<APMessage, AnnotatorError> {
        Ok(APMessage::new())
    }
}

pub struct Vdlm2Annotator;

#[async_trait]
impl Annotator for Vdlm2Annotator {
    fn name(&self) -> &'static str {
        "VDLM2"
    }

    fn default_fields(&self) -> Vec<String> {
        VDLM2_FIELDS.iter().map(|f| f.to_string()).collect()
    }

    async fn annotate_acars(&self, _message: &AcarsMessage) -> Result<APMessage, AnnotatorError> {
        Ok(APMessage::new())
    }

    async fn annotate_vdlm2(&self, m: &Vdlm2Message) -> Result<APMessage, AnnotatorError> {
        let mut out = APMessage::new();
        let Some(body) = m.body() else {
            return Ok(out);
        };
        let avlc = body.avlc.as_ref();
        let src = avlc.and_then(|a| a.src.as_ref());
        let dst = avlc.and_then(|a| a.dst.as_ref());
        let acars = m.acars();

        out.insert("vdlm2AppName", body.app.as_ref().and_then(|a| a.name.clone()));
        out.insert("vdlm2AppVersion", body.app.as_ref().and_then(|a| a.ver.clone()));
        out.insert("vdlm2FrequencyHz", body.freq);
        out.insert("vdlm2SignalLeveldBm", body.sig_level);
        out.insert("vdlm2NoiseLeveldBm", body.noise_level);
        out.insert("vdlm2FrequencySkew", body.freq_skew);
        out.insert("vdlm2StationId", body.station.clone());
        out.insert("vdlm2Timestamp", m.unix_seconds());
        out.insert("vdlm2TimestampISO", iso_timestamp(m.unix_seconds()));
        out.insert("vdlm2SourceAddress", src.and_then(|a| a.addr.clone()));
        out.insert("vdlm2SourceType", src.and_then(|a| a.kind.clone()));
        out.insert("vdlm2SourceStatus", src.and_then(|a| a.status.clone()));
        out.insert("vdlm2DestinationAddress", dst.and_then(|a| a.addr.clone()));
        out.insert("vdlm2DestinationType", dst.and_then(|a| a.kind.clone()));
        out.insert("vdlm2FrameType", avlc.and_then(|a| a.frame_type.clone()));
        out.insert(
            "vdlm2Registration",
            m.registration().map(|r| r.trim().trim_start_matches('.').to_string()),
        );
        out.insert("vdlm2FlightNumber", m.flight().map(str::trim));
        out.insert("vdlm2Mode", acars.and_then(|a| a.mode.clone()));
        out.insert("vdlm2Label", acars.and_then(|a| a.label.clone()));
        out.insert("vdlm2BlockId", acars.and_then(|a| a.blk_id.clone()));
        out.insert("vdlm2MessageNumber", acars.and_then(|a| a.msg_num.clone()));
        out.insert("vdlm2MessageText", acars.and_then(|a| a.msg_text.clone()));
        out.insert("vdlm2More", acars.and_then(|a| a.more));
        out.insert("vdlm2CrcOk", acars.and_then(|a| a.crc_ok));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acars_echo() {
        let message: AcarsMessage = serde_json::from_str(
            r#"{"freq": 131.55, "timestamp": 1700000000.5, "tail": ".N123AB",
                "flight": " UA123 ", "text": "HELLO", "app": {"name": "acarsdec", "ver": "3.7"}}"#,
        )
        .unwrap();
        let out = AcarsAnnotator.annotate_acars(&message).await.unwrap();

        assert_eq!(out.get_as_string("acarsTailCode"), "N123AB");
        assert_eq!(out.get_as_string("acarsFlightNumber"), "UA123");
        assert_eq!(out.get_as_string("acarsAppName"), "acarsdec");
        assert_eq!(out.get_as_float("acarsFrequencyMHz"), 131.55);
        assert!(out.get_as_string("acarsTimestampISO").starts_with("2023-11-14T22:13:20.5"));
        assert_eq!(out.get("acarsErrorCode"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_annotators_ignore_other_kind() {
        let acars = AcarsMessage {
            text: Some("HI".to_string()),
            ..Default::default()
        };
        assert!(Vdlm2Annotator.annotate_acars(&acars).await.unwrap().is_empty());
        let vdlm2 = Vdlm2Message::default();
        assert!(AcarsAnnotator.annotate_vdlm2(&vdlm2).await.unwrap().is_empty());
        assert!(Vdlm2Annotator.annotate_vdlm2(&vdlm2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vdlm2_echo() {
        let message: Vdlm2Message = serde_json::from_str(
            r#"{"vdl2": {"freq": 136975000, "sig_level": -12.5, "station": "KSEA",
                "t": {"sec": 1700000000, "usec": 0},
                "avlc": {"src": {"addr": "A1B2C3", "type": "Aircraft", "status": "Airborne"},
                         "acars": {"reg": ".N999AB", "flight": "AS12", "msg_text": "TEXT", "more": false}}}}"#,
        )
        .unwrap();
        let out = Vdlm2Annotator.annotate_vdlm2(&message).await.unwrap();

        assert_eq!(out.get_as_int("vdlm2FrequencyHz"), 136_975_000);
        assert_eq!(out.get_as_string("vdlm2Registration"), "N999AB");
        assert_eq!(out.get_as_string("vdlm2SourceStatus"), "Airborne");
        assert_eq!(out.get_as_string("vdlm2MessageText"), "TEXT");
        assert_eq!(out.get("vdlm2More"), Some(&Value::Bool(false)));
        assert_eq!(out.len(), VDLM2_FIELDS.len());
    }
}
