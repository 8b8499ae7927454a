//! Typed upstream message records
//!
//! ACARSHub forwards two JSON shapes: flat acarsdec ACARS records and nested
//! dumpvdl2 VDL Mode 2 frames. Both deserialize leniently (unknown fields are
//! ignored, every field is optional) and both project into an [`APMessage`].

mod acars;
mod vdlm2;

pub use acars::{AcarsApp, AcarsMessage, Acknowledge};
pub use vdlm2::{
    Vdlm2Acars, Vdlm2Address, Vdlm2App, Vdlm2Avlc, Vdlm2Body, Vdlm2Message, Vdlm2Timestamp,
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::apmessage::APMessage;
use crate::links::LinkTemplates;

/// Stream kind of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Acars,
    Vdlm2,
}

impl MessageKind {
    /// Store table holding records of this kind
    pub fn table(self) -> &'static str {
        match self {
            MessageKind::Acars => "acars_messages",
            MessageKind::Vdlm2 => "vdlm2_messages",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Acars => "ACARS",
            MessageKind::Vdlm2 => "VDLM2",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by every upstream record type
pub trait MessageRecord:
    DeserializeOwned + Serialize + Default + PartialEq + Clone + Send + Sync + 'static
{
    const KIND: MessageKind;

    /// True when the record deserialized to the zero value of its type,
    /// i.e. the JSON object carried none of the expected fields
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Free text of the message ("" when absent)
    fn message_text(&self) -> String;

    /// Deterministic projection into the flat view
    fn to_ap_message(&self, links: &LinkTemplates) -> APMessage;

    fn into_record(self) -> Record;
}

/// A stored record of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Acars(AcarsMessage),
    Vdlm2(Vdlm2Message),
}

impl Record {
    pub fn kind(&self) -> MessageKind {
        match self {
            Record::Acars(_) => MessageKind::Acars,
            Record::Vdlm2(_) => MessageKind::Vdlm2,
        }
    }

    pub fn message_text(&self) -> String {
        match self {
            Record::Acars(m) => m.message_text(),
            Record::Vdlm2(m) => m.message_text(),
        }
    }

    pub fn to_ap_message(&self, links: &LinkTemplates) -> APMessage {
        match self {
            Record::Acars(m) => m.to_ap_message(links),
            Record::Vdlm2(m) => m.to_ap_message(links),
        }
    }
}

/// Shared derivations for canonical aliases
pub(crate) fn strip_tail(tail: &str) -> String {
    tail.trim().trim_start_matches('.').to_string()
}

pub(crate) fn from_label(flight: Option<&str>) -> &'static str {
    match flight {
        Some(f) if f.chars().any(|c| !c.is_whitespace()) => "Aircraft",
        _ => "Tower",
    }
}
