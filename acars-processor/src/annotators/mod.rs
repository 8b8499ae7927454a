//! Annotators: derive extra fields for a record
//!
//! An annotator sees the typed record (not the flat view) and returns new
//! key/value pairs. The step chain merges them into the message, after
//! applying the annotator's `selected_fields` allow-list.

pub mod adsb;
pub mod geo;
pub mod local;
pub mod ollama;
pub mod tar1090;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AnnotateConfig;
use crate::harness::CallError;
use acars_common::messages::Record;
use acars_common::{APMessage, AcarsMessage, Vdlm2Message};

pub use adsb::AdsbExchangeAnnotator;
pub use local::{AcarsAnnotator, Vdlm2Annotator};
pub use ollama::OllamaAnnotator;
pub use tar1090::Tar1090Annotator;

/// Annotator failure; the chain logs it and continues
#[derive(Debug, Error)]
pub enum AnnotatorError {
    #[error("aircraft {0} not found")]
    AircraftNotFound(String),

    #[error("record has no registration")]
    MissingRegistration,

    #[error("external call failed: {0}")]
    Call(#[from] CallError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AnnotatorError> for acars_common::Error {
    fn from(err: AnnotatorError) -> Self {
        acars_common::Error::Config(err.to_string())
    }
}

#[async_trait]
pub trait Annotator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Keys this annotator can emit
    fn default_fields(&self) -> Vec<String>;

    async fn annotate_acars(&self, message: &AcarsMessage) -> Result<APMessage, AnnotatorError>;

    async fn annotate_vdlm2(&self, message: &Vdlm2Message) -> Result<APMessage, AnnotatorError>;
}

/// An annotator plus its field allow-list
pub struct AnnotatorStage {
    annotator: Box<dyn Annotator>,
    selected_fields: Vec<String>,
}

impl AnnotatorStage {
    pub fn new(annotator: Box<dyn Annotator>, selected_fields: Vec<String>) -> Self {
        Self {
            annotator,
            selected_fields,
        }
    }

    /// Like [`AnnotatorStage::new`], but every selected field must be one
    /// the annotator can emit
    pub fn checked(annotator: Box<dyn Annotator>, selected_fields: Vec<String>) -> Result<Self, AnnotatorError> {
        let known = annotator.default_fields();
        if let Some(unknown) = selected_fields.iter().find(|f| !known.contains(f)) {
            return Err(AnnotatorError::Config(format!(
                "{} annotator has no field {:?} (known: {})",
                annotator.name(),
                unknown,
                known.join(", ")
            )));
        }
        Ok(Self::new(annotator, selected_fields))
    }

    pub fn name(&self) -> &'static str {
        self.annotator.name()
    }

    /// Annotate `record`; an empty allow-list keeps every field
    pub async fn annotate(&self, record: &Record) -> Result<APMessage, AnnotatorError> {
        let mut fields = match record {
            Record::Acars(m) => self.annotator.annotate_acars(m).await?,
            Record::Vdlm2(m) => self.annotator.annotate_vdlm2(m).await?,
        };
        if !self.selected_fields.is_empty() {
            fields.retain_keys(&self.selected_fields);
        }
        Ok(fields)
    }
}

/// Build the annotators configured for one step, in a fixed order
pub fn build_annotators(config: &AnnotateConfig) -> acars_common::Result<Vec<AnnotatorStage>> {
    let mut stages = Vec::new();

    if let Some(c) = config.acars.as_ref().filter(|c| c.enabled) {
        stages.push(AnnotatorStage::checked(Box::new(AcarsAnnotator), c.selected_fields.clone())?);
    }
    if let Some(c) = config.vdlm2.as_ref().filter(|c| c.enabled) {
        stages.push(AnnotatorStage::checked(Box::new(Vdlm2Annotator), c.selected_fields.clone())?);
    }
    if let Some(c) = config.tar1090.as_ref().filter(|c| c.enabled) {
        stages.push(AnnotatorStage::checked(
            Box::new(Tar1090Annotator::from_config(c)?),
            c.selected_fields.clone(),
        )?);
    }
    if let Some(c) = config.adsb.as_ref().filter(|c| c.enabled) {
        stages.push(AnnotatorStage::checked(
            Box::new(AdsbExchangeAnnotator::from_config(c)?),
            c.selected_fields.clone(),
        )?);
    }
    if let Some(c) = config.ollama.as_ref().filter(|c| c.enabled) {
        stages.push(AnnotatorStage::checked(
            Box::new(OllamaAnnotator::from_config(c)?),
            c.selected_fields.clone(),
        )?);
    }

    Ok(stages)
}

/// Registration of a record, for the position lookups
pub(crate) fn registration(record: RecordRef<'_>) -> Result<String, AnnotatorError> {
    let raw = match record {
        RecordRef::Acars(m) => m.tail.as_deref(),
        RecordRef::Vdlm2(m) => m.registration(),
    };
    match raw.map(str::trim).filter(|r| !r.trim_start_matches('.').is_empty()) {
        Some(r) => Ok(r.to_string()),
        None => Err(AnnotatorError::MissingRegistration),
    }
}

/// Borrowed record of either kind
#[derive(Clone, Copy)]
pub(crate) enum RecordRef<'a> {
    Acars(&'a AcarsMessage),
    Vdlm2(&'a Vdlm2Message),
}
