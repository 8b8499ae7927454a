//! The step chain
//!
//! A [`Pipeline`] is the ordered list of configured steps. For one record it:
//!
//! 1. Projects the record into an [`APMessage`]
//! 2. Per step, in order:
//!    - runs the filters; the first veto stops the whole chain
//!    - runs the annotators and merges their fields (later writers win)
//!    - hands the message, as it is at that point, to each receiver
//!
//! Annotator and receiver failures are logged and never stop the chain.

mod filter_stage;

pub use filter_stage::{FilterStage, Veto};

use tracing::{debug, info, warn};

use crate::annotators::{build_annotators, AnnotatorStage};
use crate::config::Config;
use crate::filters::build_filters;
use crate::receivers::{build_receivers, Receiver};
use acars_common::db::MessageStore;
use acars_common::links::LinkTemplates;
use acars_common::messages::Record;
use acars_common::APMessage;

/// One configured step
#[derive(Default)]
pub struct Step {
    pub filter: Option<FilterStage>,
    pub annotators: Vec<AnnotatorStage>,
    pub receivers: Vec<Box<dyn Receiver>>,
}

/// Result of running the chain
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// Every step ran; holds the final message
    Completed(APMessage),
    /// A filter vetoed at `step`
    Filtered { step: usize, veto: Veto },
}

pub struct Pipeline {
    steps: Vec<Step>,
    links: LinkTemplates,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>, links: LinkTemplates) -> Self {
        Self { steps, links }
    }

    /// Build every configured step; fails on the first invalid section
    pub fn from_config(config: &Config, store: &MessageStore) -> acars_common::Result<Self> {
        let mut steps = Vec::with_capacity(config.steps.len());
        for step in &config.steps {
            let filter = match &step.filter {
                Some(filter) => Some(FilterStage::new(
                    build_filters(filter, store)?,
                    filter.filter_on_failure,
                )),
                None => None,
            };
            let annotators = match &step.annotate {
                Some(annotate) => build_annotators(annotate)?,
                None => Vec::new(),
            };
            let receivers = match &step.send {
                Some(send) => build_receivers(send)?,
                None => Vec::new(),
            };
            steps.push(Step {
                filter,
                annotators,
                receivers,
            });
        }
        Ok(Self::new(steps, config.links.clone()))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn project(&self, record: &Record) -> APMessage {
        record.to_ap_message(&self.links)
    }

    pub async fn run(&self, record: &Record, mut message: APMessage) -> ChainOutcome {
        for (index, step) in self.steps.iter().enumerate() {
            if let Some(filter) = &step.filter {
                if let Some(veto) = filter.evaluate(&message).await {
                    info!(
                        kind = %record.kind(),
                        step = index,
                        filter = veto.filter,
                        reason = %veto.reason,
                        "Message filtered"
                    );
                    return ChainOutcome::Filtered { step: index, veto };
                }
            }

            for annotator in &step.annotators {
                match annotator.annotate(record).await {
                    Ok(fields) => {
                        debug!(step = index, annotator = annotator.name(), fields = fields.len(), "Annotated");
                        message.extend(fields);
                    }
                    Err(e) => {
                        warn!(step = index, annotator = annotator.name(), error = %e, "Annotator failed");
                    }
                }
            }

            for receiver in &step.receivers {
                match receiver.submit(&message).await {
                    Ok(()) => debug!(step = index, receiver = receiver.name(), "Delivered"),
                    Err(e) => {
                        warn!(step = index, receiver = receiver.name(), error = %e, "Delivery failed");
                    }
                }
            }
        }

        ChainOutcome::Completed(message)
    }
}
