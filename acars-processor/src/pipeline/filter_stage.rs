//! Filter half of a step

use tracing::warn;

use crate::filters::Filter;
use acars_common::APMessage;

/// Why a message stopped
#[derive(Debug, Clone, PartialEq)]
pub struct Veto {
    pub filter: &'static str,
    pub reason: String,
}

pub struct FilterStage {
    filters: Vec<Box<dyn Filter>>,
    filter_on_failure: bool,
}

impl FilterStage {
    pub fn new(filters: Vec<Box<dyn Filter>>, filter_on_failure: bool) -> Self {
        Self {
            filters,
            filter_on_failure,
        }
    }

    /// First veto in filter order, if any
    ///
    /// A filter error vetoes when `filter_on_failure` is set and is skipped
    /// otherwise.
    pub async fn evaluate(&self, message: &APMessage) -> Option<Veto> {
        for filter in &self.filters {
            match filter.evaluate(message).await {
                Ok(verdict) if verdict.filtered => {
                    return Some(Veto {
                        filter: filter.name(),
                        reason: verdict.reason,
                    });
                }
                Ok(_) => {}
                Err(e) if self.filter_on_failure => {
                    warn!(filter = filter.name(), error = %e, "Filter failed, vetoing message");
                    return Some(Veto {
                        filter: filter.name(),
                        reason: format!("filter failed: {}", e),
                    });
                }
                Err(e) => {
                    warn!(filter = filter.name(), error = %e, "Filter failed, ignoring");
                }
            }
        }
        None
    }
}
