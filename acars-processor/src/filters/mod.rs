//! Filters: predicates over an [`APMessage`] that may veto a message
//!
//! A filter answers "keep or veto". A filter that cannot answer (missing
//! field, unreachable provider) returns an error and the owning step's
//! `filter_on_failure` flag decides.

pub mod ai;
pub mod builtin;
pub mod dictionary;
pub mod duplicate;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::FilterConfig;
use crate::harness::CallError;
use acars_common::db::MessageStore;
use acars_common::APMessage;

pub use ai::{OllamaFilter, OpenAiFilter};
pub use builtin::Criterion;
pub use dictionary::DictionaryFilter;
pub use duplicate::SimilarityFilter;

/// Filter failure
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("required field missing: {0}")]
    MissingField(String),

    #[error("external call failed: {0}")]
    Call(#[from] CallError),

    #[error("store error: {0}")]
    Store(#[from] acars_common::Error),
}

/// Outcome of one filter
#[derive(Debug, Clone, PartialEq)]
pub struct FilterVerdict {
    /// True when the message must stop here
    pub filtered: bool,
    pub reason: String,
}

impl FilterVerdict {
    pub fn pass() -> Self {
        Self {
            filtered: false,
            reason: String::new(),
        }
    }

    pub fn veto(reason: impl Into<String>) -> Self {
        Self {
            filtered: true,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, message: &APMessage) -> Result<FilterVerdict, FilterError>;
}

/// Build every filter configured for one step, cheapest first
pub fn build_filters(
    config: &FilterConfig,
    store: &MessageStore,
) -> acars_common::Result<Vec<Box<dyn Filter>>> {
    let mut filters: Vec<Box<dyn Filter>> = builtin::criteria_from_config(config)
        .into_iter()
        .map(|c| Box::new(c) as Box<dyn Filter>)
        .collect();

    if let Some(minimum) = config.dictionary_phrase_length_minimum {
        let filter = match &config.dictionary_path {
            Some(path) => DictionaryFilter::from_file(path, minimum)?,
            None => DictionaryFilter::builtin(minimum),
        };
        filters.push(Box::new(filter));
    }

    if let Some(similarity) = &config.previous_message_similarity {
        filters.push(Box::new(SimilarityFilter::new(similarity.clone(), store.clone())));
    }

    if let Some(ollama) = &config.ollama {
        filters.push(Box::new(OllamaFilter::from_config(ollama, Some(store.clone()))?));
    }

    if let Some(openai) = &config.openai {
        filters.push(Box::new(OpenAiFilter::from_config(openai, Some(store.clone()))?));
    }

    Ok(filters)
}

/// Message text alias shared by the text-based filters
pub(crate) fn message_text(message: &APMessage) -> Option<String> {
    match message.alias("MessageText") {
        Some(acars_common::Value::String(s)) => Some(s.clone()),
        Some(_) => Some(String::new()),
        None => None,
    }
}

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("static regex is valid"));

/// Uppercased word tokens; punctuation and whitespace separate tokens
pub(crate) fn tokens(text: &str) -> Vec<String> {
    TOKEN.find_iter(text).map(|m| m.as_str().to_uppercase()).collect()
}
