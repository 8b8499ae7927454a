//! PreviousMessageSimilarity
//!
//! Vetoes a message whose text is too close to one of the most recent
//! processed messages (any kind, newest first).

use async_trait::async_trait;
use strsim::normalized_levenshtein;

use super::{message_text, Filter, FilterError, FilterVerdict};
use crate::config::SimilarityConfig;
use acars_common::db::MessageStore;
use acars_common::APMessage;

pub struct SimilarityFilter {
    config: SimilarityConfig,
    store: MessageStore,
}

impl SimilarityFilter {
    pub fn new(config: SimilarityConfig, store: MessageStore) -> Self {
        Self { config, store }
    }
}

/// Normalized similarity in [0, 1]; symmetric in its arguments
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

#[async_trait]
impl Filter for SimilarityFilter {
    fn name(&self) -> &'static str {
        "PreviousMessageSimilarity"
    }

    async fn evaluate(&self, message: &APMessage) -> Result<FilterVerdict, FilterError> {
        // A threshold of zero disables the check
        if self.config.similarity <= 0.0 {
            return Ok(FilterVerdict::pass());
        }

        let text = message_text(message).unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(FilterVerdict::veto("empty message treated as duplicate"));
        }

        let recent = self
            .store
            .recent_processed_texts(self.config.maximum_look_behind)
            .await?;
        let length = text.chars().count();

        for previous in &recent {
            let score = similarity(&text, previous);
            if score <= self.config.similarity {
                continue;
            }
            if self.config.dont_filter_if_longer && length > previous.chars().count() {
                continue;
            }
            return Ok(FilterVerdict::veto(format!(
                "similarity {:.3} to a recent message exceeds {}",
                score, self.config.similarity
            )));
        }

        Ok(FilterVerdict::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acars_common::db::init_memory_database;
    use acars_common::{AcarsMessage, MessageKind};

    async fn store_with(texts: &[&str]) -> MessageStore {
        let store = MessageStore::new(init_memory_database().await.unwrap());
        for text in texts {
            let record = AcarsMessage {
                text: Some(text.to_string()),
                ..Default::default()
            };
            let id = store.insert(&record).await.unwrap();
            store.mark_processing_started(MessageKind::Acars, id).await.unwrap();
            store.mark_processed(MessageKind::Acars, id).await.unwrap();
        }
        store
    }

    fn message(text: &str) -> APMessage {
        let mut m = APMessage::new();
        m.set_alias("MessageText", text);
        m
    }

    fn config(similarity: f64) -> SimilarityConfig {
        SimilarityConfig {
            similarity,
            ..Default::default()
        }
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = "ENGINE OIL PRESSURE LOW";
        let b = "ENGINE OIL PRESSURE OK";
        assert_eq!(similarity(a, b), similarity(b, a));
        assert_eq!(similarity(a, a), 1.0);
    }

    #[tokio::test]
    async fn test_identical_text_is_vetoed() {
        let store = store_with(&["HELLO WORLD"]).await;
        let filter = SimilarityFilter::new(config(0.9), store);
        let verdict = filter.evaluate(&message("HELLO WORLD")).await.unwrap();
        assert!(verdict.filtered);
    }

    #[tokio::test]
    async fn test_different_text_passes() {
        let store = store_with(&["HELLO WORLD"]).await;
        let filter = SimilarityFilter::new(config(0.9), store);
        let verdict = filter
            .evaluate(&message("REQUEST WHEELCHAIR AT GATE"))
            .await
            .unwrap();
        assert!(!verdict.filtered);
    }

    #[tokio::test]
    async fn test_zero_threshold_disables_check() {
        let store = store_with(&["HELLO WORLD"]).await;
        let filter = SimilarityFilter::new(config(0.0), store);
        assert!(!filter.evaluate(&message("HELLO WORLD")).await.unwrap().filtered);
        assert!(!filter.evaluate(&message("")).await.unwrap().filtered);
    }

    #[tokio::test]
    async fn test_empty_text_is_vetoed() {
        let store = store_with(&[]).await;
        let filter = SimilarityFilter::new(config(0.5), store);
        assert!(filter.evaluate(&message("  ")).await.unwrap().filtered);
    }

    #[tokio::test]
    async fn test_longer_message_kept_when_configured() {
        let store = store_with(&["HELLO WORLD AGAIN"]).await;
        let filter = SimilarityFilter::new(
            SimilarityConfig {
                similarity: 0.8,
                dont_filter_if_longer: true,
                ..Default::default()
            },
            store,
        );
        let verdict = filter.evaluate(&message("HELLO WORLD AGAIN!")).await.unwrap();
        assert!(!verdict.filtered);
    }

    #[tokio::test]
    async fn test_look_behind_limits_scan() {
        let store = store_with(&["HELLO WORLD", "SOMETHING ELSE ENTIRELY"]).await;
        let filter = SimilarityFilter::new(
            SimilarityConfig {
                similarity: 0.9,
                maximum_look_behind: 1,
                dont_filter_if_longer: false,
            },
            store,
        );
        let verdict = filter.evaluate(&message("HELLO WORLD")).await.unwrap();
        assert!(!verdict.filtered);
    }
}
