//! DictionaryPhraseLengthMinimum
//!
//! Most ACARS traffic is machine-formatted (position reports, OOOI events).
//! Human-written messages show up as runs of real words, so this filter
//! vetoes a message whose longest run of consecutive dictionary words is
//! shorter than the configured minimum.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

use super::{message_text, tokens, Filter, FilterError, FilterVerdict};
use acars_common::apmessage::alias_key;
use acars_common::{APMessage, Error};

/// Common English plus aviation vocabulary
const BUILTIN_WORDS: &str = "
a about above after again against air aircraft airport all also am an and any are arrival arrive
as at back bad be because been before being below between both brake bring but by cabin call can
cancel cannot captain cargo catering change check clear come could crew customer day delay departure
did do does doing door down due during each early engine estimate fault few fine flight fly for from
fuel gate get give go going good got had has have he her here him his how i if in inop is issue it
its just know landing last late leak left light like look low maintenance make many may me meal
medical more most much must my need new next no not now of off oil ok okay on once one only or other
our out over paperwork passenger passengers people please pressure problem put ramp ready repair
replace reply request right runway said same say seat see send service she should since so some soon
still stop such system take taxi than thank thanks that the their them then there these they thing
this those through time to today too tower two under until up us use very wait want was water way
we weather well were what wheel when where which while who why will with without work would wx yes
you your
";

pub struct DictionaryFilter {
    words: HashSet<String>,
    minimum: usize,
}

impl DictionaryFilter {
    pub fn builtin(minimum: usize) -> Self {
        Self::from_words(BUILTIN_WORDS.split_whitespace(), minimum)
    }

    /// Load a word list with one word per line; blank lines and `#` comments
    /// are skipped
    pub fn from_file(path: &Path, minimum: usize) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read dictionary {}: {}", path.display(), e))
        })?;
        let words = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        Ok(Self::from_words(words, minimum))
    }

    fn from_words<'a>(words: impl Iterator<Item = &'a str>, minimum: usize) -> Self {
        Self {
            words: words.map(|w| w.to_uppercase()).collect(),
            minimum,
        }
    }

    /// Length of the longest run of consecutive dictionary words in `text`
    pub fn longest_phrase(&self, text: &str) -> usize {
        let mut longest = 0;
        let mut current = 0;
        // Bare numbers neither extend nor break a run
        for token in tokens(text).into_iter().filter(|t| !t.chars().all(char::is_numeric)) {
            if self.words.contains(&token) {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        longest
    }
}

#[async_trait]
impl Filter for DictionaryFilter {
    fn name(&self) -> &'static str {
        "DictionaryPhraseLengthMinimum"
    }

    async fn evaluate(&self, message: &APMessage) -> Result<FilterVerdict, FilterError> {
        let text = message_text(message)
            .ok_or_else(|| FilterError::MissingField(alias_key("MessageText")))?;
        let longest = self.longest_phrase(&text);
        if longest < self.minimum {
            Ok(FilterVerdict::veto(format!(
                "longest dictionary phrase has {} words, need {}",
                longest, self.minimum
            )))
        } else {
            Ok(FilterVerdict::pass())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn message(text: &str) -> APMessage {
        let mut m = APMessage::new();
        m.set_alias("MessageText", text);
        m
    }

    #[test]
    fn test_longest_phrase_counts_consecutive_words() {
        let filter = DictionaryFilter::builtin(3);
        assert_eq!(filter.longest_phrase("PLEASE SEND MAINTENANCE TO GATE B12"), 5);
        assert_eq!(filter.longest_phrase("POSN N47123W122456,KSEA,1234"), 0);
        assert_eq!(filter.longest_phrase("FUEL 123 ON BOARD"), 2);
    }

    #[tokio::test]
    async fn test_machine_text_is_vetoed() {
        let filter = DictionaryFilter::builtin(3);
        let verdict = filter.evaluate(&message("/PS12345,N47W122,350,M52")).await.unwrap();
        assert!(verdict.filtered);

        let verdict = filter
            .evaluate(&message("Need a wheel chair at the gate please"))
            .await
            .unwrap();
        assert!(!verdict.filtered);
    }

    #[tokio::test]
    async fn test_missing_text_is_error() {
        let filter = DictionaryFilter::builtin(1);
        assert!(filter.evaluate(&APMessage::new()).await.is_err());
    }

    #[test]
    fn test_custom_word_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# custom\nalpha\nBRAVO\n\ncharlie").unwrap();
        let filter = DictionaryFilter::from_file(file.path(), 2).unwrap();
        assert_eq!(filter.longest_phrase("alpha bravo charlie the"), 3);
    }

    #[test]
    fn test_missing_word_list_is_config_error() {
        let result = DictionaryFilter::from_file(Path::new("/nonexistent/words.txt"), 2);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
