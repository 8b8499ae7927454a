//! Link templates used to derive the canonical link aliases
//!
//! Tail-number links are `prefix + tail`; the translate link appends the
//! URL-encoded message text.

use serde::{Deserialize, Serialize};

use crate::apmessage::{APMessage, Value};

/// Configurable link prefixes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkTemplates {
    pub tracking: String,
    pub photos: String,
    pub thumbnail: String,
    pub image: String,
    pub translate: String,
    pub acars_drama: String,
}

impl Default for LinkTemplates {
    fn default() -> Self {
        Self {
            tracking: "https://globe.adsbexchange.com/?reg=".to_string(),
            photos: "https://www.jetphotos.com/registration/".to_string(),
            thumbnail: "https://www.jetphotos.com/showphotos.php?regsearch=".to_string(),
            image: "https://www.planespotters.net/photos/reg/".to_string(),
            translate: "https://translate.google.com/?sl=auto&tl=en&op=translate&text=".to_string(),
            acars_drama: "https://acarsdrama.com/tail/".to_string(),
        }
    }
}

impl LinkTemplates {
    /// Set the link aliases on `out`
    ///
    /// Tail links are null when the tail is empty; the translate link is null
    /// when the text is empty.
    pub fn apply(&self, tail: &str, text: &str, out: &mut APMessage) {
        let tail_link = |prefix: &str| -> Value {
            if tail.is_empty() {
                Value::Null
            } else {
                Value::String(format!("{}{}", prefix, tail))
            }
        };

        out.set_alias("TrackingLink", tail_link(&self.tracking));
        out.set_alias("PhotosLink", tail_link(&self.photos));
        out.set_alias("ThumbnailLink", tail_link(&self.thumbnail));
        out.set_alias("ImageLink", tail_link(&self.image));
        out.set_alias("ACARSDramaTailNumberLink", tail_link(&self.acars_drama));

        let translate = if text.trim().is_empty() {
            Value::Null
        } else {
            Value::String(format!("{}{}", self.translate, urlencoding::encode(text)))
        };
        out.set_alias("TranslateLink", translate);
    }
}
