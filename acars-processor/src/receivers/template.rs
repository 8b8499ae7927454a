//! `{{ key }}` placeholder rendering for receiver bodies
//!
//! - `{{ ACARSProcessor.TailCode }}` inserts the value's display form
//!   (missing keys and nulls render as empty)
//! - a leading `.` on the key is accepted (`{{ .ACARSProcessor.TailCode }}`)
//! - `{{ key | json }}` inserts the value JSON-encoded, for JSON bodies

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use acars_common::{APMessage, Value};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.?([^{}|\s]+)\s*(?:\|\s*(json)\s*)?\}\}").expect("static regex is valid")
});

pub fn render(template: &str, message: &APMessage) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let value = message.get(&caps[1]).cloned().unwrap_or(Value::Null);
            if caps.get(2).is_some() {
                serde_json::to_string(&value).unwrap_or_default()
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> APMessage {
        let mut m = APMessage::new();
        m.set_alias("TailCode", "N123AB");
        m.set_alias("MessageText", "SAY \"HI\"");
        m.set_alias("FrequencyMHz", 131.55);
        m.set_alias("FlightNumber", Value::Null);
        m
    }

    #[test]
    fn test_render_plain_placeholders() {
        let out = render(
            "{{ ACARSProcessor.TailCode }} on {{.ACARSProcessor.FrequencyMHz}} MHz",
            &message(),
        );
        assert_eq!(out, "N123AB on 131.55 MHz");
    }

    #[test]
    fn test_render_missing_and_null_are_empty() {
        let out = render("[{{ nope }}][{{ ACARSProcessor.FlightNumber }}]", &message());
        assert_eq!(out, "[][]");
    }

    #[test]
    fn test_render_json_filter_escapes() {
        let out = render(
            r#"{"text": {{ ACARSProcessor.MessageText | json }}, "flight": {{ ACARSProcessor.FlightNumber | json }}}"#,
            &message(),
        );
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["text"], "SAY \"HI\"");
        assert!(parsed["flight"].is_null());
    }

    #[test]
    fn test_render_leaves_plain_text() {
        assert_eq!(render("no placeholders { here }", &message()), "no placeholders { here }");
    }
}
