//! Built-in field predicates
//!
//! Each configured slot of a `[steps.filter]` table becomes one [`Criterion`].
//! They read canonical aliases only, so they behave identically for ACARS
//! and VDLM2 records.

use async_trait::async_trait;

use super::{message_text, tokens, Filter, FilterError, FilterVerdict};
use crate::annotators::geo::{DISTANCE_MI_KEYS, DISTANCE_NM_KEYS};
use crate::config::{FilterConfig, FreetextConfig};
use acars_common::apmessage::alias_key;
use acars_common::{APMessage, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// `true`: veto blank text; `false`: veto non-blank text
    HasText(bool),
    TailCode(String),
    FlightNumber(String),
    /// Frequency in MHz, compared in whole Hz
    Frequency(f64),
    StationId(String),
    AboveMinimumSignal(f64),
    BelowMaximumSignal(f64),
    AssStatus(String),
    FromTower(bool),
    FromAircraft(bool),
    More(bool),
    AboveDistanceNm(f64),
    BelowDistanceNm(f64),
    AboveDistanceMi(f64),
    BelowDistanceMi(f64),
    FreetextTermPresent(FreetextConfig),
}

/// Criteria for every built-in slot that is set, in table order
pub fn criteria_from_config(config: &FilterConfig) -> Vec<Criterion> {
    let mut criteria = Vec::new();
    if let Some(v) = config.has_text {
        criteria.push(Criterion::HasText(v));
    }
    if let Some(v) = &config.tail_code {
        criteria.push(Criterion::TailCode(v.clone()));
    }
    if let Some(v) = &config.flight_number {
        criteria.push(Criterion::FlightNumber(v.clone()));
    }
    if let Some(v) = config.frequency {
        criteria.push(Criterion::Frequency(v));
    }
    if let Some(v) = &config.station_id {
        criteria.push(Criterion::StationId(v.clone()));
    }
    if let Some(v) = config.above_minimum_signal {
        criteria.push(Criterion::AboveMinimumSignal(v));
    }
    if let Some(v) = config.below_maximum_signal {
        criteria.push(Criterion::BelowMaximumSignal(v));
    }
    if let Some(v) = &config.ass_status {
        criteria.push(Criterion::AssStatus(v.clone()));
    }
    if let Some(v) = config.from_tower {
        criteria.push(Criterion::FromTower(v));
    }
    if let Some(v) = config.from_aircraft {
        criteria.push(Criterion::FromAircraft(v));
    }
    if let Some(v) = config.more {
        criteria.push(Criterion::More(v));
    }
    if let Some(v) = config.above_distance_nm {
        criteria.push(Criterion::AboveDistanceNm(v));
    }
    if let Some(v) = config.below_distance_nm {
        criteria.push(Criterion::BelowDistanceNm(v));
    }
    if let Some(v) = config.above_distance_mi {
        criteria.push(Criterion::AboveDistanceMi(v));
    }
    if let Some(v) = config.below_distance_mi {
        criteria.push(Criterion::BelowDistanceMi(v));
    }
    if let Some(v) = &config.freetext_term_present {
        if !v.terms.is_empty() {
            criteria.push(Criterion::FreetextTermPresent(v.clone()));
        }
    }
    criteria
}

fn required<'a>(message: &'a APMessage, alias: &str) -> Result<&'a Value, FilterError> {
    message
        .get_present(&alias_key(alias))
        .ok_or_else(|| FilterError::MissingField(alias_key(alias)))
}

fn required_str(message: &APMessage, alias: &str) -> Result<String, FilterError> {
    match required(message, alias)? {
        Value::String(s) => Ok(s.trim().to_string()),
        other => Ok(other.to_string()),
    }
}

fn required_f64(message: &APMessage, alias: &str) -> Result<f64, FilterError> {
    match required(message, alias)? {
        Value::Float(x) => Ok(*x),
        Value::Int(i) => Ok(*i as f64),
        _ => Err(FilterError::MissingField(alias_key(alias))),
    }
}

fn required_bool(message: &APMessage, alias: &str) -> Result<bool, FilterError> {
    match required(message, alias)? {
        Value::Bool(b) => Ok(*b),
        _ => Err(FilterError::MissingField(alias_key(alias))),
    }
}

/// First distance an annotator produced, if any
fn distance(message: &APMessage, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match message.get(key) {
        Some(Value::Float(x)) => Some(*x),
        Some(Value::Int(i)) => Some(*i as f64),
        _ => None,
    })
}

fn mismatch(field: &str, expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> FilterVerdict {
    FilterVerdict::veto(format!("{} {} does not match {}", field, actual, expected))
}

impl Criterion {
    fn check(&self, message: &APMessage) -> Result<FilterVerdict, FilterError> {
        let verdict = match self {
            Criterion::HasText(want_text) => {
                let text = message_text(message).unwrap_or_default();
                let has_text = !text.trim().is_empty();
                if has_text == *want_text {
                    FilterVerdict::pass()
                } else if *want_text {
                    FilterVerdict::veto("message has no text")
                } else {
                    FilterVerdict::veto("message has text")
                }
            }
            Criterion::TailCode(expected) => {
                let actual = required_str(message, "TailCode")?;
                let expected = expected.trim().trim_start_matches('.');
                if actual.eq_ignore_ascii_case(expected) {
                    FilterVerdict::pass()
                } else {
                    mismatch("tail code", expected, actual)
                }
            }
            Criterion::FlightNumber(expected) => {
                let actual = required_str(message, "FlightNumber")?;
                if actual.eq_ignore_ascii_case(expected.trim()) {
                    FilterVerdict::pass()
                } else {
                    mismatch("flight number", expected, actual)
                }
            }
            Criterion::Frequency(mhz) => {
                let expected = (mhz * 1_000_000.0).round() as i64;
                let actual = match required(message, "FrequencyHz")? {
                    Value::Int(hz) => *hz,
                    Value::Float(hz) => hz.round() as i64,
                    _ => return Err(FilterError::MissingField(alias_key("FrequencyHz"))),
                };
                if actual == expected {
                    FilterVerdict::pass()
                } else {
                    mismatch("frequency (Hz)", expected, actual)
                }
            }
            Criterion::StationId(expected) => {
                let actual = required_str(message, "StationId")?;
                if actual.eq_ignore_ascii_case(expected.trim()) {
                    FilterVerdict::pass()
                } else {
                    mismatch("station", expected, actual)
                }
            }
            Criterion::AboveMinimumSignal(minimum) => {
                let level = required_f64(message, "SignalLeveldBm")?;
                if level < *minimum {
                    FilterVerdict::veto(format!("signal {} dBm below minimum {}", level, minimum))
                } else {
                    FilterVerdict::pass()
                }
            }
            Criterion::BelowMaximumSignal(maximum) => {
                let level = required_f64(message, "SignalLeveldBm")?;
                if level > *maximum {
                    FilterVerdict::veto(format!("signal {} dBm above maximum {}", level, maximum))
                } else {
                    FilterVerdict::pass()
                }
            }
            Criterion::AssStatus(expected) => {
                let actual = required_str(message, "ASSStatus")?;
                if actual.eq_ignore_ascii_case(expected.trim()) {
                    FilterVerdict::pass()
                } else {
                    mismatch("ASS status", expected, actual)
                }
            }
            Criterion::FromTower(want) => {
                let from_tower = required_str(message, "From")? == "Tower";
                if from_tower == *want {
                    FilterVerdict::pass()
                } else {
                    FilterVerdict::veto(format!("from tower is {}", from_tower))
                }
            }
            Criterion::FromAircraft(want) => {
                let from_aircraft = required_str(message, "From")? == "Aircraft";
                if from_aircraft == *want {
                    FilterVerdict::pass()
                } else {
                    FilterVerdict::veto(format!("from aircraft is {}", from_aircraft))
                }
            }
            Criterion::More(want) => {
                let more = required_bool(message, "More")?;
                if more == *want {
                    FilterVerdict::pass()
                } else {
                    FilterVerdict::veto(format!("more flag is {}", more))
                }
            }
            Criterion::AboveDistanceNm(limit) => distance_band(message, &DISTANCE_NM_KEYS, *limit, true, "nm"),
            Criterion::BelowDistanceNm(limit) => distance_band(message, &DISTANCE_NM_KEYS, *limit, false, "nm"),
            Criterion::AboveDistanceMi(limit) => distance_band(message, &DISTANCE_MI_KEYS, *limit, true, "mi"),
            Criterion::BelowDistanceMi(limit) => distance_band(message, &DISTANCE_MI_KEYS, *limit, false, "mi"),
            Criterion::FreetextTermPresent(config) => {
                let text = tokens(
                    &message_text(message)
                        .ok_or_else(|| FilterError::MissingField(alias_key("MessageText")))?,
                );
                // Whole-token match; a multi-word term must appear as a run
                let found = config.terms.iter().find(|term| {
                    let wanted = tokens(term);
                    !wanted.is_empty() && text.windows(wanted.len()).any(|run| run == wanted.as_slice())
                });
                match (found, config.invert) {
                    (Some(term), true) => FilterVerdict::veto(format!("text contains {:?}", term)),
                    (None, false) => FilterVerdict::veto("text contains none of the freetext terms"),
                    _ => FilterVerdict::pass(),
                }
            }
        };
        Ok(verdict)
    }
}

/// Distance filters veto when no annotator produced a distance
fn distance_band(message: &APMessage, keys: &[&str], limit: f64, above: bool, unit: &str) -> FilterVerdict {
    match distance(message, keys) {
        None => FilterVerdict::veto("no aircraft distance available"),
        Some(d) if above && d < limit => {
            FilterVerdict::veto(format!("distance {:.1} {} closer than {}", d, unit, limit))
        }
        Some(d) if !above && d > limit => {
            FilterVerdict::veto(format!("distance {:.1} {} farther than {}", d, unit, limit))
        }
        Some(_) => FilterVerdict::pass(),
    }
}

#[async_trait]
impl Filter for Criterion {
    fn name(&self) -> &'static str {
        match self {
            Criterion::HasText(_) => "HasText",
            Criterion::TailCode(_) => "TailCode",
            Criterion::FlightNumber(_) => "FlightNumber",
            Criterion::Frequency(_) => "Frequency",
            Criterion::StationId(_) => "StationID",
            Criterion::AboveMinimumSignal(_) => "AboveMinimumSignal",
            Criterion::BelowMaximumSignal(_) => "BelowMaximumSignal",
            Criterion::AssStatus(_) => "ASSStatus",
            Criterion::FromTower(_) => "FromTower",
            Criterion::FromAircraft(_) => "FromAircraft",
            Criterion::More(_) => "More",
            Criterion::AboveDistanceNm(_) => "AboveDistanceNm",
            Criterion::BelowDistanceNm(_) => "BelowDistanceNm",
            Criterion::AboveDistanceMi(_) => "AboveDistanceMi",
            Criterion::BelowDistanceMi(_) => "BelowDistanceMi",
            Criterion::FreetextTermPresent(_) => "FreetextTermPresent",
        }
    }

    async fn evaluate(&self, message: &APMessage) -> Result<FilterVerdict, FilterError> {
        self.check(message)
    }
}
