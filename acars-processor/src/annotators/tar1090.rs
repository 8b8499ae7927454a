//! tar1090 position annotator
//!
//! Fetches the local receiver's `aircraft.json`, finds the aircraft by
//! normalized registration and reports where it is relative to the
//! configured reference point (Vincenty distance).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::geo::{
    bearing_degrees, compass_direction, km_to_miles, km_to_nautical_miles, normalize_registration,
    parse_reference, vincenty_km, Coordinate,
};
use super::{registration, Annotator, AnnotatorError, RecordRef};
use crate::clients::{build_http_client, trim_base_url};
use crate::config::Tar1090Config;
use crate::harness::{call_with_retry, check_status, CallError, RetryPolicy};
use crate::params;
use acars_common::{APMessage, AcarsMessage, Value, Vdlm2Message};

const FIELDS: &[&str] = &[
    "tar1090ReferenceGeolocation",
    "tar1090AircraftHex",
    "tar1090AircraftType",
    "tar1090AircraftDescription",
    "tar1090AircraftOwnerOperator",
    "tar1090AircraftYearOfManufacture",
    "tar1090AircraftLatitude",
    "tar1090AircraftLongitude",
    "tar1090AircraftAltimeterBarometerFeet",
    "tar1090AircraftRSSIdBm",
    "tar1090AircraftDistanceKm",
    "tar1090AircraftDistanceMi",
    "tar1090AircraftDistanceNm",
    "tar1090AircraftBearingDegrees",
    "tar1090AircraftDirection",
];

/// Barometric altitude: feet, or `"ground"`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Altitude {
    Feet(f64),
    Label(String),
}

impl Altitude {
    pub fn to_value(&self) -> Value {
        match self {
            Altitude::Feet(ft) => Value::Float(*ft),
            Altitude::Label(label) => Value::String(label.clone()),
        }
    }
}

/// One entry of `aircraft.json`; only fields the annotator reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tar1090Aircraft {
    #[serde(default)]
    pub hex: Option<String>,
    /// Registration
    #[serde(default)]
    pub r: Option<String>,
    /// ICAO type designator
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default, rename = "ownOp")]
    pub own_op: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub alt_baro: Option<Altitude>,
    #[serde(default)]
    pub rssi: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tar1090Snapshot {
    #[serde(default)]
    pub now: Option<f64>,
    #[serde(default)]
    pub aircraft: Vec<Tar1090Aircraft>,
}

impl Tar1090Snapshot {
    pub fn find(&self, registration: &str) -> Option<&Tar1090Aircraft> {
        let wanted = normalize_registration(registration);
        self.aircraft
            .iter()
            .find(|a| a.r.as_deref().map(normalize_registration).as_deref() == Some(wanted.as_str()))
    }
}

pub struct Tar1090Annotator {
    http: reqwest::Client,
    base_url: String,
    reference: Coordinate,
    reference_raw: String,
    policy: RetryPolicy,
}

impl Tar1090Annotator {
    pub fn from_config(config: &Tar1090Config) -> Result<Self, AnnotatorError> {
        if config.url.trim().is_empty() {
            return Err(AnnotatorError::Config("tar1090 url is required".to_string()));
        }
        let reference = parse_reference(&config.reference_geolocation)?;
        Ok(Self {
            http: build_http_client(None).map_err(|e| AnnotatorError::Config(e.to_string()))?,
            base_url: trim_base_url(&config.url),
            reference,
            reference_raw: format!("{},{}", reference.latitude, reference.longitude),
            policy: params::lookup_retry_policy(&config.overrides),
        })
    }

    async fn fetch(&self) -> Result<Tar1090Snapshot, CallError> {
        let url = format!(
            "{}/data/aircraft.json?_={}",
            self.base_url,
            acars_common::time::now().timestamp_millis()
        );
        let http = &self.http;
        call_with_retry("tar1090 aircraft.json", &self.policy, || {
            let url = url.clone();
            async move {
                let response = check_status(http.get(url).send().await?).await?;
                Ok(response.json::<Tar1090Snapshot>().await?)
            }
        })
        .await
    }

    async fn annotate(&self, record: RecordRef<'_>) -> Result<APMessage, AnnotatorError> {
        let registration = registration(record)?;
        let snapshot = self.fetch().await?;
        let aircraft = snapshot
            .find(&registration)
            .ok_or_else(|| AnnotatorError::AircraftNotFound(normalize_registration(&registration)))?;
        debug!(registration = %registration, hex = ?aircraft.hex, "tar1090 aircraft found");
        Ok(self.fields(aircraft))
    }

    fn fields(&self, aircraft: &Tar1090Aircraft) -> APMessage {
        let mut out = APMessage::new();
        out.insert("tar1090ReferenceGeolocation", self.reference_raw.as_str());
        out.insert("tar1090AircraftHex", aircraft.hex.clone());
        out.insert("tar1090AircraftType", aircraft.t.clone());
        out.insert("tar1090AircraftDescription", aircraft.desc.clone());
        out.insert("tar1090AircraftOwnerOperator", aircraft.own_op.clone());
        out.insert("tar1090AircraftYearOfManufacture", aircraft.year.clone());
        out.insert("tar1090AircraftLatitude", aircraft.lat);
        out.insert("tar1090AircraftLongitude", aircraft.lon);
        out.insert(
            "tar1090AircraftAltimeterBarometerFeet",
            aircraft.alt_baro.as_ref().map(Altitude::to_value).unwrap_or(Value::Null),
        );
        out.insert("tar1090AircraftRSSIdBm", aircraft.rssi);

        if let (Some(lat), Some(lon)) = (aircraft.lat, aircraft.lon) {
            let position = Coordinate::new(lat, lon);
            let km = vincenty_km(self.reference, position);
            let bearing = bearing_degrees(self.reference, position);
            out.insert("tar1090AircraftDistanceKm", km);
            out.insert("tar1090AircraftDistanceMi", km_to_miles(km));
            out.insert("tar1090AircraftDistanceNm", km_to_nautical_miles(km));
            out.insert("tar1090AircraftBearingDegrees", bearing);
            out.insert("tar1090AircraftDirection", compass_direction(bearing));
        }
        out
    }
}

#[async_trait]
impl Annotator for Tar1090Annotator {
    fn name(&self) -> &'static str {
        "tar1090"
    }

    fn default_fields(&self) -> Vec<String> {
        FIELDS.iter().map(|f| f.to_string()).collect()
    }

    async fn annotate_acars(&self, message: &AcarsMessage) -> Result<APMessage, AnnotatorError> {
        self.annotate(RecordRef::Acars(message)).await
    }

    async fn annotate_vdlm2(&self, message: &Vdlm2Message) -> Result<APMessage, AnnotatorError> {
        self.annotate(RecordRef::Vdlm2(message)).await
    }
}
