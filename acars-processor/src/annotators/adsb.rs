//! ADS-B Exchange position annotator (RapidAPI)
//!
//! Looks the aircraft up by registration and reports haversine distance from
//! the reference point.

use async_trait::async_trait;
use serde::Deserialize;

use super::geo::{
    bearing_degrees, compass_direction, haversine_km, km_to_miles, km_to_nautical_miles,
    normalize_registration, parse_reference, Coordinate,
};
use super::tar1090::Altitude;
use super::{registration, Annotator, AnnotatorError, RecordRef};
use crate::clients::{build_http_client, trim_base_url};
use crate::config::AdsbConfig;
use crate::harness::{call_with_retry, check_status, CallError, RetryPolicy};
use crate::params;
use acars_common::{APMessage, AcarsMessage, Value, Vdlm2Message};

const FIELDS: &[&str] = &[
    "adsbReferenceGeolocation",
    "adsbAircraftHex",
    "adsbAircraftType",
    "adsbAircraftDescription",
    "adsbAircraftOwnerOperator",
    "adsbAircraftYearOfManufacture",
    "adsbAircraftLatitude",
    "adsbAircraftLongitude",
    "adsbAircraftAltimeterBarometerFeet",
    "adsbAircraftGroundSpeedKnots",
    "adsbAircraftRSSIdBm",
    "adsbAircraftDistanceKm",
    "adsbAircraftDistanceMi",
    "adsbAircraftDistanceNm",
    "adsbAircraftBearingDegrees",
    "adsbAircraftDirection",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdsbAircraft {
    #[serde(default)]
    pub hex: Option<String>,
    #[serde(default)]
    pub r: Option<String>,
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
    pub gs: Option<f64>,
    #[serde(default)]
    pub rssi: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdsbResponse {
    #[serde(default)]
    pub ac: Vec<AdsbAircraft>,
    #[serde(default)]
    pub msg: Option<String>,
}

pub struct AdsbExchangeAnnotator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    reference: Coordinate,
    reference_raw: String,
    policy: RetryPolicy,
}

impl AdsbExchangeAnnotator {
    pub fn from_config(config: &AdsbConfig) -> Result<Self, AnnotatorError> {
        if config.api_key.trim().is_empty() {
            return Err(AnnotatorError::Config("adsb api_key is required".to_string()));
        }
        let reference = parse_reference(&config.reference_geolocation)?;
        Ok(Self {
            http: build_http_client(None).map_err(|e| AnnotatorError::Config(e.to_string()))?,
            base_url: trim_base_url(&config.base_url),
            api_key: config.api_key.clone(),
            reference,
            reference_raw: format!("{},{}", reference.latitude, reference.longitude),
            policy: params::lookup_retry_policy(&config.overrides),
        })
    }

    async fn fetch(&self, normalized: &str) -> Result<AdsbResponse, CallError> {
        let url = format!("{}/v2/registration/{}/", self.base_url, normalized);
        let (http, api_key) = (&self.http, self.api_key.as_str());
        call_with_retry("adsbexchange registration", &self.policy, || {
            let url = url.clone();
            async move {
                let response = http.get(url).header("x-rapidapi-key", api_key).send().await?;
                let response = check_status(response).await?;
                Ok(response.json::<AdsbResponse>().await?)
            }
        })
        .await
    }

    async fn annotate(&self, record: RecordRef<'_>) -> Result<APMessage, AnnotatorError> {
        let normalized = normalize_registration(&registration(record)?);
        let response = self.fetch(&normalized).await?;
        let aircraft = response
            .ac
            .first()
            .ok_or_else(|| AnnotatorError::AircraftNotFound(normalized.clone()))?;

        let mut out = APMessage::new();
        out.insert("adsbReferenceGeolocation", self.reference_raw.as_str());
        out.insert("adsbAircraftHex", aircraft.hex.clone());
        out.insert("adsbAircraftType", aircraft.t.clone());
        out.insert("adsbAircraftDescription", aircraft.desc.clone());
        out.insert("adsbAircraftOwnerOperator", aircraft.own_op.clone());
        out.insert("adsbAircraftYearOfManufacture", aircraft.year.clone());
        out.insert("adsbAircraftLatitude", aircraft.lat);
        out.insert("adsbAircraftLongitude", aircraft.lon);
        out.insert(
            "adsbAircraftAltimeterBarometerFeet",
            aircraft.alt_baro.as_ref().map(Altitude::to_value).unwrap_or(Value::Null),
        );
        out.insert("adsbAircraftGroundSpeedKnots", aircraft.gs);
        out.insert("adsbAircraftRSSIdBm", aircraft.rssi);

        if let (Some(lat), Some(lon)) = (aircraft.lat, aircraft.lon) {
            let position = Coordinate::new(lat, lon);
            let km = haversine_km(self.reference, position);
            let bearing = bearing_degrees(self.reference, position);
            out.insert("adsbAircraftDistanceKm", km);
            out.insert("adsbAircraftDistanceMi", km_to_miles(km));
            out.insert("adsbAircraftDistanceNm", km_to_nautical_miles(km));
            out.insert("adsbAircraftBearingDegrees", bearing);
            out.insert("adsbAircraftDirection", compass_direction(bearing));
        }
        Ok(out)
    }
}

#[async_trait]
impl Annotator for AdsbExchangeAnnotator {
    fn name(&self) -> &'static str {
        "ADS-B Exchange"
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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve() -> String {
        let router = Router::new().route(
            "/v2/registration/:reg/",
            get(|Path(reg): Path<String>, headers: HeaderMap| async move {
                if headers.get("x-rapidapi-key").map(|v| v.as_bytes()) != Some(b"secret".as_slice()) {
                    return Json(json!({ "ac": [], "msg": "unauthorized" }));
                }
                if reg == "n123ab" {
                    Json(json!({
                        "ac": [{"hex": "a1b2c3", "r": "N123AB", "t": "A320",
                                "desc": "AIRBUS A-320", "ownOp": "Example Air Lines", "year": "2004",
                                "lat": 45.5898, "lon": -122.5951, "alt_baro": 30000, "gs": 440.5,
                                "rssi": -18.4}],
                        "msg": "No error"
                    }))
                } else {
                    Json(json!({ "ac": [], "msg": "No error" }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn annotator(base_url: String) -> AdsbExchangeAnnotator {
        AdsbExchangeAnnotator::from_config(&AdsbConfig {
            api_key: "secret".to_string(),
            base_url,
            reference_geolocation: "47.4502,-122.3088".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_adds_position_and_distance() {
        let annotator = annotator(serve().await);
        let message = AcarsMessage {
            tail: Some(".N123AB".to_string()),
            ..Default::default()
        };
        let out = annotator.annotate_acars(&message).await.unwrap();

        assert_eq!(out.get_as_string("adsbAircraftType"), "A320");
        assert_eq!(out.get_as_float("adsbAircraftGroundSpeedKnots"), 440.5);
        assert_eq!(out.get_as_string("adsbAircraftDescription"), "AIRBUS A-320");
        assert_eq!(out.get_as_string("adsbAircraftOwnerOperator"), "Example Air Lines");
        assert_eq!(out.get_as_string("adsbAircraftYearOfManufacture"), "2004");
        assert_eq!(out.get_as_float("adsbAircraftRSSIdBm"), -18.4);
        let km = out.get_as_float("adsbAircraftDistanceKm");
        assert!((km - 208.0).abs() < 3.0, "distance {}", km);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let annotator = annotator(serve().await);
        let message = AcarsMessage {
            tail: Some("N000".to_string()),
            ..Default::default()
        };
        let result = annotator.annotate_acars(&message).await;
        assert!(matches!(result, Err(AnnotatorError::AircraftNotFound(_))));
    }

    #[test]
    fn test_requires_api_key() {
        let result = AdsbExchangeAnnotator::from_config(&AdsbConfig::default());
        assert!(matches!(result, Err(AnnotatorError::Config(_))));
    }
}
