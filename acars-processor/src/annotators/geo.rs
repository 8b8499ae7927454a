//! Geodesy helpers for the position annotators

use crate::annotators::AnnotatorError;
use tracing::warn;

/// Mean earth radius for haversine, km
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
pub const KM_PER_MILE: f64 = 1.609344;
pub const KM_PER_NAUTICAL_MILE: f64 = 1.852;

/// Distance keys the distance filters read, in lookup order
pub const DISTANCE_NM_KEYS: [&str; 2] = ["tar1090AircraftDistanceNm", "adsbAircraftDistanceNm"];
pub const DISTANCE_MI_KEYS: [&str; 2] = ["tar1090AircraftDistanceMi", "adsbAircraftDistanceMi"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Parse a `"LAT,LON"` reference
///
/// An empty value falls back to `0,0` with a warning.
pub fn parse_reference(value: &str) -> Result<Coordinate, AnnotatorError> {
    if value.trim().is_empty() {
        warn!("Reference geolocation not set, using 0,0");
        return Ok(Coordinate::new(0.0, 0.0));
    }

    let invalid = || AnnotatorError::Config(format!("invalid reference geolocation {:?}, expected LAT,LON", value));
    let (lat, lon) = value.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }
    Ok(Coordinate::new(latitude, longitude))
}

/// Great-circle distance in km
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Ellipsoidal (WGS-84) distance in km using Vincenty's inverse formula
///
/// Falls back to haversine when the iteration does not converge
/// (nearly antipodal points).
pub fn vincenty_km(a: Coordinate, b: Coordinate) -> f64 {
    const A: f64 = 6_378_137.0;
    const F: f64 = 1.0 / 298.257_223_563;
    const B: f64 = A * (1.0 - F);

    let l = (b.longitude - a.longitude).to_radians();
    let u1 = ((1.0 - F) * a.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - F) * b.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..200 {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return 0.0;
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = F / 16.0 * cos_sq_alpha * (4.0 + F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * F
                * sin_alpha
                * (sigma + c * sin_sigma * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < 1e-12 {
            let u_sq = cos_sq_alpha * (A * A - B * B) / (B * B);
            let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            return B * big_a * (sigma - delta_sigma) / 1000.0;
        }
    }

    haversine_km(a, b)
}

/// Initial bearing from `a` to `b`, degrees in [0, 360)
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlon = (b.longitude - a.longitude).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// 16-point compass direction for a bearing
pub fn compass_direction(bearing: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
    ];
    let index = ((bearing.rem_euclid(360.0) / 22.5) + 0.5).floor() as usize % 16;
    POINTS[index]
}

pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

pub fn km_to_nautical_miles(km: f64) -> f64 {
    km / KM_PER_NAUTICAL_MILE
}

/// Registration lookup key: `.`, spaces and `-` removed, lowercased
pub fn normalize_registration(registration: &str) -> String {
    registration
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}
