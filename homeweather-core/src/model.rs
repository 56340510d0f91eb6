use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !in_range {
            return Err(CoordinateError::OutOfRange {
                latitude: latitude.to_string(),
                longitude: longitude.to_string(),
            });
        }

        Ok(Self { latitude, longitude })
    }

    /// Parse the textual form used by persisted preferences.
    pub fn parse(latitude: &str, longitude: &str) -> Result<Self, CoordinateError> {
        let lat = parse_component(latitude)?;
        let lon = parse_component(longitude)?;
        Self::new(lat, lon)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

fn parse_component(raw: &str) -> Result<f64, CoordinateError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CoordinateError::Unparseable(raw.to_string()))
}

/// Formats as `"50.0755, 14.4378"`, the fallback display name of a fix.
impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// The user's chosen location, stored as text like the preference keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeLocation {
    pub name: String,
    pub latitude: String,
    pub longitude: String,
}

impl HomeLocation {
    /// Returns `None` when `name` is blank.
    pub fn new(
        name: impl Into<String>,
        latitude: impl Into<String>,
        longitude: impl Into<String>,
    ) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return None;
        }

        Some(Self {
            name,
            latitude: latitude.into(),
            longitude: longitude.into(),
        })
    }

    pub fn from_resolved(resolved: &ResolvedLocation) -> Self {
        Self::from_parts(&resolved.display_name, resolved.coordinates)
    }

    pub fn from_candidate(candidate: &PlaceCandidate) -> Self {
        Self::from_parts(&candidate.primary_name, candidate.coordinates)
    }

    fn from_parts(name: &str, coordinates: Coordinates) -> Self {
        Self {
            name: name.to_string(),
            latitude: coordinates.latitude().to_string(),
            longitude: coordinates.longitude().to_string(),
        }
    }

    pub fn coordinates(&self) -> Result<Coordinates, CoordinateError> {
        Coordinates::parse(&self.latitude, &self.longitude)
    }
}

/// Outcome of resolving the device's current position.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub display_name: String,
}

/// One forward-geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub display_name: String,
    pub primary_name: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub country: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// °C
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    pub icon_code: String,
    pub humidity: u8,
    /// hPa
    pub pressure: u32,
    pub clouds: u8,
    /// km/h
    pub wind_speed: f64,
    pub wind_direction: u16,
    pub visibility_km: u32,
    pub uv_index: f64,
    /// Epoch seconds.
    pub observed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub timestamp: i64,
    pub temperature: f64,
    pub description: String,
    pub icon_code: String,
    pub precipitation_chance: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: i64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub description: String,
    pub icon_code: String,
    pub precipitation_chance: u8,
    pub humidity: u8,
    pub wind_speed: f64,
}

/// Weather for one location at one point in time. Replaced wholesale on
/// every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

impl WeatherSnapshot {
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.current.observed_at, 0)
    }
}
