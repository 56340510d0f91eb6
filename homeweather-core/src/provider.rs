use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{error::FetchError, model::Coordinates};

pub mod openweather;

pub use openweather::{OneCallPayload, OpenWeatherFetcher};

/// Unit system requested from the weather service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    /// Factor turning the service's wind speed into km/h.
    pub fn wind_to_kmh(&self) -> f64 {
        match self {
            Units::Metric | Units::Standard => 3.6,
            Units::Imperial => 1.609_344,
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Standard]
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub units: Units,
    /// Language code for condition descriptions, e.g. "cz".
    pub language: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            language: "cz".to_string(),
        }
    }
}

/// Source of raw weather payloads for a coordinate pair.
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn fetch(
        &self,
        coordinates: Coordinates,
        options: &FetchOptions,
    ) -> Result<OneCallPayload, FetchError>;
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_as_str_roundtrip() {
        for units in Units::all() {
            let parsed = Units::try_from(units.as_str()).expect("roundtrip should succeed");
            assert_eq!(*units, parsed);
        }
    }

    #[test]
    fn unknown_units_error() {
        let err = Units::try_from("kelvinish").unwrap_err();
        assert!(err.to_string().contains("Unknown units"));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "ř".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
    }
}
