use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::FetchError, model::Coordinates};

use super::{FetchOptions, WeatherFetcher, truncate_body};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const ONE_CALL_PATH: &str = "/data/3.0/onecall";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// OpenWeather One Call 3.0 client.
#[derive(Debug, Clone)]
pub struct OpenWeatherFetcher {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

impl OpenWeatherFetcher {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherFetcher {
    async fn fetch(
        &self,
        coordinates: Coordinates,
        options: &FetchOptions,
    ) -> Result<OneCallPayload, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        let url = format!("{}{}", self.base_url, ONE_CALL_PATH);

        tracing::debug!(%coordinates, units = %options.units, "requesting One Call forecast");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", coordinates.latitude().to_string()),
                ("lon", coordinates.longitude().to_string()),
                ("appid", api_key.to_string()),
                ("units", options.units.as_str().to_string()),
                ("lang", options.language.clone()),
                ("exclude", "minutely,alerts".to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "One Call request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneCallPayload {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub timezone: String,
    pub current: OwCurrent,
    #[serde(default)]
    pub hourly: Vec<OwHourly>,
    #[serde(default)]
    pub daily: Vec<OwDaily>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCondition {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwCurrent {
    pub dt: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: i64,
    pub humidity: i64,
    #[serde(default)]
    pub clouds: i64,
    #[serde(default)]
    pub uvi: f64,
    /// Meters; the service omits it above its 10 km ceiling.
    #[serde(default = "max_visibility")]
    pub visibility: i64,
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_deg: i64,
    #[serde(default)]
    pub weather: Vec<OwCondition>,
}

fn max_visibility() -> i64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwHourly {
    pub dt: i64,
    pub temp: f64,
    #[serde(default)]
    pub weather: Vec<OwCondition>,
    #[serde(default)]
    pub pop: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwTempRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwDaily {
    pub dt: i64,
    pub temp: OwTempRange,
    #[serde(default)]
    pub weather: Vec<OwCondition>,
    #[serde(default)]
    pub pop: f64,
    #[serde(default)]
    pub humidity: i64,
    #[serde(default)]
    pub wind_speed: f64,
}
