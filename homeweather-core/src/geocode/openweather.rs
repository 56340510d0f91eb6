use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::GeocodeError,
    model::Coordinates,
    provider::{openweather::DEFAULT_BASE_URL, truncate_body},
};

use super::{Address, GeocodeProvider};

const REVERSE_PATH: &str = "/geo/1.0/reverse";
const DIRECT_PATH: &str = "/geo/1.0/direct";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// OpenWeather Geocoding API client.
#[derive(Debug, Clone)]
pub struct OpenWeatherGeocoder {
    /// Without a key every lookup fails with [`GeocodeError::MissingApiKey`].
    api_key: Option<String>,
    base_url: String,
    /// Preferred key into `local_names`, e.g. "cs".
    language: String,
    http: Client,
}

impl OpenWeatherGeocoder {
    pub fn new(api_key: Option<String>, language: impl Into<String>) -> Self {
        Self::with_base_url(api_key, language, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        language: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: geo_language(&language.into()),
            http,
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<GeoEntry>, GeocodeError> {
        let api_key = self.api_key.as_deref().ok_or(GeocodeError::MissingApiKey)?;
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", api_key)])
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| GeocodeError::Decode(e.to_string()))
    }

    fn to_address(&self, entry: GeoEntry) -> Address {
        let locality = entry
            .local_names
            .as_ref()
            .and_then(|names| names.get(&self.language))
            .cloned()
            .or(entry.name);

        Address {
            locality,
            sub_admin_area: None,
            admin_area: entry.state,
            country: entry.country,
            coordinates: Coordinates::new(entry.lat, entry.lon).ok(),
        }
    }
}

/// Weather descriptions use "cz" while place names are keyed by ISO 639-1.
fn geo_language(language: &str) -> String {
    match language.to_lowercase().as_str() {
        "cz" => "cs".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl GeocodeProvider for OpenWeatherGeocoder {
    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<Address>, GeocodeError> {
        let entries = self
            .get(
                REVERSE_PATH,
                &[
                    ("lat", coordinates.latitude().to_string()),
                    ("lon", coordinates.longitude().to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        Ok(entries.into_iter().next().map(|e| self.to_address(e)))
    }

    async fn forward_geocode(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Address>, GeocodeError> {
        let entries = self
            .get(
                DIRECT_PATH,
                &[("q", query.to_string()), ("limit", limit.to_string())],
            )
            .await?;

        Ok(entries
            .into_iter()
            .take(limit)
            .map(|e| self.to_address(e))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct GeoEntry {
    name: Option<String>,
    local_names: Option<HashMap<String, String>>,
    lat: f64,
    lon: f64,
    country: Option<String>,
    state: Option<String>,
}
