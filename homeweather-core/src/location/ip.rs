use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{model::Coordinates, store::PreferenceStore};

use super::{LocationProvider, Permission, ProviderFailure};

pub const DEFAULT_LOOKUP_URL: &str = "http://ip-api.com/json/?fields=status,message,lat,lon";

const LAST_FIX_LAT: &str = "last_fix_lat";
const LAST_FIX_LON: &str = "last_fix_lon";

/// Positions the machine by its public IP address.
///
/// The permission signal comes from configuration. Every successful fix is
/// written to the preference store and served back as the last known fix.
#[derive(Debug, Clone)]
pub struct IpLocationProvider {
    enabled: bool,
    lookup_url: String,
    store: Arc<dyn PreferenceStore>,
    http: Client,
}

impl IpLocationProvider {
    pub fn new(enabled: bool, lookup_url: impl Into<String>, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            enabled,
            lookup_url: lookup_url.into(),
            store,
            http: Client::new(),
        }
    }

    async fn remember(&self, fix: Coordinates) {
        let saved = async {
            self.store
                .set(LAST_FIX_LAT, &fix.latitude().to_string())
                .await?;
            self.store
                .set(LAST_FIX_LON, &fix.longitude().to_string())
                .await
        };

        if let Err(e) = saved.await {
            tracing::warn!(error = %e, "failed to remember location fix");
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lon: Option<f64>,
}

#[async_trait]
impl LocationProvider for IpLocationProvider {
    async fn check_permission(&self) -> Permission {
        if self.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn current_fix(&self, timeout: Duration) -> Result<Option<Coordinates>, ProviderFailure> {
        if !self.enabled {
            return Err(ProviderFailure::PermissionRevoked);
        }

        let res = self
            .http
            .get(&self.lookup_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderFailure::Unavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(ProviderFailure::Unavailable(format!(
                "lookup answered with status {}",
                res.status()
            )));
        }

        let body: LookupResponse = res
            .json()
            .await
            .map_err(|e| ProviderFailure::Unavailable(e.to_string()))?;

        if body.status.as_deref().is_some_and(|s| s != "success") {
            return Err(ProviderFailure::Unavailable(
                body.message.unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        let fix = match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon).ok(),
            _ => None,
        };

        if let Some(fix) = fix {
            self.remember(fix).await;
        }
        Ok(fix)
    }

    async fn last_known_fix(&self) -> Option<Coordinates> {
        let lat = self.store.get(LAST_FIX_LAT).await.ok().flatten()?;
        let lon = self.store.get(LAST_FIX_LON).await.ok().flatten()?;
        Coordinates::parse(&lat, &lon).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn fix_is_remembered_as_last_known() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success", "lat": 49.1951, "lon": 16.6068
            })))
            .mount(&server)
            .await;

        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryStore::new());
        let provider = IpLocationProvider::new(true, format!("{}/json", server.uri()), store);

        assert_eq!(provider.last_known_fix().await, None);
        let fix = provider.current_fix(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(fix, Coordinates::new(49.1951, 16.6068).unwrap());
        assert_eq!(provider.last_known_fix().await, Some(fix));
    }

    #[tokio::test]
    async fn failed_lookup_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail", "message": "reserved range"
            })))
            .mount(&server)
            .await;

        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryStore::new());
        let provider = IpLocationProvider::new(true, server.uri(), store);

        let err = provider.current_fix(TIMEOUT).await.unwrap_err();
        assert_eq!(err, ProviderFailure::Unavailable("reserved range".into()));
    }

    #[tokio::test]
    async fn disabled_provider_denies_permission() {
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryStore::new());
        let provider = IpLocationProvider::new(false, DEFAULT_LOOKUP_URL, store);

        assert_eq!(provider.check_permission().await, Permission::Denied);
        assert_eq!(
            provider.current_fix(TIMEOUT).await,
            Err(ProviderFailure::PermissionRevoked)
        );
    }
}
