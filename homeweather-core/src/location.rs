//! Resolving the device's current location into coordinates and a name.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    error::LocationError,
    geocode::GeocodeProvider,
    model::{Coordinates, ResolvedLocation},
};

pub mod ip;

pub use ip::IpLocationProvider;

pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Why a positioning request produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    #[error("location permission was revoked")]
    PermissionRevoked,
    #[error("positioning failed: {0}")]
    Unavailable(String),
}

/// A device positioning source.
#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn check_permission(&self) -> Permission;

    /// Best-effort high accuracy fix, waiting at most `timeout`.
    async fn current_fix(&self, timeout: Duration) -> Result<Option<Coordinates>, ProviderFailure>;

    async fn last_known_fix(&self) -> Option<Coordinates>;
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    provider: Arc<dyn LocationProvider>,
    geocoder: Arc<dyn GeocodeProvider>,
    fix_timeout: Duration,
}

impl LocationResolver {
    pub fn new(provider: Arc<dyn LocationProvider>, geocoder: Arc<dyn GeocodeProvider>) -> Self {
        Self {
            provider,
            geocoder,
            fix_timeout: DEFAULT_FIX_TIMEOUT,
        }
    }

    pub fn with_fix_timeout(mut self, timeout: Duration) -> Self {
        self.fix_timeout = timeout;
        self
    }

    /// Current fix, then last known fix, then a reverse-geocoded name with
    /// the formatted coordinates as the final fallback. Only a missing
    /// permission or a missing fix is an error.
    pub async fn resolve_current_location(&self) -> Result<ResolvedLocation, LocationError> {
        if self.provider.check_permission().await == Permission::Denied {
            warn!("location permission denied");
            return Err(LocationError::PermissionDenied);
        }

        let coordinates = match self.current_fix().await? {
            Some(fix) => fix,
            None => self.last_known_fix().await?,
        };

        let display_name = match self.place_name(coordinates).await {
            Some(name) => name,
            None => {
                debug!(%coordinates, "using coordinates as location name");
                coordinates.to_string()
            }
        };

        info!(%coordinates, name = %display_name, "resolved current location");
        Ok(ResolvedLocation {
            coordinates,
            display_name,
        })
    }

    async fn current_fix(&self) -> Result<Option<Coordinates>, LocationError> {
        let request = self.provider.current_fix(self.fix_timeout);
        match tokio::time::timeout(self.fix_timeout, request).await {
            Ok(Ok(Some(fix))) => Ok(Some(fix)),
            Ok(Ok(None)) => {
                debug!("no current fix");
                Ok(None)
            }
            Ok(Err(ProviderFailure::PermissionRevoked)) => Err(LocationError::PermissionDenied),
            Ok(Err(e)) => {
                debug!(error = %e, "current fix failed");
                Ok(None)
            }
            Err(_) => {
                debug!(timeout = ?self.fix_timeout, "current fix timed out");
                Ok(None)
            }
        }
    }

    async fn last_known_fix(&self) -> Result<Coordinates, LocationError> {
        match self.provider.last_known_fix().await {
            Some(fix) => {
                debug!(%fix, "using last known fix");
                Ok(fix)
            }
            None => {
                warn!("no location fix available");
                Err(LocationError::NoFixAvailable)
            }
        }
    }

    async fn place_name(&self, coordinates: Coordinates) -> Option<String> {
        match self.geocoder.reverse_geocode(coordinates).await {
            Ok(address) => address.as_ref().and_then(|a| a.place_name()).map(String::from),
            Err(e) => {
                debug!(error = %e, "reverse geocoding failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::GeocodeError,
        geocode::{Address, OpenWeatherGeocoder},
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeDevice {
        permission: Permission,
        current: Result<Option<Coordinates>, ProviderFailure>,
        current_delay: Option<Duration>,
        last_known: Option<Coordinates>,
        fix_requests: AtomicUsize,
    }

    impl FakeDevice {
        fn with_fix(fix: Option<Coordinates>) -> Self {
            Self {
                permission: Permission::Granted,
                current: Ok(fix),
                current_delay: None,
                last_known: None,
                fix_requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LocationProvider for FakeDevice {
        async fn check_permission(&self) -> Permission {
            self.permission
        }

        async fn current_fix(
            &self,
            _timeout: Duration,
        ) -> Result<Option<Coordinates>, ProviderFailure> {
            self.fix_requests.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.current_delay {
                tokio::time::sleep(delay).await;
            }
            self.current.clone()
        }

        async fn last_known_fix(&self) -> Option<Coordinates> {
            self.fix_requests.fetch_add(1, Ordering::SeqCst);
            self.last_known
        }
    }

    #[derive(Debug, Default)]
    struct FakeReverse {
        answer: Mutex<Option<Result<Option<Address>, GeocodeError>>>,
    }

    impl FakeReverse {
        fn answering(answer: Result<Option<Address>, GeocodeError>) -> Self {
            Self {
                answer: Mutex::new(Some(answer)),
            }
        }
    }

    #[async_trait]
    impl GeocodeProvider for FakeReverse {
        async fn reverse_geocode(
            &self,
            _coordinates: Coordinates,
        ) -> Result<Option<Address>, GeocodeError> {
            self.answer
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(None))
        }

        async fn forward_geocode(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<Address>, GeocodeError> {
            Ok(Vec::new())
        }
    }

    fn prague() -> Coordinates {
        Coordinates::new(50.075538, 14.437800).unwrap()
    }

    fn resolver(device: FakeDevice, geocoder: FakeReverse) -> (LocationResolver, Arc<FakeDevice>) {
        let device = Arc::new(device);
        let resolver = LocationResolver::new(device.clone(), Arc::new(geocoder));
        (resolver, device)
    }

    #[tokio::test]
    async fn permission_denied_requests_no_fix() {
        let mut device = FakeDevice::with_fix(Some(prague()));
        device.permission = Permission::Denied;
        let (resolver, device) = resolver(device, FakeReverse::default());

        let err = resolver.resolve_current_location().await.unwrap_err();

        assert_eq!(err, LocationError::PermissionDenied);
        assert_eq!(device.fix_requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn uses_reverse_geocoded_name() {
        let address = Address {
            locality: None,
            sub_admin_area: Some("Hlavní město Praha".into()),
            admin_area: Some("Praha".into()),
            ..Address::default()
        };
        let (resolver, _) = resolver(
            FakeDevice::with_fix(Some(prague())),
            FakeReverse::answering(Ok(Some(address))),
        );

        let resolved = resolver.resolve_current_location().await.unwrap();

        assert_eq!(resolved.display_name, "Hlavní město Praha");
        assert_eq!(resolved.coordinates, prague());
    }

    #[tokio::test]
    async fn geocoding_failure_falls_back_to_coordinates() {
        let (resolver, _) = resolver(
            FakeDevice::with_fix(Some(prague())),
            FakeReverse::answering(Err(GeocodeError::Transport("offline".into()))),
        );

        let resolved = resolver.resolve_current_location().await.unwrap();

        assert_eq!(resolved.display_name, "50.0755, 14.4378");
    }

    #[tokio::test]
    async fn keyless_geocoder_falls_back_to_coordinates() {
        let device = Arc::new(FakeDevice::with_fix(Some(prague())));
        let geocoder = Arc::new(OpenWeatherGeocoder::with_base_url(
            None,
            "cz",
            "http://127.0.0.1:9",
        ));
        let resolver = LocationResolver::new(device, geocoder);

        let resolved = resolver.resolve_current_location().await.unwrap();

        assert_eq!(resolved.display_name, "50.0755, 14.4378");
        assert_eq!(resolved.coordinates, prague());
    }

    #[tokio::test]
    async fn keyless_geocoder_keeps_permission_error() {
        let mut device = FakeDevice::with_fix(Some(prague()));
        device.permission = Permission::Denied;
        let geocoder = Arc::new(OpenWeatherGeocoder::new(None, "cz"));
        let resolver = LocationResolver::new(Arc::new(device), geocoder);

        let err = resolver.resolve_current_location().await.unwrap_err();

        assert_eq!(err, LocationError::PermissionDenied);
    }

    #[tokio::test]
    async fn nameless_address_falls_back_to_coordinates() {
        let (resolver, _) = resolver(
            FakeDevice::with_fix(Some(prague())),
            FakeReverse::answering(Ok(Some(Address::default()))),
        );

        let resolved = resolver.resolve_current_location().await.unwrap();

        assert_eq!(resolved.display_name, "50.0755, 14.4378");
    }

    #[tokio::test]
    async fn falls_back_to_last_known_fix() {
        let mut device = FakeDevice::with_fix(None);
        device.last_known = Some(prague());
        let (resolver, _) = resolver(device, FakeReverse::default());

        let resolved = resolver.resolve_current_location().await.unwrap();

        assert_eq!(resolved.coordinates, prague());
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_last_known_fix() {
        let mut device = FakeDevice::with_fix(None);
        device.current = Err(ProviderFailure::Unavailable("gps off".into()));
        device.last_known = Some(prague());
        let (resolver, _) = resolver(device, FakeReverse::default());

        assert!(resolver.resolve_current_location().await.is_ok());
    }

    #[tokio::test]
    async fn revoked_permission_is_hard_failure() {
        let mut device = FakeDevice::with_fix(None);
        device.current = Err(ProviderFailure::PermissionRevoked);
        device.last_known = Some(prague());
        let (resolver, _) = resolver(device, FakeReverse::default());

        let err = resolver.resolve_current_location().await.unwrap_err();
        assert_eq!(err, LocationError::PermissionDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fix_times_out_to_last_known() {
        let mut device = FakeDevice::with_fix(Some(Coordinates::new(1.0, 1.0).unwrap()));
        device.current_delay = Some(Duration::from_secs(60));
        device.last_known = Some(prague());
        let (resolver, _) = resolver(device, FakeReverse::default());
        let resolver = resolver.with_fix_timeout(Duration::from_secs(5));

        let resolved = resolver.resolve_current_location().await.unwrap();

        assert_eq!(resolved.coordinates, prague());
    }

    #[tokio::test]
    async fn no_fix_at_all_fails() {
        let (resolver, _) = resolver(FakeDevice::with_fix(None), FakeReverse::default());

        let err = resolver.resolve_current_location().await.unwrap_err();
        assert_eq!(err, LocationError::NoFixAvailable);
    }

    #[tokio::test]
    async fn any_valid_fix_gets_non_empty_name_without_geocoder() {
        for (lat, lon) in [(-90.0, -180.0), (0.0, 0.0), (89.99999, 179.99999), (-33.8688, 151.2093)] {
            let fix = Coordinates::new(lat, lon).unwrap();
            let (resolver, _) = resolver(
                FakeDevice::with_fix(Some(fix)),
                FakeReverse::answering(Err(GeocodeError::Decode("bad".into()))),
            );

            let resolved = resolver.resolve_current_location().await.unwrap();
            assert_eq!(resolved.display_name, fix.to_string());
            assert!(!resolved.display_name.is_empty());
        }
    }
}
