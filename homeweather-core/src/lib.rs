//! Core library for the `homeweather` CLI.
//!
//! This crate defines:
//! - Shared domain models (coordinates, home location, weather snapshots)
//! - Current-location resolution with its fallback chain
//! - Debounced, cancellable place search
//! - The load/refresh state machine behind the weather view
//! - OpenWeather adapters for weather and geocoding
//! - Configuration and persisted preferences
//!
//! It is used by `homeweather-cli`, but the state machines are independent of
//! any particular front end.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod geocode;
pub mod location;
pub mod mapper;
pub mod model;
pub mod provider;
pub mod search;
pub mod session;
pub mod store;

pub use acquisition::{AcquisitionSettings, AcquisitionState, AcquisitionStateMachine};
pub use config::Config;
pub use error::{CoordinateError, FetchError, GeocodeError, LocationError, StoreError};
pub use geocode::{Address, GeocodeProvider, OpenWeatherGeocoder};
pub use location::{IpLocationProvider, LocationProvider, LocationResolver, Permission};
pub use model::{
    Coordinates, CurrentConditions, DailyPoint, HomeLocation, HourlyPoint, LocationInfo,
    PlaceCandidate, ResolvedLocation, WeatherSnapshot,
};
pub use provider::{FetchOptions, OpenWeatherFetcher, Units, WeatherFetcher};
pub use search::{SearchCoordinator, SearchState};
pub use session::WeatherSession;
pub use store::{FileStore, HomeLocationStore, MemoryStore, PreferenceStore};
