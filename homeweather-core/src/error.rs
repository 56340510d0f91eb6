use thiserror::Error;

/// Hard failures of current-location resolution.
///
/// Geocoding problems never show up here; the resolver degrades to a
/// coordinate string instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("no location fix available; enable location services and try again")]
    NoFixAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("coordinate '{0}' is not a number")]
    Unparseable(String),
    #[error("coordinates out of range: {latitude}, {longitude}")]
    OutOfRange { latitude: String, longitude: String },
}

/// Failures talking to a geocoding service.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no OpenWeather API key configured")]
    MissingApiKey,
    #[error("geocoding request failed: {0}")]
    Transport(String),
    #[error("geocoding service answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode geocoding response: {0}")]
    Decode(String),
}

/// Failures producing a weather snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no OpenWeather API key configured")]
    MissingApiKey,
    #[error("weather request failed: {0}")]
    Transport(String),
    #[error("weather service answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode weather response: {0}")]
    Decode(String),
    #[error("weather data is inconsistent: {0}")]
    Mapping(String),
}

impl FetchError {
    /// Short text suitable for showing to a user.
    pub fn summary(&self) -> String {
        match self {
            FetchError::MissingApiKey => {
                "no API key configured (run `homeweather configure`)".to_string()
            }
            FetchError::Transport(_) => "could not reach the weather service".to_string(),
            FetchError::Status { status: 401, .. } => "the API key was rejected".to_string(),
            FetchError::Status { status: 429, .. } => {
                "too many requests, try again later".to_string()
            }
            FetchError::Status { status, .. } => format!("weather service error (HTTP {status})"),
            FetchError::Decode(_) => "unexpected response from the weather service".to_string(),
            FetchError::Mapping(detail) => format!("invalid weather data ({detail})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference store is corrupt: {0}")]
    Encode(#[from] serde_json::Error),
}
