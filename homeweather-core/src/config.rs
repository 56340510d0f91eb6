use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    acquisition::AcquisitionSettings,
    location::ip::DEFAULT_LOOKUP_URL,
    provider::{FetchOptions, Units},
    search::{DEFAULT_DEBOUNCE, DEFAULT_RESULT_LIMIT},
};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub units: Units,
    /// Language of condition descriptions, e.g. "cz" or "en".
    pub language: String,
    /// Country label shown next to the home location.
    pub country: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            units: Units::Metric,
            language: "cz".to_string(),
            country: "CZ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub debounce_ms: u64,
    pub limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    /// Whether positioning is allowed at all.
    pub enabled: bool,
    pub fix_timeout_secs: u64,
    pub lookup_url: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fix_timeout_secs: 10,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
        }
    }
}

impl LocationSettings {
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_secs(self.fix_timeout_secs)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
///
/// [weather]
/// units = "metric"
/// language = "cz"
///
/// [search]
/// debounce_ms = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub weather: WeatherSettings,
    pub search: SearchSettings,
    pub location: LocationSettings,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "homeweather", "homeweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the preference store holding the home location.
    pub fn preferences_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("preferences.json"))
    }

    /// API key from the environment, falling back to the stored one.
    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn acquisition_settings(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            fetch: FetchOptions {
                units: self.weather.units,
                language: self.weather.language.clone(),
            },
            country: self.weather.country.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.search.debounce(), Duration::from_millis(500));
        assert_eq!(cfg.search.limit, 10);
        assert!(cfg.location.enabled);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.api_key = Some("KEY".into());
        cfg.weather.units = Units::Imperial;
        cfg.location.enabled = false;
        cfg.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[weather]\nlanguage = \"en\"\n").unwrap();

        let cfg = Config::load_from(&path).unwrap();

        assert_eq!(cfg.weather.language, "en");
        assert_eq!(cfg.weather.units, Units::Metric);
        assert_eq!(cfg.search, SearchSettings::default());
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn env_key_overrides_stored_key() {
        let cfg = Config {
            api_key: Some("STORED".into()),
            ..Config::default()
        };

        assert_eq!(cfg.resolve_api_key(Some("ENV".into())).as_deref(), Some("ENV"));
        assert_eq!(cfg.resolve_api_key(Some(" ".into())).as_deref(), Some("STORED"));
        assert_eq!(cfg.resolve_api_key(None).as_deref(), Some("STORED"));
    }

    #[test]
    fn blank_stored_key_counts_as_missing() {
        let cfg = Config {
            api_key: Some(String::new()),
            ..Config::default()
        };
        assert_eq!(cfg.resolve_api_key(None), None);
    }

    #[test]
    fn acquisition_settings_follow_weather_section() {
        let mut cfg = Config::default();
        cfg.weather.language = "en".into();
        cfg.weather.country = "GB".into();

        let settings = cfg.acquisition_settings();
        assert_eq!(settings.fetch.language, "en");
        assert_eq!(settings.country, "GB");
    }
}
