//! Conversion of raw One Call payloads into [`WeatherSnapshot`]s.

use crate::{
    error::FetchError,
    model::{
        Coordinates, CurrentConditions, DailyPoint, HourlyPoint, LocationInfo, WeatherSnapshot,
    },
    provider::{
        Units,
        openweather::{OneCallPayload, OwCondition},
    },
};

pub const MAX_HOURLY_POINTS: usize = 24;
pub const MAX_DAILY_POINTS: usize = 8;

/// Location label attached to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLabel<'a> {
    pub name: &'a str,
    pub country: &'a str,
}

pub fn to_snapshot(
    payload: OneCallPayload,
    label: SnapshotLabel<'_>,
    units: Units,
) -> Result<WeatherSnapshot, FetchError> {
    let coordinates = Coordinates::new(payload.lat, payload.lon)
        .map_err(|e| FetchError::Mapping(e.to_string()))?;
    let wind_factor = units.wind_to_kmh();

    let current = &payload.current;
    let (description, icon_code) = representative(&current.weather);
    let current = CurrentConditions {
        temperature: finite("current temperature", current.temp)?,
        feels_like: finite("feels-like temperature", current.feels_like)?,
        description,
        icon_code,
        humidity: percent(current.humidity),
        pressure: u32::try_from(current.pressure)
            .map_err(|_| FetchError::Mapping(format!("negative pressure {}", current.pressure)))?,
        clouds: percent(current.clouds),
        wind_speed: finite("wind speed", current.wind_speed)? * wind_factor,
        wind_direction: current.wind_deg.rem_euclid(360) as u16,
        visibility_km: (current.visibility.max(0) / 1000) as u32,
        uv_index: finite("UV index", current.uvi)?.max(0.0),
        observed_at: current.dt,
    };

    let hourly = payload
        .hourly
        .iter()
        .take(MAX_HOURLY_POINTS)
        .map(|hour| {
            let (description, icon_code) = representative(&hour.weather);
            Ok(HourlyPoint {
                timestamp: hour.dt,
                temperature: finite("hourly temperature", hour.temp)?,
                description,
                icon_code,
                precipitation_chance: probability(hour.pop),
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;
    ensure_chronological("hourly", hourly.iter().map(|h| h.timestamp))?;

    let daily = payload
        .daily
        .iter()
        .take(MAX_DAILY_POINTS)
        .map(|day| {
            let (description, icon_code) = representative(&day.weather);
            Ok(DailyPoint {
                date: day.dt,
                temperature_min: finite("daily minimum", day.temp.min)?,
                temperature_max: finite("daily maximum", day.temp.max)?,
                description,
                icon_code,
                precipitation_chance: probability(day.pop),
                humidity: percent(day.humidity),
                wind_speed: finite("daily wind speed", day.wind_speed)? * wind_factor,
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;
    ensure_chronological("daily", daily.iter().map(|d| d.date))?;

    Ok(WeatherSnapshot {
        location: LocationInfo {
            name: label.name.to_string(),
            country: label.country.to_string(),
            coordinates,
        },
        current,
        hourly,
        daily,
    })
}

/// Only the first condition of a time point is shown.
fn representative(conditions: &[OwCondition]) -> (String, String) {
    conditions
        .first()
        .map(|c| (capitalize_first(&c.description), c.icon.clone()))
        .unwrap_or_default()
}

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn finite(field: &str, value: f64) -> Result<f64, FetchError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FetchError::Mapping(format!("{field} is not a finite number")))
    }
}

fn percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

fn probability(pop: f64) -> u8 {
    if pop.is_finite() {
        (pop.clamp(0.0, 1.0) * 100.0).round() as u8
    } else {
        0
    }
}

fn ensure_chronological(
    series: &str,
    timestamps: impl Iterator<Item = i64>,
) -> Result<(), FetchError> {
    let mut previous = None;
    for ts in timestamps {
        if previous.is_some_and(|p| ts <= p) {
            return Err(FetchError::Mapping(format!(
                "{series} forecast is not in chronological order"
            )));
        }
        previous = Some(ts);
    }
    Ok(())
}
