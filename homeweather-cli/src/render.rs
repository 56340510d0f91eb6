use std::fmt::Write;

use chrono::{DateTime, Local};
use homeweather_core::{PlaceCandidate, Units, WeatherSnapshot};

#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    pub hours: usize,
    pub days: usize,
    pub units: Units,
}

pub fn candidate_line(candidate: &PlaceCandidate) -> String {
    format!("{} ({})", candidate.display_name, candidate.coordinates)
}

pub fn print_snapshot(snapshot: &WeatherSnapshot, options: &ViewOptions) {
    print!("{}", format_snapshot(snapshot, options));
}

fn temperature_suffix(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
        Units::Standard => "K",
    }
}

fn local_time(epoch: i64, pattern: &str) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|t| t.with_timezone(&Local).format(pattern).to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// Multi-line report: header, current conditions, hourly and daily tables.
pub fn format_snapshot(snapshot: &WeatherSnapshot, options: &ViewOptions) -> String {
    let t = temperature_suffix(options.units);
    let current = &snapshot.current;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{}, {}  ({})",
        snapshot.location.name, snapshot.location.country, snapshot.location.coordinates
    );
    let _ = writeln!(
        out,
        "Updated {}",
        local_time(current.observed_at, "%Y-%m-%d %H:%M")
    );
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "{:.1}{t} (feels like {:.1}{t}), {}",
        current.temperature, current.feels_like, current.description
    );
    let _ = writeln!(
        out,
        "Humidity {}%  Pressure {} hPa  Clouds {}%",
        current.humidity, current.pressure, current.clouds
    );
    let _ = writeln!(
        out,
        "Wind {:.1} km/h from {}°  Visibility {} km  UV {:.1}",
        current.wind_speed, current.wind_direction, current.visibility_km, current.uv_index
    );

    if options.hours > 0 && !snapshot.hourly.is_empty() {
        let _ = writeln!(out, "\nHourly");
        for point in snapshot.hourly.iter().take(options.hours) {
            let _ = writeln!(
                out,
                "  {}  {:>6.1}{t}  {:>3}%  {}",
                local_time(point.timestamp, "%H:%M"),
                point.temperature,
                point.precipitation_chance,
                point.description
            );
        }
    }

    if options.days > 0 && !snapshot.daily.is_empty() {
        let _ = writeln!(out, "\nDaily");
        for day in snapshot.daily.iter().take(options.days) {
            let _ = writeln!(
                out,
                "  {}  {:>6.1}{t} / {:>6.1}{t}  {:>3}%  {}",
                local_time(day.date, "%a %d.%m."),
                day.temperature_min,
                day.temperature_max,
                day.precipitation_chance,
                day.description
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeweather_core::{
        Coordinates, CurrentConditions, DailyPoint, HourlyPoint, LocationInfo,
    };

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            location: LocationInfo {
                name: "Brno".into(),
                country: "CZ".into(),
                coordinates: Coordinates::new(49.1951, 16.6068).unwrap(),
            },
            current: CurrentConditions {
                temperature: 12.34,
                feels_like: 10.0,
                description: "Zataženo".into(),
                icon_code: "04d".into(),
                humidity: 71,
                pressure: 1013,
                clouds: 90,
                wind_speed: 14.4,
                wind_direction: 270,
                visibility_km: 10,
                uv_index: 1.2,
                observed_at: 1_700_000_000,
            },
            hourly: (0..24)
                .map(|i| HourlyPoint {
                    timestamp: 1_700_000_000 + i * 3600,
                    temperature: 10.0,
                    description: format!("hour {i}"),
                    icon_code: "01d".into(),
                    precipitation_chance: 20,
                })
                .collect(),
            daily: (0..8)
                .map(|i| DailyPoint {
                    date: 1_700_000_000 + i * 86_400,
                    temperature_min: 3.0,
                    temperature_max: 11.0,
                    description: format!("day {i}"),
                    icon_code: "02d".into(),
                    precipitation_chance: 40,
                    humidity: 80,
                    wind_speed: 9.0,
                })
                .collect(),
        }
    }

    fn options(hours: usize, days: usize) -> ViewOptions {
        ViewOptions {
            hours,
            days,
            units: Units::Metric,
        }
    }

    #[test]
    fn report_contains_current_conditions() {
        let text = format_snapshot(&snapshot(), &options(12, 7));

        assert!(text.starts_with("Brno, CZ"));
        assert!(text.contains("12.3°C (feels like 10.0°C), Zataženo"));
        assert!(text.contains("Wind 14.4 km/h from 270°"));
    }

    #[test]
    fn series_respect_requested_lengths() {
        let text = format_snapshot(&snapshot(), &options(3, 2));

        assert!(text.contains("hour 2"));
        assert!(!text.contains("hour 3"));
        assert!(text.contains("day 1"));
        assert!(!text.contains("day 2"));
    }

    #[test]
    fn zero_lengths_hide_tables() {
        let text = format_snapshot(&snapshot(), &options(0, 0));

        assert!(!text.contains("Hourly"));
        assert!(!text.contains("Daily"));
    }

    #[test]
    fn imperial_uses_fahrenheit() {
        let mut opts = options(0, 0);
        opts.units = Units::Imperial;

        assert!(format_snapshot(&snapshot(), &opts).contains("12.3°F"));
    }

    #[test]
    fn candidate_line_shows_coordinates() {
        let candidate = PlaceCandidate {
            display_name: "Brno, Jihomoravský kraj, CZ".into(),
            primary_name: "Brno".into(),
            coordinates: Coordinates::new(49.1951, 16.6068).unwrap(),
        };

        assert_eq!(
            candidate_line(&candidate),
            "Brno, Jihomoravský kraj, CZ (49.1951, 16.6068)"
        );
    }
}
