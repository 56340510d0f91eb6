//! Geocoding: coordinates to place names and back.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::GeocodeError,
    model::{Coordinates, PlaceCandidate},
};

pub mod openweather;

pub use openweather::OpenWeatherGeocoder;

const UNKNOWN_PLACE: &str = "Unknown place";

/// A structured geocoding match.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Address {
    pub locality: Option<String>,
    pub sub_admin_area: Option<String>,
    pub admin_area: Option<String>,
    pub country: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl Address {
    /// Locality, then sub-administrative area, then administrative area.
    pub fn place_name(&self) -> Option<&str> {
        [&self.locality, &self.sub_admin_area, &self.admin_area]
            .into_iter()
            .filter_map(|field| non_blank(field.as_deref()))
            .next()
    }

    /// `None` when the match carries no coordinates.
    pub fn to_candidate(&self) -> Option<PlaceCandidate> {
        let coordinates = self.coordinates?;
        let primary = non_blank(self.locality.as_deref())
            .or_else(|| non_blank(self.sub_admin_area.as_deref()))
            .unwrap_or(UNKNOWN_PLACE)
            .to_string();

        let mut display = primary.clone();
        if let Some(admin) = non_blank(self.admin_area.as_deref()).filter(|a| *a != primary) {
            display.push_str(", ");
            display.push_str(admin);
        }
        if let Some(country) = non_blank(self.country.as_deref()) {
            display.push_str(", ");
            display.push_str(country);
        }

        Some(PlaceCandidate {
            display_name: display,
            primary_name: primary,
            coordinates,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Place-name lookups. Implementations hide whatever callback or blocking
/// API the backend has behind a single await.
#[async_trait]
pub trait GeocodeProvider: Send + Sync + Debug {
    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<Address>, GeocodeError>;

    async fn forward_geocode(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Address>, GeocodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(locality: Option<&str>, sub: Option<&str>, admin: Option<&str>) -> Address {
        Address {
            locality: locality.map(String::from),
            sub_admin_area: sub.map(String::from),
            admin_area: admin.map(String::from),
            country: Some("CZ".into()),
            coordinates: Coordinates::new(50.0, 14.0).ok(),
        }
    }

    #[test]
    fn place_name_prefers_locality() {
        let a = address(Some("Praha"), Some("Hlavní město Praha"), Some("Praha"));
        assert_eq!(a.place_name(), Some("Praha"));
    }

    #[test]
    fn place_name_falls_back_through_admin_levels() {
        assert_eq!(
            address(None, Some("Okres Beroun"), Some("Středočeský kraj")).place_name(),
            Some("Okres Beroun")
        );
        assert_eq!(
            address(Some(" "), None, Some("Středočeský kraj")).place_name(),
            Some("Středočeský kraj")
        );
        assert_eq!(address(None, None, None).place_name(), None);
    }

    #[test]
    fn candidate_display_skips_duplicate_admin_area() {
        let candidate = address(Some("Praha"), None, Some("Praha"))
            .to_candidate()
            .unwrap();
        assert_eq!(candidate.display_name, "Praha, CZ");
        assert_eq!(candidate.primary_name, "Praha");
    }

    #[test]
    fn candidate_display_includes_admin_and_country() {
        let candidate = address(Some("Brno"), None, Some("Jihomoravský kraj"))
            .to_candidate()
            .unwrap();
        assert_eq!(candidate.display_name, "Brno, Jihomoravský kraj, CZ");
    }

    #[test]
    fn candidate_without_name_is_unknown_place() {
        let candidate = address(None, None, None).to_candidate().unwrap();
        assert_eq!(candidate.primary_name, UNKNOWN_PLACE);
    }

    #[test]
    fn candidate_requires_coordinates() {
        let mut a = address(Some("Praha"), None, None);
        a.coordinates = None;
        assert!(a.to_candidate().is_none());
    }
}
