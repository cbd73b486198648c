//! Upstream data feeds for the dashboard
//!
//! Each feed module supplies the pieces the cache needs: a client whose fetch
//! acts as the producer, and a hand-authored fallback payload for when the
//! upstream is down. Payloads are plain serde structs so they can be cached as
//! JSON and handed to the front end unchanged.

pub mod ferry;
pub mod gas;
pub mod weather;

pub use ferry::{FerryBoard, FerryClient, FerryError};
pub use gas::{GasError, GasPriceBoard, PriceSource, ProvincialAverage};
pub use weather::{WeatherClient, WeatherError, WeatherReport};

use serde::Serialize;

/// `source` tag carried by every fallback payload
pub const FALLBACK_SOURCE: &str = "fallback";

/// User-Agent sent to upstream services
pub const USER_AGENT: &str = "PA-Daily-Dashboard/1.0";

/// A payload that knows where its data came from
pub trait Sourced {
    /// Machine-readable origin tag (e.g., "openweathermap", "fallback")
    fn source(&self) -> &str;
}

/// A town the dashboard can serve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    /// Identifier used in cache keys and analytics (e.g., "port_alberni")
    pub slug: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Latitude coordinate
    pub latitude: f64,
    /// Longitude coordinate
    pub longitude: f64,
}

/// Port Alberni, BC
pub const PORT_ALBERNI: Location = Location {
    slug: "port_alberni",
    name: "Port Alberni, BC",
    latitude: 49.2334,
    longitude: -124.8039,
};

static LOCATIONS: [Location; 1] = [PORT_ALBERNI];

/// Look up a location by its slug
pub fn get_location_by_slug(slug: &str) -> Option<&'static Location> {
    LOCATIONS.iter().find(|location| location.slug == slug)
}

/// All locations the dashboard knows about
pub fn all_locations() -> &'static [Location] {
    &LOCATIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_location_by_slug() {
        let location = get_location_by_slug("port_alberni").expect("Port Alberni should exist");
        assert_eq!(location.name, "Port Alberni, BC");
        assert!((location.latitude - 49.2334).abs() < 0.0001);
        assert!((location.longitude - (-124.8039)).abs() < 0.0001);
    }

    #[test]
    fn test_get_location_by_slug_unknown() {
        assert!(get_location_by_slug("tofino").is_none());
        assert!(get_location_by_slug("").is_none());
        assert!(get_location_by_slug("PORT_ALBERNI").is_none()); // Case sensitive
    }

    #[test]
    fn test_location_slugs_are_unique() {
        let mut slugs: Vec<&str> = all_locations().iter().map(|l| l.slug).collect();
        let original_len = slugs.len();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), original_len);
    }
}
