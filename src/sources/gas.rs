//! Gas price board for Port Alberni stations
//!
//! A single regional base price (cents per litre) is spread across the town's
//! stations with small fixed offsets, then summarized: cheapest first, average,
//! spread, and a savings tip when shopping around is worth it.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::{Location, Sourced, FALLBACK_SOURCE};

/// How long a price board stays fresh; upstream data only changes weekly
pub const GAS_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// BC provincial average regular gas price, in cents per litre
pub const BC_AVERAGE_PRICE: f64 = 164.9;

/// Plausible range for a regular gas price, in cents per litre
const PRICE_RANGE: std::ops::RangeInclusive<f64> = 100.0..=300.0;

/// Spread above which the board suggests shopping around, in cents per litre
const SAVINGS_ALERT_THRESHOLD: f64 = 2.0;

/// Cache key for a location's price board
pub fn cache_key(location: &Location) -> String {
    format!("gas_prices_{}", location.slug)
}

/// A station in the roster
#[derive(Debug, Clone, Copy)]
pub struct StationInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub brand: &'static str,
    pub address: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub amenities: &'static [&'static str],
    pub operating_hours: &'static str,
    /// Offset from the base price in cents per litre
    pub price_offset: f64,
}

/// Port Alberni gas stations
static STATIONS: [StationInfo; 7] = [
    StationInfo {
        id: "tseshaht-market",
        name: "Tseshaht Market",
        brand: "Independent",
        address: "7581 Pacific Rim Hwy, Port Alberni, BC",
        latitude: 49.2156,
        longitude: -124.7891,
        amenities: &["Propane", "C-Store", "Restrooms", "Air Pump", "ATM"],
        operating_hours: "6:00 AM - 10:00 PM",
        price_offset: -1.5,
    },
    StationInfo {
        id: "chevron-johnston",
        name: "Chevron & On the Run",
        brand: "Chevron",
        address: "4781 Johnston Rd, Port Alberni, BC",
        latitude: 49.2298,
        longitude: -124.8189,
        amenities: &["C-Store", "Pay At Pump", "Restrooms", "ATM"],
        operating_hours: "6:00 AM - 11:00 PM",
        price_offset: -0.5,
    },
    StationInfo {
        id: "esso-circle-k",
        name: "Esso & Circle K",
        brand: "Esso",
        address: "3955 Johnston Rd, Port Alberni, BC",
        latitude: 49.2365,
        longitude: -124.8089,
        amenities: &["24 Hours", "C-Store", "Pay At Pump", "Air Pump", "ATM"],
        operating_hours: "24 Hours",
        price_offset: 0.0,
    },
    StationInfo {
        id: "petro-canada-river",
        name: "Petro-Canada",
        brand: "Petro-Canada",
        address: "5101 River Rd, Port Alberni, BC",
        latitude: 49.2456,
        longitude: -124.8234,
        amenities: &["Propane", "C-Store", "Restrooms", "Air Pump", "ATM", "Lotto"],
        operating_hours: "6:00 AM - 11:00 PM",
        price_offset: 0.0,
    },
    StationInfo {
        id: "coop-johnston",
        name: "CO-OP",
        brand: "Co-op",
        address: "4006 Johnston Rd, Port Alberni, BC",
        latitude: 49.2334,
        longitude: -124.8134,
        amenities: &["C-Store", "Car Wash", "Restrooms", "Air Pump", "ATM"],
        operating_hours: "6:00 AM - 11:00 PM",
        price_offset: 0.0,
    },
    StationInfo {
        id: "mobil-johnston",
        name: "Mobil",
        brand: "Mobil",
        address: "3455 Johnston Rd, Port Alberni, BC",
        latitude: 49.2389,
        longitude: -124.8023,
        amenities: &["C-Store", "Pay At Pump", "Air Pump"],
        operating_hours: "6:00 AM - 10:00 PM",
        price_offset: 0.5,
    },
    StationInfo {
        id: "shell-johnston",
        name: "Shell",
        brand: "Shell",
        address: "3690 Johnston Rd, Port Alberni, BC",
        latitude: 49.2378,
        longitude: -124.8056,
        amenities: &["Propane", "C-Store", "Restrooms", "Air Pump", "ATM", "Lotto"],
        operating_hours: "6:00 AM - 11:00 PM",
        price_offset: 1.5,
    },
];

/// All stations on the board
pub fn all_stations() -> &'static [StationInfo] {
    &STATIONS
}

/// A regional base price and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct BasePrice {
    /// Cents per litre
    pub cents_per_litre: f64,
    /// Human-readable source name (e.g., "BC Provincial Average")
    pub data_source: String,
    /// Machine-readable source tag
    pub source: String,
    /// Survey date, if the source publishes one
    pub data_date: Option<String>,
}

/// Errors that can occur when producing a price board
#[derive(Debug, Error)]
pub enum GasError {
    /// The price source could not be read
    #[error("Price source unavailable: {0}")]
    Unavailable(String),

    /// The source returned a price no station would charge
    #[error("Implausible base price: {0} cents/L")]
    ImplausiblePrice(f64),
}

/// Where the board's base price comes from
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn base_price(&self) -> Result<BasePrice, GasError>;
}

/// The BC provincial average, used when no survey feed is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvincialAverage;

#[async_trait]
impl PriceSource for ProvincialAverage {
    async fn base_price(&self) -> Result<BasePrice, GasError> {
        Ok(BasePrice {
            cents_per_litre: BC_AVERAGE_PRICE,
            data_source: "BC Provincial Average".to_string(),
            source: "bc_provincial_average".to_string(),
            data_date: None,
        })
    }
}

/// Station location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One priced station on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasStation {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub address: String,
    /// Cents per litre, one decimal
    pub price: f64,
    pub location: Coordinates,
    pub amenities: Vec<String>,
    pub operating_hours: String,
    /// e.g. "BC Provincial Average Data"
    pub updated: String,
    pub trend: String,
}

/// Kind of price tip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Good,
    Info,
}

/// Tip shown above the station list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
}

/// The gas price card payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPriceBoard {
    /// Cheapest first
    pub stations: Vec<GasStation>,
    pub average_price: f64,
    pub cheapest_station: String,
    pub cheapest_price: f64,
    pub most_expensive_price: f64,
    pub price_range: f64,
    pub alert: PriceAlert,
    pub last_updated: chrono::DateTime<Utc>,
    pub data_date: String,
    pub update_frequency: String,
    pub data_source: String,
    pub location: String,
    pub currency: String,
    pub unit: String,
    pub note: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sourced for GasPriceBoard {
    fn source(&self) -> &str {
        &self.source
    }
}

/// Produces a board from `source`, rejecting implausible prices
pub async fn fetch_board(source: &dyn PriceSource) -> Result<GasPriceBoard, GasError> {
    let base = source.base_price().await?;
    if !PRICE_RANGE.contains(&base.cents_per_litre) {
        return Err(GasError::ImplausiblePrice(base.cents_per_litre));
    }
    Ok(build_board(&base))
}

/// Degraded board built from the provincial average
pub fn fallback_board() -> GasPriceBoard {
    let mut board = build_board(&BasePrice {
        cents_per_litre: BC_AVERAGE_PRICE,
        data_source: "Fallback Data".to_string(),
        source: FALLBACK_SOURCE.to_string(),
        data_date: None,
    });
    board.note =
        "Using BC provincial average pricing. Government data temporarily unavailable.".to_string();
    board.error = Some("Partial service - using fallback data".to_string());
    board
}

/// Prices every station off `base` and summarizes the spread
pub fn build_board(base: &BasePrice) -> GasPriceBoard {
    let updated = format!("{} Data", base.data_source);

    let mut stations: Vec<GasStation> = all_stations()
        .iter()
        .map(|info| GasStation {
            id: info.id.to_string(),
            name: info.name.to_string(),
            brand: info.brand.to_string(),
            address: info.address.to_string(),
            price: round_tenth(base.cents_per_litre + info.price_offset),
            location: Coordinates {
                lat: info.latitude,
                lng: info.longitude,
            },
            amenities: info.amenities.iter().map(|a| a.to_string()).collect(),
            operating_hours: info.operating_hours.to_string(),
            updated: updated.clone(),
            trend: "same".to_string(),
        })
        .collect();
    stations.sort_by(|a, b| a.price.total_cmp(&b.price));

    let prices: Vec<f64> = stations.iter().map(|s| s.price).collect();
    let average_price = round_tenth(prices.iter().sum::<f64>() / prices.len() as f64);
    let cheapest_price = prices.iter().copied().fold(f64::MAX, f64::min);
    let most_expensive_price = prices.iter().copied().fold(f64::MIN, f64::max);
    let price_range = round_tenth(most_expensive_price - cheapest_price);
    let cheapest_station = stations.first().map(|s| s.name.clone()).unwrap_or_default();

    let alert = if price_range > SAVINGS_ALERT_THRESHOLD {
        PriceAlert {
            kind: AlertKind::Good,
            message: format!("Save {:.1}¢/L by choosing the right station!", price_range),
        }
    } else {
        PriceAlert {
            kind: AlertKind::Info,
            message: "Gas prices are fairly consistent across Port Alberni.".to_string(),
        }
    };

    let note = if base.data_date.is_some() {
        "Prices update weekly on Wednesdays. Data may be 2-7 days behind current market prices."
    } else {
        "Using BC provincial average as baseline."
    };

    GasPriceBoard {
        stations,
        average_price,
        cheapest_station,
        cheapest_price,
        most_expensive_price,
        price_range,
        alert,
        last_updated: Utc::now(),
        data_date: base.data_date.clone().unwrap_or_else(|| "Recent".to_string()),
        update_frequency: "Weekly".to_string(),
        data_source: base.data_source.clone(),
        location: "Port Alberni, BC".to_string(),
        currency: "CAD".to_string(),
        unit: "cents per litre".to_string(),
        note: note.to_string(),
        source: base.source.clone(),
        error: None,
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PORT_ALBERNI;

    struct FixedPrice(f64);

    #[async_trait]
    impl PriceSource for FixedPrice {
        async fn base_price(&self) -> Result<BasePrice, GasError> {
            Ok(BasePrice {
                cents_per_litre: self.0,
                data_source: "Government of Canada".to_string(),
                source: "nrcan".to_string(),
                data_date: Some("2026-07-15".to_string()),
            })
        }
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key(&PORT_ALBERNI), "gas_prices_port_alberni");
    }

    #[test]
    fn test_roster_has_unique_ids() {
        let mut ids: Vec<&str> = all_stations().iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_board_sorted_cheapest_first() {
        let board = fallback_board();
        let prices: Vec<f64> = board.stations.iter().map(|s| s.price).collect();
        let mut sorted = prices.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(prices, sorted);
        assert_eq!(board.cheapest_station, "Tseshaht Market");
    }

    #[tokio::test]
    async fn test_board_statistics() {
        let board = fetch_board(&ProvincialAverage).await.unwrap();

        assert_eq!(board.stations.len(), 7);
        assert_eq!(board.cheapest_price, 163.4);
        assert_eq!(board.most_expensive_price, 166.4);
        assert_eq!(board.price_range, 3.0);
        assert_eq!(board.average_price, 164.9);
        assert_eq!(board.source, "bc_provincial_average");
        assert_eq!(board.data_date, "Recent");
        assert!(board.error.is_none());
    }

    #[tokio::test]
    async fn test_wide_spread_raises_savings_alert() {
        let board = fetch_board(&ProvincialAverage).await.unwrap();
        assert_eq!(board.alert.kind, AlertKind::Good);
        assert_eq!(board.alert.message, "Save 3.0¢/L by choosing the right station!");
    }

    #[tokio::test]
    async fn test_survey_source_carries_date_and_note() {
        let board = fetch_board(&FixedPrice(172.3)).await.unwrap();
        assert_eq!(board.data_date, "2026-07-15");
        assert_eq!(board.data_source, "Government of Canada");
        assert!(board.note.contains("weekly"));
        assert_eq!(board.stations[0].updated, "Government of Canada Data");
    }

    #[tokio::test]
    async fn test_implausible_price_is_rejected() {
        let result = fetch_board(&FixedPrice(12.0)).await;
        assert!(matches!(result, Err(GasError::ImplausiblePrice(_))));

        let result = fetch_board(&FixedPrice(f64::NAN)).await;
        assert!(matches!(result, Err(GasError::ImplausiblePrice(_))));
    }

    #[test]
    fn test_fallback_board_is_marked() {
        let board = fallback_board();
        assert_eq!(board.source, "fallback");
        assert_eq!(board.data_source, "Fallback Data");
        assert!(board.error.is_some());
        assert!(board.note.contains("temporarily unavailable"));
    }

    #[test]
    fn test_board_json_layout() {
        let json = serde_json::to_value(fallback_board()).unwrap();
        assert!(json.get("averagePrice").is_some());
        assert!(json.get("cheapestStation").is_some());
        assert_eq!(json["alert"]["type"], "good");
        assert!(json["stations"][0]["location"].get("lng").is_some());
        assert!(json["stations"][0].get("operatingHours").is_some());
    }

    #[test]
    fn test_round_tenth() {
        assert_eq!(round_tenth(164.94), 164.9);
        assert_eq!(round_tenth(164.96), 165.0);
    }
}
