//! BC Ferries sailings client
//!
//! Fetches today's sailings from the community BC Ferries API and keeps the
//! off-island routes that matter to Port Alberni residents (Nanaimo and
//! Victoria terminals). Sailing status is derived from the local clock rather
//! than trusted from the API.

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Timelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::{Location, Sourced, FALLBACK_SOURCE};

/// Base URL for the BC Ferries API
const BC_FERRIES_BASE_URL: &str = "https://bcferriesapi.ca/v2/";

/// How long a ferry board stays fresh
pub const FERRY_TTL: Duration = Duration::from_secs(30 * 60);

/// `source` tag for live boards
pub const FERRY_SOURCE: &str = "bc_ferries";

/// BC Ferries customer service line
pub const EMERGENCY_CONTACT: &str = "1-888-223-3779";

/// Minutes either side of departure during which a sailing counts as boarding
const BOARDING_WINDOW_MINUTES: i64 = 30;

/// Terminals with off-island sailings, in display priority order
const OFF_ISLAND_TERMINALS: [&str; 3] = ["NAN", "DUK", "SWB"];

/// Cache key for a location's ferry board
pub fn cache_key(location: &Location) -> String {
    format!("ferry_{}_live", location.slug)
}

/// A ferry terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminal {
    pub name: &'static str,
    pub location: &'static str,
}

/// Look up a terminal by its BC Ferries code
pub fn terminal(code: &str) -> Option<Terminal> {
    let (name, location) = match code {
        "TSA" => ("Tsawwassen", "Vancouver"),
        "SWB" => ("Swartz Bay", "Victoria"),
        "HSB" => ("Horseshoe Bay", "Vancouver"),
        "NAN" => ("Departure Bay", "Nanaimo"),
        "DUK" => ("Duke Point", "Nanaimo"),
        "LNG" => ("Langdale", "Sunshine Coast"),
        "BOW" => ("Bowen Island", "Bowen Island"),
        "FUL" => ("Fulford Harbour", "Salt Spring Island"),
        "SGI" => ("Southern Gulf Islands", "Gulf Islands"),
        _ => return None,
    };
    Some(Terminal { name, location })
}

/// Where a sailing is relative to now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SailingStatus {
    Scheduled,
    Boarding,
    Departed,
}

/// One sailing on a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    /// Departure time, 24h "HH:MM"
    pub time: String,
    pub status: SailingStatus,
    pub vessel: String,
}

/// The next sailing that has not started boarding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDeparture {
    pub time: String,
    pub vessel: String,
    pub minutes_until: i64,
    /// e.g. "1h 5m" or "45m"
    pub countdown: String,
}

/// A route and today's sailings on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryRoute {
    /// Lowercased route code (e.g., "nanhsb")
    pub id: String,
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub departures: Vec<Departure>,
    pub next_departure: Option<NextDeparture>,
}

/// The ferry card payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FerryBoard {
    pub routes: Vec<FerryRoute>,
    pub alerts: Vec<String>,
    pub notice: Option<String>,
    pub emergency_contact: String,
    pub last_updated: chrono::DateTime<Utc>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sourced for FerryBoard {
    fn source(&self) -> &str {
        &self.source
    }
}

/// Errors that can occur when fetching ferry data
#[derive(Debug, Error)]
pub enum FerryError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Non-success response
    #[error("BC Ferries API error: {0}")]
    Api(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The API answered but had nothing for our terminals
    #[error("No off-island routes in BC Ferries response")]
    NoRelevantRoutes,
}

/// Client for fetching sailings from the BC Ferries API
#[derive(Debug, Clone)]
pub struct FerryClient {
    client: Client,
    base_url: String,
}

impl Default for FerryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FerryClient {
    /// Create a new FerryClient with default settings
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a new FerryClient with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: BC_FERRIES_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch today's off-island sailings
    ///
    /// # Returns
    /// * `Ok(FerryBoard)` tagged with source "bc_ferries"
    /// * `Err(FerryError)` if the request fails or no relevant route is listed
    pub async fn fetch_board(&self) -> Result<FerryBoard, FerryError> {
        let response = self.client.get(&self.base_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FerryError::Api(status.as_u16()));
        }

        let text = response.text().await?;
        let api_response: ApiResponse = serde_json::from_str(&text)?;

        build_board(api_response.capacity_routes, Local::now().naive_local())
    }
}

/// Degraded board served when the BC Ferries API is unreachable
pub fn fallback_board() -> FerryBoard {
    FerryBoard {
        routes: Vec::new(),
        alerts: vec!["Service information temporarily unavailable".to_string()],
        notice: Some("Please check bcferries.com for current schedules".to_string()),
        emergency_contact: EMERGENCY_CONTACT.to_string(),
        last_updated: Utc::now(),
        source: FALLBACK_SOURCE.to_string(),
        error: Some("BC Ferries data temporarily unavailable".to_string()),
    }
}

/// Turns the API's route list into a board as seen at local time `now`
fn build_board(routes: Vec<ApiRoute>, now: NaiveDateTime) -> Result<FerryBoard, FerryError> {
    let mut relevant: Vec<(usize, FerryRoute)> = routes
        .into_iter()
        .filter_map(|route| {
            let priority = OFF_ISLAND_TERMINALS
                .iter()
                .position(|code| *code == route.from_terminal_code)?;
            let from = terminal(&route.from_terminal_code)?;
            let to = terminal(&route.to_terminal_code)?;
            Some((priority, build_route(route, from, to, now)))
        })
        .collect();

    if relevant.is_empty() {
        return Err(FerryError::NoRelevantRoutes);
    }
    relevant.sort_by_key(|(priority, _)| *priority);

    Ok(FerryBoard {
        routes: relevant.into_iter().map(|(_, route)| route).collect(),
        alerts: Vec::new(),
        notice: None,
        emergency_contact: EMERGENCY_CONTACT.to_string(),
        last_updated: Utc::now(),
        source: FERRY_SOURCE.to_string(),
        error: None,
    })
}

fn build_route(route: ApiRoute, from: Terminal, to: Terminal, now: NaiveDateTime) -> FerryRoute {
    let departures: Vec<(NaiveTime, Departure)> = route
        .sailings
        .into_iter()
        .filter_map(|sailing| {
            let time = parse_sailing_time(&sailing.time)?;
            Some((
                time,
                Departure {
                    time: time.format("%H:%M").to_string(),
                    status: sailing_status(time, now.time()),
                    vessel: sailing.vessel_name.unwrap_or_else(|| "BC Ferry".to_string()),
                },
            ))
        })
        .collect();

    let next_departure = departures
        .iter()
        .find(|(_, d)| d.status == SailingStatus::Scheduled)
        .map(|(time, d)| {
            let minutes_until = minutes_until(*time, now);
            NextDeparture {
                time: d.time.clone(),
                vessel: d.vessel.clone(),
                minutes_until,
                countdown: countdown(minutes_until),
            }
        });

    FerryRoute {
        id: route.route_code.to_lowercase(),
        name: format!("{} → {}", from.name, to.name),
        from: format!("{} ({})", from.location, from.name),
        to: format!("{} ({})", to.location, to.name),
        duration: route.sailing_duration,
        departures: departures.into_iter().map(|(_, d)| d).collect(),
        next_departure,
    }
}

/// Parses "7:00 am", "12:15 PM" or "07:00" into a time of day
pub fn parse_sailing_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim().to_lowercase();
    let (clock, period) = match raw.split_once(' ') {
        Some((clock, period)) => (clock, Some(period.trim())),
        None => (raw.as_str(), None),
    };

    let (hours, minutes) = clock.split_once(':')?;
    let mut hour: u32 = hours.parse().ok()?;
    let minute: u32 = minutes.parse().ok()?;

    match period {
        Some("am") if hour == 12 => hour = 0,
        Some("am") => {}
        Some("pm") if hour != 12 => hour += 12,
        Some("pm") => {}
        Some(_) => return None,
        None => {}
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Classifies a sailing relative to the current time of day
///
/// More than 30 minutes in the past is departed; within 30 minutes either side
/// is boarding; anything later is scheduled.
pub fn sailing_status(departure: NaiveTime, now: NaiveTime) -> SailingStatus {
    let departure_minutes = i64::from(departure.hour() * 60 + departure.minute());
    let now_minutes = i64::from(now.hour() * 60 + now.minute());

    if departure_minutes < now_minutes - BOARDING_WINDOW_MINUTES {
        SailingStatus::Departed
    } else if (departure_minutes - now_minutes).abs() <= BOARDING_WINDOW_MINUTES {
        SailingStatus::Boarding
    } else {
        SailingStatus::Scheduled
    }
}

/// Whole minutes until the next occurrence of `departure`, rolling to tomorrow if needed
fn minutes_until(departure: NaiveTime, now: NaiveDateTime) -> i64 {
    let mut at = now.date().and_time(departure);
    if at <= now {
        at += ChronoDuration::days(1);
    }
    (at - now).num_minutes().max(0)
}

/// Formats minutes as "1h 5m" when over an hour, otherwise "45m"
pub fn countdown(minutes: i64) -> String {
    if minutes > 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}

/// BC Ferries API response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    capacity_routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRoute {
    route_code: String,
    from_terminal_code: String,
    to_terminal_code: String,
    #[serde(default)]
    sailing_duration: Option<String>,
    #[serde(default)]
    sailings: Vec<ApiSailing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSailing {
    time: String,
    #[serde(default)]
    vessel_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PORT_ALBERNI;
    use chrono::NaiveDate;

    /// Trimmed BC Ferries API response
    const API_RESPONSE: &str = r#"{
        "capacityRoutes": [
            {
                "routeCode": "TSASWB",
                "fromTerminalCode": "TSA",
                "toTerminalCode": "SWB",
                "sailingDuration": "1h 35m",
                "sailings": [{"time": "7:00 am", "vesselName": "Spirit of British Columbia"}]
            },
            {
                "routeCode": "SWBTSA",
                "fromTerminalCode": "SWB",
                "toTerminalCode": "TSA",
                "sailingDuration": "1h 35m",
                "sailings": [
                    {"time": "7:00 am", "vesselName": "Coastal Celebration"},
                    {"time": "11:00 am", "vesselName": "Spirit of Vancouver Island"}
                ]
            },
            {
                "routeCode": "NANHSB",
                "fromTerminalCode": "NAN",
                "toTerminalCode": "HSB",
                "sailingDuration": "1h 40m",
                "sailings": [
                    {"time": "6:15 am", "vesselName": "Queen of Oak Bay"},
                    {"time": "8:25 am", "vesselName": "Queen of Surrey"},
                    {"time": "12:50 pm"},
                    {"time": "not a time", "vesselName": "Ghost"}
                ]
            },
            {
                "routeCode": "DUKXXX",
                "fromTerminalCode": "DUK",
                "toTerminalCode": "XXX",
                "sailings": []
            }
        ],
        "nonCapacityRoutes": []
    }"#;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key(&PORT_ALBERNI), "ferry_port_alberni_live");
    }

    #[test]
    fn test_parse_sailing_time() {
        assert_eq!(parse_sailing_time("7:00 am"), Some(hm(7, 0)));
        assert_eq!(parse_sailing_time("12:15 pm"), Some(hm(12, 15)));
        assert_eq!(parse_sailing_time("12:05 am"), Some(hm(0, 5)));
        assert_eq!(parse_sailing_time("9:45 PM"), Some(hm(21, 45)));
        assert_eq!(parse_sailing_time("07:30"), Some(hm(7, 30)));
    }

    #[test]
    fn test_parse_sailing_time_invalid() {
        assert!(parse_sailing_time("").is_none());
        assert!(parse_sailing_time("noon").is_none());
        assert!(parse_sailing_time("7:00 xm").is_none());
        assert!(parse_sailing_time("25:00").is_none());
    }

    #[test]
    fn test_sailing_status_windows() {
        let now = hm(10, 0);
        assert_eq!(sailing_status(hm(9, 29), now), SailingStatus::Departed);
        assert_eq!(sailing_status(hm(9, 30), now), SailingStatus::Boarding);
        assert_eq!(sailing_status(hm(10, 0), now), SailingStatus::Boarding);
        assert_eq!(sailing_status(hm(10, 30), now), SailingStatus::Boarding);
        assert_eq!(sailing_status(hm(10, 31), now), SailingStatus::Scheduled);
    }

    #[test]
    fn test_countdown_format() {
        assert_eq!(countdown(45), "45m");
        assert_eq!(countdown(60), "60m");
        assert_eq!(countdown(65), "1h 5m");
        assert_eq!(countdown(150), "2h 30m");
    }

    #[test]
    fn test_minutes_until_rolls_to_tomorrow() {
        assert_eq!(minutes_until(hm(11, 0), at(10, 0)), 60);
        assert_eq!(minutes_until(hm(9, 0), at(10, 0)), 23 * 60);
    }

    #[test]
    fn test_build_board_keeps_off_island_routes_in_priority_order() {
        let response: ApiResponse = serde_json::from_str(API_RESPONSE).unwrap();
        let board = build_board(response.capacity_routes, at(8, 0)).unwrap();

        let ids: Vec<&str> = board.routes.iter().map(|r| r.id.as_str()).collect();
        // TSA departures are not off-island; DUK->XXX has no terminal mapping
        assert_eq!(ids, vec!["nanhsb", "swbtsa"]);
        assert_eq!(board.source, "bc_ferries");
        assert!(board.error.is_none());

        let nanaimo = &board.routes[0];
        assert_eq!(nanaimo.name, "Departure Bay → Horseshoe Bay");
        assert_eq!(nanaimo.from, "Nanaimo (Departure Bay)");
        assert_eq!(nanaimo.to, "Vancouver (Horseshoe Bay)");
        assert_eq!(nanaimo.duration.as_deref(), Some("1h 40m"));
    }

    #[test]
    fn test_build_board_derives_statuses_and_next_departure() {
        let response: ApiResponse = serde_json::from_str(API_RESPONSE).unwrap();
        let board = build_board(response.capacity_routes, at(8, 0)).unwrap();
        let nanaimo = &board.routes[0];

        // Unparseable sailing is dropped
        assert_eq!(nanaimo.departures.len(), 3);
        assert_eq!(nanaimo.departures[0].time, "06:15");
        assert_eq!(nanaimo.departures[0].status, SailingStatus::Departed);
        assert_eq!(nanaimo.departures[1].time, "08:25");
        assert_eq!(nanaimo.departures[1].status, SailingStatus::Boarding);
        assert_eq!(nanaimo.departures[2].time, "12:50");
        assert_eq!(nanaimo.departures[2].status, SailingStatus::Scheduled);
        assert_eq!(nanaimo.departures[2].vessel, "BC Ferry");

        let next = nanaimo.next_departure.as_ref().unwrap();
        assert_eq!(next.time, "12:50");
        assert_eq!(next.minutes_until, 290);
        assert_eq!(next.countdown, "4h 50m");
    }

    #[test]
    fn test_build_board_without_relevant_routes_fails() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"capacityRoutes": [{"routeCode": "TSASWB", "fromTerminalCode": "TSA", "toTerminalCode": "SWB"}]}"#,
        )
        .unwrap();

        let result = build_board(response.capacity_routes, at(8, 0));
        assert!(matches!(result, Err(FerryError::NoRelevantRoutes)));
    }

    #[test]
    fn test_route_with_no_upcoming_sailing_has_no_next_departure() {
        let response: ApiResponse = serde_json::from_str(API_RESPONSE).unwrap();
        let board = build_board(response.capacity_routes, at(23, 0)).unwrap();
        assert!(board.routes.iter().all(|r| r.next_departure.is_none()));
    }

    #[test]
    fn test_terminal_lookup() {
        assert_eq!(terminal("NAN").unwrap().name, "Departure Bay");
        assert_eq!(terminal("SWB").unwrap().location, "Victoria");
        assert!(terminal("nan").is_none());
        assert!(terminal("XXX").is_none());
    }

    #[test]
    fn test_fallback_board_is_marked() {
        let board = fallback_board();
        assert_eq!(board.source, "fallback");
        assert!(board.routes.is_empty());
        assert!(board.notice.is_some());
        assert_eq!(board.emergency_contact, "1-888-223-3779");
    }

    #[test]
    fn test_board_serializes_camel_case() {
        let json = serde_json::to_value(fallback_board()).unwrap();
        assert!(json.get("emergencyContact").is_some());
        assert!(json.get("lastUpdated").is_some());

        let status = serde_json::to_value(SailingStatus::Boarding).unwrap();
        assert_eq!(status, "boarding");
    }
}
