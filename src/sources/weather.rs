//! OpenWeatherMap client
//!
//! Fetches current conditions and the 5-day/3-hour forecast, and condenses
//! them into the dashboard's weather card: current temperature, humidity,
//! wind and icon, plus one high/low row per day.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::{Location, Sourced, FALLBACK_SOURCE};

/// Base URL for the OpenWeatherMap API
const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// How long a weather report stays fresh
pub const WEATHER_TTL: Duration = Duration::from_secs(15 * 60);

/// `source` tag for live reports
pub const WEATHER_SOURCE: &str = "openweathermap";

/// Number of forecast days shown on the card
const FORECAST_DAYS: usize = 5;

/// Icon used when OpenWeatherMap sends one we don't know
const DEFAULT_ICON: &str = "⛅";

/// Cache key for a location's live weather
pub fn cache_key(location: &Location) -> String {
    format!("weather_{}_live", location.slug)
}

/// Current conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    /// Temperature in Celsius, rounded
    pub temp: i32,
    /// Free-text description (e.g., "broken clouds")
    pub condition: String,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Wind speed in km/h, rounded
    pub wind_speed: i32,
    /// Display icon
    pub icon: String,
}

/// One forecast row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// "Today", "Tomorrow", or a short weekday name
    pub day: String,
    /// Daily high in Celsius, rounded
    pub high: i32,
    /// Daily low in Celsius, rounded
    pub low: i32,
    /// Display icon for the day
    pub icon: String,
}

/// The weather card payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub forecast: Vec<DailyForecast>,
    /// When the report was built
    pub last_updated: DateTime<Utc>,
    /// Where the data came from
    pub source: String,
    /// Set on degraded reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Sourced for WeatherReport {
    fn source(&self) -> &str {
        &self.source
    }
}

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No API key configured
    #[error("Missing OPENWEATHER_API_KEY")]
    MissingApiKey,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The API rejected our key
    #[error("API key error: {0}")]
    Unauthorized(String),

    /// Any other non-success response
    #[error("Weather API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),
}

/// Client for fetching weather from OpenWeatherMap
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl WeatherClient {
    /// Create a new WeatherClient with default settings
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_client(Client::new(), api_key)
    }

    /// Create a new WeatherClient with a custom HTTP client
    pub fn with_client(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: OPENWEATHER_BASE_URL.to_string(),
        }
    }

    /// Points the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch current conditions and forecast for a location
    ///
    /// # Returns
    /// * `Ok(WeatherReport)` tagged with source "openweathermap"
    /// * `Err(WeatherError)` if no key is configured, or either request fails
    pub async fn fetch_report(&self, location: &Location) -> Result<WeatherReport, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;

        let current: CurrentResponse = self.get_json("weather", location, api_key).await?;
        let forecast: ForecastResponse = self.get_json("forecast", location, api_key).await?;

        build_report(current, forecast)
    }

    /// GETs an OpenWeatherMap endpoint and decodes the body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        location: &Location,
        api_key: &str,
    ) -> Result<T, WeatherError> {
        let url = format!(
            "{}/{}?lat={}&lon={}&appid={}&units=metric",
            self.base_url, endpoint, location.latitude, location.longitude, api_key
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            if status == StatusCode::UNAUTHORIZED {
                return Err(WeatherError::Unauthorized(message));
            }
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Degraded report served when OpenWeatherMap is unreachable
pub fn fallback_report() -> WeatherReport {
    let forecast = (0..FORECAST_DAYS)
        .map(|i| DailyForecast {
            day: ["Today", "Tomorrow", "Day 3", "Day 4", "Day 5"][i].to_string(),
            high: 14,
            low: 8,
            icon: DEFAULT_ICON.to_string(),
        })
        .collect();

    WeatherReport {
        current: CurrentConditions {
            temp: 12,
            condition: "Data temporarily unavailable".to_string(),
            humidity: 65,
            wind_speed: 15,
            icon: DEFAULT_ICON.to_string(),
        },
        forecast,
        last_updated: Utc::now(),
        source: FALLBACK_SOURCE.to_string(),
        error: Some("API temporarily unavailable".to_string()),
    }
}

/// Combines the two API responses into a report
fn build_report(
    current: CurrentResponse,
    forecast: ForecastResponse,
) -> Result<WeatherReport, WeatherError> {
    let summary = current
        .weather
        .first()
        .ok_or_else(|| WeatherError::MissingField("weather".to_string()))?;

    let offset = forecast
        .city
        .as_ref()
        .and_then(|city| FixedOffset::east_opt(city.timezone))
        .unwrap_or_else(|| Utc.fix());

    Ok(WeatherReport {
        current: CurrentConditions {
            temp: current.main.temp.round() as i32,
            condition: summary.description.clone(),
            humidity: current.main.humidity.round().clamp(0.0, 100.0) as u8,
            // m/s to km/h
            wind_speed: (current.wind.speed * 3.6).round() as i32,
            icon: weather_icon(&summary.icon).to_string(),
        },
        forecast: process_forecast(&forecast.list, offset),
        last_updated: Utc::now(),
        source: WEATHER_SOURCE.to_string(),
        error: None,
    })
}

/// Groups 3-hourly forecast slots by local date into daily high/low rows
///
/// Days appear in the order they first occur in `slots`; at most
/// five are returned. A day's icon is that of its first slot.
fn process_forecast(slots: &[ForecastSlot], offset: FixedOffset) -> Vec<DailyForecast> {
    let mut days: Vec<(NaiveDate, Vec<f64>, String)> = Vec::new();

    for slot in slots {
        let Some(time) = DateTime::from_timestamp(slot.dt, 0) else {
            continue;
        };
        let date = time.with_timezone(&offset).date_naive();
        let icon = slot.weather.first().map(|w| w.icon.as_str()).unwrap_or("");

        match days.iter_mut().find(|(d, _, _)| *d == date) {
            Some((_, temps, _)) => temps.push(slot.main.temp),
            None => days.push((date, vec![slot.main.temp], icon.to_string())),
        }
    }

    days.into_iter()
        .take(FORECAST_DAYS)
        .enumerate()
        .map(|(index, (date, temps, icon))| {
            let high = temps.iter().copied().fold(f64::MIN, f64::max);
            let low = temps.iter().copied().fold(f64::MAX, f64::min);
            DailyForecast {
                day: match index {
                    0 => "Today".to_string(),
                    1 => "Tomorrow".to_string(),
                    _ => date.format("%a").to_string(),
                },
                high: high.round() as i32,
                low: low.round() as i32,
                icon: weather_icon(&icon).to_string(),
            }
        })
        .collect()
}

/// Map an OpenWeatherMap icon code (e.g., "10d") to a display icon
pub fn weather_icon(code: &str) -> &'static str {
    match code {
        "01d" => "☀️",
        "01n" => "🌙",
        "02d" | "02n" => "⛅",
        "03d" | "03n" | "04d" | "04n" => "☁️",
        "09d" | "09n" | "10n" => "🌧️",
        "10d" => "🌦️",
        "11d" | "11n" => "⛈️",
        "13d" | "13n" => "❄️",
        "50d" | "50n" => "🌫️",
        _ => DEFAULT_ICON,
    }
}

/// Error body returned by OpenWeatherMap on failure
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// `/weather` response
#[derive(Debug, Deserialize)]
struct CurrentResponse {
    weather: Vec<WeatherSummary>,
    main: MainReadings,
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct WeatherSummary {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

/// `/forecast` response
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastSlot>,
    city: Option<City>,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    /// Unix timestamp of the slot
    dt: i64,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<WeatherSummary>,
}

#[derive(Debug, Deserialize)]
struct City {
    /// Shift from UTC in seconds
    timezone: i32,
}
