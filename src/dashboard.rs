//! Dashboard feeds served through the temporal cache
//!
//! One [`Dashboard`] is built per process with its cache, analytics sink and
//! upstream clients injected. Each feed is a single call that goes through
//! [`TemporalCache::get_or_produce`], records one analytics event, and returns
//! the payload as JSON with a `cached` flag added for the front end.

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::cache::{CacheError, Origin, Served, TemporalCache};
use crate::config::Config;
use crate::sources::{
    ferry, gas, weather, FerryClient, Location, PriceSource, ProvincialAverage, Sourced,
    WeatherClient, FALLBACK_SOURCE, USER_AGENT,
};

/// Analytics source recorded for values served from cache
pub const CACHE_SOURCE: &str = "cache";

/// Errors returned by dashboard feeds
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The data feeds the dashboard shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Weather,
    Ferry,
    GasPrices,
}

impl Feed {
    /// Widget name used in analytics and JSON output
    pub fn name(&self) -> &'static str {
        match self {
            Feed::Weather => "weather",
            Feed::Ferry => "ferry",
            Feed::GasPrices => "gasPrices",
        }
    }

    /// How long a produced payload stays fresh
    pub fn ttl(&self) -> Duration {
        match self {
            Feed::Weather => weather::WEATHER_TTL,
            Feed::Ferry => ferry::FERRY_TTL,
            Feed::GasPrices => gas::GAS_TTL,
        }
    }

    /// Cache key for this feed at `location`
    pub fn cache_key(&self, location: &Location) -> String {
        match self {
            Feed::Weather => weather::cache_key(location),
            Feed::Ferry => ferry::cache_key(location),
            Feed::GasPrices => gas::cache_key(location),
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Serves dashboard feeds for one location
pub struct Dashboard {
    cache: TemporalCache,
    analytics: Arc<dyn AnalyticsSink>,
    location: &'static Location,
    weather: WeatherClient,
    ferry: FerryClient,
    prices: Arc<dyn PriceSource>,
}

impl Dashboard {
    /// Builds a dashboard whose upstream clients share one HTTP client
    /// configured from `config`
    pub fn new(
        cache: TemporalCache,
        analytics: Arc<dyn AnalyticsSink>,
        location: &'static Location,
        config: &Config,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_sources(
            cache,
            analytics,
            location,
            WeatherClient::with_client(client.clone(), config.openweather_api_key.clone()),
            FerryClient::with_client(client),
            Arc::new(ProvincialAverage),
        ))
    }

    /// Builds a dashboard from explicit upstream sources
    pub fn with_sources(
        cache: TemporalCache,
        analytics: Arc<dyn AnalyticsSink>,
        location: &'static Location,
        weather: WeatherClient,
        ferry: FerryClient,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            cache,
            analytics,
            location,
            weather,
            ferry,
            prices,
        }
    }

    pub fn location(&self) -> &'static Location {
        self.location
    }

    /// Current conditions and 5-day forecast
    pub async fn weather(&self) -> Result<Value, DashboardError> {
        self.serve(
            Feed::Weather,
            || self.weather.fetch_report(self.location),
            weather::fallback_report,
        )
        .await
    }

    /// Today's off-island sailings
    pub async fn ferry(&self) -> Result<Value, DashboardError> {
        self.serve(Feed::Ferry, || self.ferry.fetch_board(), ferry::fallback_board)
            .await
    }

    /// Local gas price board
    pub async fn gas_prices(&self) -> Result<Value, DashboardError> {
        self.serve(
            Feed::GasPrices,
            || gas::fetch_board(self.prices.as_ref()),
            gas::fallback_board,
        )
        .await
    }

    /// Serves one feed by name
    pub async fn feed(&self, feed: Feed) -> Result<Value, DashboardError> {
        match feed {
            Feed::Weather => self.weather().await,
            Feed::Ferry => self.ferry().await,
            Feed::GasPrices => self.gas_prices().await,
        }
    }

    /// Every feed, fetched concurrently, keyed by feed name
    pub async fn all(&self) -> Result<Value, DashboardError> {
        let (weather, ferry, gas_prices) =
            futures::try_join!(self.weather(), self.ferry(), self.gas_prices())?;

        let mut all = Map::new();
        all.insert(Feed::Weather.name().to_string(), weather);
        all.insert(Feed::Ferry.name().to_string(), ferry);
        all.insert(Feed::GasPrices.name().to_string(), gas_prices);
        all.insert(
            "location".to_string(),
            Value::String(self.location.name.to_string()),
        );
        Ok(Value::Object(all))
    }

    /// Runs `producer` through the cache, records the request and tags the
    /// JSON with whether it was a cache hit
    async fn serve<T, P, Fut, E, F>(
        &self,
        feed: Feed,
        producer: P,
        fallback: F,
    ) -> Result<Value, DashboardError>
    where
        T: Serialize + DeserializeOwned + Sourced,
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        F: FnOnce() -> T,
    {
        let key = feed.cache_key(self.location);
        let served = self
            .cache
            .get_or_produce(&key, feed.ttl(), producer, || {
                Ok::<_, Infallible>(fallback())
            })
            .await?;

        let source = analytics_source(&served);
        debug!(feed = %feed, key = %key, source = %source, "Feed served");
        let event = AnalyticsEvent::api_call(feed.name(), self.location.slug, &source);
        if let Err(e) = self.analytics.record(event).await {
            warn!(feed = %feed, error = %e, "Failed to record analytics event");
        }

        let cached = served.was_cached();
        let mut json = serde_json::to_value(served.value)?;
        if let Value::Object(fields) = &mut json {
            fields.insert("cached".to_string(), Value::Bool(cached));
        }
        Ok(json)
    }
}

/// Source tag recorded in analytics for a served value
fn analytics_source<T: Sourced>(served: &Served<T>) -> String {
    match served.origin {
        Origin::Cache => CACHE_SOURCE.to_string(),
        Origin::Fresh => served.value.source().to_string(),
        Origin::Fallback => FALLBACK_SOURCE.to_string(),
    }
}
