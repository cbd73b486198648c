//! Usage tracking for dashboard feeds
//!
//! Each feed request records one `api_call` event tagged with where the data
//! came from (`cache`, the upstream name, or `fallback`). Recording is best
//! effort: a sink failure is logged and never changes what the caller gets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Event type for a feed request
pub const API_CALL: &str = "api_call";

/// Errors raised by an analytics sink
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The sink could not accept the event
    #[error("Analytics sink rejected event: {0}")]
    Rejected(String),
}

/// A single tracked event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    /// Kind of event (currently always [`API_CALL`])
    pub event_type: String,
    /// Feed that was requested (e.g., "weather")
    pub widget_name: String,
    /// Location slug the feed is for (e.g., "port_alberni")
    pub user_location: String,
    /// Where the served data came from
    pub source: String,
    /// When the event was recorded
    pub recorded_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    /// Builds an `api_call` event stamped with the current time
    pub fn api_call(widget: &str, location: &str, source: &str) -> Self {
        Self {
            event_type: API_CALL.to_string(),
            widget_name: widget.to_string(),
            user_location: location.to_string(),
            source: source.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

/// Destination for analytics events
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Records one event
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Emits events as structured log lines under the `padaily::analytics` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl AnalyticsSink for TracingSink {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        info!(
            target: "padaily::analytics",
            event_type = %event.event_type,
            widget = %event.widget_name,
            location = %event.user_location,
            source = %event.source,
            "Feed served"
        );
        Ok(())
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far
    pub async fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn record(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_call_event_fields() {
        let event = AnalyticsEvent::api_call("weather", "port_alberni", "cache");
        assert_eq!(event.event_type, "api_call");
        assert_eq!(event.widget_name, "weather");
        assert_eq!(event.user_location, "port_alberni");
        assert_eq!(event.source, "cache");
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_events_in_order() {
        let sink = MemorySink::new();
        sink.record(AnalyticsEvent::api_call("ferry", "port_alberni", "bc_ferries"))
            .await
            .unwrap();
        sink.record(AnalyticsEvent::api_call("ferry", "port_alberni", "cache"))
            .await
            .unwrap();

        let sources: Vec<String> = sink.events().await.into_iter().map(|e| e.source).collect();
        assert_eq!(sources, vec!["bc_ferries", "cache"]);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingSink;
        let result = sink
            .record(AnalyticsEvent::api_call("gas", "port_alberni", "fallback"))
            .await;
        assert!(result.is_ok());
    }
}
