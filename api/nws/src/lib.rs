#[macro_use] extern crate log;

mod alert;
mod error;
mod snapshot;

pub use alert::{round_coordinate, AlertKind, AlertRecord, COORDINATE_PRECISION};
pub use error::{FeatureParseError, FetchError};
pub use snapshot::{parse_snapshot, ParsedSnapshot, Snapshot};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

/// Active alerts for the whole country
pub const DEFAULT_ALERTS_URL: &str = "https://api.weather.gov/alerts/active";

/// api.weather.gov rejects requests without a User-Agent
pub const DEFAULT_USER_AGENT: &str = "WarningNav (warningnav@example.com)";

/// National Weather Service alerts API client
pub struct NwsAlertsAPI {
    client: Client,
    source_url: String,
}

impl NwsAlertsAPI {
    /// Create a client for a specific feed URL
    pub fn new(source_url: &str, user_agent: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/geo+json"));

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            source_url: source_url.to_string(),
        })
    }

    /// Create a client for the nationwide active-alerts feed
    pub fn national() -> Result<Self, FetchError> {
        Self::new(DEFAULT_ALERTS_URL, DEFAULT_USER_AGENT)
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Fetch and parse the current active alerts.
    ///
    /// Returns no partial result: either the whole collection was read, or
    /// the cycle failed. Individual bad features are logged and dropped.
    pub async fn fetch_active_alerts(&self) -> Result<Snapshot, FetchError> {
        debug!("Fetching active alerts from {}", self.source_url);

        let response = self.client.get(&self.source_url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url: self.source_url.clone(),
            });
        }

        let bytes = response.bytes().await?;
        let parsed = parse_snapshot(&bytes)?;

        for skipped in &parsed.skipped {
            warn!("Skipping alert {}: {}", skipped.id().unwrap_or("<unknown>"), skipped);
        }

        info!(
            "Fetched {} active alerts ({} with polygons, {} skipped)",
            parsed.snapshot.len(),
            parsed.snapshot.with_geometry().count(),
            parsed.skipped.len()
        );

        Ok(parsed.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_creation() {
        let api = NwsAlertsAPI::national().unwrap();
        assert_eq!(api.source_url(), DEFAULT_ALERTS_URL);
    }

    #[test]
    fn test_custom_source() {
        let api = NwsAlertsAPI::new("https://api.weather.gov/alerts/active?area=OK", "test-agent").unwrap();
        assert_eq!(api.source_url(), "https://api.weather.gov/alerts/active?area=OK");
    }

    #[tokio::test]
    async fn test_unreachable_source_is_fetch_error() {
        // Nothing listens on port 9 of the loopback interface
        let api = NwsAlertsAPI::new("http://127.0.0.1:9/alerts/active", "test-agent").unwrap();
        assert!(matches!(api.fetch_active_alerts().await, Err(FetchError::Http(_))));
    }
}
