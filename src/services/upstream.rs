//! Upstream roads/weather feed client.
//!
//! Both feeds are plain JSON GET endpoints owned by a third party. They are
//! always fetched together: a refresh needs both documents or it fails.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde_json::Value;

use crate::errors::AppError;

pub const ROADS_PATH: &str = "/api/v1/roads";
pub const WEATHER_PATH: &str = "/api/v1/weather";

/// Client for the two upstream status feeds.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
}

/// Raw documents from one successful fetch of both feeds.
#[derive(Debug, Clone)]
pub struct FeedDocuments {
    pub roads: Value,
    pub weather: Value,
}

impl FeedClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| AppError::InternalError(format!("Invalid User-Agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch both feeds concurrently. Fails if either one fails.
    pub async fn fetch_feeds(&self) -> Result<FeedDocuments, AppError> {
        let (roads, weather) = futures::try_join!(
            self.fetch_document(ROADS_PATH),
            self.fetch_document(WEATHER_PATH),
        )?;
        Ok(FeedDocuments { roads, weather })
    }

    /// GET one feed document. Any non-2xx status is an error.
    async fn fetch_document(&self, path: &str) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::ExternalServiceError(format!("{} request failed: {}", path, e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "{} returned HTTP {}",
                path,
                response.status()
            )));
        }

        let doc: Value = response.json().await.map_err(|e| {
            AppError::MalformedPayload(format!("{} JSON parse error: {}", path, e))
        })?;

        tracing::debug!("Fetched {}", url);
        Ok(doc)
    }
}
