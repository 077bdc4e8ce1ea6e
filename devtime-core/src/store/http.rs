//! HTTP remote store talking to the devtime API server.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use super::{RemoteStore, StoreError};
use crate::models::{DayRecord, DeltaRecord};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error body returned by the API server.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
    message: String,
}

/// Remote store backed by the devtime HTTP API.
///
/// Failures are classified from reqwest's structured signals and HTTP status
/// codes. Text sniffing is only the fallback.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
}

impl HttpStore {
    pub fn new(
        server_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::permanent(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_url: server_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        let base_url = if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    fn day_url(&self, user_id: &str, date: &str) -> String {
        self.build_http_url(&format!(
            "/users/{}/days/{}",
            urlencoding::encode(user_id),
            urlencoding::encode(date)
        ))
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.api_key))
    }
}

/// Maps a transport error onto a store error.
fn classify_reqwest(err: reqwest::Error) -> StoreError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() || err.is_connect() || err.is_request() {
        StoreError::transient(message)
    } else if err.is_decode() || err.is_builder() || err.is_body() {
        StoreError::permanent(message)
    } else if let Some(status) = err.status() {
        classify_status(status, message)
    } else {
        StoreError::from_message(message)
    }
}

fn classify_status(status: StatusCode, message: String) -> StoreError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        StoreError::transient(message)
    } else {
        StoreError::permanent(message)
    }
}

/// Turns a non-success response into a classified error.
async fn error_from_response(response: Response) -> StoreError {
    let status = response.status();
    let message = match response.json::<ApiError>().await {
        Ok(body) => format!("server returned {} ({}): {}", status, body.error, body.message),
        Err(_) => format!("server returned {}", status),
    };
    classify_status(status, message)
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.build_http_url("/health"))
            .send()
            .await
            .map_err(classify_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        tracing::debug!(server_url = %self.server_url, "Connected to sync server");
        Ok(())
    }

    async fn read(&self, user_id: &str, date: &str) -> Result<Option<DayRecord>, StoreError> {
        let response = self
            .authorized(self.client.get(self.day_url(user_id, date)))
            .send()
            .await
            .map_err(classify_reqwest)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response.json().await.map(Some).map_err(classify_reqwest)
    }

    async fn write(&self, record: &DayRecord) -> Result<(), StoreError> {
        let response = self
            .authorized(
                self.client
                    .put(self.day_url(&record.user_id, &record.date))
                    .json(record),
            )
            .send()
            .await
            .map_err(classify_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(())
    }

    fn supports_increment(&self) -> bool {
        true
    }

    async fn increment(&self, user_id: &str, delta: &DeltaRecord) -> Result<DayRecord, StoreError> {
        let url = format!("{}/increment", self.day_url(user_id, &delta.date));
        let response = self
            .authorized(self.client.post(url).json(delta))
            .send()
            .await
            .map_err(classify_reqwest)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response.json().await.map_err(classify_reqwest)
    }
}
