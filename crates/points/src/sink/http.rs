//! HTTP points sink backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use domain::PointsPayload;
use reqwest::{Client, Url};

use super::PointsSink;
use crate::error::SinkError;

/// Posts payloads as JSON to the configured `cart.points-sink-url`.
#[derive(Debug, Clone)]
pub struct HttpPointsSink {
    client: Client,
    url: Url,
}

impl HttpPointsSink {
    /// Creates a sink for an absolute URL with a per-request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let url = Url::parse(url).map_err(|e| SinkError::Config(format!("{url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;
        Ok(Self { client, url })
    }

    /// Returns the sink URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PointsSink for HttpPointsSink {
    #[tracing::instrument(skip(self, payload), fields(url = %self.url, username = %payload.username))]
    async fn send(&self, payload: &PointsPayload) -> Result<String, SinkError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_server_error() {
            return Err(SinkError::Server {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            return Err(SinkError::Client {
                status: status.as_u16(),
            });
        }

        Ok(body)
    }
}
