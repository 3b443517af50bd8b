use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use fl_common::{Endpoint, Serialize};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Status and untouched body of a platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .wrap_err_with(|| format!("Response body is not JSON: {}", self.body))
    }
}

/// Speaks to the platform API below the SDK, so bodies, content types and
/// status codes can be checked exactly.
#[derive(Debug, Clone)]
pub struct RawHttp {
    client: Client,
    host: String,
}

impl RawHttp {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Posts `body` serialized as JSON.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        body: &T,
    ) -> Result<RawResponse> {
        let text = serde_json::to_string(body).wrap_err("Failed to serialize request")?;
        self.post_raw(endpoint, "application/json", text).await
    }

    /// Posts `body` verbatim with the given content type.
    pub async fn post_raw(
        &self,
        endpoint: Endpoint,
        content_type: &str,
        body: impl Into<String>,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", self.host, endpoint.path());
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .body(body.into())
            .send()
            .await
            .wrap_err_with(|| format!("POST {url} failed"))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .wrap_err_with(|| format!("Failed to read response from {url}"))?;
        debug!(%url, status, "Platform responded");
        Ok(RawResponse { status, body })
    }
}
