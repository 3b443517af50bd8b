//! # FunLess Rust SDK
//!
//! A typed client for the FunLess platform API: create, invoke and delete
//! functions inside a namespace.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fl_sdk::{FlClient, FunctionInvocation};
//!
//! # async fn run() -> Result<(), fl_sdk::SdkError> {
//! let client = FlClient::new("http://localhost:4000");
//!
//! let result = client
//!     .invoke(&FunctionInvocation {
//!         function: "hellojs".to_string(),
//!         namespace: "helloNS".to_string(),
//!         args: Some(serde_json::json!({"name": "Test"})),
//!     })
//!     .await?;
//!
//! println!("{:?}", result.result);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Non-2xx responses become [`SdkError::Api`]. When the body is the platform's
//! `{"error": "..."}` object it is decoded into an [`ErrorModel`] matching the
//! operation that failed; [`extract_error`] returns that message.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use fl_common::{
    Endpoint, FunctionCreation, FunctionDeletion, FunctionInvocation, PlatformErrorKind,
};

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{status}")]
    Api {
        status: StatusCode,
        body: String,
        model: Option<ErrorModel>,
    },
}

impl SdkError {
    /// Platform error class for API errors; `None` for transport failures.
    pub fn kind(&self) -> Option<PlatformErrorKind> {
        match self {
            SdkError::Api { status, .. } => PlatformErrorKind::from_status(status.as_u16()),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&ErrorModel> {
        match self {
            SdkError::Api { model, .. } => model.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;

/// The `{"error": "..."}` body the platform returns on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionError {
    pub error: String,
}

/// Structured error payload, tagged by the operation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorModel {
    FunctionCreationError(FunctionError),
    FunctionDeletionError(FunctionError),
    FunctionInvocationError(FunctionError),
}

impl ErrorModel {
    pub fn message(&self) -> &str {
        match self {
            ErrorModel::FunctionCreationError(e)
            | ErrorModel::FunctionDeletionError(e)
            | ErrorModel::FunctionInvocationError(e) => &e.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionCreationSuccess {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionDeletionSuccess {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionInvocationSuccess {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Message of the structured error model when there is one, otherwise the
/// error's own description.
pub fn extract_error(err: &SdkError) -> String {
    match err.model() {
        Some(model) => model.message().to_string(),
        None => err.to_string(),
    }
}

/// Client for the FunLess platform API.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct FlClient {
    client: Client,
    base_path: String,
}

impl FlClient {
    /// `base_path` is the platform's address, e.g. `http://localhost:4000`.
    pub fn new(base_path: impl Into<String>) -> Self {
        Self::with_http_client(base_path, Client::new())
    }

    pub fn with_timeout(base_path: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(base_path, client))
    }

    pub fn with_http_client(base_path: impl Into<String>, client: Client) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self { client, base_path }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub async fn create(&self, body: &FunctionCreation) -> Result<FunctionCreationSuccess> {
        self.post(Endpoint::Create, body, ErrorModel::FunctionCreationError)
            .await
    }

    pub async fn invoke(&self, body: &FunctionInvocation) -> Result<FunctionInvocationSuccess> {
        self.post(Endpoint::Invoke, body, ErrorModel::FunctionInvocationError)
            .await
    }

    pub async fn delete(&self, body: &FunctionDeletion) -> Result<FunctionDeletionSuccess> {
        self.post(Endpoint::Delete, body, ErrorModel::FunctionDeletionError)
            .await
    }

    async fn post<B, T>(
        &self,
        endpoint: Endpoint,
        body: &B,
        model: fn(FunctionError) -> ErrorModel,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_path, endpoint.path());
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%url, %status, "Platform responded");

        if status.is_success() {
            return Ok(serde_json::from_str(&text)?);
        }

        let model = serde_json::from_str::<FunctionError>(&text).ok().map(model);
        Err(SdkError::Api {
            status,
            body: text,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_prefers_model() {
        let err = SdkError::Api {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
            model: Some(ErrorModel::FunctionInvocationError(FunctionError {
                error: "Failed to invoke function: function not found in given namespace"
                    .to_string(),
            })),
        };
        assert_eq!(
            extract_error(&err),
            "Failed to invoke function: function not found in given namespace"
        );
        assert_eq!(err.kind(), Some(PlatformErrorKind::NotFound));

        let bare = SdkError::Api {
            status: StatusCode::NOT_FOUND,
            body: "<html>".to_string(),
            model: None,
        };
        assert_eq!(extract_error(&bare), "404 Not Found");
    }

    #[test]
    fn test_base_path_trailing_slash() {
        let client = FlClient::new("http://localhost:4000/");
        assert_eq!(client.base_path(), "http://localhost:4000");
    }
}
