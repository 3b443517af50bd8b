// Wire model of the FunLess platform HTTP surface, shared by the SDK and the suites.

use std::fmt::Display;

pub use serde::{Deserialize, Serialize};
pub use serde_json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Malformed platform response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("Response carried neither a result nor an error: {0}")]
    EmptyEnvelope(String),
}

pub type Result<T> = std::result::Result<T, CommonError>;

/// Request body for `POST /create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCreation {
    pub name: String,
    pub namespace: String,
    pub code: String,
    pub image: String,
}

/// Request body for `POST /delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeletion {
    pub name: String,
    pub namespace: String,
}

/// Request body for `POST /invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInvocation {
    pub function: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub result: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

/// A decoded platform response: either `{"result": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Result(serde_json::Value),
    Error(String),
}

impl Envelope {
    pub fn parse(body: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if let Some(result) = value.get("result") {
            return Ok(Envelope::Result(result.clone()));
        }
        match value.get("error") {
            Some(serde_json::Value::String(message)) => Ok(Envelope::Error(message.clone())),
            Some(other) => Ok(Envelope::Error(other.to_string())),
            None => Err(CommonError::EmptyEnvelope(body.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Create,
    Delete,
    Invoke,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Create => "/create",
            Endpoint::Delete => "/delete",
            Endpoint::Invoke => "/invoke",
        }
    }
}

/// Error taxonomy the platform exposes through HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformErrorKind {
    NotFound,
    BadRequest,
    UnsupportedMediaType,
    Conflict,
    InvocationFailure,
}

impl PlatformErrorKind {
    /// Classifies a status code. Returns `None` for success statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(PlatformErrorKind::BadRequest),
            404 => Some(PlatformErrorKind::NotFound),
            409 => Some(PlatformErrorKind::Conflict),
            415 => Some(PlatformErrorKind::UnsupportedMediaType),
            _ => Some(PlatformErrorKind::InvocationFailure),
        }
    }

    pub fn status(self) -> u16 {
        match self {
            PlatformErrorKind::NotFound => 404,
            PlatformErrorKind::BadRequest => 400,
            PlatformErrorKind::UnsupportedMediaType => 415,
            PlatformErrorKind::Conflict => 409,
            PlatformErrorKind::InvocationFailure => 500,
        }
    }
}

impl Display for PlatformErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            PlatformErrorKind::NotFound => "not found",
            PlatformErrorKind::BadRequest => "bad request",
            PlatformErrorKind::UnsupportedMediaType => "unsupported media type",
            PlatformErrorKind::Conflict => "conflict",
            PlatformErrorKind::InvocationFailure => "invocation failure",
        };
        f.write_str(text)
    }
}
